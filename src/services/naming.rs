//! Collision-resistant artifact names shared by session and report files.

use chrono::Local;
use uuid::Uuid;

/// Build `<prefix><yyyyMMddHHmmss>_<uuid><suffix>`.
///
/// `prefix` defaults to `"temp"` and `suffix` to `".tmp"`. The UUID is a
/// random v4, so two calls in the same second still differ.
pub fn generate_artifact_stem(prefix: Option<&str>, suffix: Option<&str>) -> String {
    format!(
        "{}{}_{}{}",
        prefix.unwrap_or("temp"),
        Local::now().format("%Y%m%d%H%M%S"),
        Uuid::new_v4(),
        suffix.unwrap_or(".tmp"),
    )
}
