//! Control API of the ZAP scanning engine.
//!
//! The workflow only talks to the engine through the `ZapApi` trait so a
//! scripted engine can stand in for ZAP in tests. `zap::ZapClient` is the
//! HTTP implementation used by the binary.

pub mod zap;

use std::fmt;

use async_trait::async_trait;

use crate::errors::ScanError;

/// Status value at which a spider or active scan job is finished.
pub const SCAN_COMPLETE: u8 = 100;

/// Identifier the engine hands back when a scan job starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanId(pub String);

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations the workflow invokes on the engine.
#[async_trait]
pub trait ZapApi: Send + Sync {
    /// Start a spider crawl rooted at `url`.
    async fn spider_scan(&self, url: &str) -> Result<ScanId, ScanError>;

    /// Progress of a spider job, 0..=100.
    async fn spider_status(&self, scan: &ScanId) -> Result<u8, ScanError>;

    /// Start an active scan of `url`.
    async fn active_scan(
        &self,
        url: &str,
        recurse: bool,
        in_scope_only: bool,
    ) -> Result<ScanId, ScanError>;

    /// Progress of an active scan job, 0..=100.
    async fn active_scan_status(&self, scan: &ScanId) -> Result<u8, ScanError>;

    /// Persist the current session under `path`.
    async fn save_session(&self, path: &str) -> Result<(), ScanError>;

    /// Discard the current session and start a fresh one stored at `path`.
    async fn new_session(&self, path: &str) -> Result<(), ScanError>;

    /// Raw alert payload, JSON when `as_json` is set and XML otherwise.
    async fn get_all_alerts(&self, as_json: bool) -> Result<String, ScanError>;

    /// HTML rendering of all alerts.
    async fn get_alerts_html(&self) -> Result<String, ScanError>;

    async fn shutdown(&self) -> Result<(), ScanError>;
}
