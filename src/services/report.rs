//! Alert report export.
//!
//! XML is always written. A second format is picked by the configured
//! selector and an HTML rendering can be fetched from the engine on top.
//! All files share the run's artifact stem.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;

use crate::engine::ZapApi;
use crate::errors::ScanError;
use crate::models::alert::AlertCollection;

const ROOT_ELEMENT: &str = "alerts";
const ITEM_ELEMENT: &str = "alertitem";

/// Extra report format written next to the XML report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraFormat {
    None,
    Json,
}

impl FromStr for ExtraFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "json" => Ok(Self::Json),
            _ => Err(ScanError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Files produced by one export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub alert_count: usize,
    pub files: Vec<PathBuf>,
}

/// Fetch every alert from the engine and write the reports for `stem`.
pub async fn export_alerts<C>(
    client: &C,
    stem: &str,
    directory: &Path,
    format: &str,
    include_html: bool,
) -> Result<ExportReport, ScanError>
where
    C: ZapApi + ?Sized,
{
    let raw = client.get_all_alerts(true).await?;
    let alerts = AlertCollection::from_json(&raw)?;
    let mut report = write_reports(stem, directory, &alerts, format).await?;

    if include_html {
        let html = client.get_alerts_html().await?;
        let path = directory.join(format!("{stem}.html"));
        write_file(&path, html.as_bytes()).await?;
        report.files.push(path);
    }

    Ok(report)
}

/// Write `<stem>.xml` and, depending on `format`, `<stem>.json`.
///
/// An unsupported `format` is logged and only the XML report is written.
pub async fn write_reports(
    stem: &str,
    directory: &Path,
    alerts: &AlertCollection,
    format: &str,
) -> Result<ExportReport, ScanError> {
    tokio::fs::create_dir_all(directory).await.map_err(|e| {
        ScanError::Export(format!("Failed to create {}: {e}", directory.display()))
    })?;

    let mut files = Vec::new();

    let xml_path = directory.join(format!("{stem}.xml"));
    write_file(&xml_path, &render_xml(alerts)?).await?;
    files.push(xml_path);

    match format.parse::<ExtraFormat>() {
        Ok(ExtraFormat::Json) => {
            let json = serde_json::to_vec_pretty(alerts)
                .map_err(|e| ScanError::Export(format!("Failed to encode alerts: {e}")))?;
            let json_path = directory.join(format!("{stem}.json"));
            write_file(&json_path, &json).await?;
            files.push(json_path);
        }
        Ok(ExtraFormat::None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Invalid format: only none or json are supported");
        }
    }

    tracing::info!(
        alerts = alerts.len(),
        files = files.len(),
        directory = %directory.display(),
        "Alert reports written"
    );
    Ok(ExportReport {
        alert_count: alerts.len(),
        files,
    })
}

/// Render alerts as `<alerts><alertitem><field>..</field></alertitem></alerts>`.
pub fn render_xml(alerts: &AlertCollection) -> Result<Vec<u8>, ScanError> {
    write_xml(alerts).map_err(|e| ScanError::Export(format!("Failed to render XML: {e}")))
}

fn write_xml(alerts: &AlertCollection) -> anyhow::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;
    for alert in &alerts.alerts {
        writer.write_event(Event::Start(BytesStart::new(ITEM_ELEMENT)))?;
        for (name, value) in alert.fields() {
            writer
                .create_element(name)
                .write_text_content(BytesText::new(value))?;
        }
        writer.write_event(Event::End(BytesEnd::new(ITEM_ELEMENT)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
    Ok(writer.into_inner())
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), ScanError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ScanError::Export(format!("Failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::Alert;

    fn sample_alerts() -> AlertCollection {
        AlertCollection {
            alerts: vec![
                Alert {
                    id: "0".to_string(),
                    alert: "Cross Site Scripting (Reflected)".to_string(),
                    risk: "High".to_string(),
                    param: "q".to_string(),
                    attack: "<script>alert(1)</script>".to_string(),
                    ..Alert::default()
                },
                Alert {
                    id: "1".to_string(),
                    alert: "Cookie No HttpOnly Flag".to_string(),
                    risk: "Low".to_string(),
                    ..Alert::default()
                },
            ],
        }
    }

    #[test]
    fn extra_format_parsing() {
        assert_eq!("json".parse::<ExtraFormat>().unwrap(), ExtraFormat::Json);
        assert_eq!(" JSON ".parse::<ExtraFormat>().unwrap(), ExtraFormat::Json);
        assert_eq!("none".parse::<ExtraFormat>().unwrap(), ExtraFormat::None);
        assert_eq!("".parse::<ExtraFormat>().unwrap(), ExtraFormat::None);
        let err = "yaml".parse::<ExtraFormat>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported report format: yaml");
    }

    #[test]
    fn xml_has_one_item_element_per_alert() {
        let xml = String::from_utf8(render_xml(&sample_alerts()).unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<alerts>"));
        assert_eq!(xml.matches("<alertitem>").count(), 2);
        assert!(xml.contains("<risk>High</risk>"));
        assert!(xml.contains("<cweid></cweid>") || xml.contains("<cweid/>"));
    }

    #[test]
    fn xml_escapes_attack_payloads() {
        let xml = String::from_utf8(render_xml(&sample_alerts()).unwrap()).unwrap();
        assert!(xml.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!xml.contains("<script>"));
    }

    #[test]
    fn empty_collection_renders_bare_root() {
        let xml = String::from_utf8(render_xml(&AlertCollection::default()).unwrap()).unwrap();
        assert!(xml.contains("<alerts>"));
        assert!(xml.contains("</alerts>"));
        assert!(!xml.contains("<alertitem>"));
    }

    #[tokio::test]
    async fn json_selector_writes_matching_json() {
        let dir = tempfile::tempdir().unwrap();
        let alerts = sample_alerts();
        let report = write_reports("ZAP_stem", dir.path(), &alerts, "json")
            .await
            .unwrap();

        assert_eq!(report.alert_count, 2);
        assert_eq!(report.files.len(), 2);
        let json = std::fs::read_to_string(dir.path().join("ZAP_stem.json")).unwrap();
        let decoded = AlertCollection::from_json(&json).unwrap();
        assert_eq!(decoded, alerts);

        let xml = std::fs::read_to_string(dir.path().join("ZAP_stem.xml")).unwrap();
        assert_eq!(xml.matches("<alertitem>").count(), decoded.len());
    }

    #[tokio::test]
    async fn none_selector_writes_only_xml() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_reports("ZAP_stem", dir.path(), &sample_alerts(), "none")
            .await
            .unwrap();
        assert_eq!(report.files, vec![dir.path().join("ZAP_stem.xml")]);
        assert!(!dir.path().join("ZAP_stem.json").exists());
    }

    #[tokio::test]
    async fn unsupported_selector_still_writes_xml() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_reports("ZAP_stem", dir.path(), &sample_alerts(), "yaml")
            .await
            .unwrap();
        assert_eq!(report.files, vec![dir.path().join("ZAP_stem.xml")]);
        assert!(!dir.path().join("ZAP_stem.yaml").exists());
    }

    #[tokio::test]
    async fn missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("target").join("zap-reports");
        write_reports("ZAP_stem", &nested, &AlertCollection::default(), "none")
            .await
            .unwrap();
        assert!(nested.join("ZAP_stem.xml").exists());
    }
}
