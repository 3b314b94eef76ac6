//! Alerts recorded by the ZAP engine.

use serde::{Deserialize, Serialize};

use crate::errors::ScanError;

/// One potential vulnerability reported by ZAP's `core/view/alerts`.
///
/// Field names follow the engine's JSON so the exported JSON report reads
/// like ZAP's own output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    pub id: String,
    pub plugin_id: String,
    pub alert_ref: String,
    pub alert: String,
    pub name: String,
    pub risk: String,
    pub confidence: String,
    pub url: String,
    pub method: String,
    pub param: String,
    pub attack: String,
    pub evidence: String,
    #[serde(rename = "cweid")]
    pub cwe_id: String,
    #[serde(rename = "wascid")]
    pub wasc_id: String,
    pub description: String,
    pub solution: String,
    pub reference: String,
    pub other: String,
    pub message_id: String,
}

impl Alert {
    /// Fields in report order, keyed by their element name.
    pub fn fields(&self) -> [(&'static str, &str); 19] {
        [
            ("id", self.id.as_str()),
            ("pluginId", self.plugin_id.as_str()),
            ("alertRef", self.alert_ref.as_str()),
            ("alert", self.alert.as_str()),
            ("name", self.name.as_str()),
            ("risk", self.risk.as_str()),
            ("confidence", self.confidence.as_str()),
            ("url", self.url.as_str()),
            ("method", self.method.as_str()),
            ("param", self.param.as_str()),
            ("attack", self.attack.as_str()),
            ("evidence", self.evidence.as_str()),
            ("cweid", self.cwe_id.as_str()),
            ("wascid", self.wasc_id.as_str()),
            ("description", self.description.as_str()),
            ("solution", self.solution.as_str()),
            ("reference", self.reference.as_str()),
            ("other", self.other.as_str()),
            ("messageId", self.message_id.as_str()),
        ]
    }
}

/// All alerts returned for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertCollection {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl AlertCollection {
    /// Decode the engine's JSON alert payload.
    pub fn from_json(raw: &str) -> Result<Self, ScanError> {
        serde_json::from_str(raw)
            .map_err(|e| ScanError::Export(format!("Failed to decode alerts: {e}")))
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
