//! Unified error taxonomy for a scan run.

use std::path::PathBuf;
use std::time::Duration;

use crate::services::workflow::ScanPhase;

/// Everything that can go wrong while driving the ZAP engine.
///
/// Only `Launch`, the control API variants and `PollTimeout` are fatal; the
/// workflow absorbs `Export`, `UnsupportedFormat` and `Cleanup` after
/// logging them.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unable to start ZAP [{}]: {source}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ZAP control API unreachable: {0}")]
    ControlTransport(String),

    #[error("ZAP API error {code}: {message}")]
    EngineApi { code: String, message: String },

    #[error("Malformed ZAP response: {0}")]
    MalformedResponse(String),

    #[error("{phase} did not complete within {}s", timeout.as_secs())]
    PollTimeout { phase: ScanPhase, timeout: Duration },

    #[error("Export error: {0}")]
    Export(String),

    #[error("Unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("Shutdown failed: {0}")]
    Cleanup(String),

    #[error("Processing with ZAP failed during {phase}: {source}")]
    RunFailed {
        phase: ScanPhase,
        #[source]
        source: Box<ScanError>,
    },
}

impl ScanError {
    /// Check if this error came from spawning the engine process.
    pub fn is_launch(&self) -> bool {
        matches!(self, Self::Launch { .. })
    }

    /// Check if this error represents a failed exchange with the control API.
    pub fn is_control_transport(&self) -> bool {
        matches!(
            self,
            Self::ControlTransport(_) | Self::EngineApi { .. } | Self::MalformedResponse(_)
        )
    }

    /// Phase a run-level failure happened in, if this is one.
    pub fn failed_phase(&self) -> Option<ScanPhase> {
        match self {
            Self::RunFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest keeps the useful part (connection refused, timeout) in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::ControlTransport(message)
    }
}
