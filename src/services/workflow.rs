//! Scan workflow state machine.
//!
//! Runs the optional phases strictly in order: spider, active scan,
//! session save, report export. Once the engine is up, cleanup always
//! runs afterwards. A failure in spider, active scan or session save stops
//! the remaining phases and becomes the run's error; report export is best
//! effort; a failed shutdown is only logged so it never hides the error
//! that is already on its way out.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::time::Instant;

use crate::config::ScanConfig;
use crate::engine::{ScanId, ZapApi, SCAN_COMPLETE};
use crate::errors::ScanError;
use crate::services::report::{self, ExportReport};
use crate::services::{naming, supervisor};

/// Phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Startup,
    Spider,
    ActiveScan,
    SaveSession,
    ReportAlerts,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Spider => write!(f, "spider"),
            Self::ActiveScan => write!(f, "active scan"),
            Self::SaveSession => write!(f, "session save"),
            Self::ReportAlerts => write!(f, "report export"),
        }
    }
}

/// Long-running engine jobs whose completion is polled.
#[derive(Debug, Clone, Copy)]
enum ScanJob {
    Spider,
    ActiveScan,
}

impl ScanJob {
    fn phase(self) -> ScanPhase {
        match self {
            Self::Spider => ScanPhase::Spider,
            Self::ActiveScan => ScanPhase::ActiveScan,
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Artifact stem shared by the session and report files.
    pub stem: Option<String>,
    pub session_path: Option<PathBuf>,
    /// Temporary session opened when attaching with a new session.
    pub attached_session: Option<PathBuf>,
    pub report: Option<ExportReport>,
    /// Shutdown was requested and the engine accepted it.
    pub shutdown_requested: bool,
}

#[derive(Debug, Clone, Serialize)]
pub enum RunOutcome {
    Skipped,
    Completed(RunSummary),
}

/// Drives one scan run against a ZAP engine.
#[derive(Debug)]
pub struct ScanWorkflow<C> {
    config: ScanConfig,
    client: C,
}

impl<C: ZapApi> ScanWorkflow<C> {
    pub fn new(config: ScanConfig, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Execute the whole run, cleanup included.
    pub async fn run(&self) -> Result<RunOutcome, ScanError> {
        if self.config.skip {
            tracing::info!("Skipping zap execution");
            return Ok(RunOutcome::Skipped);
        }

        let engine = supervisor::start_engine(
            &self.config.launch_mode(),
            &self.client,
            self.config.zap_sleep,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Unable to start ZAP");
            ScanError::RunFailed {
                phase: ScanPhase::Startup,
                source: Box::new(e),
            }
        })?;

        let mut summary = RunSummary {
            attached_session: engine.session_path.clone(),
            ..RunSummary::default()
        };
        let result = self.run_phases(&mut summary).await;

        summary.shutdown_requested = self.cleanup().await;
        engine.release();

        match result {
            Ok(()) => {
                tracing::info!(stem = ?summary.stem, "ZAP run completed");
                Ok(RunOutcome::Completed(summary))
            }
            Err((phase, e)) => {
                tracing::error!(
                    %phase,
                    control_api = e.is_control_transport(),
                    error = %e,
                    "Processing with ZAP failed"
                );
                Err(ScanError::RunFailed {
                    phase,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn run_phases(&self, summary: &mut RunSummary) -> Result<(), (ScanPhase, ScanError)> {
        let target = self.config.target_url.as_str();

        if self.config.spider_url {
            tracing::info!(target_url = target, "Spider the site");
            self.spider(target)
                .await
                .map_err(|e| (ScanPhase::Spider, e))?;
        } else {
            tracing::info!(target_url = target, "skip spidering the site");
        }

        if self.config.scan_url {
            tracing::info!(target_url = target, "Scan the site");
            self.active_scan(target)
                .await
                .map_err(|e| (ScanPhase::ActiveScan, e))?;
        } else {
            tracing::info!(target_url = target, "skip scanning the site");
        }

        if self.config.save_session {
            let stem = artifact_stem(&mut summary.stem).to_string();
            let path = session_path(&self.config.reports_directory, &stem);
            tracing::info!(path = %path.display(), "Save session");
            self.save_session(&path)
                .await
                .map_err(|e| (ScanPhase::SaveSession, e))?;
            summary.session_path = Some(path);
        } else {
            tracing::info!("skip saveSession");
        }

        if self.config.report_alerts {
            let stem = artifact_stem(&mut summary.stem).to_string();
            match report::export_alerts(
                &self.client,
                &stem,
                &self.config.reports_directory,
                &self.config.report_format,
                self.config.report_html,
            )
            .await
            {
                Ok(export) => summary.report = Some(export),
                Err(e) => {
                    tracing::warn!(error = %e, "Writing alert reports failed");
                }
            }
        } else {
            tracing::info!("skip reportAlerts");
        }

        Ok(())
    }

    async fn spider(&self, target: &str) -> Result<(), ScanError> {
        let scan = self.client.spider_scan(target).await?;
        self.wait_for_completion(ScanJob::Spider, &scan).await
    }

    async fn active_scan(&self, target: &str) -> Result<(), ScanError> {
        let scan = self.client.active_scan(target, true, false).await?;
        self.wait_for_completion(ScanJob::ActiveScan, &scan).await
    }

    async fn save_session(&self, path: &Path) -> Result<(), ScanError> {
        // Best effort: the engine may run on another host
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(dir = %parent.display(), error = %e, "Could not create session directory");
            }
        }
        self.client.save_session(&path.to_string_lossy()).await
    }

    /// Poll the job's status until it reaches 100.
    async fn wait_for_completion(&self, job: ScanJob, scan: &ScanId) -> Result<(), ScanError> {
        let phase = job.phase();
        let started = Instant::now();
        let mut queries = 0u32;
        loop {
            let status = match job {
                ScanJob::Spider => self.client.spider_status(scan).await?,
                ScanJob::ActiveScan => self.client.active_scan_status(scan).await?,
            };
            queries += 1;
            tracing::debug!(%phase, %scan, status, "Scan progress");

            if status >= SCAN_COMPLETE {
                tracing::info!(%phase, %scan, queries, elapsed_ms = started.elapsed().as_millis() as u64, "Scan complete");
                return Ok(());
            }
            if let Some(timeout) = self.config.poll_timeout {
                if started.elapsed() >= timeout {
                    return Err(ScanError::PollTimeout { phase, timeout });
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Request engine shutdown when enabled. Never fails the run.
    async fn cleanup(&self) -> bool {
        if !self.config.shutdown_zap {
            tracing::info!("No shutdown of ZAP");
            return false;
        }
        tracing::info!("Shutdown ZAProxy");
        match self.client.shutdown().await {
            Ok(()) => true,
            Err(e) => {
                let e = ScanError::Cleanup(e.to_string());
                tracing::warn!(error = %e, "Ignoring shutdown failure");
                false
            }
        }
    }
}

/// Absolute location of the session file. The engine resolves relative
/// names against its own home directory, not ours.
fn session_path(reports_directory: &Path, stem: &str) -> PathBuf {
    let path = reports_directory.join(stem);
    match std::path::absolute(&path) {
        Ok(absolute) => absolute,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not resolve session path");
            path
        }
    }
}

/// Stem of this run's artifacts, generated on first use.
fn artifact_stem(slot: &mut Option<String>) -> &str {
    slot.get_or_insert_with(|| naming::generate_artifact_stem(Some("ZAP"), Some("")))
}
