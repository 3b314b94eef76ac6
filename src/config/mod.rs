//! Run configuration read from `ZAP_*` environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ScanError;
use crate::services::supervisor::LaunchMode;

/// Scan run configuration loaded from environment variables.
///
/// Built once at start-up and never mutated during the run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub zap_proxy_host: String,
    pub zap_proxy_port: u16,
    pub zap_api_key: Option<String>,
    pub target_url: String,
    pub spider_url: bool,
    pub scan_url: bool,
    pub save_session: bool,
    pub report_alerts: bool,
    pub shutdown_zap: bool,
    pub reports_directory: PathBuf,
    /// Extra report format on top of XML: `none` or `json`.
    pub report_format: String,
    pub report_html: bool,
    pub skip: bool,
    /// Settle time after spawning the engine or opening a new session.
    pub zap_sleep: Duration,
    pub zap_program: Option<PathBuf>,
    pub new_session: bool,
    pub poll_interval: Duration,
    /// `None` polls until the engine reports completion.
    pub poll_timeout: Option<Duration>,
    pub request_timeout: Duration,
}

impl ScanConfig {
    /// Defaults for a run against `target_url`.
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            zap_proxy_host: "localhost".to_string(),
            zap_proxy_port: 8080,
            zap_api_key: None,
            target_url: target_url.into(),
            spider_url: true,
            scan_url: true,
            save_session: true,
            report_alerts: true,
            shutdown_zap: true,
            reports_directory: PathBuf::from("target/zap-reports"),
            report_format: "none".to_string(),
            report_html: false,
            skip: false,
            zap_sleep: Duration::from_millis(4000),
            zap_program: None,
            new_session: false,
            poll_interval: Duration::from_millis(1000),
            poll_timeout: None,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_env() -> Result<Self, ScanError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::new(String::new());
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str, default| parse_or(get(key), default);

        let skip = parsed("ZAP_SKIP", defaults.skip);
        let target_url = match get("ZAP_TARGET_URL") {
            Some(url) => url,
            None if skip => String::new(),
            None => {
                return Err(ScanError::Config(
                    "ZAP_TARGET_URL must be set".to_string(),
                ))
            }
        };

        Ok(Self {
            zap_proxy_host: get("ZAP_PROXY_HOST").unwrap_or(defaults.zap_proxy_host),
            zap_proxy_port: parse_or(get("ZAP_PROXY_PORT"), defaults.zap_proxy_port),
            zap_api_key: get("ZAP_API_KEY"),
            target_url,
            spider_url: parsed("ZAP_SPIDER_URL", defaults.spider_url),
            scan_url: parsed("ZAP_SCAN_URL", defaults.scan_url),
            save_session: parsed("ZAP_SAVE_SESSION", defaults.save_session),
            report_alerts: parsed("ZAP_REPORT_ALERTS", defaults.report_alerts),
            shutdown_zap: parsed("ZAP_SHUTDOWN", defaults.shutdown_zap),
            reports_directory: get("ZAP_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_directory),
            report_format: get("ZAP_REPORT_FORMAT").unwrap_or(defaults.report_format),
            report_html: parsed("ZAP_REPORT_HTML", defaults.report_html),
            skip,
            zap_sleep: Duration::from_millis(parse_or(get("ZAP_SLEEP_MS"), 4000)),
            zap_program: get("ZAP_PROGRAM").map(PathBuf::from),
            new_session: parsed("ZAP_NEW_SESSION", defaults.new_session),
            poll_interval: Duration::from_millis(parse_or(get("ZAP_POLL_INTERVAL_MS"), 1000)),
            poll_timeout: get("ZAP_POLL_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs),
            request_timeout: Duration::from_secs(parse_or(get("ZAP_REQUEST_TIMEOUT_SECS"), 60)),
        })
    }

    /// Base URL of the engine's control API.
    pub fn engine_base_url(&self) -> String {
        format!("http://{}:{}", self.zap_proxy_host, self.zap_proxy_port)
    }

    /// How the engine is brought up for this run.
    pub fn launch_mode(&self) -> LaunchMode {
        match (&self.zap_program, self.new_session) {
            (_, true) => LaunchMode::Attach { new_session: true },
            (Some(program), false) => LaunchMode::Spawn {
                program: program.clone(),
            },
            (None, false) => LaunchMode::Attach { new_session: false },
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
        .unwrap_or(default)
}
