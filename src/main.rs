use anyhow::Context;
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zapgate::{RunOutcome, ScanConfig, ScanWorkflow, ZapClient};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "zapgate=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = ScanConfig::from_env().context("Failed to load configuration")?;
    let client = ZapClient::new(
        &config.engine_base_url(),
        config.zap_api_key.clone(),
        config.request_timeout,
    )?;
    tracing::info!(
        engine = %client.base_url(),
        target_url = %config.target_url,
        "Starting ZAP scan run"
    );

    let outcome = match ScanWorkflow::new(config, client).run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(phase = ?e.failed_phase(), "Run failed");
            return Err(e.into());
        }
    };

    match outcome {
        RunOutcome::Skipped => tracing::info!("Run skipped"),
        RunOutcome::Completed(summary) => {
            tracing::info!(
                stem = ?summary.stem,
                session = ?summary.session_path,
                attached_session = ?summary.attached_session,
                alerts = summary.report.as_ref().map(|r| r.alert_count),
                shutdown = summary.shutdown_requested,
                "Run finished"
            );
        }
    }

    Ok(())
}
