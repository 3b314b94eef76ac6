pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod services;

pub use config::ScanConfig;
pub use engine::zap::ZapClient;
pub use errors::ScanError;
pub use services::workflow::{RunOutcome, ScanWorkflow};
