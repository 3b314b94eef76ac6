//! Scan orchestration services.

pub mod naming;
pub mod report;
pub mod supervisor;
pub mod workflow;
