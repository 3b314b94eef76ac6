//! Data returned by the ZAP engine.

pub mod alert;
