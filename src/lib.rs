//! cert-manager certificate expiry notifier.

pub mod app;
pub mod telemetry;
