use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide liveness/readiness flag.
///
/// Starts unhealthy. The entrypoint marks it healthy once the notifier is
/// running and unhealthy as the first step of shutdown; the health server
/// only reads it.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    healthy: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
