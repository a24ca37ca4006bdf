use thiserror::Error;

/// Why a single destination did not accept a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    #[error("webhook returned non-success status: {0}")]
    Status(u16),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("delivery cancelled")]
    Cancelled,
    #[error("failed to send request: {0}")]
    Transport(String),
}

/// One failed destination, by its configured name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationFailure {
    pub destination: String,
    pub error: DestinationError,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to encode notification payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to send notification to any of {attempted} webhook(s): {last}")]
    AllFailed {
        attempted: usize,
        last: DestinationFailure,
    },
}

impl std::fmt::Display for DestinationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.destination, self.error)
    }
}

/// Outcome of a fan-out where at least one destination succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<DestinationFailure>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.attempted > 0 && self.succeeded == self.attempted
    }

    /// Some, but not all, destinations accepted the notification.
    pub fn is_degraded(&self) -> bool {
        self.succeeded > 0 && self.succeeded < self.attempted
    }
}
