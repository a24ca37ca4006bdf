//! Port traits between the scheduler and the outside world.

use anyhow::Result;
use async_trait::async_trait;

use certnotify_domain::{DeliveryError, DeliveryReport, NotificationEvent, ObservedCertificate};

/// Where certificates are read from on every poll.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Lists every certificate, or only those in `namespace` when given.
    async fn list_certificates(&self, namespace: Option<&str>) -> Result<Vec<ObservedCertificate>>;

    /// Cheap reachability check used before the scheduler starts.
    async fn probe(&self, namespace: Option<&str>) -> Result<()> {
        self.list_certificates(namespace).await.map(|_| ())
    }
}

/// Fans one notification out to every configured destination.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> Result<DeliveryReport, DeliveryError>;
}
