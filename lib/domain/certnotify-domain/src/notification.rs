//! Notification events and their JSON wire format.
//!
//! The serialized shape is a stable contract with webhook consumers:
//!
//! ```json
//! {
//!   "type": "expiring",
//!   "message": "Certificate default/web-tls expires in 12 days",
//!   "certificate": {
//!     "name": "web-tls",
//!     "namespace": "default",
//!     "issuer": "letsencrypt",
//!     "dns_names": ["example.com"],
//!     "expires_at": "2024-01-12T00:00:00Z"
//!   },
//!   "timestamp": "2023-12-31T00:00:00Z"
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::certificate::{CertificateKey, ObservedCertificate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Expired,
    Expiring,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Expired => "expired",
            NotificationKind::Expiring => "expiring",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDetails {
    pub name: String,
    pub namespace: String,
    pub issuer: String,
    pub dns_names: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl CertificateDetails {
    pub fn key(&self) -> CertificateKey {
        CertificateKey::new(self.namespace.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub certificate: CertificateDetails,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// Builds the event for a certificate whose expiry has already passed.
    pub fn expired(cert: &ObservedCertificate, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            kind: NotificationKind::Expired,
            message: format!("Certificate {} has expired", cert.key),
            certificate: details(cert, expires_at),
            timestamp: now,
        }
    }

    /// Builds the event for a certificate inside the expiration threshold.
    pub fn expiring(cert: &ObservedCertificate, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let days = days_until_expiry(expires_at, now);
        let unit = if days == 1 { "day" } else { "days" };
        Self {
            kind: NotificationKind::Expiring,
            message: format!("Certificate {} expires in {days} {unit}", cert.key),
            certificate: details(cert, expires_at),
            timestamp: now,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Whole days between `now` and `expires_at`, truncated toward zero.
pub fn days_until_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_days()
}

fn details(cert: &ObservedCertificate, expires_at: DateTime<Utc>) -> CertificateDetails {
    CertificateDetails {
        name: cert.key.name.clone(),
        namespace: cert.key.namespace.clone(),
        issuer: cert.issuer.clone(),
        dns_names: cert.dns_names.clone(),
        expires_at,
    }
}
