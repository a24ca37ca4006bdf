use std::fmt;

use chrono::{DateTime, Utc};

/// Issuer label reported when a certificate does not name one.
pub const UNKNOWN_ISSUER: &str = "unknown";

/// Composite `namespace/name` identity of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CertificateKey {
    pub namespace: String,
    pub name: String,
}

impl CertificateKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CertificateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Snapshot of one certificate as seen by a single poll.
///
/// `expires_at` is `None` until the certificate has been issued; such
/// certificates are never classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedCertificate {
    pub key: CertificateKey,
    pub expires_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub dns_names: Vec<String>,
}

impl ObservedCertificate {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: CertificateKey::new(namespace, name),
            expires_at: None,
            issuer: UNKNOWN_ISSUER.to_string(),
            dns_names: Vec::new(),
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the issuer, keeping the `unknown` label for blank names.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        if !issuer.trim().is_empty() {
            self.issuer = issuer;
        }
        self
    }

    pub fn with_dns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }
}
