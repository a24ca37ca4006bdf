//! Domain models and invariants.

pub mod certificate;
pub mod config;
pub mod delivery;
pub mod health;
pub mod notification;

pub use certificate::{CertificateKey, ObservedCertificate, UNKNOWN_ISSUER};
pub use config::{ConfigError, DestinationConfig, LogFormat, NotifierConfig};
pub use delivery::{DeliveryError, DeliveryReport, DestinationError, DestinationFailure};
pub use health::HealthState;
pub use notification::{
    CertificateDetails, NotificationEvent, NotificationKind, days_until_expiry,
};
