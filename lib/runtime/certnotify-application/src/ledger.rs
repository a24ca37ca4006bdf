use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use certnotify_domain::CertificateKey;

/// Minimum spacing between two notifications for the same certificate.
pub const NOTIFICATION_COOLDOWN_HOURS: i64 = 24;

pub fn notification_cooldown() -> TimeDelta {
    TimeDelta::hours(NOTIFICATION_COOLDOWN_HOURS)
}

/// Last-notified instant per certificate, kept for the process lifetime.
///
/// Records are keyed by certificate only, not by notification kind, so an
/// `expiring` notification also holds back an `expired` one for the rest of
/// the cooldown.
#[derive(Debug, Clone, Default)]
pub struct NotificationLedger {
    notified: HashMap<CertificateKey, DateTime<Utc>>,
}

impl NotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_notify(&self, key: &CertificateKey, now: DateTime<Utc>) -> bool {
        match self.notified.get(key) {
            None => true,
            Some(last) => now - *last >= notification_cooldown(),
        }
    }

    pub fn mark_notified(&mut self, key: CertificateKey, now: DateTime<Utc>) {
        self.notified.insert(key, now);
    }

    pub fn last_notified(&self, key: &CertificateKey) -> Option<DateTime<Utc>> {
        self.notified.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}
