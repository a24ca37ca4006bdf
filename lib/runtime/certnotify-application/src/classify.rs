use chrono::{DateTime, TimeDelta, Utc};

use certnotify_domain::ObservedCertificate;

/// Lifecycle state of a certificate relative to one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No expiry recorded yet.
    Unissued,
    Expired { expires_at: DateTime<Utc> },
    Expiring { expires_at: DateTime<Utc> },
    Healthy,
}

pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

/// True once `now + threshold` passes the expiry. Every expired
/// certificate also satisfies this.
pub fn is_expiring(expires_at: DateTime<Utc>, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
    match now.checked_add_signed(threshold) {
        Some(horizon) => horizon > expires_at,
        None => true,
    }
}

/// Expired is checked first and wins over expiring.
pub fn classify(cert: &ObservedCertificate, now: DateTime<Utc>, threshold: TimeDelta) -> Classification {
    let Some(expires_at) = cert.expires_at else {
        return Classification::Unissued;
    };

    if is_expired(expires_at, now) {
        Classification::Expired { expires_at }
    } else if is_expiring(expires_at, now, threshold) {
        Classification::Expiring { expires_at }
    } else {
        Classification::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn cert_expiring_at(expires_at: DateTime<Utc>) -> ObservedCertificate {
        ObservedCertificate::new("default", "web-tls").with_expiry(expires_at)
    }

    #[test]
    fn unissued_certificate_is_not_classified() {
        let cert = ObservedCertificate::new("default", "pending");
        assert_eq!(classify(&cert, now(), TimeDelta::days(30)), Classification::Unissued);
    }

    #[test]
    fn expired_wins_over_expiring() {
        let expires_at = now() - TimeDelta::hours(1);
        assert!(is_expiring(expires_at, now(), TimeDelta::days(30)));
        assert_eq!(
            classify(&cert_expiring_at(expires_at), now(), TimeDelta::days(30)),
            Classification::Expired { expires_at }
        );
    }

    #[test]
    fn inside_threshold_is_expiring() {
        let expires_at = now() + TimeDelta::days(10);
        assert_eq!(
            classify(&cert_expiring_at(expires_at), now(), TimeDelta::days(30)),
            Classification::Expiring { expires_at }
        );
    }

    #[test]
    fn beyond_threshold_is_healthy() {
        let expires_at = now() + TimeDelta::days(45);
        assert_eq!(
            classify(&cert_expiring_at(expires_at), now(), TimeDelta::days(30)),
            Classification::Healthy
        );
    }

    #[test]
    fn boundaries_are_strict() {
        // Expiry exactly at `now` is not yet expired.
        assert!(!is_expired(now(), now()));
        assert_eq!(
            classify(&cert_expiring_at(now()), now(), TimeDelta::days(30)),
            Classification::Expiring { expires_at: now() }
        );

        let at_threshold = now() + TimeDelta::days(30);
        assert!(!is_expiring(at_threshold, now(), TimeDelta::days(30)));
    }

    #[test]
    fn overflowing_threshold_counts_as_expiring() {
        let expires_at = now() + TimeDelta::days(3650);
        assert!(is_expiring(expires_at, now(), TimeDelta::MAX));
    }
}
