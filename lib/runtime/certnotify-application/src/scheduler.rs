use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use certnotify_domain::config::DEFAULT_CHECK_INTERVAL;
use certnotify_domain::{NotificationEvent, NotifierConfig, ObservedCertificate, days_until_expiry};
use certnotify_ports::{CertificateSource, NotificationPort};

use crate::classify::{Classification, classify};
use crate::ledger::NotificationLedger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub check_interval: Duration,
    pub expiration_threshold: Duration,
    pub namespace: Option<String>,
}

impl From<&NotifierConfig> for SchedulerSettings {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            check_interval: config.check_interval,
            expiration_threshold: config.expiration_threshold,
            namespace: config.namespace.clone(),
        }
    }
}

/// Counts for one classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub seen: usize,
    pub unissued: usize,
    /// Expired certificates, notified or not.
    pub expired: usize,
    /// Expiring certificates, notified or not.
    pub expiring: usize,
    /// Notifications at least one destination accepted.
    pub delivered: usize,
    pub suppressed: usize,
    /// Notifications no destination accepted.
    pub failed: usize,
}

pub struct ExpiryScheduler {
    source: Arc<dyn CertificateSource>,
    notifier: Arc<dyn NotificationPort>,
    settings: SchedulerSettings,
    threshold: TimeDelta,
    ledger: NotificationLedger,
}

impl ExpiryScheduler {
    pub fn new(
        source: Arc<dyn CertificateSource>,
        notifier: Arc<dyn NotificationPort>,
        settings: SchedulerSettings,
    ) -> Self {
        let threshold = TimeDelta::from_std(settings.expiration_threshold).unwrap_or(TimeDelta::MAX);
        Self {
            source,
            notifier,
            settings,
            threshold,
            ledger: NotificationLedger::new(),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &NotificationLedger {
        &self.ledger
    }

    /// Runs one pass immediately, then one per check interval, until
    /// `shutdown` is cancelled. A pass already in progress is finished.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval = ?self.settings.check_interval,
            namespace = self.settings.namespace.as_deref().unwrap_or("<all>"),
            "starting certificate monitor"
        );

        let period = if self.settings.check_interval.is_zero() {
            DEFAULT_CHECK_INTERVAL
        } else {
            self.settings.check_interval
        };
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            if let Err(err) = self.check_certificates(Utc::now()).await {
                error!("certificate check failed: {err:#}");
            }
        }

        info!("certificate monitor stopped");
    }

    /// Fetches the current certificate set and classifies it against `now`.
    pub async fn check_certificates(&mut self, now: DateTime<Utc>) -> Result<TickSummary> {
        debug!("checking certificates");
        let certificates = self
            .source
            .list_certificates(self.settings.namespace.as_deref())
            .await
            .context("failed to get certificates")?;
        info!(count = certificates.len(), "found certificates");

        let summary = self.tick(&certificates, now).await;
        info!(
            expired = summary.expired,
            expiring = summary.expiring,
            delivered = summary.delivered,
            failed = summary.failed,
            suppressed = summary.suppressed,
            "certificate check completed"
        );
        Ok(summary)
    }

    pub async fn tick(&mut self, certificates: &[ObservedCertificate], now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary {
            seen: certificates.len(),
            ..TickSummary::default()
        };

        for cert in certificates {
            let event = match classify(cert, now, self.threshold) {
                Classification::Unissued => {
                    debug!(certificate = %cert.key, "certificate has no expiration date");
                    summary.unissued += 1;
                    continue;
                }
                Classification::Healthy => continue,
                Classification::Expired { expires_at } => {
                    summary.expired += 1;
                    if !self.ledger.should_notify(&cert.key, now) {
                        summary.suppressed += 1;
                        continue;
                    }
                    warn!(certificate = %cert.key, expires_at = %expires_at, "certificate is expired");
                    NotificationEvent::expired(cert, expires_at, now)
                }
                Classification::Expiring { expires_at } => {
                    summary.expiring += 1;
                    if !self.ledger.should_notify(&cert.key, now) {
                        summary.suppressed += 1;
                        continue;
                    }
                    info!(
                        certificate = %cert.key,
                        days_until_expiry = days_until_expiry(expires_at, now),
                        "certificate is expiring soon"
                    );
                    NotificationEvent::expiring(cert, expires_at, now)
                }
            };

            match self.notifier.deliver(&event).await {
                Ok(report) => {
                    summary.delivered += 1;
                    debug!(
                        certificate = %cert.key,
                        kind = %event.kind,
                        succeeded = report.succeeded,
                        attempted = report.attempted,
                        "notification delivered"
                    );
                }
                Err(err) => {
                    error!(
                        certificate = %cert.key,
                        kind = %event.kind,
                        error = %err,
                        "failed to send notification"
                    );
                    summary.failed += 1;
                }
            }

            // A failed attempt still starts the cooldown.
            self.ledger.mark_notified(cert.key.clone(), now);
        }

        summary
    }
}
