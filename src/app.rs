//! Process wiring and the shutdown sequence.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use certnotify_adapter_health::HealthServer;
use certnotify_adapter_kube::KubeCertificateSource;
use certnotify_adapter_webhook::WebhookNotifier;
use certnotify_application::{ExpiryScheduler, SchedulerSettings};
use certnotify_domain::{HealthState, NotifierConfig};
use certnotify_ports::{CertificateSource, NotificationPort};

/// How long an in-flight pass may keep delivering after shutdown begins.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// How long to wait for the scheduler after in-flight sends are aborted.
const ABORT_WAIT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The scheduler stopped within the grace period.
    Graceful,
    /// In-flight deliveries had to be cancelled.
    Aborted,
}

/// Owns the health flag and the cancellation scopes of the running tasks.
///
/// Shutdown order: health goes unhealthy, the scheduler stops taking new
/// passes, and only after the grace period are in-flight deliveries
/// cancelled.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    health: HealthState,
    scheduler: CancellationToken,
    delivery: CancellationToken,
    server: CancellationToken,
}

impl Lifecycle {
    pub fn new(health: HealthState) -> Self {
        Self {
            health,
            scheduler: CancellationToken::new(),
            delivery: CancellationToken::new(),
            server: CancellationToken::new(),
        }
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    pub fn scheduler_token(&self) -> CancellationToken {
        self.scheduler.clone()
    }

    pub fn delivery_token(&self) -> CancellationToken {
        self.delivery.clone()
    }

    pub fn server_token(&self) -> CancellationToken {
        self.server.clone()
    }

    pub fn mark_started(&self) {
        self.health.set_healthy(true);
    }

    pub async fn shutdown(&self, mut scheduler: JoinHandle<()>, grace: Duration) -> ShutdownOutcome {
        self.health.set_healthy(false);
        self.scheduler.cancel();

        let outcome = match timeout(grace, &mut scheduler).await {
            Ok(joined) => {
                log_join(joined);
                ShutdownOutcome::Graceful
            }
            Err(_) => {
                warn!(grace = ?grace, "certificate check still running, aborting deliveries");
                self.delivery.cancel();
                match timeout(ABORT_WAIT, &mut scheduler).await {
                    Ok(joined) => log_join(joined),
                    Err(_) => {
                        scheduler.abort();
                        warn!("certificate monitor did not stop in time");
                    }
                }
                ShutdownOutcome::Aborted
            }
        };

        self.server.cancel();
        outcome
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        error!("certificate monitor failed: {err}");
    }
}

/// Background tasks spawned by [`start`].
pub struct Running {
    pub health_addr: SocketAddr,
    scheduler: JoinHandle<()>,
    server: JoinHandle<Result<()>>,
}

impl Running {
    /// Runs the shutdown sequence and waits for the health server to exit.
    pub async fn stop(self, lifecycle: &Lifecycle, grace: Duration) -> ShutdownOutcome {
        let outcome = lifecycle.shutdown(self.scheduler, grace).await;
        match self.server.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("{err:#}"),
            Err(err) => error!("health server task failed: {err}"),
        }
        outcome
    }
}

/// Probes `source`, binds the health endpoint, then starts the scheduler.
///
/// Health is only marked up once every step has succeeded; on error nothing
/// is left serving.
pub async fn start(
    source: Arc<dyn CertificateSource>,
    notifier: Arc<dyn NotificationPort>,
    config: &NotifierConfig,
    lifecycle: &Lifecycle,
) -> Result<Running> {
    source
        .probe(config.namespace.as_deref())
        .await
        .context("certificate source is unreachable")?;

    let server = HealthServer::bind(config.health_port, lifecycle.health().clone()).await?;
    let health_addr = server.local_addr()?;
    let server = tokio::spawn(server.serve(lifecycle.server_token()));

    let scheduler = ExpiryScheduler::new(source, notifier, SchedulerSettings::from(config));
    lifecycle.mark_started();
    let scheduler = tokio::spawn(scheduler.run(lifecycle.scheduler_token()));

    Ok(Running {
        health_addr,
        scheduler,
        server,
    })
}

/// Starts every component from `config` and blocks until a shutdown signal.
pub async fn run(config: NotifierConfig) -> Result<()> {
    info!(
        webhooks = config.webhooks.len(),
        check_interval = ?config.check_interval,
        expiration_threshold = ?config.expiration_threshold,
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        "starting cert-notifier"
    );

    let lifecycle = Lifecycle::new(HealthState::new());

    let notifier = WebhookNotifier::new(&config.webhooks, lifecycle.delivery_token())
        .context("invalid webhook configuration")?;

    let client = certnotify_adapter_kube::connect().await?;
    let source = KubeCertificateSource::new(client);
    let running = start(Arc::new(source), Arc::new(notifier), &config, &lifecycle).await?;

    shutdown_signal().await?;
    info!("shutting down");

    if running.stop(&lifecycle, SHUTDOWN_GRACE).await == ShutdownOutcome::Aborted {
        warn!("in-flight notifications were cancelled");
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use certnotify_domain::{
        DeliveryError, DeliveryReport, DestinationConfig, LogFormat, NotificationEvent,
        ObservedCertificate,
    };
    use tokio::net::TcpStream;

    struct Cluster {
        reachable: bool,
        lists: AtomicUsize,
    }

    impl Cluster {
        fn reachable() -> Arc<Self> {
            Arc::new(Self {
                reachable: true,
                lists: AtomicUsize::new(0),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                reachable: false,
                lists: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CertificateSource for Cluster {
        async fn list_certificates(&self, _namespace: Option<&str>) -> Result<Vec<ObservedCertificate>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            if self.reachable {
                Ok(Vec::new())
            } else {
                Err(anyhow!("connection refused"))
            }
        }
    }

    struct Accepting;

    #[async_trait]
    impl NotificationPort for Accepting {
        async fn deliver(&self, _event: &NotificationEvent) -> Result<DeliveryReport, DeliveryError> {
            Ok(DeliveryReport {
                attempted: 1,
                succeeded: 1,
                failures: Vec::new(),
            })
        }
    }

    fn config(health_port: u16) -> NotifierConfig {
        NotifierConfig {
            webhooks: vec![DestinationConfig::new("webhook-1", "http://127.0.0.1:9/hook")],
            check_interval: Duration::from_secs(3600),
            expiration_threshold: Duration::from_secs(720 * 3600),
            namespace: None,
            health_port,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tokio::test]
    async fn unreachable_source_fails_before_serving() {
        let lifecycle = Lifecycle::new(HealthState::new());
        let source = Cluster::unreachable();
        let port = free_port();

        let err = start(source.clone(), Arc::new(Accepting), &config(port), &lifecycle)
            .await
            .err()
            .expect("start fails");

        assert!(format!("{err:#}").contains("connection refused"));
        assert!(!lifecycle.health().is_healthy());
        assert_eq!(source.lists.load(Ordering::SeqCst), 1);
        assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
    }

    #[tokio::test]
    async fn taken_health_port_fails_before_scheduling() {
        let lifecycle = Lifecycle::new(HealthState::new());
        let source = Cluster::reachable();
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = start(source.clone(), Arc::new(Accepting), &config(port), &lifecycle)
            .await
            .err()
            .expect("start fails");

        assert!(format!("{err:#}").contains("failed to bind health server"));
        assert!(!lifecycle.health().is_healthy());
        // Only the startup probe listed; the scheduler never ran.
        tokio::task::yield_now().await;
        assert_eq!(source.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_start_serves_health_until_stopped() {
        let lifecycle = Lifecycle::new(HealthState::new());

        let running = start(Cluster::reachable(), Arc::new(Accepting), &config(0), &lifecycle)
            .await
            .unwrap();
        let port = running.health_addr.port();

        assert!(lifecycle.health().is_healthy());
        TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let outcome = running.stop(&lifecycle, SHUTDOWN_GRACE).await;

        assert_eq!(outcome, ShutdownOutcome::Graceful);
        assert!(!lifecycle.health().is_healthy());
        assert!(lifecycle.server_token().is_cancelled());
    }

    #[tokio::test]
    async fn mark_started_flips_health() {
        let lifecycle = Lifecycle::new(HealthState::new());
        assert!(!lifecycle.health().is_healthy());
        lifecycle.mark_started();
        assert!(lifecycle.health().is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_scheduler_stops_gracefully_after_health_flip() {
        let lifecycle = Lifecycle::new(HealthState::new());
        lifecycle.mark_started();

        let saw_unhealthy = Arc::new(AtomicBool::new(false));
        let task = {
            let token = lifecycle.scheduler_token();
            let health = lifecycle.health().clone();
            let saw_unhealthy = saw_unhealthy.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                saw_unhealthy.store(!health.is_healthy(), Ordering::SeqCst);
            })
        };

        let outcome = lifecycle.shutdown(task, SHUTDOWN_GRACE).await;

        assert_eq!(outcome, ShutdownOutcome::Graceful);
        assert!(saw_unhealthy.load(Ordering::SeqCst));
        assert!(!lifecycle.delivery_token().is_cancelled());
        assert!(lifecycle.server_token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_pass_finishing_within_grace_is_not_aborted() {
        let lifecycle = Lifecycle::new(HealthState::new());
        let task = {
            let token = lifecycle.scheduler_token();
            tokio::spawn(async move {
                token.cancelled().await;
                tokio::time::sleep(Duration::from_secs(1)).await;
            })
        };

        let outcome = lifecycle.shutdown(task, SHUTDOWN_GRACE).await;

        assert_eq!(outcome, ShutdownOutcome::Graceful);
        assert!(!lifecycle.delivery_token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_delivery_is_cancelled_after_grace() {
        let lifecycle = Lifecycle::new(HealthState::new());
        let task = {
            let delivery = lifecycle.delivery_token();
            tokio::spawn(async move {
                delivery.cancelled().await;
            })
        };

        let outcome = lifecycle.shutdown(task, SHUTDOWN_GRACE).await;

        assert_eq!(outcome, ShutdownOutcome::Aborted);
        assert!(lifecycle.delivery_token().is_cancelled());
        assert!(!lifecycle.health().is_healthy());
        assert!(lifecycle.server_token().is_cancelled());
    }
}
