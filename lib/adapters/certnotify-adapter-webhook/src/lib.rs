//! Webhook delivery: one JSON POST per configured destination.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use certnotify_domain::{
    DeliveryError, DeliveryReport, DestinationConfig, DestinationError, DestinationFailure,
    NotificationEvent,
};
use certnotify_ports::NotificationPort;

pub const SENDER_USER_AGENT: &str = concat!("cert-notifier/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
struct Destination {
    name: String,
    url: Url,
    headers: HeaderMap,
    timeout: Duration,
}

impl Destination {
    fn from_config(config: &DestinationConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .with_context(|| format!("invalid URL for {}: {}", config.name, config.url))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(SENDER_USER_AGENT));
        // Destination headers replace the defaults above.
        for (name, value) in &config.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name:?} for {}", config.name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name:?} on {}", config.name))?;
            headers.insert(header, value);
        }

        Ok(Self {
            name: config.name.clone(),
            url,
            headers,
            timeout: config.timeout,
        })
    }
}

/// Posts each notification to every destination concurrently.
///
/// Every send runs under a child of `shutdown`, so cancelling it aborts
/// whatever is still in flight.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    destinations: Vec<Destination>,
    shutdown: CancellationToken,
}

impl WebhookNotifier {
    pub fn new(configs: &[DestinationConfig], shutdown: CancellationToken) -> Result<Self> {
        if configs.is_empty() {
            bail!("no webhooks configured");
        }
        let destinations = configs
            .iter()
            .map(Destination::from_config)
            .collect::<Result<Vec<_>>>()?;
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            destinations,
            shutdown,
        })
    }

    pub fn destination_names(&self) -> Vec<&str> {
        self.destinations.iter().map(|d| d.name.as_str()).collect()
    }

    async fn send(
        &self,
        destination: &Destination,
        body: Bytes,
        cancel: CancellationToken,
    ) -> Result<(), DestinationError> {
        let request = self
            .client
            .post(destination.url.clone())
            .headers(destination.headers.clone())
            .timeout(destination.timeout)
            .body(body);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DestinationError::Cancelled),
            result = request.send() => result.map_err(|err| {
                if err.is_timeout() {
                    DestinationError::Timeout(destination.timeout)
                } else {
                    DestinationError::Transport(err.to_string())
                }
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DestinationError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationPort for WebhookNotifier {
    async fn deliver(&self, event: &NotificationEvent) -> Result<DeliveryReport, DeliveryError> {
        let body = Bytes::from(event.to_json()?);

        let sends = self.destinations.iter().map(|destination| {
            let cancel = self.shutdown.child_token();
            let body = body.clone();
            async move { (destination, self.send(destination, body, cancel).await) }
        });
        let results = join_all(sends).await;

        let mut report = DeliveryReport {
            attempted: results.len(),
            ..DeliveryReport::default()
        };
        for (destination, result) in results {
            match result {
                Ok(()) => {
                    report.succeeded += 1;
                    info!(webhook = %destination.name, "notification sent successfully");
                }
                Err(err) => {
                    error!(webhook = %destination.name, error = %err, "failed to send notification");
                    report.failures.push(DestinationFailure {
                        destination: destination.name.clone(),
                        error: err,
                    });
                }
            }
        }

        if report.succeeded == 0 {
            let last = report
                .failures
                .pop()
                .unwrap_or_else(|| DestinationFailure {
                    destination: String::new(),
                    error: DestinationError::Cancelled,
                });
            return Err(DeliveryError::AllFailed {
                attempted: report.attempted,
                last,
            });
        }

        if report.is_degraded() {
            warn!(
                success_count = report.succeeded,
                total_webhooks = report.attempted,
                "some webhooks failed"
            );
        }
        Ok(report)
    }
}
