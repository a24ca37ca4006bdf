//! In-memory port implementations for scheduler tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use certnotify_domain::{
    DeliveryError, DeliveryReport, DestinationError, DestinationFailure, NotificationEvent,
    ObservedCertificate,
};
use certnotify_ports::{CertificateSource, NotificationPort};

#[derive(Default)]
pub struct StaticSource {
    certificates: Vec<ObservedCertificate>,
    unreachable: bool,
    calls: AtomicUsize,
    namespaces: Mutex<Vec<Option<String>>>,
}

impl StaticSource {
    pub fn with_certificates(certificates: Vec<ObservedCertificate>) -> Self {
        Self {
            certificates,
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn namespaces(&self) -> Vec<Option<String>> {
        self.namespaces.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateSource for StaticSource {
    async fn list_certificates(&self, namespace: Option<&str>) -> Result<Vec<ObservedCertificate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.namespaces
            .lock()
            .unwrap()
            .push(namespace.map(str::to_string));
        if self.unreachable {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.certificates.clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn deliver(&self, event: &NotificationEvent) -> Result<DeliveryReport, DeliveryError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(DeliveryError::AllFailed {
                attempted: 1,
                last: DestinationFailure {
                    destination: "webhook-1".to_string(),
                    error: DestinationError::Status(500),
                },
            });
        }
        Ok(DeliveryReport {
            attempted: 1,
            succeeded: 1,
            failures: Vec::new(),
        })
    }
}
