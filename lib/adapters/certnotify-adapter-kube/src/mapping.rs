use chrono::{DateTime, Utc};
use kube::api::DynamicObject;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use certnotify_domain::ObservedCertificate;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CertificateSpec {
    dns_names: Vec<String>,
    issuer_ref: IssuerRef,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssuerRef {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CertificateStatus {
    not_after: Option<String>,
}

/// Maps a cert-manager `Certificate` object onto the observed model.
pub fn observe(object: &DynamicObject) -> ObservedCertificate {
    let namespace = object.metadata.namespace.clone().unwrap_or_default();
    let name = object.metadata.name.clone().unwrap_or_default();

    let spec: CertificateSpec = section(object, "spec");
    let status: CertificateStatus = section(object, "status");

    let mut cert = ObservedCertificate::new(namespace, name)
        .with_issuer(spec.issuer_ref.name)
        .with_dns_names(spec.dns_names);

    if let Some(raw) = status.not_after {
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(expires_at) => cert = cert.with_expiry(expires_at.with_timezone(&Utc)),
            Err(err) => {
                warn!(certificate = %cert.key, not_after = %raw, "unparseable notAfter: {err}");
            }
        }
    }
    cert
}

fn section<T: DeserializeOwned + Default>(object: &DynamicObject, field: &str) -> T {
    let Some(value) = object.data.get(field) else {
        return T::default();
    };
    match serde_json::from_value::<Option<T>>(value.clone()) {
        Ok(parsed) => parsed.unwrap_or_default(),
        Err(err) => {
            warn!(
                certificate = object.metadata.name.as_deref().unwrap_or_default(),
                "malformed certificate {field}: {err}"
            );
            T::default()
        }
    }
}
