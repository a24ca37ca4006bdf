//! cert-manager `Certificate` source backed by the Kubernetes API.

pub mod mapping;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};
use tracing::debug;

use certnotify_domain::ObservedCertificate;
use certnotify_ports::CertificateSource;

pub const CERT_MANAGER_GROUP: &str = "cert-manager.io";
pub const CERT_MANAGER_VERSION: &str = "v1";
pub const CERTIFICATE_KIND: &str = "Certificate";
const CERTIFICATE_PLURAL: &str = "certificates";

pub fn certificate_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(CERT_MANAGER_GROUP, CERT_MANAGER_VERSION, CERTIFICATE_KIND);
    ApiResource::from_gvk_with_plural(&gvk, CERTIFICATE_PLURAL)
}

/// Builds a client from the in-cluster service account, falling back to
/// the local kubeconfig (`KUBECONFIG` or `~/.kube/config`).
pub async fn connect() -> Result<Client> {
    let config = match Config::incluster() {
        Ok(config) => config,
        Err(err) => {
            debug!("in-cluster config unavailable, using kubeconfig: {err}");
            Config::from_kubeconfig(&KubeConfigOptions::default())
                .await
                .context("failed to get Kubernetes config")?
        }
    };
    Client::try_from(config).context("failed to create Kubernetes client")
}

#[derive(Clone)]
pub struct KubeCertificateSource {
    client: Client,
    resource: ApiResource,
}

impl KubeCertificateSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: certificate_resource(),
        }
    }

    fn api(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &self.resource),
            None => Api::all_with(self.client.clone(), &self.resource),
        }
    }
}

#[async_trait]
impl CertificateSource for KubeCertificateSource {
    async fn list_certificates(&self, namespace: Option<&str>) -> Result<Vec<ObservedCertificate>> {
        let list = self
            .api(namespace)
            .list(&ListParams::default())
            .await
            .context("failed to list cert-manager certificates")?;
        Ok(list.items.iter().map(mapping::observe).collect())
    }

    async fn probe(&self, namespace: Option<&str>) -> Result<()> {
        self.api(namespace)
            .list(&ListParams::default().limit(1))
            .await
            .context("cert-manager certificates are not reachable")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_resource_targets_cert_manager_v1() {
        let resource = certificate_resource();
        assert_eq!(resource.group, "cert-manager.io");
        assert_eq!(resource.version, "v1");
        assert_eq!(resource.api_version, "cert-manager.io/v1");
        assert_eq!(resource.kind, "Certificate");
        assert_eq!(resource.plural, "certificates");
    }
}
