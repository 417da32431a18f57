//! Kubernetes-backed hub client

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::certificates::v1::CertificateSigningRequest;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::debug;

use super::HubApi;
use crate::crd::ManagedCluster;
use crate::{Error, CLUSTER_NAME_LABEL, TOOL_NAME};

/// Default connection timeout for the hub client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for the hub client
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::validation(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::validation(format!("failed to load kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::validation(format!("failed to infer kube config: {}", e)))?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(Error::from)
}

/// Label selector matching the bootstrap CSRs of one cluster
pub(crate) fn csr_selector(cluster_name: &str) -> String {
    format!("{}={}", CLUSTER_NAME_LABEL, cluster_name)
}

/// Merge patch that accepts a ManagedCluster and adds annotations.
///
/// Annotations not named here are left untouched by the merge.
pub(crate) fn accept_patch(annotations: &BTreeMap<String, String>) -> serde_json::Value {
    let mut patch = serde_json::json!({
        "spec": { "hubAcceptsClient": true }
    });
    if !annotations.is_empty() {
        patch["metadata"] = serde_json::json!({ "annotations": annotations });
    }
    patch
}

fn is_api_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// [`HubApi`] over a live Kubernetes client
#[derive(Clone)]
pub struct KubeHubClient {
    client: Client,
}

impl KubeHubClient {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the given kubeconfig, or the inferred config if none
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, Error> {
        Ok(Self::new(create_client(kubeconfig).await?))
    }

    /// The underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HubApi for KubeHubClient {
    async fn list_csrs(
        &self,
        cluster_name: &str,
    ) -> Result<Vec<CertificateSigningRequest>, Error> {
        let api: Api<CertificateSigningRequest> = Api::all(self.client.clone());
        let lp = ListParams::default().labels(&csr_selector(cluster_name));
        match api.list(&lp).await {
            Ok(list) => Ok(list.items),
            Err(e) if is_api_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_csr_approval(&self, csr: CertificateSigningRequest) -> Result<(), Error> {
        let api: Api<CertificateSigningRequest> = Api::all(self.client.clone());
        let name = csr
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::validation("CSR has no name"))?;
        let body = serde_json::to_vec(&csr).map_err(|e| Error::serialization(e.to_string()))?;

        let _: CertificateSigningRequest = api
            .replace_subresource("approval", &name, &PostParams::default(), body)
            .await?;
        debug!(csr = %name, "Updated CSR approval");
        Ok(())
    }

    async fn get_managed_cluster(&self, name: &str) -> Result<Option<ManagedCluster>, Error> {
        let api: Api<ManagedCluster> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn accept_managed_cluster(
        &self,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let api: Api<ManagedCluster> = Api::all(self.client.clone());
        let patch = accept_patch(&annotations);
        api.patch(name, &PatchParams::apply(TOOL_NAME), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn config_map_exists(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.is_some())
    }
}
