//! Hub control-plane collaborators
//!
//! Everything accept needs from the hub's Kubernetes API sits behind two
//! traits so the orchestration can be tested without a cluster:
//! - [`HubApi`] - CSRs, ManagedCluster records and the `aws-auth` precondition
//! - [`RoleMapper`] - the IAM role to Kubernetes group mapping

pub mod aws_auth;
pub mod client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::certificates::v1::CertificateSigningRequest;

#[cfg(test)]
use mockall::automock;

use crate::crd::ManagedCluster;
use crate::Error;

pub use self::aws_auth::{AwsAuthMapper, MapRole, AWS_AUTH_CONFIGMAP, AWS_AUTH_NAMESPACE};
pub use self::client::KubeHubClient;

/// Hub Kubernetes API operations used during admission
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HubApi: Send + Sync {
    /// List bootstrap CSRs labelled with the cluster name, in listing order
    async fn list_csrs(&self, cluster_name: &str)
        -> Result<Vec<CertificateSigningRequest>, Error>;

    /// Submit a CSR with an updated status through the approval subresource
    async fn update_csr_approval(&self, csr: CertificateSigningRequest) -> Result<(), Error>;

    /// Get a ManagedCluster record
    async fn get_managed_cluster(&self, name: &str) -> Result<Option<ManagedCluster>, Error>;

    /// Set `hubAcceptsClient` to true and merge in the given annotations
    async fn accept_managed_cluster(
        &self,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), Error>;

    /// True if the ConfigMap exists
    async fn config_map_exists(&self, namespace: &str, name: &str) -> Result<bool, Error>;
}

/// Idempotent IAM role to Kubernetes group mapping
///
/// Implementations carry their own retry policy; callers invoke it once.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoleMapper: Send + Sync {
    /// Ensure `role_arn` maps to (at least) `groups`
    async fn upsert_role(&self, role_arn: &str, groups: Vec<String>) -> Result<(), Error>;
}
