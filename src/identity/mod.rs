//! Identity resolution
//!
//! Pure parsing of ARNs and OIDC issuer URLs, plus the two read-only discovery
//! calls (caller account and cluster description) that feed them.

pub mod names;

use std::sync::Arc;

use tracing::{debug, info};

use crate::provider::{ClusterApi, ClusterDescription, IdentityApi};
use crate::{Error, Result};

pub use names::TrustVariant;

/// Account, region and OIDC issuer of one cluster, resolved once per run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterIdentity {
    /// Cluster name as known to the cloud provider
    pub name: String,
    /// Account ID owning the cluster
    pub account_id: String,
    /// Region the cluster runs in
    pub region: String,
    /// OIDC issuer ID (the segment after `/id/`), when configured
    pub oidc_issuer: Option<String>,
}

/// Split an ARN positionally: `arn:<partition>:<service>:<region>:<account>:<resource>`
fn arn_segments(arn: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() < 6 || parts[0] != "arn" {
        return Err(Error::MalformedArn(arn.to_string()));
    }
    Ok(parts)
}

/// Account ID from an ARN (`arn:aws:iam::12341234:role/foo` -> `12341234`)
pub fn account_from_arn(arn: &str) -> Result<String> {
    Ok(arn_segments(arn)?[4].to_string())
}

/// Region from an ARN (`arn:aws:eks:us-west-2:1:cluster/hub` -> `us-west-2`)
///
/// IAM ARNs have an empty region segment.
pub fn region_from_arn(arn: &str) -> Result<String> {
    Ok(arn_segments(arn)?[3].to_string())
}

/// Issuer ID from an EKS OIDC issuer URL
///
/// `https://oidc.eks.us-west-2.amazonaws.com/id/XYZ` -> `XYZ`
pub fn oidc_issuer_id(url: &str) -> Result<String> {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 5 || parts[3] != "id" || parts[4].is_empty() {
        return Err(Error::MalformedOidcUrl(url.to_string()));
    }
    Ok(parts[4].to_string())
}

/// Discovery calls against the cloud provider
pub struct IdentityResolver {
    identity: Arc<dyn IdentityApi>,
    clusters: Arc<dyn ClusterApi>,
}

impl IdentityResolver {
    /// Create a resolver over the given provider capabilities
    pub fn new(identity: Arc<dyn IdentityApi>, clusters: Arc<dyn ClusterApi>) -> Self {
        Self { identity, clusters }
    }

    /// Account ID of the credentials in use
    pub async fn discover_caller_account(&self) -> Result<String> {
        let account = self.identity.caller_account().await?;
        debug!(account = %account, "Resolved caller account");
        Ok(account)
    }

    /// Describe a cluster, failing with `ClusterNotFound` when it does not exist
    pub async fn discover_cluster(&self, cluster_name: &str) -> Result<ClusterDescription> {
        self.clusters
            .describe_cluster(cluster_name)
            .await?
            .ok_or_else(|| Error::ClusterNotFound(cluster_name.to_string()))
    }

    /// Resolve the identity of a cluster from its description.
    ///
    /// `region_override` replaces the region parsed from the cluster ARN.
    pub async fn resolve_cluster_identity(
        &self,
        cluster_name: &str,
        region_override: Option<&str>,
    ) -> Result<ClusterIdentity> {
        let description = self.discover_cluster(cluster_name).await?;
        info!(cluster = %description.name, arn = %description.arn, "EKS cluster exists");

        let region = match region_override {
            Some(r) => r.to_string(),
            None => region_from_arn(&description.arn)?,
        };
        let oidc_issuer = description
            .oidc_issuer_url
            .as_deref()
            .map(oidc_issuer_id)
            .transpose()?;

        Ok(ClusterIdentity {
            name: description.name.clone(),
            account_id: account_from_arn(&description.arn)?,
            region,
            oidc_issuer,
        })
    }
}
