//! Worker side: the role the registration agent assumes through IRSA

use std::collections::BTreeMap;

use tracing::info;

use super::{ProvisionRequest, TrustObjectRefs, TrustProvisioner};
use crate::config::{DEFAULT_AGENT_NAMESPACE, DEFAULT_AGENT_SERVICE_ACCOUNT};
use crate::identity::names::oidc_provider_arn;
use crate::identity::{ClusterIdentity, TrustVariant};
use crate::tags::build_tag_set;
use crate::template::PolicyContext;
use crate::{Error, Result};

/// Inputs of a join
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinRequest {
    /// Name the cluster is registered under on the hub
    pub cluster_name: String,
    /// Name of the worker's EKS cluster
    pub eks_cluster_name: String,
    /// Account the hub runs in
    pub hub_account_id: String,
    /// Namespace of the registration agent
    pub namespace: String,
    /// Service account of the registration agent
    pub service_account: String,
    /// Overrides the region parsed from the cluster ARN
    pub region: Option<String>,
    /// Extra tags for the created objects
    pub additional_tags: BTreeMap<String, String>,
}

impl JoinRequest {
    /// Request with the default agent namespace and service account
    pub fn new(
        cluster_name: impl Into<String>,
        eks_cluster_name: impl Into<String>,
        hub_account_id: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            eks_cluster_name: eks_cluster_name.into(),
            hub_account_id: hub_account_id.into(),
            namespace: DEFAULT_AGENT_NAMESPACE.to_string(),
            service_account: DEFAULT_AGENT_SERVICE_ACCOUNT.to_string(),
            region: None,
            additional_tags: BTreeMap::new(),
        }
    }
}

/// Result of a join
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The worker role and policy
    pub refs: TrustObjectRefs,
    /// The worker identity the trust policy was rendered against
    pub identity: ClusterIdentity,
}

impl JoinOutcome {
    /// Role ARN to declare in the ManagedCluster's worker-role annotation
    pub fn role_arn(&self) -> &str {
        &self.refs.role_arn
    }
}

impl TrustProvisioner {
    /// Provision the worker role for a cluster.
    ///
    /// The worker account is the caller's account. The EKS cluster must have
    /// an OIDC issuer that is registered as an IAM identity provider; both
    /// checks run before anything else, including under dry run.
    pub async fn join(&self, request: &JoinRequest, dry_run: bool) -> Result<JoinOutcome> {
        info!(cluster = %request.cluster_name, eks_cluster = %request.eks_cluster_name, "Validating AWS environment");

        let worker_account = self.resolver().discover_caller_account().await?;
        let mut identity = self
            .resolver()
            .resolve_cluster_identity(&request.eks_cluster_name, request.region.as_deref())
            .await?;
        identity.account_id = worker_account;

        let issuer = identity
            .oidc_issuer
            .clone()
            .ok_or_else(|| Error::OidcNotConfigured(request.eks_cluster_name.clone()))?;
        info!(issuer = %issuer, "OIDC is configured for EKS cluster");

        let provider_arn = oidc_provider_arn(&identity.account_id, &identity.region, &issuer);
        let provider_url = self
            .iam
            .get_oidc_provider(&provider_arn)
            .await?
            .ok_or_else(|| Error::OidcProviderMissing(provider_arn.clone()))?;
        info!(provider = %provider_url, "OIDC provider exists");

        let context = PolicyContext::builder()
            .cluster_name(&request.cluster_name)
            .hub("account_id", &request.hub_account_id)
            .worker("account_id", &identity.account_id)
            .worker("region", &identity.region)
            .worker("oidc_issuer", &issuer)
            .agent("namespace", &request.namespace)
            .agent("service_account", &request.service_account)
            .build();

        let provision = ProvisionRequest {
            variant: TrustVariant::Worker,
            cluster_name: request.cluster_name.clone(),
            account_id: identity.account_id.clone(),
            context,
            tags: build_tag_set(&request.cluster_name, &request.additional_tags),
            policy_description: format!(
                "Allows OCM on EKS cluster {} to assume a role enabling access to the hub cluster",
                request.cluster_name
            ),
            role_description: "OCM role to allow klusterlet to auth with hub cluster".to_string(),
        };

        let refs = self.provision(&provision, dry_run).await?;
        Ok(JoinOutcome { refs, identity })
    }
}
