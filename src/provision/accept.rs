//! Hub side: the role a specific worker role may assume in the hub account

use std::collections::BTreeMap;

use tracing::info;

use super::{cleanup_hint, ProvisionRequest, TrustProvisioner};
use crate::hub::{HubApi, RoleMapper, AWS_AUTH_CONFIGMAP, AWS_AUTH_NAMESPACE};
use crate::identity::names::mapped_group;
use crate::identity::{account_from_arn, region_from_arn, TrustVariant};
use crate::tags::build_tag_set;
use crate::template::PolicyContext;
use crate::{
    Error, Result, HUB_ACCOUNT_ANNOTATION, HUB_EKS_CLUSTER_ANNOTATION, HUB_REGION_ANNOTATION,
    HUB_ROLE_ANNOTATION,
};

/// Inputs of a hub-side accept for one cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptRequest {
    /// Managed cluster name on the hub
    pub cluster_name: String,
    /// Worker role ARN declared by the managed cluster
    pub worker_role_arn: String,
    /// Name of the hub's EKS cluster
    pub hub_eks_cluster_name: String,
    /// Extra tags for the created objects
    pub additional_tags: BTreeMap<String, String>,
}

/// Hub identity the registration agent needs to finish registering
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// Role the worker assumes in the hub account
    pub hub_role_arn: String,
    /// Hub EKS cluster name
    pub hub_eks_cluster: String,
    /// Hub region
    pub hub_region: String,
    /// Hub account ID
    pub hub_account: String,
}

impl AcceptOutcome {
    /// Annotations to merge into the ManagedCluster
    pub fn annotations(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (HUB_ROLE_ANNOTATION.to_string(), self.hub_role_arn.clone()),
            (HUB_EKS_CLUSTER_ANNOTATION.to_string(), self.hub_eks_cluster.clone()),
            (HUB_REGION_ANNOTATION.to_string(), self.hub_region.clone()),
            (HUB_ACCOUNT_ANNOTATION.to_string(), self.hub_account.clone()),
        ])
    }
}

impl TrustProvisioner {
    /// Provision the hub role for a worker and map it into `aws-auth`.
    ///
    /// The `aws-auth` ConfigMap must exist before anything is created; its
    /// absence is a precondition failure. Under dry run the role mapping is
    /// skipped along with the creates.
    pub async fn accept(
        &self,
        request: &AcceptRequest,
        hub: &dyn HubApi,
        mapper: &dyn RoleMapper,
        dry_run: bool,
    ) -> Result<AcceptOutcome> {
        let worker_account = account_from_arn(&request.worker_role_arn)?;

        let hub_cluster = self
            .resolver()
            .discover_cluster(&request.hub_eks_cluster_name)
            .await?;
        info!(cluster = %hub_cluster.name, arn = %hub_cluster.arn, "EKS hub cluster exists");
        let hub_account = self.resolver().discover_caller_account().await?;
        let hub_region = region_from_arn(&hub_cluster.arn)?;

        if !hub
            .config_map_exists(AWS_AUTH_NAMESPACE, AWS_AUTH_CONFIGMAP)
            .await?
        {
            return Err(Error::precondition(format!(
                "{} configmap not found in {}. See https://docs.aws.amazon.com/eks/latest/userguide/add-user-role.html",
                AWS_AUTH_CONFIGMAP, AWS_AUTH_NAMESPACE
            )));
        }

        let context = PolicyContext::builder()
            .cluster_name(&request.cluster_name)
            .hub("account_id", &hub_account)
            .hub("region", &hub_region)
            .hub("cluster_name", &hub_cluster.name)
            .worker("account_id", &worker_account)
            .build();

        let provision = ProvisionRequest {
            variant: TrustVariant::Hub,
            cluster_name: request.cluster_name.clone(),
            account_id: hub_account.clone(),
            context,
            tags: build_tag_set(&request.cluster_name, &request.additional_tags),
            policy_description: format!(
                "Allows remote worker cluster {} to assume a role enabling access to the hub cluster",
                request.cluster_name
            ),
            role_description: "OCM role to allow klusterlet to auth with hub cluster".to_string(),
        };
        let refs = self.provision(&provision, dry_run).await?;

        if dry_run {
            info!(role = %refs.role_arn, "Dry run - not updating aws-auth");
        } else {
            let group = mapped_group(&request.cluster_name);
            info!(role = %refs.role_arn, group = %group, "Mapping role in aws-auth");
            mapper
                .upsert_role(&refs.role_arn, vec![group])
                .await
                .map_err(|e| {
                    Error::partial(
                        &[refs.policy_arn.clone(), refs.role_arn.clone()],
                        cleanup_hint(&provision, &refs, true, true),
                        e,
                    )
                })?;
        }

        Ok(AcceptOutcome {
            hub_role_arn: refs.role_arn,
            hub_eks_cluster: hub_cluster.name.clone(),
            hub_region,
            hub_account: account_from_arn(&hub_cluster.arn)?,
        })
    }
}
