//! Trust object provisioning
//!
//! Creates the role/policy pair for one side of a hub/worker trust
//! relationship. The common sequence lives in [`TrustProvisioner::provision`];
//! the worker side ([`join`]) and the hub side ([`accept`]) resolve their
//! identities and render context, then delegate to it.
//!
//! Each provider call is attempted once. There is no rollback: a failure after
//! the policy or role was created is reported as [`Error::PartialProvision`]
//! naming what was left behind.

pub mod accept;
pub mod join;

use std::sync::Arc;

use tracing::{debug, info};

use crate::identity::names::{policy_arn, role_arn, trust_object_name, unjoin_command};
use crate::identity::{IdentityResolver, TrustVariant};
use crate::provider::{AwsClients, ClusterApi, IamApi, IdentityApi};
use crate::tags::Tag;
use crate::template::{PolicyContext, TemplateBundle, TemplateEngine};
use crate::{Error, Result};

pub use accept::{AcceptOutcome, AcceptRequest};
pub use join::{JoinOutcome, JoinRequest};

/// Everything needed to create one trust object pair
#[derive(Clone, Debug)]
pub struct ProvisionRequest {
    /// Worker or hub side
    pub variant: TrustVariant,
    /// Cluster name on the hub
    pub cluster_name: String,
    /// Account the objects are created in
    pub account_id: String,
    /// Values for the permission and trust templates
    pub context: PolicyContext,
    /// Tags stamped on both objects
    pub tags: Vec<Tag>,
    /// Description of the managed policy
    pub policy_description: String,
    /// Description of the role
    pub role_description: String,
}

/// Names and ARNs of a provisioned (or, under dry run, planned) pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustObjectRefs {
    /// Role name, `ocm.<variant>.<cluster>`
    pub role_name: String,
    /// Role ARN
    pub role_arn: String,
    /// Policy name, same as the role name
    pub policy_name: String,
    /// Policy ARN
    pub policy_arn: String,
    /// False under dry run
    pub created: bool,
}

/// Creates trust objects from injected templates
pub struct TrustProvisioner {
    iam: Arc<dyn IamApi>,
    resolver: IdentityResolver,
    templates: TemplateBundle,
    engine: TemplateEngine,
}

impl TrustProvisioner {
    /// Create a provisioner over explicit provider capabilities
    pub fn new(
        iam: Arc<dyn IamApi>,
        identity: Arc<dyn IdentityApi>,
        clusters: Arc<dyn ClusterApi>,
        templates: TemplateBundle,
    ) -> Self {
        Self {
            iam,
            resolver: IdentityResolver::new(identity, clusters),
            templates,
            engine: TemplateEngine::new(),
        }
    }

    /// Create a provisioner over SDK-backed clients
    pub fn from_clients(clients: &AwsClients, templates: TemplateBundle) -> Self {
        Self::new(
            clients.iam.clone(),
            clients.sts.clone(),
            clients.eks.clone(),
            templates,
        )
    }

    /// Identity discovery used by join and accept
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Fail with `AlreadyExists` if the policy or role name is taken
    async fn ensure_absent(&self, refs: &TrustObjectRefs) -> Result<()> {
        if self.iam.get_policy(&refs.policy_arn).await?.is_some() {
            return Err(Error::AlreadyExists {
                kind: "policy",
                name: refs.policy_arn.clone(),
            });
        }
        debug!(policy = %refs.policy_arn, "Policy does not exist - will create");

        if self.iam.get_role(&refs.role_name).await?.is_some() {
            return Err(Error::AlreadyExists {
                kind: "role",
                name: refs.role_arn.clone(),
            });
        }
        debug!(role = %refs.role_arn, "Role does not exist - will create");
        Ok(())
    }

    /// Check, render, then create policy, role and attachment in that order.
    ///
    /// Under `dry_run` the existence check and rendering still run, so naming
    /// conflicts and template errors surface, but no create or attach call is
    /// made.
    pub async fn provision(
        &self,
        request: &ProvisionRequest,
        dry_run: bool,
    ) -> Result<TrustObjectRefs> {
        let name = trust_object_name(request.variant, &request.cluster_name);
        let mut refs = TrustObjectRefs {
            role_arn: role_arn(&request.account_id, &name),
            policy_arn: policy_arn(&request.account_id, &name),
            role_name: name.clone(),
            policy_name: name,
            created: false,
        };

        self.ensure_absent(&refs).await?;

        let templates = self.templates.for_variant(request.variant);
        let permission = self.engine.render_document(
            &format!("{}-permission", templates.name),
            &templates.permission,
            &request.context,
        )?;
        let trust = self.engine.render_document(
            &format!("{}-trust", templates.name),
            &templates.trust,
            &request.context,
        )?;
        debug!(policy = %refs.policy_name, document = %permission, "Rendered permission policy");
        debug!(role = %refs.role_name, document = %trust, "Rendered trust policy");

        for tag in &request.tags {
            info!(key = %tag.key, value = %tag.value, "Resources will be created with tag");
        }

        if dry_run {
            info!(
                role = %refs.role_arn,
                policy = %refs.policy_arn,
                "Dry run - not creating any AWS resources"
            );
            return Ok(refs);
        }

        let mut created: Vec<String> = Vec::new();

        info!(policy = %refs.policy_name, "Creating IAM policy");
        let policy = self
            .iam
            .create_policy(
                &refs.policy_name,
                &permission,
                &request.policy_description,
                request.tags.clone(),
            )
            .await?;
        refs.policy_arn = policy.arn;
        created.push(refs.policy_arn.clone());
        info!(policy = %refs.policy_arn, "Created policy");

        info!(role = %refs.role_name, "Creating IAM role");
        let role = self
            .iam
            .create_role(
                &refs.role_name,
                &trust,
                &request.role_description,
                request.tags.clone(),
            )
            .await
            .map_err(|e| {
                Error::partial(&created, cleanup_hint(request, &refs, false, false), e)
            })?;
        refs.role_arn = role.arn;
        created.push(refs.role_arn.clone());
        info!(role = %refs.role_arn, "Created role");

        self.iam
            .attach_role_policy(&refs.role_name, &refs.policy_arn)
            .await
            .map_err(|e| {
                Error::partial(&created, cleanup_hint(request, &refs, true, false), e)
            })?;
        info!(policy = %refs.policy_arn, role = %refs.role_arn, "Attached policy to role");

        refs.created = true;
        Ok(refs)
    }
}

/// How to remove what a failed provision left behind.
///
/// Unjoin only finds a policy through its attachment to the role, so a policy
/// that never got attached has to be deleted directly.
pub(crate) fn cleanup_hint(
    request: &ProvisionRequest,
    refs: &TrustObjectRefs,
    role_created: bool,
    policy_attached: bool,
) -> String {
    let delete_policy = format!("aws iam delete-policy --policy-arn {}", refs.policy_arn);
    let unjoin = unjoin_command(request.variant, &request.cluster_name);
    match (role_created, policy_attached) {
        (false, _) => format!("run `{}`", delete_policy),
        (true, false) => format!("run `{}` and then `{}`", unjoin, delete_policy),
        (true, true) => format!("run `{}`", unjoin),
    }
}
