//! Ownership-checked removal of trust objects
//!
//! Teardown is keyed only by cluster name: the role name is recomputed from the
//! naming convention. The role's managed tag is the hard gate; nothing is
//! detached or deleted from a role this tool did not create. Attached policies
//! are detached, then deleted only if they carry the managed tag themselves,
//! and the role is deleted last.

use std::sync::Arc;

use tracing::{info, warn};

use crate::identity::names::trust_object_name;
use crate::identity::TrustVariant;
use crate::provider::IamApi;
use crate::tags::{is_managed, tagged_cluster};
use crate::{Error, Result};

/// What a teardown did, or under dry run would have done
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Role that was examined, if deletion was requested
    pub role_name: Option<String>,
    /// Policy ARNs detached from the role
    pub detached: Vec<String>,
    /// Managed policy ARNs deleted
    pub deleted_policies: Vec<String>,
    /// Policy ARNs left in place because they are not managed or no longer exist
    pub skipped_policies: Vec<String>,
    /// True once the role has been deleted
    pub role_deleted: bool,
    /// Nothing was mutated
    pub dry_run: bool,
}

/// Removes the trust objects of a cluster
pub struct TeardownManager {
    iam: Arc<dyn IamApi>,
    variant: TrustVariant,
}

impl TeardownManager {
    /// Manager for worker-side objects
    pub fn new(iam: Arc<dyn IamApi>) -> Self {
        Self {
            iam,
            variant: TrustVariant::Worker,
        }
    }

    /// Tear down objects of the given side instead
    pub fn with_variant(mut self, variant: TrustVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Remove the role and its managed policies for `cluster_name`.
    ///
    /// Without `delete_requested` this only warns that manual cleanup is
    /// needed. Fails with `RoleNotFound` if the role is absent and with
    /// `NotManaged` if it lacks the managed tag, in both cases before any
    /// mutation.
    pub async fn teardown(
        &self,
        cluster_name: &str,
        delete_requested: bool,
        dry_run: bool,
    ) -> Result<TeardownReport> {
        let mut report = TeardownReport {
            dry_run,
            ..Default::default()
        };

        if !delete_requested {
            warn!(
                cluster = %cluster_name,
                "Delete role not selected - you will need to manually delete any IAM roles and policies associated with the registration agent"
            );
            return Ok(report);
        }

        let role_name = trust_object_name(self.variant, cluster_name);
        report.role_name = Some(role_name.clone());

        info!(role = %role_name, "Checking role is managed");
        let role = self
            .iam
            .get_role(&role_name)
            .await?
            .ok_or_else(|| Error::RoleNotFound(role_name.clone()))?;
        if !is_managed(&role.tags) {
            return Err(Error::NotManaged {
                kind: "role",
                name: role_name,
            });
        }
        if let Some(owner) = tagged_cluster(&role.tags).filter(|c| *c != cluster_name) {
            warn!(role = %role_name, tagged_cluster = %owner, "Role is tagged for a different cluster");
        }

        let attached = self.iam.list_attached_role_policies(&role_name).await?;
        if attached.truncated {
            warn!(
                role = %role_name,
                returned = attached.policies.len(),
                "Attached policy listing was truncated; only the returned policies are processed"
            );
        }

        for policy in &attached.policies {
            info!(policy = %policy.name, role = %role_name, "Detaching policy from role");
            if dry_run {
                info!("Dry run - skipping");
            } else {
                self.iam
                    .detach_role_policy(&role_name, &policy.arn)
                    .await?;
            }
            report.detached.push(policy.arn.clone());

            match self.iam.get_policy(&policy.arn).await? {
                Some(p) if is_managed(&p.tags) => {
                    info!(policy = %policy.name, "Deleting policy");
                    if dry_run {
                        info!("Dry run - skipping");
                    } else {
                        self.iam.delete_policy(&policy.arn).await?;
                    }
                    report.deleted_policies.push(policy.arn.clone());
                }
                Some(_) => {
                    warn!(policy = %policy.name, "Policy is not managed - will not delete");
                    report.skipped_policies.push(policy.arn.clone());
                }
                None => {
                    warn!(policy = %policy.arn, "Attached policy no longer exists - skipping");
                    report.skipped_policies.push(policy.arn.clone());
                }
            }
        }

        info!(role = %role_name, "Deleting role");
        if dry_run {
            info!("Dry run - skipping");
        } else {
            self.iam.delete_role(&role_name).await?;
            report.role_deleted = true;
        }

        Ok(report)
    }
}
