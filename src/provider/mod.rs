//! Cloud provider capability traits
//!
//! Trust provisioning needs only a handful of IAM, EKS and STS calls. Each
//! provider area is a small trait so that tests can substitute deterministic
//! doubles; [`aws`] holds the SDK-backed implementation.
//!
//! "Get" calls return `Ok(None)` when the provider reports the object does not
//! exist. Any other provider failure is an error, so callers can tell absence
//! apart from an outage.

pub mod aws;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::tags::Tag;
use crate::Error;

pub use aws::{AwsClients, AwsEks, AwsIam, AwsSts};

/// An IAM role as seen by this tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IamRole {
    /// Role name
    pub name: String,
    /// Role ARN
    pub arn: String,
    /// Tags attached to the role
    pub tags: Vec<Tag>,
}

/// A managed IAM policy as seen by this tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IamPolicy {
    /// Policy name
    pub name: String,
    /// Policy ARN
    pub arn: String,
    /// Tags attached to the policy
    pub tags: Vec<Tag>,
}

/// A policy attached to a role
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachedPolicy {
    /// Policy name
    pub name: String,
    /// Policy ARN
    pub arn: String,
}

/// One page of attached policies
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachedPolicies {
    /// Policies on this page
    pub policies: Vec<AttachedPolicy>,
    /// True when the provider reported more pages
    pub truncated: bool,
}

/// What the provider reports about a compute cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterDescription {
    /// Cluster name
    pub name: String,
    /// Cluster ARN (`arn:aws:eks:<region>:<account>:cluster/<name>`)
    pub arn: String,
    /// OIDC issuer URL, when the cluster has one
    pub oidc_issuer_url: Option<String>,
}

/// IAM role and policy operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IamApi: Send + Sync {
    /// Get a role by name
    async fn get_role(&self, name: &str) -> Result<Option<IamRole>, Error>;

    /// Get a policy by ARN
    async fn get_policy(&self, arn: &str) -> Result<Option<IamPolicy>, Error>;

    /// Create a managed policy
    async fn create_policy(
        &self,
        name: &str,
        document: &str,
        description: &str,
        tags: Vec<Tag>,
    ) -> Result<IamPolicy, Error>;

    /// Create a role with the given assume-role (trust) policy
    async fn create_role(
        &self,
        name: &str,
        trust_document: &str,
        description: &str,
        tags: Vec<Tag>,
    ) -> Result<IamRole, Error>;

    /// Attach a managed policy to a role
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error>;

    /// List the managed policies attached to a role (first page only)
    async fn list_attached_role_policies(&self, role_name: &str)
        -> Result<AttachedPolicies, Error>;

    /// Detach a managed policy from a role
    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error>;

    /// Delete a managed policy
    async fn delete_policy(&self, arn: &str) -> Result<(), Error>;

    /// Delete a role
    async fn delete_role(&self, name: &str) -> Result<(), Error>;

    /// Get the URL of an IAM OIDC identity provider by ARN
    async fn get_oidc_provider(&self, arn: &str) -> Result<Option<String>, Error>;
}

/// Compute cluster description
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Describe a cluster by name
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterDescription>, Error>;
}

/// Caller identity
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Account ID of the credentials in use
    async fn caller_account(&self) -> Result<String, Error>;
}
