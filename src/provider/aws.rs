//! AWS SDK implementations of the provider capability traits
//!
//! Not-found service errors (`NoSuchEntity`, `ResourceNotFoundException`) are
//! turned into `Ok(None)` here; every other SDK error is reported as
//! [`Error::Aws`] with the SDK's full error context.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_iam::error::{DisplayErrorContext, SdkError};
use tracing::debug;

use super::{
    AttachedPolicies, AttachedPolicy, ClusterApi, ClusterDescription, IamApi, IamPolicy, IamRole,
    IdentityApi,
};
use crate::tags::Tag;
use crate::Error;

fn sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    Error::aws(operation, DisplayErrorContext(&err).to_string())
}

fn tags_from_sdk(tags: &[aws_sdk_iam::types::Tag]) -> Vec<Tag> {
    tags.iter().map(|t| Tag::new(t.key(), t.value())).collect()
}

fn tags_to_sdk(operation: &'static str, tags: Vec<Tag>) -> Result<Vec<aws_sdk_iam::types::Tag>, Error> {
    tags.into_iter()
        .map(|t| {
            aws_sdk_iam::types::Tag::builder()
                .key(t.key)
                .value(t.value)
                .build()
                .map_err(|e| Error::aws(operation, e.to_string()))
        })
        .collect()
}

fn role_from_sdk(role: &aws_sdk_iam::types::Role) -> IamRole {
    IamRole {
        name: role.role_name().to_string(),
        arn: role.arn().to_string(),
        tags: tags_from_sdk(role.tags()),
    }
}

fn policy_from_sdk(policy: &aws_sdk_iam::types::Policy) -> IamPolicy {
    IamPolicy {
        name: policy.policy_name().unwrap_or_default().to_string(),
        arn: policy.arn().unwrap_or_default().to_string(),
        tags: tags_from_sdk(policy.tags()),
    }
}

/// Load shared AWS configuration from the default provider chain
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// IAM backed by `aws-sdk-iam`
pub struct AwsIam {
    client: aws_sdk_iam::Client,
}

impl AwsIam {
    /// Create from shared SDK configuration
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_iam::Client::new(config),
        }
    }
}

#[async_trait]
impl IamApi for AwsIam {
    async fn get_role(&self, name: &str) -> Result<Option<IamRole>, Error> {
        match self.client.get_role().role_name(name).send().await {
            Ok(out) => Ok(out.role().map(role_from_sdk)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                debug!(role = %name, "Role does not exist");
                Ok(None)
            }
            Err(err) => Err(sdk_error("GetRole", err)),
        }
    }

    async fn get_policy(&self, arn: &str) -> Result<Option<IamPolicy>, Error> {
        match self.client.get_policy().policy_arn(arn).send().await {
            Ok(out) => Ok(out.policy().map(policy_from_sdk)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                debug!(policy = %arn, "Policy does not exist");
                Ok(None)
            }
            Err(err) => Err(sdk_error("GetPolicy", err)),
        }
    }

    async fn create_policy(
        &self,
        name: &str,
        document: &str,
        description: &str,
        tags: Vec<Tag>,
    ) -> Result<IamPolicy, Error> {
        let out = self
            .client
            .create_policy()
            .policy_name(name)
            .policy_document(document)
            .description(description)
            .set_tags(Some(tags_to_sdk("CreatePolicy", tags)?))
            .send()
            .await
            .map_err(|e| sdk_error("CreatePolicy", e))?;
        out.policy()
            .map(policy_from_sdk)
            .ok_or_else(|| Error::aws("CreatePolicy", "response did not include the policy"))
    }

    async fn create_role(
        &self,
        name: &str,
        trust_document: &str,
        description: &str,
        tags: Vec<Tag>,
    ) -> Result<IamRole, Error> {
        let out = self
            .client
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_document)
            .description(description)
            .set_tags(Some(tags_to_sdk("CreateRole", tags)?))
            .send()
            .await
            .map_err(|e| sdk_error("CreateRole", e))?;
        out.role()
            .map(role_from_sdk)
            .ok_or_else(|| Error::aws("CreateRole", "response did not include the role"))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error> {
        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("AttachRolePolicy", e))?;
        Ok(())
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<AttachedPolicies, Error> {
        let out = self
            .client
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| sdk_error("ListAttachedRolePolicies", e))?;
        Ok(AttachedPolicies {
            policies: out
                .attached_policies()
                .iter()
                .map(|p| AttachedPolicy {
                    name: p.policy_name().unwrap_or_default().to_string(),
                    arn: p.policy_arn().unwrap_or_default().to_string(),
                })
                .collect(),
            truncated: out.is_truncated(),
        })
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error> {
        self.client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("DetachRolePolicy", e))?;
        Ok(())
    }

    async fn delete_policy(&self, arn: &str) -> Result<(), Error> {
        self.client
            .delete_policy()
            .policy_arn(arn)
            .send()
            .await
            .map_err(|e| sdk_error("DeletePolicy", e))?;
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<(), Error> {
        self.client
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteRole", e))?;
        Ok(())
    }

    async fn get_oidc_provider(&self, arn: &str) -> Result<Option<String>, Error> {
        match self
            .client
            .get_open_id_connect_provider()
            .open_id_connect_provider_arn(arn)
            .send()
            .await
        {
            Ok(out) => Ok(Some(out.url().unwrap_or_default().to_string())),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(sdk_error("GetOpenIDConnectProvider", err)),
        }
    }
}

/// EKS backed by `aws-sdk-eks`
pub struct AwsEks {
    client: aws_sdk_eks::Client,
}

impl AwsEks {
    /// Create from shared SDK configuration
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_eks::Client::new(config),
        }
    }
}

#[async_trait]
impl ClusterApi for AwsEks {
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterDescription>, Error> {
        match self.client.describe_cluster().name(name).send().await {
            Ok(out) => Ok(out.cluster().map(|c| ClusterDescription {
                name: c.name().unwrap_or(name).to_string(),
                arn: c.arn().unwrap_or_default().to_string(),
                oidc_issuer_url: c
                    .identity()
                    .and_then(|i| i.oidc())
                    .and_then(|o| o.issuer())
                    .map(str::to_string),
            })),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(sdk_error("DescribeCluster", err)),
        }
    }
}

/// STS backed by `aws-sdk-sts`
pub struct AwsSts {
    client: aws_sdk_sts::Client,
}

impl AwsSts {
    /// Create from shared SDK configuration
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl IdentityApi for AwsSts {
    async fn caller_account(&self) -> Result<String, Error> {
        let out = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error("GetCallerIdentity", e))?;
        out.account()
            .map(str::to_string)
            .ok_or_else(|| Error::aws("GetCallerIdentity", "response did not include Account"))
    }
}

/// The three AWS capabilities built from one SDK configuration
#[derive(Clone)]
pub struct AwsClients {
    /// IAM roles and policies
    pub iam: Arc<dyn IamApi>,
    /// EKS cluster description
    pub eks: Arc<dyn ClusterApi>,
    /// Caller identity
    pub sts: Arc<dyn IdentityApi>,
}

impl AwsClients {
    /// Build SDK-backed clients from the default credential chain
    pub async fn from_env(region: Option<&str>) -> Self {
        let config = load_sdk_config(region).await;
        Self {
            iam: Arc::new(AwsIam::new(&config)),
            eks: Arc::new(AwsEks::new(&config)),
            sts: Arc::new(AwsSts::new(&config)),
        }
    }
}
