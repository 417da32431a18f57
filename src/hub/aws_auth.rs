//! `aws-auth` role mapping
//!
//! EKS authenticates IAM principals against the `mapRoles` entry of the
//! `kube-system/aws-auth` ConfigMap. Accept maps the hub role to the cluster's
//! group there. The entry is upserted: an existing mapping for the same role
//! keeps its username and gains any missing groups, and unrelated entries are
//! preserved in order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::PostParams;
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::RoleMapper;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::Error;

/// Namespace of the `aws-auth` ConfigMap
pub const AWS_AUTH_NAMESPACE: &str = "kube-system";
/// Name of the `aws-auth` ConfigMap
pub const AWS_AUTH_CONFIGMAP: &str = "aws-auth";

const MAP_ROLES_KEY: &str = "mapRoles";

/// One `mapRoles` entry
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct MapRole {
    /// IAM role ARN
    pub rolearn: String,
    /// Kubernetes username the role authenticates as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Kubernetes groups granted to the role
    #[serde(default)]
    pub groups: Vec<String>,
    /// Fields this tool does not model, written back unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Upsert a role into a serialized `mapRoles` list.
///
/// Returns the new serialized list and whether anything changed.
pub fn upsert_map_roles(
    existing: &str,
    role_arn: &str,
    groups: &[String],
) -> Result<(String, bool), Error> {
    let mut roles: Vec<MapRole> = if existing.trim().is_empty() {
        Vec::new()
    } else {
        serde_yaml::from_str(existing)
            .map_err(|e| Error::serialization(format!("invalid aws-auth mapRoles: {}", e)))?
    };

    let changed = match roles.iter_mut().find(|r| r.rolearn == role_arn) {
        Some(entry) => {
            let mut changed = false;
            for group in groups {
                if !entry.groups.contains(group) {
                    entry.groups.push(group.clone());
                    changed = true;
                }
            }
            changed
        }
        None => {
            roles.push(MapRole {
                rolearn: role_arn.to_string(),
                groups: groups.to_vec(),
                ..Default::default()
            });
            true
        }
    };

    let serialized = serde_yaml::to_string(&roles)
        .map_err(|e| Error::serialization(format!("failed to encode mapRoles: {}", e)))?;
    Ok((serialized, changed))
}

/// Missing ConfigMaps and unparseable data do not fix themselves between attempts
fn is_retryable(err: &Error) -> bool {
    !(err.is_not_found() || matches!(err, Error::Serialization(_)))
}

/// [`RoleMapper`] writing to the hub's `aws-auth` ConfigMap
pub struct AwsAuthMapper {
    client: Client,
    retry: RetryConfig,
}

impl AwsAuthMapper {
    /// Create a mapper with the default role mapping retry policy
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryConfig::role_mapping(),
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// One read-modify-write; the replace carries the read resourceVersion so a
    /// concurrent writer turns into a conflict instead of a lost update.
    async fn try_upsert(&self, role_arn: &str, groups: &[String]) -> Result<(), Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), AWS_AUTH_NAMESPACE);
        let mut cm = api
            .get_opt(AWS_AUTH_CONFIGMAP)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "configmap",
                name: format!("{}/{}", AWS_AUTH_NAMESPACE, AWS_AUTH_CONFIGMAP),
            })?;

        let existing = cm
            .data
            .as_ref()
            .and_then(|d| d.get(MAP_ROLES_KEY))
            .map(String::as_str)
            .unwrap_or_default();
        let (updated, changed) = upsert_map_roles(existing, role_arn, groups)?;
        if !changed {
            info!(role = %role_arn, "aws-auth already maps role");
            return Ok(());
        }

        cm.data
            .get_or_insert_with(Default::default)
            .insert(MAP_ROLES_KEY.to_string(), updated);
        api.replace(AWS_AUTH_CONFIGMAP, &PostParams::default(), &cm)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RoleMapper for AwsAuthMapper {
    async fn upsert_role(&self, role_arn: &str, groups: Vec<String>) -> Result<(), Error> {
        info!(role = %role_arn, groups = ?groups, "Updating aws-auth role mapping");
        retry_with_backoff(&self.retry, "upsert aws-auth", is_retryable, || {
            self.try_upsert(role_arn, &groups)
        })
        .await
    }
}
