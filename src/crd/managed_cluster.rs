//! ManagedCluster resource
//!
//! Owned by the hub's registration controller. This tool only reads it and
//! merge-patches `spec.hubAcceptsClient` and annotations; fields not modelled
//! here are never written back.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::WORKER_ROLE_ANNOTATION;

/// Specification for a ManagedCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1",
    kind = "ManagedCluster",
    plural = "managedclusters",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    /// Whether the hub accepts the cluster's registration agent
    #[serde(default)]
    pub hub_accepts_client: bool,
}

impl ManagedCluster {
    /// Worker IAM role ARN, if the cluster registers through AWS IAM
    pub fn iam_worker_role(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(WORKER_ROLE_ANNOTATION))
            .map(String::as_str)
    }

    /// True once the hub has accepted the cluster
    pub fn is_accepted(&self) -> bool {
        self.spec.hub_accepts_client
    }

    /// Annotation value, if set
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}
