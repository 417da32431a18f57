//! Run configuration for join, unjoin and accept
//!
//! Plain structs built by the binary from command line arguments. Library
//! callers can construct them directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::identity::TrustVariant;
use crate::provider::IamApi;
use crate::provision::JoinRequest;
use crate::teardown::TeardownManager;
use crate::template::TemplateBundle;
use crate::wait::DEFAULT_TIMEOUT;
use crate::{Error, Result};

/// Namespace the registration agent runs in
pub const DEFAULT_AGENT_NAMESPACE: &str = "open-cluster-management-agent";

/// Service account of the registration agent
pub const DEFAULT_AGENT_SERVICE_ACCOUNT: &str = "klusterlet-registration-sa";

/// Split a comma separated cluster list.
///
/// Names are trimmed, empty entries dropped and duplicates removed keeping the
/// first occurrence. An empty result is an error.
pub fn parse_cluster_list(input: &str) -> Result<Vec<String>> {
    let mut clusters: Vec<String> = Vec::new();
    for name in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !clusters.iter().any(|c| c == name) {
            clusters.push(name.to_string());
        }
    }
    if clusters.is_empty() {
        return Err(Error::validation("at least one cluster name is required"));
    }
    Ok(clusters)
}

/// Parse `key=value,key2=value2` into a tag map
pub fn parse_tags(input: &str) -> Result<BTreeMap<String, String>> {
    let mut tags = BTreeMap::new();
    for pair in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::validation(format!("invalid tag {:?}, expected key=value", pair)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation(format!("invalid tag {:?}, empty key", pair)));
        }
        tags.insert(key.to_string(), value.trim().to_string());
    }
    Ok(tags)
}

/// Load the template bundle, applying overrides from a directory if given
pub fn load_templates(dir: Option<&Path>) -> Result<TemplateBundle> {
    match dir {
        Some(dir) => Ok(TemplateBundle::from_dir(dir)?),
        None => Ok(TemplateBundle::builtin()),
    }
}

/// Configuration for `join`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinConfig {
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
    /// Region override
    pub region: Option<String>,
    /// Extra tags for created objects
    pub additional_tags: BTreeMap<String, String>,
    /// Template override directory
    pub templates_dir: Option<PathBuf>,
    /// Validate and render only
    pub dry_run: bool,
}

impl JoinConfig {
    /// The provisioning request this configuration describes
    pub fn request(&self) -> JoinRequest {
        JoinRequest {
            cluster_name: self.cluster_name.clone(),
            eks_cluster_name: self.eks_cluster_name.clone(),
            hub_account_id: self.hub_account_id.clone(),
            namespace: self.namespace.clone(),
            service_account: self.service_account.clone(),
            region: self.region.clone(),
            additional_tags: self.additional_tags.clone(),
        }
    }
}

/// Configuration for `unjoin`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnjoinConfig {
    /// Cluster whose role is removed
    pub cluster_name: String,
    /// Worker-side objects, or the hub-side objects created by accept
    pub variant: TrustVariant,
    /// Actually delete the role and its managed policies
    pub delete_aws_role: bool,
    /// Report only
    pub dry_run: bool,
}

impl UnjoinConfig {
    /// Teardown manager for the configured side
    pub fn teardown_manager(&self, iam: Arc<dyn IamApi>) -> TeardownManager {
        TeardownManager::new(iam).with_variant(self.variant)
    }
}

/// Configuration for `accept`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptConfig {
    /// Clusters to accept, in order, without duplicates
    pub clusters: Vec<String>,
    /// Poll for a CSR instead of failing when none is found
    pub wait: bool,
    /// Bound for wait mode
    pub timeout: Duration,
    /// Approve CSRs without checking the bootstrap identity
    pub skip_approve_check: bool,
    /// Hub EKS cluster name, required for clusters that register through IAM
    pub hub_eks_cluster_name: Option<String>,
    /// Extra tags for created objects
    pub additional_tags: BTreeMap<String, String>,
    /// Template override directory
    pub templates_dir: Option<PathBuf>,
    /// Evaluate only
    pub dry_run: bool,
}

impl AcceptConfig {
    /// Configuration for the given clusters with defaults for everything else
    pub fn new(clusters: Vec<String>) -> Self {
        Self {
            clusters,
            wait: false,
            timeout: DEFAULT_TIMEOUT,
            skip_approve_check: false,
            hub_eks_cluster_name: None,
            additional_tags: BTreeMap::new(),
            templates_dir: None,
            dry_run: false,
        }
    }
}
