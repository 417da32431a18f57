//! Admission orchestration
//!
//! Accepts clusters one at a time, in the order given. Each cluster is
//! authorized either through AWS IAM (when its ManagedCluster declares a worker
//! role) or by approving its bootstrap CSR, and then its ManagedCluster is
//! marked `hubAcceptsClient: true` with any hub identity annotations merged in.
//!
//! The batch stops at the first cluster that fails.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::config::AcceptConfig;
use crate::csr::CsrApprover;
use crate::hub::{HubApi, RoleMapper};
use crate::provision::{AcceptRequest, TrustProvisioner};
use crate::wait::{poll_immediate, POLL_INTERVAL};
use crate::{Error, Result};

/// Drives accept for a batch of clusters
pub struct AdmissionOrchestrator {
    hub: Arc<dyn HubApi>,
    mapper: Arc<dyn RoleMapper>,
    provisioner: Option<Arc<TrustProvisioner>>,
    /// Hub annotations from a completed IAM accept, keyed by cluster, so wait
    /// mode does not provision the same cluster twice
    pending: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl AdmissionOrchestrator {
    /// Create an orchestrator.
    ///
    /// Without a provisioner, clusters that register through IAM are rejected.
    pub fn new(
        hub: Arc<dyn HubApi>,
        mapper: Arc<dyn RoleMapper>,
        provisioner: Option<Arc<TrustProvisioner>>,
    ) -> Self {
        Self {
            hub,
            mapper,
            provisioner,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Accept every configured cluster, stopping at the first failure.
    ///
    /// In single-shot mode a cluster with nothing to approve fails with
    /// [`Error::NoCsrToApprove`]. In wait mode each cluster is retried every
    /// second until accepted or until `config.timeout` elapses.
    pub async fn accept_all(&self, config: &AcceptConfig) -> Result<Vec<String>> {
        let mut accepted = Vec::with_capacity(config.clusters.len());

        for cluster in &config.clusters {
            if config.wait {
                let description = format!("cluster {} to be accepted", cluster);
                poll_immediate(POLL_INTERVAL, config.timeout, &description, || {
                    self.accept_cluster(cluster, config, true)
                })
                .await?;
            } else if !self.accept_cluster(cluster, config, false).await? {
                return Err(Error::NoCsrToApprove(cluster.clone()));
            }
            accepted.push(cluster.clone());
        }

        Ok(accepted)
    }

    /// One accept attempt for a cluster.
    ///
    /// Returns true once the cluster is both authorized and recorded as
    /// accepted. A missing ManagedCluster fails with
    /// [`Error::ManagedClusterNotFound`] in both modes, which also ends a wait.
    /// In single-shot mode a cluster that was authorized but whose record
    /// vanished before the update fails the same way.
    pub async fn accept_cluster(
        &self,
        cluster_name: &str,
        config: &AcceptConfig,
        wait_mode: bool,
    ) -> Result<bool> {
        let managed = self
            .hub
            .get_managed_cluster(cluster_name)
            .await?
            .ok_or_else(|| Error::ManagedClusterNotFound(cluster_name.to_string()))?;

        let (authorized, annotations) = match managed.iam_worker_role() {
            Some(worker_role) => {
                let annotations = self
                    .accept_iam(cluster_name, worker_role, config)
                    .await?;
                (true, annotations)
            }
            None => {
                let approver =
                    CsrApprover::new(self.hub.clone(), config.skip_approve_check, config.dry_run);
                let outcome = approver.approve(cluster_name).await?;
                if !outcome.is_handled() && wait_mode {
                    info!(cluster = %cluster_name, "No CSR to approve yet");
                }
                (outcome.is_handled(), BTreeMap::new())
            }
        };

        let updated = self
            .update_admission_record(cluster_name, &annotations, config.dry_run)
            .await?;

        match (authorized, updated) {
            (true, true) => {
                info!(
                    cluster = %cluster_name,
                    "Your managed cluster has joined the hub successfully"
                );
                Ok(true)
            }
            (true, false) if !wait_mode => {
                Err(Error::ManagedClusterNotFound(cluster_name.to_string()))
            }
            (true, false) => {
                info!(cluster = %cluster_name, "Managed cluster record not updated yet");
                Ok(false)
            }
            (false, _) => Ok(false),
        }
    }

    async fn accept_iam(
        &self,
        cluster_name: &str,
        worker_role: &str,
        config: &AcceptConfig,
    ) -> Result<BTreeMap<String, String>> {
        if let Some(annotations) = self.pending_annotations(cluster_name) {
            return Ok(annotations);
        }

        let provisioner = self.provisioner.as_ref().ok_or_else(|| {
            Error::validation(format!(
                "cluster {} registers through AWS IAM but no AWS configuration is available",
                cluster_name
            ))
        })?;
        let hub_eks_cluster_name = config.hub_eks_cluster_name.clone().ok_or_else(|| {
            Error::validation(format!(
                "cluster {} registers through AWS IAM; the hub EKS cluster name is required",
                cluster_name
            ))
        })?;

        info!(cluster = %cluster_name, worker_role = %worker_role, "Accepting cluster through AWS IAM");
        let request = AcceptRequest {
            cluster_name: cluster_name.to_string(),
            worker_role_arn: worker_role.to_string(),
            hub_eks_cluster_name,
            additional_tags: config.additional_tags.clone(),
        };
        let outcome = provisioner
            .accept(&request, self.hub.as_ref(), self.mapper.as_ref(), config.dry_run)
            .await?;

        let annotations = outcome.annotations();
        self.remember_annotations(cluster_name, &annotations);
        Ok(annotations)
    }

    fn pending_annotations(&self, cluster_name: &str) -> Option<BTreeMap<String, String>> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.get(cluster_name).cloned()
    }

    fn remember_annotations(&self, cluster_name: &str, annotations: &BTreeMap<String, String>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(cluster_name.to_string(), annotations.clone());
    }

    /// Mark the ManagedCluster accepted and merge in `annotations`.
    ///
    /// Returns false if the record does not exist. An already accepted record
    /// that carries every annotation is left untouched. Under dry run this
    /// only reports whether the record would be accepted.
    pub async fn update_admission_record(
        &self,
        cluster_name: &str,
        annotations: &BTreeMap<String, String>,
        dry_run: bool,
    ) -> Result<bool> {
        let Some(managed) = self.hub.get_managed_cluster(cluster_name).await? else {
            return Ok(false);
        };

        let missing_annotations = annotations
            .iter()
            .any(|(k, v)| managed.annotation(k) != Some(v.as_str()));
        if managed.is_accepted() && !missing_annotations {
            info!(cluster = %cluster_name, "hubAcceptsClient already set");
            return Ok(true);
        }
        if dry_run {
            info!(cluster = %cluster_name, "Dry run - not updating managed cluster");
            return Ok(true);
        }

        self.hub
            .accept_managed_cluster(cluster_name, annotations.clone())
            .await?;
        info!(cluster = %cluster_name, "Set hubAcceptsClient to true");
        Ok(true)
    }
}
