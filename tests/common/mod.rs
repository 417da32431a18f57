//! In-memory doubles of the provider and hub capability traits
//!
//! Each fake keeps a log of mutating calls so tests can assert that nothing
//! was changed.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::certificates::v1::{
    CertificateSigningRequest, CertificateSigningRequestSpec,
};
use kube::api::ObjectMeta;

use ocm_trust::crd::{ManagedCluster, ManagedClusterSpec};
use ocm_trust::hub::{HubApi, RoleMapper};
use ocm_trust::identity::names::{policy_arn, role_arn};
use ocm_trust::provider::{
    AttachedPolicies, AttachedPolicy, ClusterApi, ClusterDescription, IamApi, IamPolicy, IamRole,
    IdentityApi,
};
use ocm_trust::tags::Tag;
use ocm_trust::template::TemplateBundle;
use ocm_trust::provision::TrustProvisioner;
use ocm_trust::Error;

pub const HUB_ACCOUNT: &str = "111111111111";
pub const WORKER_ACCOUNT: &str = "222222222222";

// =============================================================================
// IAM
// =============================================================================

#[derive(Default)]
struct IamState {
    roles: HashMap<String, IamRole>,
    policies: HashMap<String, IamPolicy>,
    attachments: HashMap<String, Vec<String>>,
    oidc_providers: HashSet<String>,
    mutations: Vec<String>,
}

/// IAM for a single account
pub struct FakeIam {
    account: String,
    state: Mutex<IamState>,
}

impl FakeIam {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            state: Mutex::new(IamState::default()),
        }
    }

    pub fn with_role(self, name: &str, tags: Vec<Tag>) -> Self {
        self.state.lock().unwrap().roles.insert(
            name.to_string(),
            IamRole {
                name: name.to_string(),
                arn: role_arn(&self.account, name),
                tags,
            },
        );
        self
    }

    pub fn with_attached_policy(self, role: &str, name: &str, tags: Vec<Tag>) -> Self {
        let arn = policy_arn(&self.account, name);
        {
            let mut state = self.state.lock().unwrap();
            state.policies.insert(
                arn.clone(),
                IamPolicy {
                    name: name.to_string(),
                    arn: arn.clone(),
                    tags,
                },
            );
            state
                .attachments
                .entry(role.to_string())
                .or_default()
                .push(arn);
        }
        self
    }

    pub fn with_oidc_provider(self, arn: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .oidc_providers
            .insert(arn.to_string());
        self
    }

    pub fn role(&self, name: &str) -> Option<IamRole> {
        self.state.lock().unwrap().roles.get(name).cloned()
    }

    pub fn policy(&self, arn: &str) -> Option<IamPolicy> {
        self.state.lock().unwrap().policies.get(arn).cloned()
    }

    pub fn attached(&self, role: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .attachments
            .get(role)
            .cloned()
            .unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }
}

#[async_trait]
impl IamApi for FakeIam {
    async fn get_role(&self, name: &str) -> Result<Option<IamRole>, Error> {
        Ok(self.role(name))
    }

    async fn get_policy(&self, arn: &str) -> Result<Option<IamPolicy>, Error> {
        Ok(self.policy(arn))
    }

    async fn create_policy(
        &self,
        name: &str,
        _document: &str,
        _description: &str,
        tags: Vec<Tag>,
    ) -> Result<IamPolicy, Error> {
        let mut state = self.state.lock().unwrap();
        let arn = policy_arn(&self.account, name);
        if state.policies.contains_key(&arn) {
            return Err(Error::aws("CreatePolicy", "EntityAlreadyExists"));
        }
        let policy = IamPolicy {
            name: name.to_string(),
            arn: arn.clone(),
            tags,
        };
        state.policies.insert(arn.clone(), policy.clone());
        state.mutations.push(format!("CreatePolicy {}", arn));
        Ok(policy)
    }

    async fn create_role(
        &self,
        name: &str,
        _trust_document: &str,
        _description: &str,
        tags: Vec<Tag>,
    ) -> Result<IamRole, Error> {
        let mut state = self.state.lock().unwrap();
        if state.roles.contains_key(name) {
            return Err(Error::aws("CreateRole", "EntityAlreadyExists"));
        }
        let role = IamRole {
            name: name.to_string(),
            arn: role_arn(&self.account, name),
            tags,
        };
        state.roles.insert(name.to_string(), role.clone());
        state.mutations.push(format!("CreateRole {}", name));
        Ok(role)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state
            .attachments
            .entry(role_name.to_string())
            .or_default()
            .push(policy_arn.to_string());
        state
            .mutations
            .push(format!("AttachRolePolicy {} {}", role_name, policy_arn));
        Ok(())
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<AttachedPolicies, Error> {
        let state = self.state.lock().unwrap();
        let policies = state
            .attachments
            .get(role_name)
            .map(|arns| {
                arns.iter()
                    .map(|arn| AttachedPolicy {
                        name: arn.rsplit('/').next().unwrap_or_default().to_string(),
                        arn: arn.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(AttachedPolicies {
            policies,
            truncated: false,
        })
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(arns) = state.attachments.get_mut(role_name) {
            arns.retain(|a| a != policy_arn);
        }
        state
            .mutations
            .push(format!("DetachRolePolicy {} {}", role_name, policy_arn));
        Ok(())
    }

    async fn delete_policy(&self, arn: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.attachments.values().any(|a| a.iter().any(|p| p == arn)) {
            return Err(Error::aws("DeletePolicy", "DeleteConflict"));
        }
        state.policies.remove(arn);
        state.mutations.push(format!("DeletePolicy {}", arn));
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.attachments.get(name).is_some_and(|a| !a.is_empty()) {
            return Err(Error::aws("DeleteRole", "DeleteConflict"));
        }
        state.roles.remove(name);
        state.mutations.push(format!("DeleteRole {}", name));
        Ok(())
    }

    async fn get_oidc_provider(&self, arn: &str) -> Result<Option<String>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .oidc_providers
            .get(arn)
            .map(|a| a.split_once("oidc-provider/").map(|(_, url)| url.to_string()).unwrap_or_default()))
    }
}

// =============================================================================
// EKS and STS
// =============================================================================

#[derive(Default)]
pub struct FakeEks {
    clusters: HashMap<String, ClusterDescription>,
}

impl FakeEks {
    pub fn with_cluster(
        mut self,
        name: &str,
        account: &str,
        region: &str,
        oidc_issuer_url: Option<&str>,
    ) -> Self {
        self.clusters.insert(
            name.to_string(),
            ClusterDescription {
                name: name.to_string(),
                arn: format!("arn:aws:eks:{}:{}:cluster/{}", region, account, name),
                oidc_issuer_url: oidc_issuer_url.map(String::from),
            },
        );
        self
    }
}

#[async_trait]
impl ClusterApi for FakeEks {
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterDescription>, Error> {
        Ok(self.clusters.get(name).cloned())
    }
}

pub struct FakeSts {
    account: String,
}

impl FakeSts {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }
}

#[async_trait]
impl IdentityApi for FakeSts {
    async fn caller_account(&self) -> Result<String, Error> {
        Ok(self.account.clone())
    }
}

pub fn provisioner(iam: Arc<FakeIam>, account: &str, eks: FakeEks) -> TrustProvisioner {
    TrustProvisioner::new(
        iam,
        Arc::new(FakeSts::new(account)),
        Arc::new(eks),
        TemplateBundle::builtin(),
    )
}

// =============================================================================
// Hub
// =============================================================================

#[derive(Default)]
pub struct FakeHub {
    managed: Mutex<HashMap<String, ManagedCluster>>,
    csrs: Mutex<Vec<CertificateSigningRequest>>,
    config_maps: HashSet<(String, String)>,
    approvals: Mutex<Vec<String>>,
    accepts: Mutex<Vec<String>>,
    reads: Mutex<usize>,
    missing_reads: HashSet<usize>,
}

impl FakeHub {
    pub fn with_managed_cluster(self, name: &str, annotations: &[(&str, &str)]) -> Self {
        let mut mc = ManagedCluster::new(name, ManagedClusterSpec::default());
        if !annotations.is_empty() {
            mc.metadata.annotations = Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        self.managed.lock().unwrap().insert(name.to_string(), mc);
        self
    }

    pub fn with_bootstrap_csr(self, name: &str, cluster: &str) -> Self {
        let csr = CertificateSigningRequest {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([(
                    ocm_trust::CLUSTER_NAME_LABEL.to_string(),
                    cluster.to_string(),
                )])),
                ..Default::default()
            },
            spec: CertificateSigningRequestSpec {
                username: Some(format!("system:bootstrap:{}", cluster)),
                groups: Some(vec![ocm_trust::csr::BOOTSTRAP_GROUP.to_string()]),
                ..Default::default()
            },
            status: None,
        };
        self.csrs.lock().unwrap().push(csr);
        self
    }

    pub fn with_config_map(mut self, namespace: &str, name: &str) -> Self {
        self.config_maps
            .insert((namespace.to_string(), name.to_string()));
        self
    }

    /// The `n`th ManagedCluster read (1-based) reports the record as absent
    pub fn with_record_missing_on_read(mut self, n: usize) -> Self {
        self.missing_reads.insert(n);
        self
    }

    pub fn managed_cluster(&self, name: &str) -> Option<ManagedCluster> {
        self.managed.lock().unwrap().get(name).cloned()
    }

    pub fn approvals(&self) -> Vec<String> {
        self.approvals.lock().unwrap().clone()
    }

    pub fn accepts(&self) -> Vec<String> {
        self.accepts.lock().unwrap().clone()
    }
}

#[async_trait]
impl HubApi for FakeHub {
    async fn list_csrs(
        &self,
        cluster_name: &str,
    ) -> Result<Vec<CertificateSigningRequest>, Error> {
        let csrs = self.csrs.lock().unwrap();
        Ok(csrs
            .iter()
            .filter(|c| {
                c.metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(ocm_trust::CLUSTER_NAME_LABEL))
                    .is_some_and(|v| v == cluster_name)
            })
            .cloned()
            .collect())
    }

    async fn update_csr_approval(&self, csr: CertificateSigningRequest) -> Result<(), Error> {
        let name = csr.metadata.name.clone().unwrap_or_default();
        let mut csrs = self.csrs.lock().unwrap();
        if let Some(existing) = csrs
            .iter_mut()
            .find(|c| c.metadata.name.as_deref() == Some(name.as_str()))
        {
            existing.status = csr.status;
        }
        self.approvals.lock().unwrap().push(name);
        Ok(())
    }

    async fn get_managed_cluster(&self, name: &str) -> Result<Option<ManagedCluster>, Error> {
        let read = {
            let mut reads = self.reads.lock().unwrap();
            *reads += 1;
            *reads
        };
        if self.missing_reads.contains(&read) {
            return Ok(None);
        }
        Ok(self.managed_cluster(name))
    }

    async fn accept_managed_cluster(
        &self,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let mut managed = self.managed.lock().unwrap();
        let mc = managed
            .get_mut(name)
            .ok_or_else(|| Error::ManagedClusterNotFound(name.to_string()))?;
        mc.spec.hub_accepts_client = true;
        mc.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations);
        self.accepts.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn config_map_exists(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        Ok(self
            .config_maps
            .contains(&(namespace.to_string(), name.to_string())))
    }
}

#[derive(Default)]
pub struct FakeMapper {
    mappings: Mutex<Vec<(String, Vec<String>)>>,
    fail: bool,
}

impl FakeMapper {
    /// Every upsert fails as if the retries were exhausted
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn mappings(&self) -> Vec<(String, Vec<String>)> {
        self.mappings.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoleMapper for FakeMapper {
    async fn upsert_role(&self, role_arn: &str, groups: Vec<String>) -> Result<(), Error> {
        if self.fail {
            return Err(Error::aws("UpdateConfigMap", "conflict"));
        }
        self.mappings
            .lock()
            .unwrap()
            .push((role_arn.to_string(), groups));
        Ok(())
    }
}
