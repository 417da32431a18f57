//! Bootstrap CSR selection and approval
//!
//! A worker that registers by certificate submits a CSR labelled with its
//! cluster name. Conditions on a CSR are append-only: once `Approved` or
//! `Denied` is present the request is terminal and is never approved again.

use std::sync::Arc;

use chrono::Utc;
use k8s_openapi::api::certificates::v1::{
    CertificateSigningRequest, CertificateSigningRequestCondition,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use tracing::{debug, info};

use crate::hub::HubApi;
use crate::{Result, TOOL_NAME};

/// Username prefix of bootstrap-token identities
pub const BOOTSTRAP_USER_PREFIX: &str = "system:bootstrap:";
/// Username of the bootstrap service account
pub const BOOTSTRAP_SA_USER: &str =
    "system:serviceaccount:open-cluster-management:cluster-bootstrap";
/// Group of bootstrap-token identities
pub const BOOTSTRAP_GROUP: &str = "system:bootstrappers:managedcluster";
/// Group of the bootstrap service account
pub const BOOTSTRAP_SA_GROUP: &str = "system:serviceaccounts:open-cluster-management";

/// Reason recorded on approval conditions written by this tool
pub const APPROVAL_REASON: &str = "OcmTrustApprove";

const APPROVED: &str = "Approved";
const DENIED: &str = "Denied";

/// Result of one approval attempt for a cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CsrOutcome {
    /// The named CSR was approved
    Approved(String),
    /// Dry run: the named CSR would have been approved
    WouldApprove(String),
    /// The first candidate was already approved; nothing submitted
    AlreadyApproved(String),
    /// The first candidate was already denied; nothing submitted
    AlreadyDenied(String),
    /// No candidate CSR exists yet
    NotFound,
}

impl CsrOutcome {
    /// True unless no candidate was found.
    ///
    /// A denied CSR counts as handled: the cluster's authorization question
    /// has an answer and approving another request would override it.
    pub fn is_handled(&self) -> bool {
        !matches!(self, CsrOutcome::NotFound)
    }
}

/// Approval state derived from a CSR's conditions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrState {
    /// No terminal condition
    Pending,
    /// Has an `Approved` condition
    Approved,
    /// Has a `Denied` condition
    Denied,
}

/// Terminal state of a CSR. Denied wins if both conditions are somehow present.
pub fn csr_state(csr: &CertificateSigningRequest) -> CsrState {
    let conditions = csr
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();

    if conditions.iter().any(|c| c.type_ == DENIED) {
        CsrState::Denied
    } else if conditions.iter().any(|c| c.type_ == APPROVED) {
        CsrState::Approved
    } else {
        CsrState::Pending
    }
}

/// True if the CSR was submitted by a bootstrap identity
pub fn is_bootstrap_request(csr: &CertificateSigningRequest) -> bool {
    let username = csr.spec.username.as_deref().unwrap_or_default();
    if !username.starts_with(BOOTSTRAP_USER_PREFIX) && username != BOOTSTRAP_SA_USER {
        return false;
    }
    csr.spec
        .groups
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|g| g == BOOTSTRAP_GROUP || g == BOOTSTRAP_SA_GROUP)
}

fn csr_name(csr: &CertificateSigningRequest) -> String {
    csr.metadata.name.clone().unwrap_or_default()
}

/// What [`select_csr`] decided for a candidate set
#[derive(Debug)]
pub enum Selection<'a> {
    /// First candidate in a terminal state
    Terminal(CsrOutcome),
    /// First pending candidate
    Pending(&'a CertificateSigningRequest),
    /// No candidates
    None,
}

/// Apply the selection policy to CSRs in listing order.
///
/// The first candidate decides: a terminal one short-circuits, a pending one
/// is selected. Later candidates are ignored.
pub fn select_csr(csrs: &[CertificateSigningRequest], skip_approve_check: bool) -> Selection<'_> {
    let first = csrs
        .iter()
        .find(|csr| skip_approve_check || is_bootstrap_request(csr));

    match first {
        None => Selection::None,
        Some(csr) => match csr_state(csr) {
            CsrState::Denied => Selection::Terminal(CsrOutcome::AlreadyDenied(csr_name(csr))),
            CsrState::Approved => Selection::Terminal(CsrOutcome::AlreadyApproved(csr_name(csr))),
            CsrState::Pending => Selection::Pending(csr),
        },
    }
}

/// Append the approval condition, leaving existing conditions in place
pub fn append_approval(csr: &mut CertificateSigningRequest) {
    let status = csr.status.get_or_insert_with(Default::default);
    status
        .conditions
        .get_or_insert_with(Vec::new)
        .push(CertificateSigningRequestCondition {
            type_: APPROVED.to_string(),
            status: "True".to_string(),
            reason: Some(APPROVAL_REASON.to_string()),
            message: Some(format!("This CSR was approved by {} accept.", TOOL_NAME)),
            last_update_time: Some(Time(Utc::now())),
            ..Default::default()
        });
}

/// Approves the bootstrap CSR of a cluster
pub struct CsrApprover {
    hub: Arc<dyn HubApi>,
    skip_approve_check: bool,
    dry_run: bool,
}

impl CsrApprover {
    /// Create an approver
    pub fn new(hub: Arc<dyn HubApi>, skip_approve_check: bool, dry_run: bool) -> Self {
        Self {
            hub,
            skip_approve_check,
            dry_run,
        }
    }

    /// List the cluster's CSRs and approve the selected one.
    ///
    /// Returns [`CsrOutcome::NotFound`] rather than an error when there is
    /// nothing to approve; the caller decides whether that is fatal.
    pub async fn approve(&self, cluster_name: &str) -> Result<CsrOutcome> {
        let csrs = self.hub.list_csrs(cluster_name).await?;

        let outcome = match select_csr(&csrs, self.skip_approve_check) {
            Selection::None => {
                debug!(cluster = %cluster_name, "No CSR to approve");
                CsrOutcome::NotFound
            }
            Selection::Terminal(outcome) => {
                match &outcome {
                    CsrOutcome::AlreadyDenied(name) => {
                        info!(cluster = %cluster_name, csr = %name, "CSR already denied")
                    }
                    CsrOutcome::AlreadyApproved(name) => {
                        info!(cluster = %cluster_name, csr = %name, "CSR already approved")
                    }
                    _ => {}
                }
                outcome
            }
            Selection::Pending(csr) => {
                let name = csr_name(csr);
                if self.dry_run {
                    info!(cluster = %cluster_name, csr = %name, "Dry run: would approve CSR");
                    CsrOutcome::WouldApprove(name)
                } else {
                    let mut csr = csr.clone();
                    append_approval(&mut csr);
                    self.hub.update_csr_approval(csr).await?;
                    info!(cluster = %cluster_name, csr = %name, "CSR approved");
                    CsrOutcome::Approved(name)
                }
            }
        };

        Ok(outcome)
    }
}
