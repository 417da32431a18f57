//! Deterministic names and ARNs
//!
//! Teardown recomputes these from the cluster name alone, so the formats are
//! part of the wire contract.

use std::fmt;

/// Which side of the trust relationship an object belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TrustVariant {
    /// Role in the worker account, assumed by the worker's registration agent
    #[default]
    Worker,
    /// Role in the hub account, assumed from the worker role
    Hub,
}

impl TrustVariant {
    /// Name segment used in `ocm.<variant>.<cluster>`
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustVariant::Worker => "worker",
            TrustVariant::Hub => "hub",
        }
    }
}

impl fmt::Display for TrustVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared role and policy name for a cluster: `ocm.<variant>.<cluster>`
pub fn trust_object_name(variant: TrustVariant, cluster_name: &str) -> String {
    format!("ocm.{}.{}", variant, cluster_name)
}

/// `arn:aws:iam::<account>:role/<name>`
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account_id, role_name)
}

/// `arn:aws:iam::<account>:policy/<name>`
pub fn policy_arn(account_id: &str, policy_name: &str) -> String {
    format!("arn:aws:iam::{}:policy/{}", account_id, policy_name)
}

/// ARN of the IAM identity provider registered for an EKS OIDC issuer
pub fn oidc_provider_arn(account_id: &str, region: &str, issuer_id: &str) -> String {
    format!(
        "arn:aws:iam::{}:oidc-provider/oidc.eks.{}.amazonaws.com/id/{}",
        account_id, region, issuer_id
    )
}

/// The unjoin invocation that removes this side's objects for a cluster
pub fn unjoin_command(variant: TrustVariant, cluster_name: &str) -> String {
    let side = match variant {
        TrustVariant::Worker => "",
        TrustVariant::Hub => " --hub",
    };
    format!(
        "ocm-trust unjoin --cluster-name {} --delete-aws-role{}",
        cluster_name, side
    )
}

/// Kubernetes group the hub role is mapped to in `aws-auth`
pub fn mapped_group(cluster_name: &str) -> String {
    format!("system:open-cluster-management:{}", cluster_name)
}
