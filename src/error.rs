//! Error types for trust provisioning and cluster admission

use thiserror::Error;

use crate::template::TemplateError;

/// Main error type for ocm-trust operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A resource that was required to exist is absent
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind (e.g. "policy", "configmap")
        kind: &'static str,
        /// Resource name or ARN
        name: String,
    },

    /// The cloud provider has no compute cluster with this name
    #[error("EKS cluster {0} not found")]
    ClusterNotFound(String),

    /// Teardown found no role for the cluster
    #[error("role {0} not found - has this cluster been joined with an IAM role?")]
    RoleNotFound(String),

    /// The hub has no ManagedCluster record for the cluster
    #[error("managed cluster {0} not found on the hub")]
    ManagedClusterNotFound(String),

    /// A same-named trust object already exists; it is never adopted
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// "role" or "policy"
        kind: &'static str,
        /// ARN of the conflicting object
        name: String,
    },

    /// The object lacks the managed tag and must not be mutated
    #[error("{kind} {name} is not managed by OCM - refusing to modify it")]
    NotManaged {
        /// "role" or "policy"
        kind: &'static str,
        /// Name of the object
        name: String,
    },

    /// ARN did not have the conventional six colon-delimited segments
    #[error("malformed ARN: {0}")]
    MalformedArn(String),

    /// OIDC issuer URL did not contain an `/id/<issuer>` segment
    #[error("malformed OIDC issuer URL: {0}")]
    MalformedOidcUrl(String),

    /// The worker cluster has no OIDC issuer
    #[error("you need to configure an OIDC provider for EKS cluster {0}")]
    OidcNotConfigured(String),

    /// The OIDC issuer has not been registered as an IAM identity provider
    #[error("IAM OIDC provider {0} does not exist - run `eksctl utils associate-iam-oidc-provider --cluster <cluster> --approve`")]
    OidcProviderMissing(String),

    /// Policy template failed to render
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A bounded poll gave up before its condition was met
    #[error("timed out after {timeout_secs}s waiting for {description}")]
    Timeout {
        /// What was being waited for
        description: String,
        /// Configured timeout
        timeout_secs: u64,
    },

    /// Single-shot accept found nothing to approve
    #[error("no CSR to approve for cluster {0}")]
    NoCsrToApprove(String),

    /// A mandatory precondition on the hub is not satisfied
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Provisioning failed after some objects were already created
    #[error(
        "{source}; the following objects were created and NOT rolled back: [{}]. \
         Clean up before retrying: {cleanup}",
        created.join(", ")
    )]
    PartialProvision {
        /// ARNs of the objects left behind
        created: Vec<String>,
        /// How to remove them
        cleanup: String,
        /// The provider error that stopped provisioning
        #[source]
        source: Box<Error>,
    },

    /// Cloud provider API error, carried through unchanged
    #[error("AWS {operation} failed: {message}")]
    Aws {
        /// API operation name (e.g. "CreateRole")
        operation: &'static str,
        /// Provider error text
        message: String,
    },

    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid user input
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a precondition error with the given message
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a provider error for the given API operation
    pub fn aws(operation: &'static str, msg: impl Into<String>) -> Self {
        Self::Aws {
            operation,
            message: msg.into(),
        }
    }

    /// Wrap a provider error with the list of objects left behind and the
    /// way to remove them.
    ///
    /// Returns the error unchanged when nothing had been created yet.
    pub fn partial(created: &[String], cleanup: impl Into<String>, source: Error) -> Self {
        if created.is_empty() {
            source
        } else {
            Self::PartialProvision {
                created: created.to_vec(),
                cleanup: cleanup.into(),
                source: Box::new(source),
            }
        }
    }

    /// True for errors describing absence rather than failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::ClusterNotFound(_)
                | Self::RoleNotFound(_)
                | Self::ManagedClusterNotFound(_)
        )
    }
}
