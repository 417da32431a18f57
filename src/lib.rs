//! ocm-trust - cross-account IAM trust and admission for hub/worker clusters
//!
//! A worker ("managed") cluster running on EKS registers with a hub control
//! plane either by a bootstrap certificate (CSR) or by AWS IAM. This crate
//! owns the IAM half of that handshake and the hub-side approval:
//!
//! - the worker side (`join`) creates a role the worker's registration agent
//!   assumes through IRSA, allowed to assume a role in the hub account
//! - the hub side (`accept`) creates that hub role, maps it into the hub's
//!   `aws-auth` ConfigMap, or approves the bootstrap CSR, and flips the
//!   ManagedCluster's `hubAcceptsClient`
//! - `unjoin` deletes what `join` created, but only objects carrying the
//!   managed tag
//!
//! # Modules
//!
//! - [`identity`] - ARN/OIDC parsing, caller and cluster discovery, naming
//! - [`tags`] - ownership tags stamped on every created object
//! - [`template`] - trust and permission policy rendering
//! - [`provider`] - narrow cloud capability traits and the AWS implementation
//! - [`provision`] - creates the role/policy pair for either side
//! - [`teardown`] - ownership-checked removal of the worker role/policy
//! - [`hub`] - hub control-plane and `aws-auth` role mapping collaborators
//! - [`crd`] - the ManagedCluster resource
//! - [`csr`] - bootstrap CSR selection and approval
//! - [`admission`] - per-cluster accept orchestration
//! - [`wait`] - bounded polling for wait mode
//! - [`retry`] - exponential backoff for the role mapping upsert
//! - [`config`] - run configuration for the three commands
//! - [`error`] - error types

#![deny(missing_docs)]

pub mod admission;
pub mod config;
pub mod crd;
pub mod csr;
pub mod error;
pub mod hub;
pub mod identity;
pub mod provider;
pub mod provision;
pub mod retry;
pub mod tags;
pub mod teardown;
pub mod template;
pub mod wait;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Wire contract
// =============================================================================
// These strings are read back by earlier and later versions of this tool and by
// the registration agent on the worker. They must not change.

/// Tool name used as field manager and in approval messages
pub const TOOL_NAME: &str = "ocm-trust";

/// Tag key binding a cloud object to exactly one cluster
pub const CLUSTER_TAG_KEY: &str = "open-cluster-management.io/cluster";

/// Tag key marking a cloud object as created by this tool
pub const MANAGED_TAG_KEY: &str = "open-cluster-management.io/managed";

/// The only value of [`MANAGED_TAG_KEY`] that grants ownership
pub const MANAGED_TAG_VALUE: &str = "true";

/// ManagedCluster annotation declaring the worker's IAM role ARN
pub const WORKER_ROLE_ANNOTATION: &str = "open-cluster-management.io/aws-iam-worker-role";

/// ManagedCluster annotation carrying the hub role ARN
pub const HUB_ROLE_ANNOTATION: &str = "open-cluster-management.io/aws-iam-hub-role";

/// ManagedCluster annotation carrying the hub EKS cluster name
pub const HUB_EKS_CLUSTER_ANNOTATION: &str = "open-cluster-management.io/aws-iam-hub-eks-cluster";

/// ManagedCluster annotation carrying the hub region
pub const HUB_REGION_ANNOTATION: &str = "open-cluster-management.io/aws-iam-hub-region";

/// ManagedCluster annotation carrying the hub account ID
pub const HUB_ACCOUNT_ANNOTATION: &str = "open-cluster-management.io/aws-iam-hub-account";

/// Label on bootstrap CSRs naming the cluster they belong to
pub const CLUSTER_NAME_LABEL: &str = "open-cluster-management.io/cluster-name";
