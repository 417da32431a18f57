//! Custom resources read and patched on the hub
//!
//! ManagedCluster is owned by the hub's registration controller; this crate
//! models only the fields it reads or patches.

mod managed_cluster;

pub use managed_cluster::{ManagedCluster, ManagedClusterSpec};
