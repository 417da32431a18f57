//! Ownership tags
//!
//! Every role and policy this tool creates carries two tags: one binding it to
//! a cluster and one marking it as managed. The managed tag is read back before
//! any detach or delete; it is the only thing standing between teardown and a
//! hand-made role that happens to share the deterministic name.

use std::collections::BTreeMap;

use crate::{CLUSTER_TAG_KEY, MANAGED_TAG_KEY, MANAGED_TAG_VALUE};

/// A cloud resource tag
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Build the tag set for a new trust object.
///
/// Caller tags come first in key order; the cluster and managed tags are
/// appended last and replace any caller tag with the same key.
pub fn build_tag_set(cluster_name: &str, extra: &BTreeMap<String, String>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = extra
        .iter()
        .filter(|(k, _)| k.as_str() != CLUSTER_TAG_KEY && k.as_str() != MANAGED_TAG_KEY)
        .map(|(k, v)| Tag::new(k, v))
        .collect();
    tags.push(Tag::new(CLUSTER_TAG_KEY, cluster_name));
    tags.push(Tag::new(MANAGED_TAG_KEY, MANAGED_TAG_VALUE));
    tags
}

/// True iff the managed tag is present with exactly the value `"true"`
pub fn is_managed(tags: &[Tag]) -> bool {
    tags.iter()
        .any(|t| t.key == MANAGED_TAG_KEY && t.value == MANAGED_TAG_VALUE)
}

/// The cluster a tag set is bound to, if any
pub fn tagged_cluster(tags: &[Tag]) -> Option<&str> {
    tags.iter()
        .find(|t| t.key == CLUSTER_TAG_KEY)
        .map(|t| t.value.as_str())
}
