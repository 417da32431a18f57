//! Values available to policy templates
//!
//! Templates address values by namespace:
//! - `${cluster.name}` - the managed cluster name on the hub
//! - `${hub.account_id}`, `${hub.region}`, `${hub.cluster_name}`
//! - `${worker.account_id}`, `${worker.region}`, `${worker.oidc_issuer}`
//! - `${agent.namespace}`, `${agent.service_account}`
//!
//! A value that was never set is undefined, and rendering a template that
//! references it fails rather than producing an empty ARN segment.

use std::collections::HashMap;

use minijinja::Value;

/// Context for rendering one trust/permission policy pair
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    /// `${cluster.*}`
    pub cluster: HashMap<String, String>,
    /// `${hub.*}`
    pub hub: HashMap<String, String>,
    /// `${worker.*}`
    pub worker: HashMap<String, String>,
    /// `${agent.*}`
    pub agent: HashMap<String, String>,
}

impl PolicyContext {
    /// Create a new builder for PolicyContext
    pub fn builder() -> PolicyContextBuilder {
        PolicyContextBuilder::default()
    }

    /// Convert to minijinja Value for rendering
    pub fn to_value(&self) -> Value {
        let mut map = HashMap::new();
        map.insert("cluster", Value::from_iter(self.cluster.clone()));
        map.insert("hub", Value::from_iter(self.hub.clone()));
        map.insert("worker", Value::from_iter(self.worker.clone()));
        map.insert("agent", Value::from_iter(self.agent.clone()));
        Value::from_iter(map)
    }
}

/// Builder for PolicyContext
#[derive(Debug, Default)]
pub struct PolicyContextBuilder {
    ctx: PolicyContext,
}

impl PolicyContextBuilder {
    /// Set `${cluster.name}`
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.ctx.cluster.insert("name".to_string(), name.into());
        self
    }

    /// Set a `${hub.*}` value
    pub fn hub(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.hub.insert(key.into(), value.into());
        self
    }

    /// Set a `${worker.*}` value
    pub fn worker(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.worker.insert(key.into(), value.into());
        self
    }

    /// Set a `${agent.*}` value
    pub fn agent(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.agent.insert(key.into(), value.into());
        self
    }

    /// Build the PolicyContext
    pub fn build(self) -> PolicyContext {
        self.ctx
    }
}
