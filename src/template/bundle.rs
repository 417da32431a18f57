//! The four policy templates, injected as configuration
//!
//! Built-in templates are compiled in from `templates/`. A directory can
//! override any of them by providing a file with the same name.

use std::path::Path;

use super::error::TemplateError;
use crate::identity::TrustVariant;

const WORKER_PERMISSION_FILE: &str = "worker-permission-policy.json";
const WORKER_TRUST_FILE: &str = "worker-trust-policy.json";
const HUB_PERMISSION_FILE: &str = "hub-permission-policy.json";
const HUB_TRUST_FILE: &str = "hub-trust-policy.json";

const WORKER_PERMISSION_TEMPLATE: &str =
    include_str!("../../templates/worker-permission-policy.json");
const WORKER_TRUST_TEMPLATE: &str = include_str!("../../templates/worker-trust-policy.json");
const HUB_PERMISSION_TEMPLATE: &str = include_str!("../../templates/hub-permission-policy.json");
const HUB_TRUST_TEMPLATE: &str = include_str!("../../templates/hub-trust-policy.json");

/// Permission and trust templates for one side of the relationship
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyTemplates {
    /// Name used in error messages
    pub name: &'static str,
    /// Managed policy attached to the role
    pub permission: String,
    /// Assume-role (trust) policy of the role
    pub trust: String,
}

/// Templates for both sides
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateBundle {
    /// Worker-side role the registration agent assumes via IRSA
    pub worker: PolicyTemplates,
    /// Hub-side role assumed from the worker role
    pub hub: PolicyTemplates,
}

impl Default for TemplateBundle {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateBundle {
    /// The templates shipped with this build
    pub fn builtin() -> Self {
        Self {
            worker: PolicyTemplates {
                name: "worker",
                permission: WORKER_PERMISSION_TEMPLATE.to_string(),
                trust: WORKER_TRUST_TEMPLATE.to_string(),
            },
            hub: PolicyTemplates {
                name: "hub",
                permission: HUB_PERMISSION_TEMPLATE.to_string(),
                trust: HUB_TRUST_TEMPLATE.to_string(),
            },
        }
    }

    /// Built-in templates with per-file overrides from `dir`
    pub fn from_dir(dir: &Path) -> Result<Self, TemplateError> {
        let mut bundle = Self::builtin();
        override_from(dir, WORKER_PERMISSION_FILE, &mut bundle.worker.permission)?;
        override_from(dir, WORKER_TRUST_FILE, &mut bundle.worker.trust)?;
        override_from(dir, HUB_PERMISSION_FILE, &mut bundle.hub.permission)?;
        override_from(dir, HUB_TRUST_FILE, &mut bundle.hub.trust)?;
        Ok(bundle)
    }

    /// Templates for the given side
    pub fn for_variant(&self, variant: TrustVariant) -> &PolicyTemplates {
        match variant {
            TrustVariant::Worker => &self.worker,
            TrustVariant::Hub => &self.hub,
        }
    }
}

fn override_from(dir: &Path, file: &str, slot: &mut String) -> Result<(), TemplateError> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(());
    }
    *slot = std::fs::read_to_string(&path).map_err(|e| TemplateError::Load {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}
