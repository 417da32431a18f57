//! Policy document templating
//!
//! Trust and permission policies are rendered from versioned templates with
//! `${...}` placeholders using minijinja's custom syntax configuration.
//! Templates are plain configuration: [`TemplateBundle`] is constructed once and
//! handed to the provisioner, never read from global state.
//!
//! Rendering is pure. Only the IAM call that follows it has side effects.

mod bundle;
mod context;
mod engine;
mod error;

pub use bundle::{PolicyTemplates, TemplateBundle};
pub use context::{PolicyContext, PolicyContextBuilder};
pub use engine::TemplateEngine;
pub use error::TemplateError;
