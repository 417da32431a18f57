//! Template engine for policy documents
//!
//! Uses minijinja with custom syntax configuration:
//! - Variable delimiters: `${...}`
//! - Block delimiters: `{%...%}`
//! - Comment delimiters: `{#...#}`
//!
//! `{{` would collide with nested JSON objects, so the default Jinja variable
//! syntax is not used.

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, UndefinedBehavior};

use super::context::PolicyContext;
use super::error::TemplateError;

/// Renders policy templates against a [`PolicyContext`]
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine
    ///
    /// # Panics
    ///
    /// Panics if the minijinja syntax configuration fails to build. The
    /// delimiters are hardcoded, so this only happens on a minijinja API change.
    pub fn new() -> Self {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("${", "}")
            .block_delimiters("{%", "%}")
            .comment_delimiters("{#", "#}")
            .build()
            .expect("template syntax configuration is hardcoded and valid");

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        // Policy documents must round-trip byte for byte.
        env.set_keep_trailing_newline(true);

        Self { env }
    }

    /// Render a template string with the given context
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Render` if the syntax is invalid or a referenced
    /// variable is undefined.
    pub fn render(&self, template: &str, ctx: &PolicyContext) -> Result<String, TemplateError> {
        self.env
            .render_str(template, ctx.to_value())
            .map_err(TemplateError::from)
    }

    /// Render a template and check the result parses as a JSON document
    pub fn render_document(
        &self,
        name: &str,
        template: &str,
        ctx: &PolicyContext,
    ) -> Result<String, TemplateError> {
        let rendered = self.render(template, ctx)?;
        serde_json::from_str::<serde_json::Value>(&rendered).map_err(|e| {
            TemplateError::InvalidDocument {
                template: name.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(rendered)
    }
}
