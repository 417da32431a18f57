//! Template error types

use std::fmt;

/// Errors that can occur while rendering a policy document
#[derive(Debug)]
pub enum TemplateError {
    /// Template rendering failed (syntax error or undefined variable)
    Render(minijinja::Error),
    /// Rendered output is not a valid JSON policy document
    InvalidDocument {
        /// Which template produced the document
        template: String,
        /// JSON parse error
        message: String,
    },
    /// A template file could not be read
    Load {
        /// Path of the template file
        path: String,
        /// IO error
        message: String,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::InvalidDocument { template, message } => write!(
                f,
                "template {} did not render a valid JSON policy document: {}",
                template, message
            ),
            Self::Load { path, message } => {
                write!(f, "failed to load template {}: {}", path, message)
            }
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err)
    }
}
