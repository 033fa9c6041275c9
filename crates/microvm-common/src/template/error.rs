//! Template error types

use std::fmt;

use minijinja::ErrorKind;

/// Errors that can occur during template operations
#[derive(Debug)]
pub enum TemplateError {
    /// Template rendering failed
    Render(minijinja::Error),
    /// Template syntax is invalid
    Syntax(String),
    /// A referenced key is absent from the value map
    Undefined(String),
    /// Filter operation failed
    Filter(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Syntax(msg) => write!(f, "template syntax error: {}", msg),
            Self::Undefined(var) => write!(f, "undefined variable: {}", var),
            Self::Filter(msg) => write!(f, "filter error: {}", msg),
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
        match err.kind() {
            ErrorKind::UndefinedError => Self::Undefined(
                err.detail()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string()),
            ),
            ErrorKind::SyntaxError => Self::Syntax(err.to_string()),
            _ => Self::Render(err),
        }
    }
}
