//! Error types for the MicroVM provider
//!
//! Errors are structured with fields to aid debugging. Each variant carries
//! contextual information like cluster names, environment keys, and
//! underlying causes.

use thiserror::Error;

use crate::template::TemplateError;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for MicroVM provider operations
#[derive(Debug, Error)]
pub enum Error {
    /// Validation error for configuration objects or environment
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.users[0].sshAuthorizedKeys")
        field: Option<String>,
    },

    /// Manifest rendering error
    #[error("template error: {source}")]
    Template {
        /// The underlying template failure
        #[from]
        source: TemplateError,
    },

    /// Failure to publish a value into the environment
    #[error("unable to set {key}: {message}")]
    Environment {
        /// Environment variable name
        key: String,
        /// Description of what failed
        message: String,
    },

    /// Infrastructure provider error
    #[error("provider error for {cluster}: {message}")]
    Provider {
        /// Name of the cluster being processed
        cluster: String,
        /// Description of what failed, including the wrapped cause
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being decoded (if known)
        kind: Option<String>,
    },

    /// Configuration file could not be read
    #[error("unable to read file {path}: {source}")]
    Io {
        /// Path of the file
        path: String,
        /// The underlying I/O error
        source: std::io::Error,
    },
}

impl Error {
    /// Create a validation error with the given message
    ///
    /// For simple validation errors without cluster context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context and field path
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an environment error for the given key
    pub fn environment(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Environment {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a provider error with cluster context
    pub fn provider_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an I/O error for the given path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors caused by invalid user input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Get the cluster name associated with this error, if any
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Self::Validation { cluster, .. } | Self::Provider { cluster, .. } => {
                if cluster == UNKNOWN_CONTEXT {
                    None
                } else {
                    Some(cluster)
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = Error::validation_for("test1", "machine config cp-1 has no users");
        assert_eq!(
            err.to_string(),
            "validation error for test1: machine config cp-1 has no users"
        );
        assert!(err.is_validation());
        assert_eq!(err.cluster(), Some("test1"));
    }

    #[test]
    fn test_validation_without_cluster_has_no_context() {
        let err = Error::validation("bad input");
        assert_eq!(err.cluster(), None);
        assert!(err.to_string().contains(UNKNOWN_CONTEXT));
    }

    #[test]
    fn test_validation_for_field_keeps_field() {
        let err = Error::validation_for_field("c", "spec.users", "empty");
        match err {
            Error::Validation { field, .. } => assert_eq!(field.as_deref(), Some("spec.users")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_environment_error_display() {
        let err = Error::environment("HOST_ENDPOINT", "value contains NUL");
        assert_eq!(
            err.to_string(),
            "unable to set HOST_ENDPOINT: value contains NUL"
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn test_template_error_converts() {
        let err: Error = TemplateError::Undefined("clusterName".to_string()).into();
        assert!(err.to_string().contains("clusterName"));
    }

    #[test]
    fn test_provider_error_has_cluster() {
        let err = Error::provider_for("c1", "error generating cluster api spec contents");
        assert_eq!(err.cluster(), Some("c1"));
    }
}
