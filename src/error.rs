//! Error types for the definition graph

use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, DocsError>;

/// Hard errors that abort a generation run.
///
/// Recoverable anomalies (dangling references, orphaned operations, malformed
/// extensions) never surface here; they are collected as
/// [`Diagnostics`](crate::graph::Diagnostics) instead.
#[derive(Error, Debug)]
pub enum DocsError {
    #[error("found multiple matching definitions [{first}, {second}] for operation {operation}")]
    BindingConflict {
        operation: String,
        first: String,
        second: String,
    },

    #[error("duplicate definition key {key} (from {first_source} and {second_source})")]
    DuplicateDefinition {
        key: String,
        first_source: String,
        second_source: String,
    },

    #[error("orphaned definitions found: {0:?}")]
    OrphanedDefinitions(Vec<String>),

    #[error("Invalid API document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_conflict_names_both_definitions() {
        let err = DocsError::BindingConflict {
            operation: "createAppsV1NamespacedDeployment".to_string(),
            first: "apps.v1.Deployment".to_string(),
            second: "extensions.v1beta1.Deployment".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("apps.v1.Deployment"));
        assert!(msg.contains("extensions.v1beta1.Deployment"));
        assert!(msg.contains("createAppsV1NamespacedDeployment"));
    }
}
