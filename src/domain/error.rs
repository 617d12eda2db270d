//! Domain error types for the migration engine.
//!
//! Each enum covers one phase of the pipeline. Transport-level errors live in
//! [`crate::infrastructure::api::ApiError`]; the orchestrator folds everything
//! into [`MigrationError`] at the top.

use std::path::PathBuf;

use thiserror::Error;

use crate::infrastructure::api::ApiError;

/// Errors raised while loading workflow files from disk (Phase 1).
///
/// Every variant is fatal to the run: a batch with unreadable or
/// malformed members is not migrated partially.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The source path does not exist or is not a file/directory
    #[error("Source path not found: {0}")]
    FileNotFound(PathBuf),

    /// A workflow file could not be parsed as JSON
    #[error("Failed to parse {path}: {detail}")]
    ParseError { path: PathBuf, detail: String },

    /// A workflow file is missing a required field or has the wrong shape
    #[error("Invalid workflow document {path}: missing or invalid field '{field}'")]
    SchemaError { path: PathBuf, field: String },

    /// Two workflow files in the batch share the same name
    #[error("Duplicate workflow name '{name}' in {}", format_paths(.paths))]
    DuplicateName { name: String, paths: Vec<PathBuf> },

    /// An I/O error while reading a workflow file
    #[error("I/O error reading {path}: {detail}")]
    Io { path: PathBuf, detail: String },

    /// The name filter is not a valid glob pattern
    #[error("Invalid name filter '{pattern}': {detail}")]
    InvalidFilter { pattern: String, detail: String },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by the dependency analyzer (Phase 2).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A reference target could not be resolved and strict mode is on
    #[error(
        "Workflow '{workflow}' references a target that is not in the batch \
         (hint: {hint:?}, id: {old_id:?})"
    )]
    MissingTarget {
        workflow: String,
        hint: Option<String>,
        old_id: Option<String>,
    },

    /// Internal invariant violation; never expected
    #[error("Dependency analysis internal error: {0}")]
    Internal(String),
}

/// Errors raised by the id mapper (Phase 4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// A name or old id was recorded twice with different new ids
    #[error("Conflicting mapping for '{key}': already mapped to {existing}, attempted {attempted}")]
    DuplicateMapping {
        key: String,
        existing: String,
        attempted: String,
    },
}

/// Errors raised by the reference updater (Phase 5).
///
/// Broken references are not errors; they are recorded in the rewrite
/// statistics and surface later as verification findings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The node tree is deeper than the recursion ceiling; malformed input
    #[error("Workflow '{workflow}' exceeds the maximum document depth of {max_depth}")]
    DepthExceeded { workflow: String, max_depth: usize },
}

/// Top-level error for a migration run.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// An upload failed and `stop_on_error` is set
    #[error("Upload of '{workflow}' failed, aborting run: {reason}")]
    Aborted { workflow: String, reason: String },

    /// The run was cancelled between workflows
    #[error("Migration cancelled")]
    Cancelled,

    /// The report file could not be written
    #[error("Failed to write migration report to {path}: {detail}")]
    ReportWrite { path: PathBuf, detail: String },
}

impl MigrationError {
    /// Returns true when the whole run must stop, as opposed to a
    /// per-workflow failure the upload loop can carry past.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Api(api) => api.is_auth(),
            Self::Load(_)
            | Self::Analysis(_)
            | Self::Mapping(_)
            | Self::Rewrite(_)
            | Self::Aborted { .. }
            | Self::Cancelled
            | Self::ReportWrite { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_duplicate_name_display() {
        let err = LoadError::DuplicateName {
            name: "Order Sync".to_string(),
            paths: vec![PathBuf::from("a/flow.json"), PathBuf::from("b/flow.json")],
        };
        assert_eq!(
            err.to_string(),
            "Duplicate workflow name 'Order Sync' in a/flow.json, b/flow.json"
        );
    }

    #[test]
    fn test_load_error_schema_display() {
        let err = LoadError::SchemaError {
            path: PathBuf::from("wf.json"),
            field: "name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid workflow document wf.json: missing or invalid field 'name'"
        );
    }

    #[test]
    fn test_mapping_error_display() {
        let err = MappingError::DuplicateMapping {
            key: "Order Sync".to_string(),
            existing: "abc".to_string(),
            attempted: "def".to_string(),
        };
        assert!(err.to_string().contains("already mapped to abc"));
    }

    #[test]
    fn test_migration_error_fatality() {
        let err = MigrationError::Cancelled;
        assert!(err.is_fatal());

        let err = MigrationError::Api(ApiError::AuthFailed);
        assert!(err.is_fatal());

        let err = MigrationError::Api(ApiError::Network("reset".to_string()));
        assert!(!err.is_fatal());
    }
}
