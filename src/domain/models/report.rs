//! Migration report: the persisted audit artifact of a run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::MigrationError;
use crate::domain::models::config::MigrationConfig;
use crate::domain::models::graph::{GraphEdge, GraphStats};

/// Per-workflow outcome of the create pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Created on the target; `new_id` assigned by the target.
    Created { new_id: String },
    /// A workflow with the same name already existed and was reused.
    SkippedExisting { existing_id: String },
    /// The create call failed.
    Failed { reason: String },
    /// Dry run: nothing was written.
    DryRun,
}

impl UploadOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Per-workflow outcome of the update (reference-rewrite) pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatchOutcome {
    Patched,
    PatchFailed { reason: String },
}

/// Everything that happened to one workflow during upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowUploadResult {
    pub name: String,
    pub old_id: Option<String>,
    pub outcome: UploadOutcome,
    /// Present only for workflows that reached the update pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<PatchOutcome>,
    /// Present only when the activation pass ran for this workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,
}

/// Aggregate upload counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatistics {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl UploadStatistics {
    pub fn from_outcomes(outcomes: &[WorkflowUploadResult]) -> Self {
        let mut stats = Self {
            attempted: outcomes.len(),
            ..Self::default()
        };
        for result in outcomes {
            match &result.outcome {
                UploadOutcome::Created { .. } => stats.succeeded += 1,
                UploadOutcome::SkippedExisting { .. } => stats.skipped += 1,
                UploadOutcome::Failed { .. } => stats.failed += 1,
                UploadOutcome::DryRun => {}
            }
        }
        stats
    }
}

/// One row of the serialized id mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub name: String,
    pub old_id: Option<String>,
    pub new_id: String,
}

/// Graph section of the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphReport {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
    /// Cycles detected during analysis, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<String>>,
    /// References whose target was not in the batch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_targets: Vec<MissingTarget>,
}

/// A reference that resolved to nothing during analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingTarget {
    pub workflow: String,
    pub hint: Option<String>,
    pub old_id: Option<String>,
}

/// Severity of a verification issue. Only errors fail a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationIssue {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    pub detail: String,
}

impl VerificationIssue {
    pub fn error(workflow: impl Into<Option<String>>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            workflow: workflow.into(),
            detail: detail.into(),
        }
    }

    pub fn warning(workflow: impl Into<Option<String>>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            workflow: workflow.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub name: String,
    pub passed: bool,
    pub issues: Vec<VerificationIssue>,
}

impl VerificationCheck {
    /// A check passes when none of its issues is an error.
    pub fn new(name: impl Into<String>, issues: Vec<VerificationIssue>) -> Self {
        let passed = issues.iter().all(|i| i.severity != Severity::Error);
        Self {
            name: name.into(),
            passed,
            issues,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub checks: Vec<VerificationCheck>,
    pub summary: String,
}

/// Upload section of the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadReport {
    pub outcomes: Vec<WorkflowUploadResult>,
    pub statistics: UploadStatistics,
}

/// The canonical audit artifact, written once at end-of-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Config snapshot with secrets redacted.
    pub config: MigrationConfig,
    pub duration_ms: u64,
    pub upload: UploadReport,
    pub mappings: Vec<MappingRecord>,
    pub graph: GraphReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
}

impl MigrationReport {
    /// File name of the persisted report, e.g.
    /// `migration-report-2024-07-01T12-30-05Z.json`.
    pub fn file_name(&self) -> String {
        format!(
            "migration-report-{}.json",
            self.timestamp.format("%Y-%m-%dT%H-%M-%SZ")
        )
    }

    /// Write the report into `dir` and return the full path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, MigrationError> {
        let path = dir.join(self.file_name());
        let body = serde_json::to_string_pretty(self).map_err(|e| MigrationError::ReportWrite {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        std::fs::write(&path, body).map_err(|e| MigrationError::ReportWrite {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        Ok(path)
    }
}
