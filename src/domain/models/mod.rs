//! Domain models for the migration engine.

pub mod config;
pub mod graph;
pub mod report;
pub mod workflow;

pub use config::{Credentials, MigrationConfig, TargetConfig, UpdateMethod, WorkflowFilter};
pub use graph::{GraphEdge, GraphStats, TopoResult, WorkflowGraph};
pub use report::{
    GraphReport, MappingRecord, MigrationReport, MissingTarget, PatchOutcome, Severity,
    UploadOutcome, UploadReport, UploadStatistics, VerificationCheck, VerificationIssue,
    VerificationResult, WorkflowUploadResult,
};
pub use workflow::{is_workflow_reference_node, references_in_nodes, Workflow, WorkflowReference};
