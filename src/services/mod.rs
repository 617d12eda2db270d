//! Service layer: the five migration phases and their orchestrator.

pub mod analyzer;
pub mod id_mapper;
pub mod loader;
pub mod orchestrator;
pub mod reference_updater;
pub mod uploader;
pub mod verifier;

pub use analyzer::{Analysis, DependencyAnalyzer};
pub use id_mapper::{IdMapper, ResolutionSource};
pub use loader::{LoadStats, LoadedBatch, WorkflowLoader};
pub use orchestrator::{MigrationOrchestrator, PreparedMigration};
pub use reference_updater::{ReferenceUpdater, RewriteStats};
pub use uploader::{UploadOptions, UploadService};
pub use verifier::Verifier;
