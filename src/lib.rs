//! n8n-migrate - workflow migration engine for n8n instances
//!
//! Moves a batch of n8n workflows from exported files on disk to a target
//! instance while guaranteeing that every cross-workflow reference still
//! resolves after the move:
//! - Dependency-ordered upload (referenced workflows are created first)
//! - Name-first identifier remapping across instances
//! - Recursive reference rewriting inside node trees
//! - Post-migration integrity verification against the live target

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::models::config::MigrationConfig;
pub use domain::models::report::MigrationReport;
pub use services::orchestrator::MigrationOrchestrator;
