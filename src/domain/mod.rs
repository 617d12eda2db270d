//! Domain layer: models, ports, and error types for the migration engine.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{AnalysisError, LoadError, MappingError, MigrationError, RewriteError};
