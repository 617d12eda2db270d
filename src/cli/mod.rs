//! CLI interface module: clap command definitions, handlers, and
//! terminal output formatting.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{AnalyzeArgs, Cli, Commands, ListArgs, MigrateArgs};
