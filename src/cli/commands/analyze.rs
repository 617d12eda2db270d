//! `analyze` command: phases 1 and 2 only, no target required.

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::output;
use crate::cli::types::AnalyzeArgs;
use crate::domain::models::report::GraphReport;
use crate::infrastructure::config::{ConfigError, ConfigLoader};
use crate::infrastructure::logging;
use crate::services::analyzer::DependencyAnalyzer;
use crate::services::loader::WorkflowLoader;

pub async fn handle_analyze(args: AnalyzeArgs, json: bool) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    args.apply_to(&mut config);
    ConfigLoader::validate(&config)?;
    if config.source_path.as_os_str().is_empty() {
        return Err(ConfigError::MissingSourcePath.into());
    }
    logging::init(&config.logging)?;

    let batch = WorkflowLoader::new().load(&config.source_path, &config.filter)?;
    let analysis = DependencyAnalyzer::new(config.strict).analyze(&batch.workflows)?;

    if json {
        let report = GraphReport {
            nodes: analysis.graph.names().to_vec(),
            edges: analysis.graph.edges(),
            stats: analysis.graph.stats(),
            cycles: analysis.cycles.clone(),
            missing_targets: analysis.missing_targets.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_analysis(&analysis);
    }

    Ok(ExitCode::SUCCESS)
}
