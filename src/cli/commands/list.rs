//! `list` command: enumerate workflows on the target instance.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::output;
use crate::cli::types::ListArgs;
use crate::domain::ports::WorkflowApi;
use crate::infrastructure::api::N8nApiClient;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging;

pub async fn handle_list(args: ListArgs, json: bool) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    args.target.apply_to(&mut config);
    args.logging.apply_to(&mut config);
    ConfigLoader::validate(&config)?;
    ConfigLoader::validate_target(&config)?;
    logging::init(&config.logging)?;

    let client: Arc<dyn WorkflowApi> = Arc::new(
        N8nApiClient::new(&config.target, config.update_method)
            .context("Failed to build API client")?,
    );

    let workflows = client.list_workflows().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
    } else {
        output::print_remote_workflows(&workflows);
        println!("{} workflows on target", workflows.len());
    }

    Ok(ExitCode::SUCCESS)
}
