//! `migrate` command: run the full pipeline against a target instance.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, warn};

use crate::cli::output;
use crate::cli::types::MigrateArgs;
use crate::infrastructure::api::N8nApiClient;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging;
use crate::services::orchestrator::MigrationOrchestrator;

/// Exit code for a completed run whose verification (or upload) failed.
const EXIT_VERIFICATION_FAILED: u8 = 2;

pub async fn handle_migrate(args: MigrateArgs, json: bool) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    args.apply_to(&mut config);
    ConfigLoader::validate_for_migration(&config)?;
    logging::init(&config.logging)?;

    let client =
        N8nApiClient::new(&config.target, config.update_method).context("Failed to build API client")?;

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current workflow");
            cancel_signal.store(true, Ordering::Relaxed);
        }
    });

    let orchestrator = MigrationOrchestrator::new(config.clone(), Arc::new(client))
        .with_cancel(cancel);

    let prepared = orchestrator.prepare()?;
    if !json {
        output::print_analysis(&prepared.analysis);
    }

    if !prepared.analysis.cycles.is_empty()
        && !config.dry_run
        && !config.assume_yes
        && !confirm_cycle_upload()?
    {
        eprintln!("Aborted.");
        return Ok(ExitCode::FAILURE);
    }

    match orchestrator.run(prepared).await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_header("Upload");
                output::print_outcomes(&report.upload.outcomes);
                if let Some(verification) = &report.verification {
                    output::print_verification(verification);
                }
                output::print_summary(&report);
            }

            let verification_passed = report.verification.as_ref().is_none_or(|v| v.passed);
            let uploads_clean = report.upload.statistics.failed == 0;
            if verification_passed && uploads_clean {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_VERIFICATION_FAILED))
            }
        }
        Err(err) => {
            error!(error = %err, "migration failed");
            Err(err.into())
        }
    }
}

/// Interactive gate before uploading a batch with reference cycles.
fn confirm_cycle_upload() -> Result<bool> {
    eprint!(
        "Reference cycles detected; upload order within a cycle is best-effort. Continue? [y/N] "
    );
    let line = console::Term::stderr().read_line()?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
