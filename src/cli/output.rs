//! Terminal output formatting for CLI commands.
//!
//! Formatted tables via comfy-table with color-coded outcome cells;
//! colors drop out automatically when stdout is not a terminal.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::domain::models::report::{
    MigrationReport, PatchOutcome, Severity, UploadOutcome, VerificationResult,
    WorkflowUploadResult,
};
use crate::infrastructure::api::types::RemoteWorkflow;
use crate::services::analyzer::Analysis;

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

/// Section header, e.g. `== Upload ==`.
pub fn print_header(title: &str) {
    println!("\n{}", style(format!("== {title} ==")).bold());
}

/// Render the analysis summary: batch size, order, cycles, and missing
/// targets.
pub fn print_analysis(analysis: &Analysis) {
    print_header("Dependency analysis");
    let stats = analysis.graph.stats();
    println!(
        "{} workflows, {} reference edges ({} references)",
        stats.node_count, stats.edge_count, stats.reference_count
    );
    println!("Upload order: {}", analysis.order.join(" -> "));

    if !analysis.cycles.is_empty() {
        println!(
            "{} {}",
            style("Cycles detected:").yellow().bold(),
            analysis
                .cycles
                .iter()
                .map(|c| format!("{{{}}}", c.join(" -> ")))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    for missing in &analysis.missing_targets {
        println!(
            "{} '{}' references a workflow outside the batch (hint: {}, id: {})",
            style("Missing target:").yellow(),
            missing.workflow,
            missing.hint.as_deref().unwrap_or("-"),
            missing.old_id.as_deref().unwrap_or("-"),
        );
    }
}

/// Render per-workflow upload outcomes as a table.
pub fn print_outcomes(outcomes: &[WorkflowUploadResult]) {
    let mut table = base_table();
    table.set_header(vec![
        header_cell("Workflow"),
        header_cell("Outcome"),
        header_cell("New id"),
        header_cell("Patch"),
    ]);

    for result in outcomes {
        let (outcome, color, new_id) = match &result.outcome {
            UploadOutcome::Created { new_id } => ("created", Color::Green, new_id.as_str()),
            UploadOutcome::SkippedExisting { existing_id } => {
                ("skipped (exists)", Color::Cyan, existing_id.as_str())
            }
            UploadOutcome::Failed { reason } => ("failed", Color::Red, reason.as_str()),
            UploadOutcome::DryRun => ("dry run", Color::Yellow, "-"),
        };
        let patch = match &result.patch {
            Some(PatchOutcome::Patched) => "patched",
            Some(PatchOutcome::PatchFailed { .. }) => "failed",
            None => "-",
        };
        table.add_row(vec![
            Cell::new(&result.name),
            Cell::new(outcome).fg(color),
            Cell::new(new_id),
            Cell::new(patch),
        ]);
    }

    println!("{table}");
}

/// Render the verification checks and their issues.
pub fn print_verification(verification: &VerificationResult) {
    print_header("Verification");
    for check in &verification.checks {
        let marker = if check.passed {
            style("ok").green()
        } else {
            style("FAILED").red().bold()
        };
        println!("  {:<24} {marker}", check.name);
        for issue in &check.issues {
            println!(
                "    - [{}] {}{}",
                match issue.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                },
                issue
                    .workflow
                    .as_deref()
                    .map(|w| format!("{w}: "))
                    .unwrap_or_default(),
                issue.detail
            );
        }
    }
    println!("{}", verification.summary);
}

/// One-line run summary after the report is complete.
pub fn print_summary(report: &MigrationReport) {
    let stats = &report.upload.statistics;
    println!(
        "\n{} attempted, {} created, {} skipped, {} failed in {} ms",
        stats.attempted, stats.succeeded, stats.skipped, stats.failed, report.duration_ms
    );
}

/// Render the target's workflow list.
pub fn print_remote_workflows(workflows: &[RemoteWorkflow]) {
    let mut table = base_table();
    table.set_header(vec![
        header_cell("Id"),
        header_cell("Name"),
        header_cell("Active"),
    ]);
    for workflow in workflows {
        table.add_row(vec![
            Cell::new(&workflow.id),
            Cell::new(&workflow.name),
            Cell::new(if workflow.active { "yes" } else { "no" }),
        ]);
    }
    println!("{table}");
}
