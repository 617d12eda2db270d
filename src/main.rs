//! n8n-migrate CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use n8n_migrate::cli::commands::{analyze, list, migrate};
use n8n_migrate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate(args) => migrate::handle_migrate(args, cli.json).await,
        Commands::Analyze(args) => analyze::handle_analyze(args, cli.json).await,
        Commands::List(args) => list::handle_list(args, cli.json).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
