//! CLI type definitions.
//!
//! Clap command structures mapping long flags onto the migration
//! configuration. Credentials can come from here, from the config file
//! hierarchy, or from `N8N_MIGRATE_*` environment variables.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::models::config::{MigrationConfig, UpdateMethod};

#[derive(Parser)]
#[command(name = "n8n-migrate")]
#[command(about = "Migrate n8n workflows between instances without breaking references", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate a workflow batch to the target instance
    Migrate(MigrateArgs),

    /// Load and analyze a workflow batch without touching any target
    Analyze(AnalyzeArgs),

    /// List workflows on the target instance (credentials smoke test)
    List(ListArgs),
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Workflow file or directory to migrate
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Validate and plan only; no create or update calls
    #[arg(long)]
    pub dry_run: bool,

    /// Reuse target workflows that already carry a batch name
    #[arg(long)]
    pub skip_existing: bool,

    /// Abort the run on the first upload failure
    #[arg(long)]
    pub stop_on_error: bool,

    /// Skip post-migration verification
    #[arg(long)]
    pub no_verify: bool,

    /// Do not persist the migration report file
    #[arg(long)]
    pub no_report: bool,

    /// Treat references without a target in the batch as fatal
    #[arg(long)]
    pub strict: bool,

    /// Re-activate workflows that were active on the source
    #[arg(long)]
    pub activate: bool,

    /// Tag each uploaded workflow with its source folder
    #[arg(long)]
    pub folder_tags: bool,

    /// Only migrate workflows carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only migrate workflows whose name matches this glob
    #[arg(short, long)]
    pub name: Option<String>,

    /// Only migrate workflows with these source ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Pacing between create/update calls, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Use PATCH instead of PUT for the update pass
    #[arg(long)]
    pub patch: bool,

    /// Answer yes to confirmation prompts (cycle warnings)
    #[arg(short = 'y', long)]
    pub yes: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Load configuration from a specific file instead of the
    /// .n8n-migrate/ hierarchy
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Workflow file or directory to analyze
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Treat references without a target in the batch as fatal
    #[arg(long)]
    pub strict: bool,

    /// Only analyze workflows carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only analyze workflows whose name matches this glob
    #[arg(short, long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Load configuration from a specific file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Load configuration from a specific file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Target connection flags shared by `migrate` and `list`.
#[derive(Args)]
pub struct TargetArgs {
    /// Target REST base URL, e.g. https://n8n.example.com/api/v1
    #[arg(short, long)]
    pub url: Option<String>,

    /// API key for the target instance
    #[arg(long)]
    pub api_key: Option<String>,

    /// Basic auth username
    #[arg(long)]
    pub username: Option<String>,

    /// Basic auth password
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct LoggingArgs {
    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format: json, pretty
    #[arg(long)]
    pub log_format: Option<String>,
}

impl TargetArgs {
    pub fn apply_to(&self, config: &mut MigrationConfig) {
        if let Some(url) = &self.url {
            config.target.base_url = url.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.target.api_key = Some(api_key.clone());
        }
        if let Some(username) = &self.username {
            config.target.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.target.password = Some(password.clone());
        }
    }
}

impl LoggingArgs {
    pub fn apply_to(&self, config: &mut MigrationConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
    }
}

impl MigrateArgs {
    /// Overlay the flags onto a loaded configuration. Flags win over
    /// config files and environment.
    pub fn apply_to(&self, config: &mut MigrationConfig) {
        if let Some(source) = &self.source {
            config.source_path = source.clone();
        }
        self.target.apply_to(config);
        self.logging.apply_to(config);

        if self.dry_run {
            config.dry_run = true;
        }
        if self.skip_existing {
            config.skip_existing = true;
        }
        if self.stop_on_error {
            config.stop_on_error = true;
        }
        if self.no_verify {
            config.verify = false;
        }
        if self.no_report {
            config.save_report = false;
        }
        if self.strict {
            config.strict = true;
        }
        if self.activate {
            config.activate = true;
        }
        if self.folder_tags {
            config.folder_tags = true;
        }
        if self.yes {
            config.assume_yes = true;
        }
        if self.patch {
            config.update_method = UpdateMethod::Patch;
        }
        if let Some(tag) = &self.tag {
            config.filter.tag = Some(tag.clone());
        }
        if let Some(name) = &self.name {
            config.filter.name_glob = Some(name.clone());
        }
        if !self.ids.is_empty() {
            config.filter.ids = self.ids.clone();
        }
        if let Some(delay_ms) = self.delay_ms {
            config.inter_request_delay_ms = delay_ms;
        }
    }
}

impl AnalyzeArgs {
    pub fn apply_to(&self, config: &mut MigrationConfig) {
        if let Some(source) = &self.source {
            config.source_path = source.clone();
        }
        self.logging.apply_to(config);
        if self.strict {
            config.strict = true;
        }
        if let Some(tag) = &self.tag {
            config.filter.tag = Some(tag.clone());
        }
        if let Some(name) = &self.name {
            config.filter.name_glob = Some(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_migrate_flags_map_onto_config() {
        let cli = Cli::parse_from([
            "n8n-migrate",
            "migrate",
            "--source",
            "flows",
            "--url",
            "https://n8n.example.com/api/v1",
            "--api-key",
            "k",
            "--dry-run",
            "--skip-existing",
            "--no-verify",
            "--tag",
            "prod",
            "--delay-ms",
            "100",
            "--patch",
        ]);

        let Commands::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        let mut config = MigrationConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.source_path, PathBuf::from("flows"));
        assert_eq!(config.target.base_url, "https://n8n.example.com/api/v1");
        assert!(config.dry_run);
        assert!(config.skip_existing);
        assert!(!config.verify);
        assert_eq!(config.filter.tag.as_deref(), Some("prod"));
        assert_eq!(config.inter_request_delay_ms, 100);
        assert_eq!(config.update_method, UpdateMethod::Patch);
    }

    #[test]
    fn test_unset_flags_leave_config_untouched() {
        let cli = Cli::parse_from(["n8n-migrate", "migrate", "--source", "flows"]);
        let Commands::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        let mut config = MigrationConfig {
            inter_request_delay_ms: 750,
            ..Default::default()
        };
        args.apply_to(&mut config);

        assert!(config.verify);
        assert_eq!(config.inter_request_delay_ms, 750);
        assert_eq!(config.update_method, UpdateMethod::Put);
    }
}
