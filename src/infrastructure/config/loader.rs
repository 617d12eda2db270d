//! Hierarchical configuration loading for migration runs.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::MigrationConfig;

/// Configuration error types. All fatal before any phase runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("source_path is required")]
    MissingSourcePath,

    #[error("target.base_url is required")]
    MissingBaseUrl,

    #[error("target credentials are incomplete: set api_key or username/password")]
    IncompleteCredentials,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid rate limit: {0}. Must be at least 1 request per minute")]
    InvalidRateLimit(u32),

    #[error("Invalid timeout: {0}. Must be at least 1 second")]
    InvalidTimeout(u64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .n8n-migrate/config.yaml (project config)
    /// 3. .n8n-migrate/local.yaml (local overrides, optional)
    /// 4. Environment variables (N8N_MIGRATE_* prefix)
    ///
    /// CLI flags are applied on top by the CLI layer; validation runs
    /// after that, once the config is final.
    pub fn load() -> Result<MigrationConfig> {
        let config: MigrationConfig = Figment::new()
            .merge(Serialized::defaults(MigrationConfig::default()))
            .merge(Yaml::file(".n8n-migrate/config.yaml"))
            .merge(Yaml::file(".n8n-migrate/local.yaml"))
            .merge(Env::prefixed("N8N_MIGRATE_").split("__"))
            .extract()
            .context("Failed to extract configuration")?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<MigrationConfig> {
        let config: MigrationConfig = Figment::new()
            .merge(Serialized::defaults(MigrationConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;
        Ok(config)
    }

    /// Validate the parts every subcommand relies on.
    pub fn validate(config: &MigrationConfig) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.target.rate_limit_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(
                config.target.rate_limit_per_minute,
            ));
        }

        if config.target.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.target.timeout_secs));
        }

        if config.target.retry.initial_backoff_ms >= config.target.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.target.retry.initial_backoff_ms,
                config.target.retry.max_backoff_ms,
            ));
        }

        Ok(())
    }

    /// Validate everything a migration run needs: the base checks plus
    /// source path, target URL, and a complete credential shape.
    pub fn validate_for_migration(config: &MigrationConfig) -> Result<(), ConfigError> {
        Self::validate(config)?;

        if config.source_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingSourcePath);
        }

        Self::validate_target(config)
    }

    /// Validate target connectivity settings only (used by `list`).
    pub fn validate_target(config: &MigrationConfig) -> Result<(), ConfigError> {
        if config.target.base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        if config.target.credentials().is_none() {
            return Err(ConfigError::IncompleteCredentials);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::TargetConfig;
    use figment::providers::Serialized;

    fn migratable_config() -> MigrationConfig {
        MigrationConfig {
            source_path: "flows".into(),
            target: TargetConfig {
                base_url: "https://n8n.example.com/api/v1".to_string(),
                api_key: Some("key".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_passes_base_validation() {
        let config = MigrationConfig::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn test_default_config_fails_migration_validation() {
        let result = ConfigLoader::validate_for_migration(&MigrationConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingSourcePath)));
    }

    #[test]
    fn test_complete_config_passes() {
        ConfigLoader::validate_for_migration(&migratable_config()).unwrap();
    }

    #[test]
    fn test_missing_base_url() {
        let mut config = migratable_config();
        config.target.base_url = String::new();
        assert!(matches!(
            ConfigLoader::validate_for_migration(&config),
            Err(ConfigError::MissingBaseUrl)
        ));
    }

    #[test]
    fn test_incomplete_credentials() {
        let mut config = migratable_config();
        config.target.api_key = None;
        config.target.username = Some("admin".to_string());
        assert!(matches!(
            ConfigLoader::validate_for_migration(&config),
            Err(ConfigError::IncompleteCredentials)
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = migratable_config();
        config.logging.level = "loud".to_string();
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
            other => panic!("expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = migratable_config();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_zero_rate_limit() {
        let mut config = migratable_config();
        config.target.rate_limit_per_minute = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(0))
        ));
    }

    #[test]
    fn test_invalid_backoff() {
        let mut config = migratable_config();
        config.target.retry.initial_backoff_ms = 60_000;
        config.target.retry.max_backoff_ms = 1_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(60_000, 1_000))
        ));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
source_path: flows
dry_run: true
inter_request_delay_ms: 250
target:
  base_url: https://n8n.example.com/api/v1
  api_key: secret
  rate_limit_per_minute: 30
logging:
  level: debug
";
        let config: MigrationConfig = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert!(config.dry_run);
        assert_eq!(config.inter_request_delay_ms, 250);
        assert_eq!(config.target.rate_limit_per_minute, 30);
        assert_eq!(config.logging.level, "debug");
        // Unset fields keep their defaults.
        assert!(config.verify);
        ConfigLoader::validate_for_migration(&config).unwrap();
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "dry_run: true\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "logging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: MigrationConfig = Figment::new()
            .merge(Serialized::defaults(MigrationConfig::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert!(config.dry_run, "base value should persist");
        assert_eq!(config.logging.level, "debug", "override should win");
        assert_eq!(
            config.logging.format, "json",
            "base value should persist when not overridden"
        );
    }
}
