//! Migration configuration model.
//!
//! The engine receives a fully-resolved [`MigrationConfig`]; hierarchical
//! file/env merging and CLI flag mapping happen in the outer layers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default header carrying the API key.
pub const DEFAULT_API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// HTTP method used by the update pass. Defaults to PUT; older targets
/// only accept PATCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    #[default]
    Put,
    Patch,
}

/// Resolved credential shape for the target instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// API key sent as a request header.
    ApiKey { key: String },
    /// HTTP basic auth.
    Basic { username: String, password: String },
}

/// Connection settings for the target instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// REST base URL, e.g. `https://n8n.example.com/api/v1`.
    pub base_url: String,

    /// API key; mutually exclusive with username/password.
    pub api_key: Option<String>,

    /// Header name the API key is sent under.
    pub api_key_header: String,

    /// Basic auth username.
    pub username: Option<String>,

    /// Basic auth password.
    pub password: Option<String>,

    /// Per-request deadline in seconds.
    pub timeout_secs: u64,

    /// Client-side token bucket: requests per minute.
    pub rate_limit_per_minute: u32,

    /// Retry policy for transient transport failures.
    pub retry: RetryConfig,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
            rate_limit_per_minute: 100,
            retry: RetryConfig::default(),
        }
    }
}

impl TargetConfig {
    /// Resolve the credential shape. Exactly one of the two shapes must
    /// be complete; the config loader validates this before the engine
    /// runs, so `None` here means a misconfigured caller.
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(Credentials::ApiKey { key: key.clone() });
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(Credentials::Basic {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Exponential backoff settings for the HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Workflow selection filters applied by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowFilter {
    /// Keep workflows whose tag set includes this tag.
    pub tag: Option<String>,

    /// Keep workflows whose name matches this glob.
    pub name_glob: Option<String>,

    /// Keep workflows whose source id is in this list.
    pub ids: Vec<String>,
}

impl WorkflowFilter {
    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.name_glob.is_none() && self.ids.is_empty()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of: trace, debug, info, warn, error.
    pub level: String,
    /// One of: json, pretty.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Complete configuration for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Workflow file or directory to migrate.
    pub source_path: PathBuf,

    pub target: TargetConfig,

    /// Skip the update pass and verification; create-pass existence
    /// probes stay read-only.
    pub dry_run: bool,

    /// Reuse the target's workflow when one with the same name exists.
    pub skip_existing: bool,

    /// Abort the run on the first upload failure.
    pub stop_on_error: bool,

    /// Run post-migration verification.
    pub verify: bool,

    /// Persist the migration report file.
    pub save_report: bool,

    /// Treat unresolvable reference targets as fatal during analysis.
    pub strict: bool,

    /// Re-activate workflows that were active on the source.
    pub activate: bool,

    /// Append each workflow's source folder to its tag set on upload.
    pub folder_tags: bool,

    /// Proceed past cycle warnings without asking.
    pub assume_yes: bool,

    pub filter: WorkflowFilter,

    /// Pacing between create/update calls, in milliseconds.
    pub inter_request_delay_ms: u64,

    pub update_method: UpdateMethod,

    pub logging: LoggingConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::new(),
            target: TargetConfig::default(),
            dry_run: false,
            skip_existing: false,
            stop_on_error: false,
            verify: true,
            save_report: true,
            strict: false,
            activate: false,
            folder_tags: false,
            assume_yes: false,
            filter: WorkflowFilter::default(),
            inter_request_delay_ms: 500,
            update_method: UpdateMethod::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MigrationConfig {
    /// Copy of the config with secrets blanked, for the report snapshot
    /// and log output.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.target.api_key.is_some() {
            copy.target.api_key = Some("***".to_string());
        }
        if copy.target.password.is_some() {
            copy.target.password = Some("***".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::default();
        assert!(!config.dry_run);
        assert!(config.verify);
        assert!(config.save_report);
        assert_eq!(config.inter_request_delay_ms, 500);
        assert_eq!(config.update_method, UpdateMethod::Put);
        assert_eq!(config.target.timeout_secs, 30);
        assert_eq!(config.target.rate_limit_per_minute, 100);
        assert_eq!(config.target.api_key_header, DEFAULT_API_KEY_HEADER);
    }

    #[test]
    fn test_credentials_api_key_wins() {
        let target = TargetConfig {
            api_key: Some("secret".to_string()),
            username: Some("u".to_string()),
            password: Some("p".to_string()),
            ..Default::default()
        };
        assert_eq!(
            target.credentials(),
            Some(Credentials::ApiKey {
                key: "secret".to_string()
            })
        );
    }

    #[test]
    fn test_credentials_basic() {
        let target = TargetConfig {
            username: Some("u".to_string()),
            password: Some("p".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            target.credentials(),
            Some(Credentials::Basic { .. })
        ));
    }

    #[test]
    fn test_credentials_incomplete() {
        let target = TargetConfig {
            username: Some("u".to_string()),
            ..Default::default()
        };
        assert_eq!(target.credentials(), None);
        assert_eq!(TargetConfig::default().credentials(), None);
    }

    #[test]
    fn test_redacted_blanks_secrets() {
        let config = MigrationConfig {
            target: TargetConfig {
                api_key: Some("secret".to_string()),
                password: Some("hunter2".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let redacted = config.redacted();
        assert_eq!(redacted.target.api_key.as_deref(), Some("***"));
        assert_eq!(redacted.target.password.as_deref(), Some("***"));
    }

    #[test]
    fn test_update_method_serde() {
        let method: UpdateMethod = serde_json::from_str("\"patch\"").unwrap();
        assert_eq!(method, UpdateMethod::Patch);
        assert_eq!(serde_json::to_string(&UpdateMethod::Put).unwrap(), "\"put\"");
    }
}
