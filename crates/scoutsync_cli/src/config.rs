//! Configuration file.
//!
//! A TOML file with `[registry]`, `[directory]` and `[sync]` sections.
//! Missing keys take their defaults; an unknown auth mode or a bad rewrite
//! pattern is rejected before any remote call is made.

use scoutsync_core::roster::DEFAULT_OTHER_MEMBERS_UNIT;
use scoutsync_core::{GroupBuilderConfig, RewriteRule, RosterConfig, DEFAULT_MANAGED_TAG};
use scoutsync_engine::{CreationRetry, ReconcileConfig, DEFAULT_PAGE_SIZE};
use scoutsync_registry::{RegistryConfig, DEFAULT_REGISTRY_ENDPOINT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "scoutsync.toml";

/// Errors loading or interpreting the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has wrongly typed values.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is present but unusable.
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// Dotted key.
        key: &'static str,
        /// What is wrong.
        message: String,
    },

    /// A required value is missing.
    #[error("missing required value {0}")]
    Missing(&'static str),

    /// The stored token file is absent or unreadable.
    #[error("token file {path}: {message}")]
    TokenFile {
        /// File path.
        path: PathBuf,
        /// What is wrong.
        message: String,
    },
}

/// How the directory client obtains access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// A stored refresh token from an installed-application consent.
    #[default]
    Installed,
    /// The metadata server of the VM the tool runs on.
    ComputeEngine,
}

/// `[registry]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// API base URL.
    pub endpoint: String,
    /// Group id.
    pub api_id: String,
    /// Key for mailing lists.
    pub api_key_groups: String,
    /// Key for the member list.
    pub api_key_users: String,
    /// Default list limit.
    pub limit: Option<usize>,
    /// Units whose members get accounts regardless of age.
    pub youth_units: Vec<String>,
    /// Unit excluded from the adult population.
    pub other_members_unit: String,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_REGISTRY_ENDPOINT.to_string(),
            api_id: String::new(),
            api_key_groups: String::new(),
            api_key_users: String::new(),
            limit: None,
            youth_units: Vec::new(),
            other_members_unit: DEFAULT_OTHER_MEMBERS_UNIT.to_string(),
        }
    }
}

/// `[directory]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectorySection {
    /// Token source.
    pub auth: AuthMode,
    /// Directory domain.
    pub domain: String,
    /// Page size for listings.
    pub max_results: u32,
    /// Refresh-token file for `installed` auth.
    pub token_file: Option<PathBuf>,
}

impl Default for DirectorySection {
    fn default() -> Self {
        Self {
            auth: AuthMode::default(),
            domain: String::new(),
            max_results: DEFAULT_PAGE_SIZE,
            token_file: None,
        }
    }
}

/// One `[[sync.rewrites]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RewriteEntry {
    /// Regex matched against the whole address.
    pub pattern: String,
    /// Replacement, `${1}` syntax.
    pub replacement: String,
}

/// `[sync]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Title suffix marking managed groups.
    pub managed_tag: String,
    /// Delayed re-fetches after creating a group.
    pub creation_retries: u32,
    /// Seconds to wait before each re-fetch.
    pub creation_retry_delay_secs: u64,
    /// Extra member rewrites, applied after the built-in ones.
    pub rewrites: Vec<RewriteEntry>,
}

impl Default for SyncSection {
    fn default() -> Self {
        let retry = CreationRetry::default();
        Self {
            managed_tag: DEFAULT_MANAGED_TAG.to_string(),
            creation_retries: retry.attempts,
            creation_retry_delay_secs: retry.delay.as_secs(),
            rewrites: Vec::new(),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Registry settings.
    pub registry: RegistrySection,
    /// Directory settings.
    pub directory: DirectorySection,
    /// Reconciliation settings.
    pub sync: SyncSection,
}

impl AppConfig {
    /// Loads and validates `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML text without validation.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Checks values that the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.managed_tag.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "sync.managed_tag",
                message: "must not be empty".into(),
            });
        }
        if self.directory.max_results == 0 {
            return Err(ConfigError::Invalid {
                key: "directory.max_results",
                message: "must be at least 1".into(),
            });
        }
        self.rewrites()?;
        Ok(())
    }

    /// The directory domain, required for any directory access.
    pub fn domain(&self) -> Result<&str, ConfigError> {
        match self.directory.domain.trim() {
            "" => Err(ConfigError::Missing("directory.domain")),
            domain => Ok(domain),
        }
    }

    fn rewrites(&self) -> Result<Vec<RewriteRule>, ConfigError> {
        self.sync
            .rewrites
            .iter()
            .map(|entry| {
                RewriteRule::new(&entry.pattern, entry.replacement.as_str()).map_err(|e| {
                    ConfigError::Invalid {
                        key: "sync.rewrites",
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    }

    /// Registry client settings.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new(self.registry.api_id.clone())
            .with_endpoint(self.registry.endpoint.clone())
            .with_lists_key(self.registry.api_key_groups.clone())
            .with_users_key(self.registry.api_key_users.clone())
    }

    /// Desired-state builder settings.
    pub fn builder_config(&self) -> Result<GroupBuilderConfig, ConfigError> {
        let defaults = GroupBuilderConfig::new(self.domain()?).map_err(|e| ConfigError::Invalid {
            key: "sync.rewrites",
            message: e.to_string(),
        })?;
        let mut rewrites = defaults.rewrites.clone();
        rewrites.extend(self.rewrites()?);
        Ok(defaults
            .with_managed_tag(self.sync.managed_tag.clone())
            .with_rewrites(rewrites))
    }

    /// Engine settings.
    pub fn reconcile_config(&self, dry_run: bool) -> ReconcileConfig {
        ReconcileConfig::new()
            .with_dry_run(dry_run)
            .with_managed_tag(self.sync.managed_tag.clone())
            .with_page_size(self.directory.max_results)
            .with_creation_retry(CreationRetry::new(
                self.sync.creation_retries,
                Duration::from_secs(self.sync.creation_retry_delay_secs),
            ))
    }

    /// Roster classification settings.
    pub fn roster_config(&self) -> RosterConfig {
        RosterConfig::default()
            .with_other_members_unit(self.registry.other_members_unit.clone())
            .with_youth_units(self.registry.youth_units.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutsync_testkit::TempFile;

    const FULL: &str = r#"
[registry]
endpoint = "https://registry.test/api"
api_id = "1234"
api_key_groups = "g"
api_key_users = "u"
limit = 3
youth_units = ["Utmanarna"]

[directory]
auth = "compute_engine"
domain = "example.com"
max_results = 50

[sync]
managed_tag = "[auto]"
creation_retries = 2
creation_retry_delay_secs = 5

[[sync.rewrites]]
pattern = '^(.+)@old\.org$'
replacement = '${1}@new.org'
"#;

    #[test]
    fn loads_full_file() {
        let file = TempFile::with_contents("scoutsync.toml", FULL);
        let config = AppConfig::load(file.path()).unwrap();

        assert_eq!(config.registry.limit, Some(3));
        assert_eq!(config.directory.auth, AuthMode::ComputeEngine);
        assert_eq!(config.domain().unwrap(), "example.com");

        let reconcile = config.reconcile_config(true);
        assert!(reconcile.dry_run);
        assert_eq!(reconcile.managed_tag, "[auto]");
        assert_eq!(reconcile.page_size, 50);
        assert_eq!(reconcile.creation_retry, CreationRetry::new(2, Duration::from_secs(5)));

        let builder = config.builder_config().unwrap();
        assert_eq!(builder.managed_tag, "[auto]");
        // Built-in googlemail rule first, then the configured one.
        assert_eq!(builder.rewrites.len(), 2);
        assert_eq!(builder.rewrites[1].replacement(), "${1}@new.org");

        let roster = config.roster_config();
        assert_eq!(roster.youth_units, vec!["Utmanarna"]);
        assert_eq!(roster.other_members_unit, DEFAULT_OTHER_MEMBERS_UNIT);
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let config = AppConfig::parse("[directory]\ndomain = \"d.org\"\n").unwrap();
        config.validate().unwrap();

        assert_eq!(config.registry.endpoint, DEFAULT_REGISTRY_ENDPOINT);
        assert_eq!(config.directory.auth, AuthMode::Installed);
        assert_eq!(config.directory.max_results, DEFAULT_PAGE_SIZE);
        assert_eq!(config.sync.managed_tag, DEFAULT_MANAGED_TAG);
        assert_eq!(config.sync.creation_retries, 1);
        assert_eq!(config.sync.creation_retry_delay_secs, 10);
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        let file = TempFile::with_contents("bad.toml", "[directory]\nauth = \"standalone\"\n");
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn bad_rewrite_is_rejected() {
        let text = "[[sync.rewrites]]\npattern = \"(\"\nreplacement = \"x\"\n";
        let config = AppConfig::parse(text).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "sync.rewrites", .. })
        ));
    }

    #[test]
    fn empty_tag_and_missing_domain() {
        let config = AppConfig::parse("[sync]\nmanaged_tag = \" \"\n").unwrap();
        assert!(config.validate().is_err());
        assert!(matches!(
            AppConfig::default().domain(),
            Err(ConfigError::Missing("directory.domain"))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let file = TempFile::missing("scoutsync.toml");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("scoutsync.toml"));
    }
}
