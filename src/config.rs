//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::objects::{json_pointer_indexer, namespace_indexer, NAMESPACE_INDEX};
use crate::store::Indexers;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Items to reserve room for up front
    #[serde(default)]
    pub initial_capacity: usize,

    /// Register the built-in namespace index
    #[serde(default = "default_namespace_index")]
    pub namespace_index: bool,

    /// Additional indexers over JSON pointers
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
}

fn default_namespace_index() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            namespace_index: default_namespace_index(),
            indexers: Vec::new(),
        }
    }
}

/// One JSON pointer indexer
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    pub name: String,
    /// RFC 6901 pointer, e.g. `/metadata/labels/app`
    pub pointer: String,
}

impl StoreConfig {
    /// Build the indexer set this configuration describes
    pub fn build_indexers(&self) -> Result<Indexers<Value>, ConfigError> {
        let mut indexers = Indexers::new();

        if self.namespace_index {
            indexers.insert(NAMESPACE_INDEX.to_string(), namespace_indexer());
        }

        for entry in &self.indexers {
            if entry.name.is_empty() {
                return Err(ConfigError::InvalidIndexer {
                    name: entry.name.clone(),
                    reason: "name must not be empty".to_string(),
                });
            }
            if !entry.pointer.starts_with('/') {
                return Err(ConfigError::InvalidIndexer {
                    name: entry.name.clone(),
                    reason: format!("pointer {:?} must start with '/'", entry.pointer),
                });
            }
            if indexers.contains_key(&entry.name) {
                return Err(ConfigError::DuplicateIndexer(entry.name.clone()));
            }

            indexers.insert(entry.name.clone(), json_pointer_indexer(entry.pointer.as_str()));
        }

        Ok(indexers)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> ConfigSource {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("mirrorstore").join("config.toml")),
            Some(PathBuf::from("/etc/mirrorstore/config.toml")),
            Some(PathBuf::from("./mirrorstore.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// First of `paths` that exists and loads, else defaults with env overrides
    ///
    /// Files that exist but fail to load are kept in [`ConfigSource::skipped`].
    pub fn load_first(paths: &[PathBuf]) -> ConfigSource {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return ConfigSource {
                        config,
                        path: Some(path.clone()),
                        skipped,
                    };
                }
                Err(e) => skipped.push(e),
            }
        }

        ConfigSource {
            config: Self::from_env(),
            path: None,
            skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(capacity) = std::env::var("MIRRORSTORE_INITIAL_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.store.initial_capacity = c;
            }
        }

        if let Ok(level) = std::env::var("MIRRORSTORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("MIRRORSTORE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// A loaded config and where it came from
#[derive(Debug)]
pub struct ConfigSource {
    pub config: Config,
    /// File the config was read from, `None` for defaults
    pub path: Option<PathBuf>,
    /// Config files that exist but could not be loaded
    pub skipped: Vec<ConfigError>,
}

impl ConfigSource {
    /// Config read from an explicitly named file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            config: Config::load_with_env(path)?,
            path: Some(path.to_path_buf()),
            skipped: Vec::new(),
        })
    }

    /// Log the outcome; call after the subscriber is installed
    pub fn report(&self) {
        for error in &self.skipped {
            tracing::warn!("Ignoring config file: {}", error);
        }
        match &self.path {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid indexer {name:?}: {reason}")]
    InvalidIndexer { name: String, reason: String },

    #[error("Indexer {0:?} is defined more than once")]
    DuplicateIndexer(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Mirrorstore Configuration
#
# Environment variables override these settings:
# - MIRRORSTORE_INITIAL_CAPACITY
# - MIRRORSTORE_LOG_LEVEL
# - MIRRORSTORE_LOG_FORMAT

[store]
# Items to reserve room for up front
initial_capacity = 0

# File objects under their metadata.namespace in the "namespace" index
namespace_index = true

# Additional indexers over JSON pointers into each object
# [[store.indexers]]
# name = "app"
# pointer = "/metadata/labels/app"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/mirrorstore/mirrorstore.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexFunc;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();

        assert_eq!(config.store.initial_capacity, 0);
        assert!(config.store.namespace_index);
        assert!(config.store.indexers.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[store]
initial_capacity = 512
namespace_index = false

[[store.indexers]]
name = "app"
pointer = "/metadata/labels/app"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.store.initial_capacity, 512);
        assert!(!config.store.namespace_index);
        assert_eq!(config.store.indexers.len(), 1);
        assert_eq!(config.store.indexers[0].name, "app");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/mirrorstore.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[store\ninitial_capacity = ").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_first_skips_broken_file() {
        let mut broken = NamedTempFile::new().unwrap();
        writeln!(broken, "[store\ninitial_capacity = ").unwrap();
        let mut good = NamedTempFile::new().unwrap();
        writeln!(good, "[store]\nnamespace_index = false").unwrap();

        let paths = vec![
            PathBuf::from("/nonexistent/mirrorstore.toml"),
            broken.path().to_path_buf(),
            good.path().to_path_buf(),
        ];
        let source = Config::load_first(&paths);

        assert_eq!(source.path.as_deref(), Some(good.path()));
        assert!(!source.config.store.namespace_index);
        assert_eq!(source.skipped.len(), 1);
        assert!(matches!(
            &source.skipped[0],
            ConfigError::Parse { path, .. } if path == broken.path()
        ));
    }

    #[test]
    fn test_load_first_falls_back_to_defaults() {
        let mut broken = NamedTempFile::new().unwrap();
        writeln!(broken, "[store\ninitial_capacity = ").unwrap();

        let source = Config::load_first(&[broken.path().to_path_buf()]);

        assert!(source.path.is_none());
        assert!(source.config.store.namespace_index);
        assert_eq!(source.skipped.len(), 1);
    }

    #[test]
    fn test_build_indexers() {
        let config = StoreConfig {
            indexers: vec![IndexerConfig {
                name: "app".to_string(),
                pointer: "/metadata/labels/app".to_string(),
            }],
            ..Default::default()
        };

        let indexers = config.build_indexers().unwrap();
        assert_eq!(indexers.len(), 2);

        let obj = json!({"metadata": {"name": "web", "namespace": "prod", "labels": {"app": "web"}}});
        assert_eq!(indexers["app"].values(&obj).unwrap(), vec!["web"]);
        assert_eq!(indexers[NAMESPACE_INDEX].values(&obj).unwrap(), vec!["prod"]);
    }

    #[test]
    fn test_build_indexers_rejects_bad_entries() {
        let bad_pointer = StoreConfig {
            indexers: vec![IndexerConfig {
                name: "app".to_string(),
                pointer: "metadata.labels.app".to_string(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            bad_pointer.build_indexers(),
            Err(ConfigError::InvalidIndexer { .. })
        ));

        let empty_pointer = StoreConfig {
            indexers: vec![IndexerConfig {
                name: "whole".to_string(),
                pointer: String::new(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            empty_pointer.build_indexers(),
            Err(ConfigError::InvalidIndexer { .. })
        ));

        let clashes_with_builtin = StoreConfig {
            indexers: vec![IndexerConfig {
                name: NAMESPACE_INDEX.to_string(),
                pointer: "/metadata/namespace".to_string(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            clashes_with_builtin.build_indexers(),
            Err(ConfigError::DuplicateIndexer(_))
        ));
    }
}
