use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ABORT_GRACE_TIMEOUT_SECS, DEFAULT_MAXIMUM_NUMBER_OF_TASKS, DEFAULT_SKIP_PATHS, MAX_DEFAULT_WORKERS,
};
use crate::storage::FlushPolicy;

fn default_maximum_number_of_tasks() -> usize {
    DEFAULT_MAXIMUM_NUMBER_OF_TASKS
}

fn default_abort_grace_timeout_secs() -> u64 {
    DEFAULT_ABORT_GRACE_TIMEOUT_SECS
}

fn default_expand_archives() -> bool {
    true
}

fn default_skip_paths() -> Vec<String> {
    DEFAULT_SKIP_PATHS.iter().map(|p| p.to_string()).collect()
}

/// Tunables of an extraction run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on tasks queued or dispatched at any instant
    #[serde(default = "default_maximum_number_of_tasks")]
    pub maximum_number_of_tasks: usize,

    /// Worker threads; CPU count capped at 8 when absent
    #[serde(default)]
    pub number_of_workers: Option<usize>,

    #[serde(default)]
    pub parser_filter_expression: Option<String>,

    /// Records between syncs; every record is synced when absent
    #[serde(default)]
    pub flush_batch_size: Option<usize>,

    #[serde(default = "default_abort_grace_timeout_secs")]
    pub abort_grace_timeout_secs: u64,

    #[serde(default = "default_expand_archives")]
    pub expand_archives: bool,

    /// Hash files up to this size in the filestat parser
    #[serde(default)]
    pub filestat_hash_max_size_mb: Option<u64>,

    #[serde(default = "default_skip_paths")]
    pub skip_paths: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            maximum_number_of_tasks: default_maximum_number_of_tasks(),
            number_of_workers: None,
            parser_filter_expression: None,
            flush_batch_size: None,
            abort_grace_timeout_secs: default_abort_grace_timeout_secs(),
            expand_archives: default_expand_archives(),
            filestat_hash_max_size_mb: None,
            skip_paths: default_skip_paths(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: EngineConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        EngineConfig::default().save_to_yaml_file(path)
    }

    /// Load the given file, or the defaults when no path is provided
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Self::from_yaml_file(path)?,
            None => {
                debug!("No config path provided, using default configuration");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.maximum_number_of_tasks == 0 {
            bail!("maximum_number_of_tasks must be at least 1");
        }
        if self.number_of_workers == Some(0) {
            bail!("number_of_workers must be at least 1");
        }
        if self.flush_batch_size == Some(0) {
            bail!("flush_batch_size must be at least 1");
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.number_of_workers
            .unwrap_or_else(|| std::cmp::min(num_cpus::get(), MAX_DEFAULT_WORKERS))
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        match self.flush_batch_size {
            Some(batch_size) => FlushPolicy::Batched(batch_size),
            None => FlushPolicy::EveryContainer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.yaml");

        let config = EngineConfig {
            maximum_number_of_tasks: 4,
            number_of_workers: Some(2),
            parser_filter_expression: Some("macos,!filestat".to_string()),
            flush_batch_size: Some(50),
            ..EngineConfig::default()
        };
        config.save_to_yaml_file(&path).unwrap();

        let loaded = EngineConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.worker_count(), 2);
        assert_eq!(loaded.flush_policy(), FlushPolicy::Batched(50));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: EngineConfig = serde_yaml::from_str("maximum_number_of_tasks: 7\n").unwrap();
        assert_eq!(config.maximum_number_of_tasks, 7);
        assert_eq!(config.abort_grace_timeout_secs, DEFAULT_ABORT_GRACE_TIMEOUT_SECS);
        assert!(config.expand_archives);
        assert_eq!(config.flush_policy(), FlushPolicy::EveryContainer);
        assert!(config.worker_count() >= 1 && config.worker_count() <= MAX_DEFAULT_WORKERS);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_tasks = EngineConfig {
            maximum_number_of_tasks: 0,
            ..EngineConfig::default()
        };
        assert!(zero_tasks.validate().is_err());

        let zero_batch = EngineConfig {
            flush_batch_size: Some(0),
            ..EngineConfig::default()
        };
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.yaml");
        fs::write(&path, "maximum_number_of_tasks: [").unwrap();
        assert!(EngineConfig::from_yaml_file(&path).is_err());
        assert!(EngineConfig::load_or_default(Some(&temp_dir.path().join("missing.yaml"))).is_err());
    }
}
