//! Configuration Loader
//!
//! Environment-aware layered loading: `default.toml`, then `<environment>.toml`
//! when present, then `DICOM_OPS__SECTION__KEY` environment variables.

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::OperationsConfig;

const ENV_PREFIX: &str = "DICOM_OPS";
const CONFIG_DIR_VAR: &str = "DICOM_OPS_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<OperationsConfig> {
        Self::load_from_directory(Self::default_config_directory())
    }

    pub fn load_from_directory(config_dir: impl AsRef<Path>) -> ConfigResult<OperationsConfig> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: impl AsRef<Path>,
        environment: &str,
    ) -> ConfigResult<OperationsConfig> {
        let config_dir = config_dir.as_ref();
        if !config_dir.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound {
                path: config_dir.to_path_buf(),
            });
        }

        debug!(
            environment = %environment,
            config_dir = %config_dir.display(),
            "Loading operations configuration"
        );

        let load_failed = |error: config::ConfigError| ConfigurationError::LoadFailed {
            environment: environment.to_string(),
            error: error.to_string(),
        };

        let config: OperationsConfig = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{environment}.toml"))).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(load_failed)?
            .try_deserialize()
            .map_err(load_failed)?;

        config.validate()?;

        debug!(
            batch_size = config.batching.batch_size,
            max_parallel_batches = config.batching.max_parallel_batches,
            thread_count = config.batching.thread_count,
            max_retries = config.retry.max_retries,
            schema_version = config.store.schema_version,
            "Operations configuration loaded"
        );

        Ok(config)
    }

    /// Current environment from `DICOM_OPS_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("DICOM_OPS_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var(CONFIG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
