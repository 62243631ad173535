//! Configuration provider using Figment

use crate::{types::EngineConfig, ConfigResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// File name looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "enginescope.toml";

/// Prefix for environment variable overrides, e.g. `ENGINESCOPE_MEMORY_LIMIT`
pub const ENV_PREFIX: &str = "ENGINESCOPE_";

/// Loads [`EngineConfig`] from all sources
///
/// Sources are merged in precedence order (later sources override earlier ones):
/// 1. Default values
/// 2. The TOML configuration file, if it exists
/// 3. Environment variables with the `ENGINESCOPE_` prefix
pub struct ConfigProvider {
    config_file: PathBuf,
}

impl ConfigProvider {
    /// Create a provider reading `enginescope.toml` from the working directory
    pub fn new() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Create a provider reading the given configuration file
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_file: path.into(),
        }
    }

    /// The configuration file this provider reads
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Load and validate the engine configuration
    pub fn load(&self) -> ConfigResult<EngineConfig> {
        let config: EngineConfig = self.build_figment().extract()?;
        config.validate()?;
        debug!("Loaded engine configuration: {:?}", config);
        Ok(config)
    }

    /// Build the figment configuration with all sources in precedence order
    fn build_figment(&self) -> Figment {
        trace!(
            "Building engine configuration from {}",
            self.config_file.display()
        );
        Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(&self.config_file))
            .merge(Env::prefixed(ENV_PREFIX))
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}
