//! Engine configuration for enginescope using Figment
//!
//! Resource limits for script engine contexts are loaded from defaults, an
//! optional `enginescope.toml`, and `ENGINESCOPE_`-prefixed environment
//! variables, in that order of precedence.
//!
//! ```toml
//! memory_limit = 33554432
//! max_stack_size = 524288
//! gc_threshold = 1048576
//! ```
//!
//! ```no_run
//! use enginescope_config::load_configuration;
//!
//! let config = load_configuration()?;
//! println!("heap limit: {} bytes", config.memory_limit);
//! # Ok::<(), enginescope_config::ConfigError>(())
//! ```

mod error;
mod provider;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use provider::{ConfigProvider, DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use types::{EngineConfig, DEFAULT_GC_THRESHOLD, DEFAULT_MAX_STACK_SIZE, DEFAULT_MEMORY_LIMIT};

/// Load the engine configuration from all default sources
pub fn load_configuration() -> ConfigResult<EngineConfig> {
    ConfigProvider::new().load()
}
