//! Engine configuration values

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Default heap limit for one engine context (16 MB)
pub const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Default native stack limit (512 KB)
pub const DEFAULT_MAX_STACK_SIZE: usize = 512 * 1024;

/// Default allocation volume between garbage collections (1 MB)
pub const DEFAULT_GC_THRESHOLD: usize = 1024 * 1024;

/// Resource limits applied to every engine context a host creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum heap size in bytes
    pub memory_limit: usize,
    /// Maximum native stack size in bytes
    pub max_stack_size: usize,
    /// Bytes allocated between garbage collection runs
    pub gc_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Override the heap limit
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Override the stack limit
    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = bytes;
        self
    }

    /// Override the GC threshold
    pub fn with_gc_threshold(mut self, bytes: usize) -> Self {
        self.gc_threshold = bytes;
        self
    }

    /// Check that the limits are usable together
    pub fn validate(&self) -> ConfigResult<()> {
        if self.memory_limit == 0 {
            return Err(ConfigError::invalid_value(
                "memory_limit",
                "must be greater than zero",
            ));
        }
        if self.max_stack_size == 0 {
            return Err(ConfigError::invalid_value(
                "max_stack_size",
                "must be greater than zero",
            ));
        }
        if self.max_stack_size >= self.memory_limit {
            return Err(ConfigError::invalid_value(
                "max_stack_size",
                format!(
                    "{} must be below memory_limit ({})",
                    self.max_stack_size, self.memory_limit
                ),
            ));
        }
        if self.gc_threshold == 0 || self.gc_threshold > self.memory_limit {
            return Err(ConfigError::invalid_value(
                "gc_threshold",
                format!("must be between 1 and memory_limit ({})", self.memory_limit),
            ));
        }
        Ok(())
    }
}
