//! Error types for the QuickJS script host

use enginescope::ContextError;
use enginescope_config::ConfigError;
use thiserror::Error;

/// Result type alias for JS operations
pub type Result<T> = std::result::Result<T, JsError>;

/// Errors that can occur while compiling or running scripts
#[derive(Debug, Error)]
pub enum JsError {
    /// Script failed to compile
    #[error("JavaScript compilation error in '{name}': {message}")]
    Compilation { name: String, message: String },

    /// JavaScript evaluation error
    #[error("JavaScript evaluation error: {message}")]
    Evaluation { message: String },

    /// Type conversion error between Rust and JS
    #[error("Type conversion error: {message}")]
    TypeConversion { message: String },

    /// Runtime initialization or teardown error
    #[error("Runtime error: {message}")]
    Runtime { message: String },

    /// The script is not compiled in its context
    #[error("Script not found: {name}")]
    ScriptNotFound { name: String },

    /// A prelude was passed where a query script is required
    #[error("Script '{name}' is a prelude and cannot be run directly")]
    NotAQuery { name: String },

    /// Engine configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The context scope protocol rejected the operation
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl JsError {
    /// Create a compilation error
    pub fn compilation(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Compilation {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create an evaluation error
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation {
            message: msg.into(),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: msg.into(),
        }
    }

    /// Create a runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime {
            message: msg.into(),
        }
    }
}

impl From<ConfigError> for JsError {
    fn from(error: ConfigError) -> Self {
        Self::Config {
            message: error.to_string(),
        }
    }
}

impl From<rquickjs::Error> for JsError {
    fn from(error: rquickjs::Error) -> Self {
        Self::runtime(error.to_string())
    }
}
