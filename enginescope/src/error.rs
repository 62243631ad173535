//! Error types for context scoping

use crate::context::ContextId;
use crate::registry::ScriptId;

/// Errors raised by the context scope protocol
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// No source was given and the thread has no ambient context
    #[error("No execution context is bound to the current thread")]
    NoContext,

    /// The thread is already bound to a different context
    #[error("Thread is bound to context {bound}, cannot enter context {requested}")]
    AffinityConflict {
        bound: ContextId,
        requested: ContextId,
    },

    /// Exit was requested for a context that is not the one bound
    #[error("Thread binding mismatch: expected {expected}, found {found:?}")]
    BindingMismatch {
        expected: ContextId,
        found: Option<ContextId>,
    },

    /// The context has already been disposed
    #[error("Execution context {0} has been disposed")]
    Disposed(ContextId),

    /// Release was called with no outstanding references
    #[error("Execution context {0} released with a reference count of zero")]
    ReleaseUnderflow(ContextId),

    /// Reference count would exceed its representable range
    #[error("Execution context {0} reference count overflow")]
    RefCountOverflow(ContextId),

    /// A script with this identity is already registered
    #[error("Script {0} is already registered")]
    DuplicateScript(ScriptId),

    /// The engine failed while releasing its native resources
    #[error("Failed to dispose execution context {id}: {source}")]
    Dispose {
        id: ContextId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to acquire the engine lock
    #[error("Lock error: {0}")]
    Lock(String),
}

impl ContextError {
    /// Create a dispose error from any engine error
    pub fn dispose(
        id: ContextId,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Dispose {
            id,
            source: source.into(),
        }
    }

    /// Whether this error indicates a misuse of the scope protocol by the caller
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::NoContext
                | Self::AffinityConflict { .. }
                | Self::BindingMismatch { .. }
                | Self::ReleaseUnderflow(_)
        )
    }
}

/// Result type for context operations
pub type Result<T> = std::result::Result<T, ContextError>;
