//! Resolution of the context a scope binds to

use crate::context::{Engine, ExecutionContext};
use std::sync::Arc;

/// Something that knows which execution context it belongs to
///
/// Returning `None` asks the scope to fall back to the context already bound
/// on the calling thread.
pub trait ContextSource<E: Engine> {
    /// The context this source was created in, if known
    fn resolve_context(&self) -> Option<Arc<ExecutionContext<E>>>;
}

impl<E: Engine> ContextSource<E> for Arc<ExecutionContext<E>> {
    fn resolve_context(&self) -> Option<Arc<ExecutionContext<E>>> {
        Some(Arc::clone(self))
    }
}
