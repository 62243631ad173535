//! Per-thread record of the entered execution context
//!
//! A thread is bound to at most one context. Entering the bound context again
//! nests; each exit undoes one entry.

use crate::context::{ContextId, Engine, ExecutionContext};
use crate::error::{ContextError, Result};
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::trace;

struct Binding {
    id: ContextId,
    context: Arc<dyn Any + Send + Sync>,
    depth: usize,
}

thread_local! {
    static CURRENT: RefCell<Option<Binding>> = const { RefCell::new(None) };
}

/// Identity of the context bound to the calling thread, if any
pub fn current_context_id() -> Option<ContextId> {
    CURRENT.with(|current| current.borrow().as_ref().map(|b| b.id))
}

/// Number of nested entries of the bound context on the calling thread
pub fn binding_depth() -> usize {
    CURRENT.with(|current| current.borrow().as_ref().map_or(0, |b| b.depth))
}

/// The bound context, if it is backed by engine type `E`
pub(crate) fn ambient<E: Engine>() -> Option<Arc<ExecutionContext<E>>> {
    let context = CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(|b| Arc::clone(&b.context))
    })?;
    context.downcast::<ExecutionContext<E>>().ok()
}

/// Check that `id` may be entered without changing anything
pub(crate) fn check_enter(id: ContextId) -> Result<()> {
    CURRENT.with(|current| match current.borrow().as_ref() {
        Some(binding) if binding.id != id => Err(ContextError::AffinityConflict {
            bound: binding.id,
            requested: id,
        }),
        _ => Ok(()),
    })
}

/// Bind `context` to the calling thread, or nest if it is already bound
pub(crate) fn enter<E: Engine>(context: &Arc<ExecutionContext<E>>) -> Result<usize> {
    let id = context.id();
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        match current.as_mut() {
            Some(binding) if binding.id == id => {
                binding.depth += 1;
                trace!("Re-entered context {} (depth {})", id, binding.depth);
                Ok(binding.depth)
            }
            Some(binding) => Err(ContextError::AffinityConflict {
                bound: binding.id,
                requested: id,
            }),
            None => {
                let erased: Arc<dyn Any + Send + Sync> = Arc::clone(context) as _;
                *current = Some(Binding {
                    id,
                    context: erased,
                    depth: 1,
                });
                trace!("Entered context {}", id);
                Ok(1)
            }
        }
    })
}

/// Undo one entry of `id`, returning the remaining depth
pub(crate) fn exit(id: ContextId) -> Result<usize> {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        match current.as_mut() {
            Some(binding) if binding.id == id => {
                binding.depth -= 1;
                let depth = binding.depth;
                if depth == 0 {
                    *current = None;
                    trace!("Exited context {}", id);
                } else {
                    trace!("Left nested context {} (depth {})", id, depth);
                }
                Ok(depth)
            }
            other => Err(ContextError::BindingMismatch {
                expected: id,
                found: other.map(|b| b.id),
            }),
        }
    })
}
