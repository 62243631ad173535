//! Scoped, reference-counted entry into an execution context
//!
//! A [`ContextScope`] resolves a context, adds itself as a holder, and binds
//! the context to the calling thread. Dropping the scope unbinds, releases,
//! and disposes the context when it was the last holder. Drop runs on every
//! exit path, including unwinding.

use crate::binding;
use crate::context::{Engine, ExecutionContext};
use crate::error::{ContextError, Result};
use crate::source::ContextSource;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Guard holding one reference to an execution context bound to this thread
///
/// Not `Clone`: each successful construction releases exactly once.
/// Not `Send`: the unbind must run on the thread that performed the bind.
#[must_use = "the context is released as soon as the scope is dropped"]
pub struct ContextScope<E: Engine> {
    context: Arc<ExecutionContext<E>>,
    _thread_bound: PhantomData<*const ()>,
}

impl<E: Engine> ContextScope<E> {
    /// Enter the context resolved from `source`
    ///
    /// With no source, or a source that resolves to nothing, the context
    /// already bound to this thread is used. Fails without side effects when
    /// no context can be found, when the thread is bound to a different
    /// context, or when the context has been disposed.
    pub fn enter(source: Option<&dyn ContextSource<E>>) -> Result<Self> {
        let context = source
            .and_then(|s| s.resolve_context())
            .or_else(binding::ambient::<E>)
            .ok_or(ContextError::NoContext)?;

        binding::check_enter(context.id())?;
        let count = context.add_ref()?;
        if let Err(e) = binding::enter(&context) {
            // Undo the reference taken above.
            if let Err(release_err) = context.release_and_dispose() {
                error!(
                    "Failed to roll back reference on context {}: {}",
                    context.id(),
                    release_err
                );
            }
            return Err(e);
        }

        debug!(
            "Entered scope for context {} (refs {}, depth {})",
            context.id(),
            count,
            binding::binding_depth()
        );

        Ok(Self {
            context,
            _thread_bound: PhantomData,
        })
    }

    /// The context this scope holds
    pub fn context(&self) -> &Arc<ExecutionContext<E>> {
        &self.context
    }

    /// Run `f` against the engine of the held context
    ///
    /// The scope's own reference stays counted while `f` runs, so scopes
    /// opened and dropped inside `f` never bring the count to zero.
    pub fn with_engine<R>(&self, f: impl FnOnce(&E) -> R) -> Result<R> {
        self.context.with_engine(f)
    }
}

impl<E: Engine> Drop for ContextScope<E> {
    fn drop(&mut self) {
        let id = self.context.id();

        if let Err(e) = binding::exit(id) {
            error!("Scope exit for context {} out of order: {}", id, e);
        }

        match self.context.release() {
            Ok(0) => {
                if let Err(e) = self.context.dispose() {
                    warn!("Disposing context {} failed: {}", id, e);
                }
            }
            Ok(remaining) => {
                debug!("Left scope for context {} (refs {})", id, remaining);
            }
            Err(e) if e.is_protocol_violation() => {
                error!("Scope release for context {} out of balance: {}", id, e);
            }
            Err(e) => {
                warn!("Scope release for context {} failed: {}", id, e);
            }
        }
    }
}

impl<E: Engine> std::fmt::Debug for ContextScope<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextScope")
            .field("context", &self.context)
            .finish()
    }
}
