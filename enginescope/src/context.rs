//! Shared execution contexts and their reference counts
//!
//! An [`ExecutionContext`] wraps one heavyweight [`Engine`]. The context keeps
//! a count of its holders next to the engine; the holder whose release brings
//! the count to zero is responsible for disposing it.

use crate::error::{ContextError, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, trace, warn};

/// High bit of the state word. Set together with the count dropping to zero.
const DISPOSED: usize = 1 << (usize::BITS - 1);
const COUNT_MASK: usize = !DISPOSED;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of an execution context within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A heavyweight script runtime that can be shared between threads
///
/// Implementations serialize access to their own internal state; the scope
/// protocol only guarantees the engine outlives every holder.
pub trait Engine: Send + Sync + 'static {
    /// Error reported when tearing down native resources fails
    type Error: std::error::Error + Send + Sync + 'static;

    /// Release every native resource held by the engine
    fn dispose(self) -> std::result::Result<(), Self::Error>;
}

/// A reference-counted execution context
///
/// The count tracks live holders (scopes and registry entries), not Rust
/// references; the `Arc` around the context only keeps the memory alive.
pub struct ExecutionContext<E: Engine> {
    id: ContextId,
    state: AtomicUsize,
    engine: RwLock<Option<E>>,
}

impl<E: Engine> ExecutionContext<E> {
    /// Wrap an engine in a new context with a reference count of zero
    pub fn new(engine: E) -> Arc<Self> {
        let id = ContextId::next();
        debug!("Created execution context {}", id);
        Arc::new(Self {
            id,
            state: AtomicUsize::new(0),
            engine: RwLock::new(Some(engine)),
        })
    }

    /// Identity of this context
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Current number of holders
    pub fn ref_count(&self) -> usize {
        self.state.load(Ordering::Acquire) & COUNT_MASK
    }

    /// Whether the count has reached zero and the context is retired
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) & DISPOSED != 0
    }

    /// Atomically add a holder, returning the new count
    ///
    /// Fails once the context has been disposed; a retired context is never
    /// revived.
    pub fn add_ref(&self) -> Result<usize> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & DISPOSED != 0 {
                return Err(ContextError::Disposed(self.id));
            }
            let next = current + 1;
            if next & DISPOSED != 0 {
                return Err(ContextError::RefCountOverflow(self.id));
            }
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    trace!("Context {} add_ref -> {}", self.id, next);
                    return Ok(next);
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically remove a holder, returning the remaining count
    ///
    /// The transition from one to zero also marks the context disposed in the
    /// same atomic step, so exactly one caller ever observes zero. That caller
    /// must then tear the engine down.
    pub fn release(&self) -> Result<usize> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & DISPOSED != 0 {
                return Err(ContextError::Disposed(self.id));
            }
            if current == 0 {
                return Err(ContextError::ReleaseUnderflow(self.id));
            }
            let next = if current == 1 { DISPOSED } else { current - 1 };
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let remaining = next & COUNT_MASK;
                    trace!("Context {} release -> {}", self.id, remaining);
                    return Ok(remaining);
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Run `f` against the live engine
    ///
    /// Concurrent callers share a read lock; the engine serializes its own work.
    /// Callers must hold a counted reference for the duration of `f`, otherwise
    /// a release inside `f` could reach zero and wait on this same lock.
    pub(crate) fn with_engine<R>(&self, f: impl FnOnce(&E) -> R) -> Result<R> {
        let guard = self
            .engine
            .read()
            .map_err(|e| ContextError::Lock(e.to_string()))?;
        match guard.as_ref() {
            Some(engine) if !self.is_disposed() => Ok(f(engine)),
            _ => Err(ContextError::Disposed(self.id)),
        }
    }

    /// Tear down the engine after the count reached zero
    ///
    /// The context stays disposed even when the engine reports a failure.
    pub(crate) fn dispose(&self) -> Result<()> {
        debug_assert!(self.is_disposed(), "dispose before count reached zero");
        let engine = self
            .engine
            .write()
            .map_err(|e| ContextError::Lock(e.to_string()))?
            .take();

        match engine {
            Some(engine) => {
                info!("Disposing execution context {}", self.id);
                engine
                    .dispose()
                    .map_err(|e| ContextError::dispose(self.id, e))
            }
            None => Ok(()),
        }
    }

    /// Release a holder and dispose when it was the last one
    pub(crate) fn release_and_dispose(&self) -> Result<usize> {
        let remaining = self.release()?;
        if remaining == 0 {
            self.dispose()?;
        }
        Ok(remaining)
    }
}

impl<E: Engine> fmt::Debug for ExecutionContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("ref_count", &self.ref_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<E: Engine> Drop for ExecutionContext<E> {
    fn drop(&mut self) {
        // Contexts that were never shared still own their engine here.
        let engine = match self.engine.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(engine) = engine {
            debug!("Disposing unshared execution context {} on drop", self.id);
            if let Err(e) = engine.dispose() {
                warn!("Failed to dispose execution context {}: {}", self.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(Debug, thiserror::Error)]
    #[error("engine teardown failed")]
    struct TeardownError;

    struct CountingEngine {
        disposals: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Engine for CountingEngine {
        type Error = TeardownError;

        fn dispose(self) -> std::result::Result<(), TeardownError> {
            self.disposals.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TeardownError)
            } else {
                Ok(())
            }
        }
    }

    fn context(fail: bool) -> (Arc<ExecutionContext<CountingEngine>>, Arc<AtomicUsize>) {
        let disposals = Arc::new(AtomicUsize::new(0));
        let ctx = ExecutionContext::new(CountingEngine {
            disposals: Arc::clone(&disposals),
            fail,
        });
        (ctx, disposals)
    }

    #[test]
    fn test_new_context_starts_live_with_zero_count() {
        let (ctx, _) = context(false);
        assert_eq!(ctx.ref_count(), 0);
        assert!(!ctx.is_disposed());
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = context(false);
        let (b, _) = context(false);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_add_ref_and_release_track_count() {
        let (ctx, disposals) = context(false);
        assert_eq!(ctx.add_ref().unwrap(), 1);
        assert_eq!(ctx.add_ref().unwrap(), 2);
        assert_eq!(ctx.release().unwrap(), 1);
        assert!(!ctx.is_disposed());
        assert_eq!(ctx.release().unwrap(), 0);
        assert!(ctx.is_disposed());
        // release only marks; the caller disposes
        assert_eq!(disposals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disposed_context_cannot_be_revived() {
        let (ctx, _) = context(false);
        ctx.add_ref().unwrap();
        ctx.release().unwrap();

        assert!(matches!(ctx.add_ref(), Err(ContextError::Disposed(_))));
        assert!(matches!(ctx.release(), Err(ContextError::Disposed(_))));
        assert_eq!(ctx.ref_count(), 0);
    }

    #[test]
    fn test_release_underflow() {
        let (ctx, _) = context(false);
        assert!(matches!(
            ctx.release(),
            Err(ContextError::ReleaseUnderflow(_))
        ));
        assert!(!ctx.is_disposed());
    }

    #[test]
    fn test_release_and_dispose_runs_engine_teardown_once() {
        let (ctx, disposals) = context(false);
        ctx.add_ref().unwrap();
        ctx.add_ref().unwrap();

        assert_eq!(ctx.release_and_dispose().unwrap(), 1);
        assert_eq!(disposals.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.release_and_dispose().unwrap(), 0);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);

        drop(ctx);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_failure_still_retires_context() {
        let (ctx, disposals) = context(true);
        ctx.add_ref().unwrap();

        let err = ctx.release_and_dispose().unwrap_err();
        assert!(matches!(err, ContextError::Dispose { .. }));
        assert!(ctx.is_disposed());
        assert_eq!(ctx.ref_count(), 0);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        assert!(matches!(ctx.with_engine(|_| ()), Err(ContextError::Disposed(_))));
    }

    #[test]
    fn test_with_engine_on_live_context() {
        let (ctx, _) = context(false);
        let seen = AtomicBool::new(false);
        ctx.with_engine(|_| seen.store(true, Ordering::SeqCst))
            .unwrap();
        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unshared_context_disposes_on_drop() {
        let (ctx, disposals) = context(false);
        drop(ctx);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_add_ref_release_balances() {
        let (ctx, disposals) = context(false);
        // Keep one holder so the count never reaches zero mid-test
        ctx.add_ref().unwrap();

        std::thread::scope(|s| {
            for _ in 0..8 {
                let ctx = &ctx;
                s.spawn(move || {
                    for _ in 0..1000 {
                        ctx.add_ref().unwrap();
                        ctx.release().unwrap();
                    }
                });
            }
        });

        assert_eq!(ctx.ref_count(), 1);
        assert_eq!(ctx.release_and_dispose().unwrap(), 0);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_display_id() {
        assert_eq!(ContextId::from_raw(42).to_string(), "ctx-42");
        assert_eq!(ContextId::from_raw(42).as_u64(), 42);
    }
}
