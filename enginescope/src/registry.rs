//! Registry mapping compiled scripts to the context they were compiled in
//!
//! Every registered script holds one counted reference on its context, so a
//! context shared by several scripts survives until the last of them is
//! unregistered and no scope is still open on it.

use crate::context::{Engine, ExecutionContext};
use crate::error::{ContextError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

static NEXT_SCRIPT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a compiled script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(u64);

impl ScriptId {
    /// Allocate a fresh, process-unique script id
    pub fn next() -> Self {
        Self(NEXT_SCRIPT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script-{}", self.0)
    }
}

/// Concurrent map from script identity to its originating context
pub struct ContextRegistry<E: Engine> {
    entries: DashMap<ScriptId, Arc<ExecutionContext<E>>>,
}

impl<E: Engine> ContextRegistry<E> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record that `script` belongs to `context`, taking a reference on it
    pub fn register(&self, script: ScriptId, context: &Arc<ExecutionContext<E>>) -> Result<()> {
        match self.entries.entry(script) {
            Entry::Occupied(_) => Err(ContextError::DuplicateScript(script)),
            Entry::Vacant(slot) => {
                let count = context.add_ref()?;
                slot.insert(Arc::clone(context));
                debug!(
                    "Registered {} with context {} (refs {})",
                    script,
                    context.id(),
                    count
                );
                Ok(())
            }
        }
    }

    /// The context `script` was compiled in
    pub fn resolve_context(&self, script: ScriptId) -> Option<Arc<ExecutionContext<E>>> {
        self.entries.get(&script).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `script` is registered
    pub fn contains(&self, script: ScriptId) -> bool {
        self.entries.contains_key(&script)
    }

    /// Forget `script` and drop its reference, disposing the context when it
    /// was the last holder. Returns the remaining count, or `None` when the
    /// script was not registered.
    pub fn unregister(&self, script: ScriptId) -> Result<Option<usize>> {
        self.unregister_with(script, |_| ())
    }

    /// Like [`unregister`](Self::unregister), running `cleanup` on the engine
    /// first
    ///
    /// `cleanup` runs while the script's reference is still counted, so the
    /// context stays live for it. The calling thread is not bound, which lets
    /// a script be dropped while a different context is entered.
    pub fn unregister_with(
        &self,
        script: ScriptId,
        cleanup: impl FnOnce(&E),
    ) -> Result<Option<usize>> {
        let Some((_, context)) = self.entries.remove(&script) else {
            return Ok(None);
        };
        let cleaned = context.with_engine(cleanup);
        let remaining = context.release_and_dispose()?;
        if let Err(e) = cleaned {
            warn!(
                "Cleanup of {} in context {} failed: {}",
                script,
                context.id(),
                e
            );
        }
        debug!(
            "Unregistered {} from context {} (refs {})",
            script,
            context.id(),
            remaining
        );
        Ok(Some(remaining))
    }

    /// Number of registered scripts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no scripts are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Engine> Default for ContextRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> fmt::Debug for ContextRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("scripts", &self.entries.len())
            .finish()
    }
}
