//! Compiled scripts and their link to a shared context

use crate::engine::QuickJsEngine;
use enginescope::{ContextRegistry, ContextSource, ExecutionContext, ScriptId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Role of a compiled script within its context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Creates the context and defines the helpers queries build on
    Prelude,
    /// Small script compiled into a prelude's context
    Query,
}

/// A script compiled into a shared execution context
///
/// The script's registry entry holds one reference on the context; dropping
/// the script removes the entry, and the last script to go disposes the
/// context once no scope is open on it.
pub struct CompiledScript {
    id: ScriptId,
    name: String,
    kind: ScriptKind,
    registry: Arc<ContextRegistry<QuickJsEngine>>,
}

impl CompiledScript {
    pub(crate) fn new(
        id: ScriptId,
        name: impl Into<String>,
        kind: ScriptKind,
        registry: Arc<ContextRegistry<QuickJsEngine>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            registry,
        }
    }

    /// Identity of this script
    pub fn id(&self) -> ScriptId {
        self.id
    }

    /// Name the script was compiled under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a prelude or a query
    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    /// Key of the compiled function inside the engine
    pub(crate) fn function_key(&self) -> String {
        self.id.to_string()
    }
}

impl ContextSource<QuickJsEngine> for CompiledScript {
    fn resolve_context(&self) -> Option<Arc<ExecutionContext<QuickJsEngine>>> {
        self.registry.resolve_context(self.id)
    }
}

impl fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScript")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Drop for CompiledScript {
    fn drop(&mut self) {
        let is_query = self.kind == ScriptKind::Query;
        let key = self.function_key();
        let name = &self.name;

        // The query function goes while the registry entry still counts the
        // context, whichever context this thread has entered.
        let result = self.registry.unregister_with(self.id, |engine| {
            if !is_query {
                return;
            }
            if let Err(e) = engine.remove_query(&key) {
                warn!("Failed to remove query '{}': {}", name, e);
            }
        });

        match result {
            Ok(Some(remaining)) => {
                debug!("Dropped script '{}' ({} holders left)", name, remaining);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to unregister script '{}': {}", name, e),
        }
    }
}
