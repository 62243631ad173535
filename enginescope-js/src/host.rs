//! Script host compiling preludes and queries into shared contexts

use crate::engine::{ModuleTable, QuickJsEngine};
use crate::error::{JsError, Result};
use crate::script::{CompiledScript, ScriptKind};
use crate::JsScope;
use dashmap::DashMap;
use enginescope::{ContextRegistry, ExecutionContext, ScriptId};
use enginescope_config::{ConfigProvider, EngineConfig};
use std::sync::Arc;
use tracing::{debug, info};

/// Compiles and runs scripts, sharing one engine context per prelude
///
/// Every prelude gets a fresh QuickJS context. Queries compiled against the
/// prelude reuse that context, and any thread may run them concurrently.
pub struct JsHost {
    config: EngineConfig,
    registry: Arc<ContextRegistry<QuickJsEngine>>,
    modules: ModuleTable,
}

impl JsHost {
    /// Create a host whose contexts use `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: Arc::new(ContextRegistry::new()),
            modules: Arc::new(DashMap::new()),
        })
    }

    /// Create a host configured from `enginescope.toml` and the environment
    pub fn from_default_config() -> Result<Self> {
        Self::new(ConfigProvider::new().load()?)
    }

    /// Limits applied to each new context
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Make `source` available to preludes as `load_module(name)`
    pub fn register_module(&self, name: impl Into<String>, source: impl Into<String>) {
        let name = name.into();
        debug!("Registered module '{}'", name);
        self.modules.insert(name, source.into());
    }

    /// Create a new context and evaluate the prelude in it
    pub fn compile_prelude(&self, name: &str, source: &str) -> Result<CompiledScript> {
        let context = ExecutionContext::new(QuickJsEngine::new(&self.config)?);
        let scope = JsScope::enter(Some(&context))?;

        let modules = Arc::clone(&self.modules);
        scope.with_engine(|engine| engine.evaluate_prelude(name, source, modules))??;

        let id = ScriptId::next();
        self.registry.register(id, scope.context())?;
        info!(
            "Compiled prelude '{}' as {} in context {}",
            name,
            id,
            context.id()
        );

        Ok(CompiledScript::new(
            id,
            name,
            ScriptKind::Prelude,
            Arc::clone(&self.registry),
        ))
    }

    /// Compile a query body into the prelude's context
    ///
    /// The body runs as a function of one argument, `input`, and returns the
    /// query result.
    pub fn compile_query(
        &self,
        prelude: &CompiledScript,
        name: &str,
        source: &str,
    ) -> Result<CompiledScript> {
        let scope = JsScope::enter(Some(prelude))?;

        let id = ScriptId::next();
        let key = id.to_string();
        scope.with_engine(|engine| engine.compile_query(&key, name, source))??;

        self.registry.register(id, scope.context())?;
        debug!(
            "Compiled query '{}' as {} in context {}",
            name,
            id,
            scope.context().id()
        );

        Ok(CompiledScript::new(
            id,
            name,
            ScriptKind::Query,
            Arc::clone(&self.registry),
        ))
    }

    /// Run a compiled query with a JSON input
    pub fn run(
        &self,
        script: &CompiledScript,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        if script.kind() != ScriptKind::Query {
            return Err(JsError::NotAQuery {
                name: script.name().to_string(),
            });
        }

        let scope = JsScope::enter(Some(script))?;
        let key = script.function_key();
        scope.with_engine(|engine| engine.call_query(&key, script.name(), input))?
    }

    /// Evaluate an expression in the script's context
    pub fn evaluate(&self, script: &CompiledScript, expression: &str) -> Result<serde_json::Value> {
        let scope = JsScope::enter(Some(script))?;
        scope.with_engine(|engine| engine.evaluate(expression))?
    }

    /// Number of live compiled scripts
    pub fn script_count(&self) -> usize {
        self.registry.len()
    }

    /// The registry mapping scripts to their contexts
    pub fn registry(&self) -> &Arc<ContextRegistry<QuickJsEngine>> {
        &self.registry
    }
}

impl Default for JsHost {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: Arc::new(ContextRegistry::new()),
            modules: Arc::new(DashMap::new()),
        }
    }
}
