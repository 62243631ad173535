//! QuickJS-backed engine for shared execution contexts
//!
//! One [`QuickJsEngine`] owns a QuickJS runtime and a single JS context. Query
//! scripts compiled against a prelude are stored as functions in a hidden
//! global table keyed by script id, so every script compiled in the context
//! sees the prelude's globals.

use crate::bridge;
use crate::error::{JsError, Result};
use crate::JsScope;
use dashmap::DashMap;
use enginescope::Engine;
use enginescope_config::EngineConfig;
use rquickjs::{
    CatchResultExt, CaughtError, Context, Ctx, Exception, Function, Object, Runtime, Value,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Global holding compiled query functions
pub(crate) const QUERIES_GLOBAL: &str = "__enginescope_queries";

/// Global native function the prelude uses to pull in registered modules
pub const LOAD_MODULE_GLOBAL: &str = "load_module";

/// Named module sources shared by every context of a host
pub(crate) type ModuleTable = Arc<DashMap<String, String>>;

/// A QuickJS runtime plus context
///
/// QuickJS serializes access through the runtime lock, so the engine can be
/// used from several threads at once.
pub struct QuickJsEngine {
    runtime: Runtime,
    context: Context,
}

impl QuickJsEngine {
    /// Create a runtime with the configured limits and a full context
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| JsError::runtime(format!("Failed to create JS runtime: {}", e)))?;
        runtime.set_memory_limit(config.memory_limit);
        runtime.set_max_stack_size(config.max_stack_size);
        runtime.set_gc_threshold(config.gc_threshold);

        let context = Context::full(&runtime)
            .map_err(|e| JsError::runtime(format!("Failed to create JS context: {}", e)))?;

        Ok(Self { runtime, context })
    }

    /// Drain all pending microtasks/Promise jobs from the runtime.
    fn drain_pending_jobs(&self) {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(false) => break,
                Ok(true) => continue,
                Err(e) => {
                    warn!("error executing pending JS job: {:?}", e);
                    break;
                }
            }
        }
    }

    /// Install the host globals and evaluate the prelude source
    pub(crate) fn evaluate_prelude(
        &self,
        name: &str,
        source: &str,
        modules: ModuleTable,
    ) -> Result<()> {
        let result = self.context.with(|ctx| -> Result<()> {
            let globals = ctx.globals();
            globals.set(QUERIES_GLOBAL, Object::new(ctx.clone())?)?;
            install_module_loader(&ctx, modules)?;

            ctx.eval::<(), _>(source.as_bytes())
                .catch(&ctx)
                .map_err(|e| JsError::compilation(name, describe_caught(e)))?;
            Ok(())
        });

        self.drain_pending_jobs();
        result
    }

    /// Compile a query body into a function stored under `key`
    pub(crate) fn compile_query(&self, key: &str, name: &str, source: &str) -> Result<()> {
        self.context.with(|ctx| -> Result<()> {
            let wrapped = format!("(function(input) {{\n{}\n}})", source);
            let function: Function = ctx
                .eval(wrapped)
                .catch(&ctx)
                .map_err(|e| JsError::compilation(name, describe_caught(e)))?;

            query_table(&ctx)?.set(key, function)?;
            trace!("Compiled query '{}' as {}", name, key);
            Ok(())
        })
    }

    /// Call the query stored under `key` with a JSON input
    pub(crate) fn call_query(
        &self,
        key: &str,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let result = self.context.with(|ctx| -> Result<serde_json::Value> {
            let function: Function = query_table(&ctx)?
                .get(key)
                .map_err(|_| JsError::ScriptNotFound {
                    name: name.to_string(),
                })?;
            let arg = bridge::json_to_js(&ctx, input)?;

            let output: Value = function
                .call((arg,))
                .catch(&ctx)
                .map_err(|e| JsError::evaluation(describe_caught(e)))?;

            bridge::js_to_json(&ctx, output)
        });

        self.drain_pending_jobs();
        result
    }

    /// Evaluate an expression in the context's global scope
    pub(crate) fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self.context.with(|ctx| -> Result<serde_json::Value> {
            let value: Value = ctx
                .eval(expression.as_bytes())
                .catch(&ctx)
                .map_err(|e| JsError::evaluation(describe_caught(e)))?;
            bridge::js_to_json(&ctx, value)
        });

        self.drain_pending_jobs();
        result
    }

    /// Drop the query stored under `key`
    pub(crate) fn remove_query(&self, key: &str) -> Result<()> {
        self.context.with(|ctx| -> Result<()> {
            query_table(&ctx)?.remove(key)?;
            Ok(())
        })
    }
}

impl Engine for QuickJsEngine {
    type Error = JsError;

    fn dispose(self) -> Result<()> {
        let pending = self.runtime.is_job_pending();
        let Self { runtime, context } = self;

        drop(context);
        runtime.run_gc();
        drop(runtime);
        debug!("QuickJS runtime released");

        if pending {
            return Err(JsError::runtime(
                "runtime disposed with pending jobs that were never run",
            ));
        }
        Ok(())
    }
}

fn query_table<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    ctx.globals()
        .get(QUERIES_GLOBAL)
        .map_err(|e| JsError::runtime(format!("Query table missing: {}", e)))
}

fn describe_caught(error: CaughtError<'_>) -> String {
    match error {
        CaughtError::Exception(ex) => format!("JS error: {}", ex),
        CaughtError::Value(v) => {
            let s: std::result::Result<String, _> = v.get();
            format!("JS threw: {}", s.unwrap_or_else(|_| "unknown".to_string()))
        }
        CaughtError::Error(e) => format!("Error: {}", e),
    }
}

fn install_module_loader<'js>(ctx: &Ctx<'js>, modules: ModuleTable) -> Result<()> {
    let loader = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, name: String| -> rquickjs::Result<Value<'js>> {
            load_module(&ctx, &modules, &name)
        },
    )?;
    ctx.globals().set(LOAD_MODULE_GLOBAL, loader)?;
    Ok(())
}

/// Native callback behind `load_module(name)`
///
/// The callback carries no script handle, so it enters whatever context the
/// calling scope bound to this thread.
fn load_module<'js>(
    ctx: &Ctx<'js>,
    modules: &DashMap<String, String>,
    name: &str,
) -> rquickjs::Result<Value<'js>> {
    let scope =
        JsScope::enter(None).map_err(|e| Exception::throw_message(ctx, &e.to_string()))?;

    let source = match modules.get(name) {
        Some(entry) => entry.value().clone(),
        None => {
            return Err(Exception::throw_message(
                ctx,
                &format!("Module not found: {}", name),
            ))
        }
    };

    debug!(
        "Loading module '{}' into context {}",
        name,
        scope.context().id()
    );
    ctx.eval(source)
}
