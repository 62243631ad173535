//! QuickJS script host sharing engine contexts through enginescope
//!
//! This crate compiles small JavaScript programs into shared QuickJS contexts
//! using rquickjs (QuickJS-NG), with context lifetime and thread affinity
//! managed by [`enginescope::ContextScope`].
//!
//! # Architecture
//!
//! - **Prelude per context**: each prelude creates one QuickJS runtime+context
//! - **Shared queries**: queries compiled against a prelude live in its context
//! - **Counted lifetime**: every compiled script and every open scope holds a
//!   reference; the last one out disposes the runtime
//! - **Any thread**: scripts run on the calling thread inside a scope; QuickJS
//!   serializes concurrent callers on its runtime lock
//! - **Modules**: preludes call `load_module(name)` to evaluate host-registered
//!   sources; the native callback recovers the context bound by the caller
//!
//! # Example
//!
//! ```rust,no_run
//! use enginescope_js::JsHost;
//! use serde_json::json;
//!
//! # fn example() -> enginescope_js::Result<()> {
//! let host = JsHost::from_default_config()?;
//!
//! let prelude = host.compile_prelude("prelude", "function double(x) { return x * 2; }")?;
//! let query = host.compile_query(&prelude, "doubler", "return double(input.value);")?;
//!
//! let result = host.run(&query, &json!({"value": 21}))?;
//! assert_eq!(result, json!(42));
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod engine;
pub mod error;
pub mod host;
pub mod script;

pub use engine::{QuickJsEngine, LOAD_MODULE_GLOBAL};
pub use error::{JsError, Result};
pub use host::JsHost;
pub use script::{CompiledScript, ScriptKind};

/// Scope over a QuickJS-backed execution context
pub type JsScope = enginescope::ContextScope<QuickJsEngine>;

#[cfg(test)]
mod tests {
    use super::*;
    use enginescope::{current_context_id, ContextError};
    use serde_json::json;

    const PRELUDE: &str = r#"
        function double(x) { return x * 2; }
        var greeting = 'hello';
    "#;

    fn host() -> JsHost {
        JsHost::new(enginescope_config::EngineConfig::default()).unwrap()
    }

    #[test_log::test]
    fn test_prelude_and_query_share_context() {
        let host = host();
        let prelude = host.compile_prelude("prelude", PRELUDE).unwrap();
        let query = host
            .compile_query(&prelude, "doubler", "return double(input.value);")
            .unwrap();

        let context = host.registry().resolve_context(prelude.id()).unwrap();
        let query_context = host.registry().resolve_context(query.id()).unwrap();
        assert_eq!(context.id(), query_context.id());
        assert_eq!(context.ref_count(), 2);

        let result = host.run(&query, &json!({"value": 21})).unwrap();
        assert_eq!(result, json!(42));
        assert_eq!(context.ref_count(), 2);
        assert_eq!(current_context_id(), None);
    }

    #[test_log::test]
    fn test_queries_see_prelude_globals() {
        let host = host();
        let prelude = host.compile_prelude("prelude", PRELUDE).unwrap();
        let query = host
            .compile_query(&prelude, "greet", "return greeting + ' ' + input;")
            .unwrap();

        let result = host.run(&query, &json!("world")).unwrap();
        assert_eq!(result, json!("hello world"));
    }

    #[test_log::test]
    fn test_object_input_and_output() {
        let host = host();
        let prelude = host.compile_prelude("prelude", "").unwrap();
        let query = host
            .compile_query(
                &prelude,
                "summarize",
                "return { count: input.items.length, first: input.items[0] };",
            )
            .unwrap();

        let result = host
            .run(&query, &json!({"items": ["a", "b", "c"]}))
            .unwrap();
        assert_eq!(result, json!({"count": 3, "first": "a"}));
    }

    #[test_log::test]
    fn test_last_script_disposes_context() {
        let host = host();
        let prelude = host.compile_prelude("prelude", PRELUDE).unwrap();
        let query = host
            .compile_query(&prelude, "doubler", "return double(input);")
            .unwrap();
        let context = host.registry().resolve_context(prelude.id()).unwrap();

        drop(prelude);
        assert_eq!(context.ref_count(), 1);
        assert!(!context.is_disposed());
        // The query keeps the prelude's context usable
        assert_eq!(host.run(&query, &json!(4)).unwrap(), json!(8));

        drop(query);
        assert!(context.is_disposed());
        assert_eq!(host.script_count(), 0);
    }

    #[test_log::test]
    fn test_prelude_syntax_error() {
        let host = host();
        let err = host.compile_prelude("broken", "function (").unwrap_err();
        assert!(matches!(err, JsError::Compilation { ref name, .. } if name == "broken"));
        assert_eq!(host.script_count(), 0);
        assert_eq!(current_context_id(), None);
    }

    #[test_log::test]
    fn test_query_syntax_error_keeps_prelude() {
        let host = host();
        let prelude = host.compile_prelude("prelude", PRELUDE).unwrap();
        let err = host.compile_query(&prelude, "broken", "return (;").unwrap_err();
        assert!(matches!(err, JsError::Compilation { .. }));

        let context = host.registry().resolve_context(prelude.id()).unwrap();
        assert_eq!(context.ref_count(), 1);
        assert_eq!(host.script_count(), 1);
    }

    #[test_log::test]
    fn test_runtime_exception_is_reported() {
        let host = host();
        let prelude = host.compile_prelude("prelude", "").unwrap();
        let query = host
            .compile_query(&prelude, "thrower", "throw new Error('boom');")
            .unwrap();

        let err = host.run(&query, &json!(null)).unwrap_err();
        match err {
            JsError::Evaluation { message } => assert!(message.contains("boom"), "{}", message),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(current_context_id(), None);
    }

    #[test_log::test]
    fn test_prelude_cannot_be_run() {
        let host = host();
        let prelude = host.compile_prelude("prelude", PRELUDE).unwrap();
        assert!(matches!(
            host.run(&prelude, &json!(1)),
            Err(JsError::NotAQuery { .. })
        ));
    }

    #[test_log::test]
    fn test_evaluate_in_script_context() {
        let host = host();
        let prelude = host.compile_prelude("prelude", PRELUDE).unwrap();
        assert_eq!(host.evaluate(&prelude, "double(5)").unwrap(), json!(10));
        assert!(host.evaluate(&prelude, "undefined_thing_xyz").is_err());
    }

    #[test_log::test]
    fn test_prelude_loads_registered_module() {
        let host = host();
        host.register_module("math", "function triple(x) { return x * 3; }");

        let prelude = host
            .compile_prelude("prelude", "load_module('math');")
            .unwrap();
        let query = host
            .compile_query(&prelude, "tripler", "return triple(input);")
            .unwrap();

        assert_eq!(host.run(&query, &json!(7)).unwrap(), json!(21));
    }

    #[test_log::test]
    fn test_query_loads_module_at_run_time() {
        let host = host();
        host.register_module("late", "var late_value = 99;");

        let prelude = host.compile_prelude("prelude", "").unwrap();
        let query = host
            .compile_query(&prelude, "lazy", "load_module('late'); return late_value;")
            .unwrap();

        assert_eq!(host.run(&query, &json!(null)).unwrap(), json!(99));
    }

    #[test_log::test]
    fn test_missing_module_is_an_error() {
        let host = host();
        let err = host
            .compile_prelude("prelude", "load_module('absent');")
            .unwrap_err();
        assert!(err.to_string().contains("Module not found"), "{}", err);
    }

    #[test_log::test]
    fn test_run_inside_another_context_conflicts() {
        let host = host();
        let first = host.compile_prelude("first", PRELUDE).unwrap();
        let second = host.compile_prelude("second", PRELUDE).unwrap();
        let query = host
            .compile_query(&second, "doubler", "return double(input);")
            .unwrap();

        let _scope = JsScope::enter(Some(&first)).unwrap();
        let err = host.run(&query, &json!(1)).unwrap_err();
        assert!(matches!(
            err,
            JsError::Context(ContextError::AffinityConflict { .. })
        ));

        let second_context = host.registry().resolve_context(second.id()).unwrap();
        assert_eq!(second_context.ref_count(), 2);
    }

    #[test_log::test]
    fn test_query_dropped_inside_another_context_is_freed() {
        let host = host();
        let first = host.compile_prelude("first", PRELUDE).unwrap();
        let second = host.compile_prelude("second", PRELUDE).unwrap();
        let queries: Vec<_> = (0..10)
            .map(|i| {
                host.compile_query(&first, &format!("echo-{}", i), "return input;")
                    .unwrap()
            })
            .collect();

        let count = format!("Object.keys({}).length", engine::QUERIES_GLOBAL);
        assert_eq!(host.evaluate(&first, &count).unwrap(), json!(10));

        {
            let _scope = JsScope::enter(Some(&second)).unwrap();
            drop(queries);
            let second_id = host.registry().resolve_context(second.id()).map(|c| c.id());
            assert_eq!(current_context_id(), second_id);
        }

        assert_eq!(host.evaluate(&first, &count).unwrap(), json!(0));
        assert_eq!(host.script_count(), 2);
        let context = host.registry().resolve_context(first.id()).unwrap();
        assert_eq!(context.ref_count(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = enginescope_config::EngineConfig::default().with_memory_limit(0);
        assert!(matches!(JsHost::new(config), Err(JsError::Config { .. })));
    }
}
