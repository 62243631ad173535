//! Reference-counted, thread-bound scopes over shared script engine contexts.
//!
//! A host that compiles many small scripts shares one heavyweight engine
//! context between them. This crate tracks who holds that context, which thread
//! it is entered on, and tears it down exactly once when the last holder goes.
//!
//! # Overview
//!
//! - **[`ExecutionContext`]**: wraps an [`Engine`] with an atomic holder count
//! - **[`ContextScope`]**: RAII guard that adds a holder and binds the context
//!   to the current thread; dropping it unbinds, releases, and disposes on the
//!   last release
//! - **Thread affinity**: a thread is bound to at most one context at a time;
//!   the same context may be re-entered
//! - **[`ContextRegistry`]**: maps compiled scripts to their context, holding
//!   one reference per script
//!
//! # Example
//!
//! ```
//! use enginescope::{ContextScope, Engine, ExecutionContext};
//!
//! struct Noop;
//!
//! impl Engine for Noop {
//!     type Error = std::convert::Infallible;
//!     fn dispose(self) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//! }
//!
//! let context = ExecutionContext::new(Noop);
//! {
//!     let scope = ContextScope::<Noop>::enter(Some(&context))?;
//!     assert_eq!(scope.context().ref_count(), 1);
//!
//!     // Callbacks with no handle recover the bound context
//!     let nested = ContextScope::<Noop>::enter(None)?;
//!     assert_eq!(nested.context().id(), context.id());
//! }
//! assert!(context.is_disposed());
//! # Ok::<(), enginescope::ContextError>(())
//! ```

mod binding;
mod context;
mod error;
mod registry;
mod scope;
mod source;

pub use binding::{binding_depth, current_context_id};
pub use context::{ContextId, Engine, ExecutionContext};
pub use error::{ContextError, Result};
pub use registry::{ContextRegistry, ScriptId};
pub use scope::ContextScope;
pub use source::ContextSource;
