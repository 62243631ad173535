//! Shared engine fixtures for scope integration tests

#![allow(dead_code)] // Not every test binary uses every helper

use enginescope::{current_context_id, ContextId, Engine, ExecutionContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the engine observed when it was disposed
#[derive(Debug, Default)]
pub struct DisposalLog {
    disposals: AtomicUsize,
    bound_at_disposal: Mutex<Vec<Option<ContextId>>>,
}

impl DisposalLog {
    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }

    /// Binding of the disposing thread, one entry per disposal
    pub fn bound_at_disposal(&self) -> Vec<Option<ContextId>> {
        self.bound_at_disposal.lock().unwrap().clone()
    }
}

/// Engine that records its disposal
pub struct RecordingEngine {
    log: Arc<DisposalLog>,
}

impl Engine for RecordingEngine {
    type Error = std::convert::Infallible;

    fn dispose(self) -> Result<(), Self::Error> {
        self.log
            .bound_at_disposal
            .lock()
            .unwrap()
            .push(current_context_id());
        self.log.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A fresh context plus the log its engine writes to
pub fn recording_context() -> (Arc<ExecutionContext<RecordingEngine>>, Arc<DisposalLog>) {
    let log = Arc::new(DisposalLog::default());
    let context = ExecutionContext::new(RecordingEngine {
        log: Arc::clone(&log),
    });
    (context, log)
}
