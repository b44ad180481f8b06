//! Atelier core: conversational React component generation.
//!
//! The interesting pieces live in [`parse`] (turning an LLM reply into a
//! validated component artifact), [`model::session`] (versioned component
//! state on the session aggregate) and [`workflow`] (the chat / refine /
//! regenerate operations the web layer calls). Everything else is the
//! plumbing those pieces need: config, the completion client, the SQLite
//! session store, the export assembler and the notification bus.

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod llm;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod storage;
pub mod workflow;

pub use error::{AtelierError, Result};

/// Serializes tests that mutate process environment variables; the default
/// test runner is parallel and the environment is process-global.
#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn lock() -> MutexGuard<'static, ()> {
        LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
