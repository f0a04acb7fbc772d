//! Kernel error type.
//!
//! Handler-internal failures never surface here — handlers report
//! through `TaskResult`. This enum covers the kernel's own concerns:
//! loading the catalog, persisting state, webhook transport, and
//! provider misconfiguration caught before handlers run.

use thiserror::Error;

/// Errors the scheduling kernel itself can produce.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or malformed catalog/state document. Aborts the run
    /// before any handler executes.
    #[error("config error: {0}")]
    Config(String),

    /// State persistence failed. Fatal: a later run would observe
    /// stale state.
    #[error("storage error: {0}")]
    Storage(String),

    /// Webhook transport failed. Logged by callers, never fatal to
    /// handler outcomes.
    #[error("notifier error: {0}")]
    Notifier(String),

    /// A provider-level failure surfaced at the kernel boundary
    /// (e.g. an unknown provider id configured), stringified from
    /// the provider crate's own taxonomy.
    #[error("provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Config(format!("JSON: {e}"))
    }
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::Storage(e.to_string())
    }
}
