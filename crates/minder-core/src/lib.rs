//! # Minder Core
//!
//! Shared foundation for the minder agent: the immutable runtime
//! configuration, the kernel error type, and small text utilities
//! (truncation, slugs, word counting) used across crates.

pub mod config;
pub mod error;
pub mod util;

pub use config::AgentConfig;
pub use error::{AgentError, Result};
