//! # Minder Scheduler
//!
//! The scheduling and execution kernel: frequency gating, bounded
//! concurrent dispatch, per-task retry, atomic state persistence,
//! and webhook notification.
//!
//! ## Architecture
//! ```text
//! one cron invocation
//!   └── run_once
//!        ├── StateStore.load          (tasks.json + state.json, or remote table)
//!        ├── clock: filter eligible   (frequency window + 5s grace)
//!        ├── Executor.run_batch       (semaphore-bounded workers,
//!        │     └── HandlerRegistry     retry w/ backoff, panic guard,
//!        │                             global run deadline)
//!        ├── StateStore.save          (temp-write → fsync → rename)
//!        └── WebhookNotifier          (failure alerts + summary card)
//! ```
//!
//! Handlers communicate through `TaskResult` — the executor catches
//! panics only as defense in depth, never as control flow.

pub mod clock;
pub mod engine;
pub mod notify;
pub mod registry;
pub mod store;
pub mod tasks;

pub use engine::{run_once, Executor, ExecutorSettings, RunReport, TaskOutcome};
pub use notify::WebhookNotifier;
pub use registry::{HandlerRegistry, TaskHandler};
pub use store::{open_store, JsonFileStore, RemoteTableStore, StateStore};
pub use tasks::{Frequency, ResultStatus, TaskDefinition, TaskResult, TaskState, TaskStatus};
