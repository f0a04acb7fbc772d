//! Handler registry — maps a task id to the code that runs it.
//!
//! The mapping is populated once at startup and read-only after
//! that. An id with no handler is a per-task failure, never a crash.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::tasks::{TaskDefinition, TaskResult};

/// One task's work. Implementations must not panic on bad params:
/// parse them on entry and return a curated `failed` result instead.
/// Handlers may run in parallel with each other and must not touch
/// any other task's state.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, def: &TaskDefinition) -> TaskResult;
}

/// Static id → handler mapping.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, handler: Arc<dyn TaskHandler>) {
        if self.handlers.insert(id.to_string(), handler).is_some() {
            tracing::warn!("⚠️ handler for '{id}' registered twice, keeping the latest");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch one definition, translating a missing handler into
    /// the standard failure row.
    pub async fn dispatch(&self, def: &TaskDefinition) -> TaskResult {
        match self.get(&def.id) {
            Some(handler) => handler.run(def).await,
            None => {
                tracing::error!("✗ no handler registered for '{}'", def.id);
                TaskResult::failed(
                    "no handler registered",
                    format!("unknown_task_id:{}", def.id),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Frequency;
    use serde_json::Map;

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        async fn run(&self, def: &TaskDefinition) -> TaskResult {
            TaskResult::ok(format!("ran {}", def.id))
        }
    }

    fn def(id: &str) -> TaskDefinition {
        TaskDefinition {
            id: id.into(),
            title: id.into(),
            enabled: true,
            frequency: Frequency::Daily,
            timezone: "UTC".into(),
            params: Map::new(),
        }
    }

    #[tokio::test]
    async fn dispatch_known_and_unknown() {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", Arc::new(EchoHandler));

        let result = registry.dispatch(&def("echo")).await;
        assert_eq!(result.summary, "ran echo");

        let result = registry.dispatch(&def("ghost")).await;
        assert_eq!(result.error.as_deref(), Some("unknown_task_id:ghost"));
    }
}
