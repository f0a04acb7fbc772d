//! Heartbeat — runs every minute, always succeeds. Its only purpose
//! is proving the cron trigger and the kernel are alive.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};

use minder_scheduler::{TaskDefinition, TaskHandler, TaskResult};

pub struct HeartbeatHandler;

#[async_trait]
impl TaskHandler for HeartbeatHandler {
    async fn run(&self, _def: &TaskDefinition) -> TaskResult {
        let now = Utc::now();
        let mut metrics = Map::new();
        metrics.insert("timestamp_utc".into(), json!(now.to_rfc3339()));
        TaskResult::ok(format!("Heartbeat at {}", now.to_rfc3339())).with_metrics(metrics)
    }
}
