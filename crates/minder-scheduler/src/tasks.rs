//! Task definitions, runtime state, and handler results — the core
//! data model for scheduled work.
//!
//! Definitions are human-edited and read-only from the kernel side;
//! state is rewritten after every run. The two are paired by `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use minder_core::util::{truncate, SUMMARY_CAP};

/// How often a task is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    EveryMinute,
    #[serde(rename = "every_5_min")]
    Every5Min,
    Hourly,
    OncePerDay,
    Daily,
    Weekly,
}

impl Frequency {
    /// Canonical interval in seconds.
    pub fn interval_secs(&self) -> i64 {
        match self {
            Frequency::EveryMinute => 60,
            Frequency::Every5Min => 300,
            Frequency::Hourly => 3600,
            Frequency::OncePerDay | Frequency::Daily => 86_400,
            Frequency::Weekly => 7 * 86_400,
        }
    }

    /// Grace margin absorbing cron jitter. The external timer fires
    /// at ~60s cadence; without the margin a task could slip a full
    /// period.
    pub fn grace_secs(&self) -> i64 {
        5
    }
}

/// Immutable configuration for one scheduled unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub title: String,
    pub enabled: bool,
    pub frequency: Frequency,
    /// IANA timezone name. Only UTC behavior is implemented; the
    /// field is carried for forward compatibility.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Opaque handler parameters, passed through verbatim.
    #[serde(default)]
    pub params: Map<String, Value>,
}

fn default_timezone() -> String {
    "UTC".into()
}

/// Where a task currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    Running,
    Ok,
    Failed,
    Skipped,
}

/// Mutable per-task runtime record, paired with a definition by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_result_summary: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_metrics: Map<String, Value>,
    /// Unknown fields from older/newer writers, preserved on
    /// round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskState {
    /// Fresh state for a definition observed for the first time.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: TaskStatus::Scheduled,
            last_run_at: None,
            next_run_at: None,
            last_result_summary: None,
            last_error: None,
            last_metrics: Map::new(),
            extra: Map::new(),
        }
    }

    /// Merge a handler result into this state after a run. Enforces
    /// the status/error invariants and the summary length cap.
    pub fn apply_result(&mut self, result: &TaskResult, now: DateTime<Utc>, next: DateTime<Utc>) {
        self.status = result.status.as_task_status();
        self.last_run_at = Some(now);
        self.next_run_at = Some(next);
        self.last_result_summary = Some(truncate(&result.summary, SUMMARY_CAP));
        self.last_error = match result.status {
            ResultStatus::Failed => {
                let msg = result.error.as_deref().unwrap_or("unknown error");
                let msg = if msg.is_empty() { "unknown error" } else { msg };
                Some(truncate(msg, SUMMARY_CAP))
            }
            _ => None,
        };
        self.last_metrics = result.metrics.clone();
    }
}

/// Handler verdict for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    Failed,
    Skipped,
}

impl ResultStatus {
    pub fn as_task_status(&self) -> TaskStatus {
        match self {
            ResultStatus::Ok => TaskStatus::Ok,
            ResultStatus::Failed => TaskStatus::Failed,
            ResultStatus::Skipped => TaskStatus::Skipped,
        }
    }
}

/// What a handler hands back to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: ResultStatus,
    pub summary: String,
    #[serde(default)]
    pub error: Option<String>,
    /// A failed result with `retriable` set is retried in-worker
    /// with backoff before being surfaced.
    #[serde(default)]
    pub retriable: bool,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub duration_sec: f64,
}

impl TaskResult {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Ok,
            summary: summary.into(),
            error: None,
            retriable: false,
            metrics: Map::new(),
            duration_sec: 0.0,
        }
    }

    pub fn failed(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            summary: summary.into(),
            error: Some(error.into()),
            retriable: false,
            metrics: Map::new(),
            duration_sec: 0.0,
        }
    }

    pub fn skipped(summary: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Skipped,
            summary: summary.into(),
            error: None,
            retriable: false,
            metrics: Map::new(),
            duration_sec: 0.0,
        }
    }

    pub fn with_retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    pub fn with_metrics(mut self, metrics: Map<String, Value>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_wire_names() {
        let f: Frequency = serde_json::from_str("\"every_minute\"").unwrap();
        assert_eq!(f, Frequency::EveryMinute);
        let f: Frequency = serde_json::from_str("\"every_5_min\"").unwrap();
        assert_eq!(f, Frequency::Every5Min);
        let f: Frequency = serde_json::from_str("\"once_per_day\"").unwrap();
        assert_eq!(f.interval_secs(), 86_400);
        assert_eq!(
            serde_json::to_string(&Frequency::Weekly).unwrap(),
            "\"weekly\""
        );
    }

    #[test]
    fn apply_result_enforces_invariants() {
        let mut state = TaskState::new("t1");
        let now = Utc::now();
        let next = now + chrono::Duration::seconds(3600);

        state.apply_result(&TaskResult::ok("fine"), now, next);
        assert_eq!(state.status, TaskStatus::Ok);
        assert!(state.last_error.is_none());
        assert_eq!(state.last_result_summary.as_deref(), Some("fine"));

        state.apply_result(&TaskResult::failed("broke", "boom"), now, next);
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(state.last_error.as_deref(), Some("boom"));

        state.apply_result(&TaskResult::skipped("no key"), now, next);
        assert_eq!(state.status, TaskStatus::Skipped);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn apply_result_truncates_long_strings() {
        let mut state = TaskState::new("t1");
        let now = Utc::now();
        let long = "e".repeat(600);
        state.apply_result(&TaskResult::failed(long.clone(), long), now, now);
        assert_eq!(state.last_error.as_ref().unwrap().chars().count(), 400);
        assert!(state.last_error.as_ref().unwrap().ends_with("..."));
        assert_eq!(
            state.last_result_summary.as_ref().unwrap().chars().count(),
            400
        );
    }

    #[test]
    fn failed_with_empty_error_gets_placeholder() {
        let mut state = TaskState::new("t1");
        let now = Utc::now();
        let mut result = TaskResult::failed("broke", "");
        result.error = None;
        state.apply_result(&result, now, now);
        assert_eq!(state.last_error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn state_preserves_unknown_fields() {
        let raw = r#"{
            "id": "t1",
            "status": "ok",
            "attempts": 7,
            "custom_tag": "keepme"
        }"#;
        let state: TaskState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.extra.get("attempts"), Some(&serde_json::json!(7)));
        let out = serde_json::to_value(&state).unwrap();
        assert_eq!(out["custom_tag"], "keepme");
        assert_eq!(out["attempts"], 7);
    }
}
