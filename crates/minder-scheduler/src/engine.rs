//! Executor — runs one batch of eligible tasks.
//!
//! Eligible tasks go through a bounded worker pool. Each worker
//! wraps its handler in a guard that retries retriable failures
//! in-place with backoff and converts panics into `failed` results,
//! so one bad handler can never take down the batch. State merging
//! happens sequentially after all workers return, then state is
//! persisted before anything is sent to the webhook.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use minder_core::{util, AgentConfig, Result};

use crate::clock::{compute_next_run, is_eligible};
use crate::notify::WebhookNotifier;
use crate::registry::HandlerRegistry;
use crate::store::StateStore;
use crate::tasks::{ResultStatus, TaskDefinition, TaskResult, TaskState};

/// Executor tuning, extracted from the agent config.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub max_concurrency: usize,
    pub retry_backoff: Vec<f64>,
    pub task_timeout: Duration,
    pub run_timeout: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            retry_backoff: config.retry_backoff.clone(),
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            retry_backoff: vec![1.0, 3.0, 7.0],
            task_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(600),
        }
    }
}

/// One eligible task's final result for this run.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub definition: TaskDefinition,
    pub result: TaskResult,
    /// False for rows synthesized at the run deadline; their
    /// persisted state is left unchanged.
    pub persist: bool,
}

/// Everything the notifier (and the exit code) needs to know about
/// one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_sec: f64,
    pub outcomes: Vec<TaskOutcome>,
    pub total_tasks: usize,
}

impl RunReport {
    pub fn count(&self, status: ResultStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.status == status)
            .count()
    }

    pub fn any_failed(&self) -> bool {
        self.count(ResultStatus::Failed) > 0
    }
}

pub struct Executor {
    registry: Arc<HandlerRegistry>,
    settings: ExecutorSettings,
}

impl Executor {
    pub fn new(registry: Arc<HandlerRegistry>, settings: ExecutorSettings) -> Self {
        Self { registry, settings }
    }

    /// Run every eligible task and fold the results into a fresh
    /// state vector (one row per definition, in definition order).
    pub async fn run_batch(
        &self,
        definitions: &[TaskDefinition],
        states: &[TaskState],
    ) -> (Vec<TaskState>, RunReport) {
        let run_id = util::run_id();
        let started_at = Utc::now();
        let started = Instant::now();

        let state_by_id: HashMap<&str, &TaskState> =
            states.iter().map(|s| (s.id.as_str(), s)).collect();

        let eligible: Vec<&TaskDefinition> = definitions
            .iter()
            .filter(|def| is_eligible(def, state_by_id.get(def.id.as_str()).copied(), started_at))
            .collect();

        tracing::info!(
            "🔔 {} of {} tasks eligible (run {})",
            eligible.len(),
            definitions.len(),
            run_id
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut set: JoinSet<(String, TaskResult)> = JoinSet::new();

        for def in &eligible {
            let def = (*def).clone();
            let registry = self.registry.clone();
            let backoff = self.settings.retry_backoff.clone();
            let task_timeout = self.settings.task_timeout;
            let semaphore = semaphore.clone();

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = run_with_retry(registry, &def, &backoff, task_timeout).await;
                (def.id.clone(), result)
            });
        }

        // Drain under the global run deadline. Workers still running
        // when it fires are aborted and surfaced as failed rows, but
        // their persisted state is left untouched.
        let mut results: HashMap<String, TaskResult> = HashMap::new();
        let deadline = tokio::time::timeout(self.settings.run_timeout, async {
            while let Some(joined) = set.join_next().await {
                if let Ok((id, result)) = joined {
                    results.insert(id, result);
                }
            }
        })
        .await;

        if deadline.is_err() {
            tracing::error!("⏱️ run deadline exceeded, aborting remaining workers");
            set.abort_all();
        }

        let now = Utc::now();
        let mut outcomes = Vec::with_capacity(eligible.len());
        for def in &eligible {
            match results.remove(def.id.as_str()) {
                Some(result) => outcomes.push(TaskOutcome {
                    definition: (*def).clone(),
                    result,
                    persist: true,
                }),
                None => outcomes.push(TaskOutcome {
                    definition: (*def).clone(),
                    result: TaskResult::failed(
                        "run deadline exceeded before this task finished",
                        "run_deadline_exceeded",
                    ),
                    persist: false,
                }),
            }
        }

        // Sequential merge: exactly one state row per definition.
        let outcome_by_id: HashMap<&str, &TaskOutcome> = outcomes
            .iter()
            .map(|o| (o.definition.id.as_str(), o))
            .collect();
        let mut new_states = Vec::with_capacity(definitions.len());
        for def in definitions {
            let mut state = state_by_id
                .get(def.id.as_str())
                .map(|s| (*s).clone())
                .unwrap_or_else(|| TaskState::new(&def.id));
            if let Some(outcome) = outcome_by_id.get(def.id.as_str()) {
                if outcome.persist {
                    state.apply_result(&outcome.result, now, compute_next_run(now, def.frequency));
                }
            }
            new_states.push(state);
        }

        let report = RunReport {
            run_id,
            started_at,
            duration_sec: started.elapsed().as_secs_f64(),
            outcomes,
            total_tasks: definitions.len(),
        };

        tracing::info!(
            "🏁 run {} done: {} ok, {} skipped, {} failed ({:.2}s)",
            report.run_id,
            report.count(ResultStatus::Ok),
            report.count(ResultStatus::Skipped),
            report.count(ResultStatus::Failed),
            report.duration_sec
        );

        (new_states, report)
    }
}

/// Outer guard around one handler invocation: panic containment,
/// wall-clock timing, in-worker retry for retriable failures.
async fn run_with_retry(
    registry: Arc<HandlerRegistry>,
    def: &TaskDefinition,
    backoff: &[f64],
    task_timeout: Duration,
) -> TaskResult {
    let started = Instant::now();
    let mut attempt = 0;

    let mut result = loop {
        let attempt_def = def.clone();
        let attempt_registry = registry.clone();
        // Run the attempt on its own task so a panicking handler is
        // contained by the join error instead of unwinding the pool.
        let result = match tokio::spawn(async move {
            attempt_registry.dispatch(&attempt_def).await
        })
        .await
        {
            Ok(result) => result,
            Err(e) => TaskResult::failed("handler crashed", e.to_string()),
        };

        match result.status {
            ResultStatus::Failed if result.retriable && attempt < backoff.len() => {
                let wait = backoff[attempt];
                tracing::info!("🔁 [{}] failed (retriable), retrying in {wait}s", def.id);
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                attempt += 1;
            }
            _ => break result,
        }
    };

    let elapsed = started.elapsed().as_secs_f64();
    result.duration_sec = elapsed;
    if elapsed > task_timeout.as_secs_f64() {
        tracing::warn!(
            "⏱️ [{}] exceeded soft deadline ({elapsed:.1}s > {}s)",
            def.id,
            task_timeout.as_secs()
        );
    }
    result
}

/// One full kernel invocation: load → filter → execute → save →
/// notify. Returns the report so the caller can derive the exit code.
pub async fn run_once(
    store: &dyn StateStore,
    registry: Arc<HandlerRegistry>,
    notifier: &WebhookNotifier,
    config: &AgentConfig,
) -> Result<(RunReport, bool)> {
    let (definitions, states) = store.load().await?;
    tracing::info!(
        "📋 loaded {} definitions, {} state rows",
        definitions.len(),
        states.len()
    );

    let executor = Executor::new(registry, ExecutorSettings::from_config(config));
    let (new_states, report) = executor.run_batch(&definitions, &states).await;

    // Persistence is the single synchronization point: it happens
    // before any notification, and its failure is fatal.
    if config.dry_run {
        tracing::info!("🧪 dry run: state save skipped");
    } else {
        store.save(&new_states).await?;
    }

    let notifier_ok = if config.dry_run {
        tracing::info!("🧪 dry run: webhook dispatch skipped");
        true
    } else {
        notifier.dispatch(&report).await
    };

    Ok((report, notifier_ok))
}
