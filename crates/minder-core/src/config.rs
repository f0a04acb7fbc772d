//! Agent configuration.
//!
//! Built once from the environment at startup and passed down
//! explicitly — nothing reads env vars after `from_env()` returns,
//! so tests can construct configs directly.

use serde::{Deserialize, Serialize};

/// Immutable runtime configuration for one agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Chat webhook for the consolidated card and failure alerts.
    /// Empty → notifications are skipped (reported as success).
    #[serde(default)]
    pub webhook_url: String,
    /// Optional user id to @-mention on failure alerts.
    #[serde(default)]
    pub mention: String,

    /// Primary LLM provider id (`groq`, `openai`, `dry_run`).
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,
    #[serde(default)]
    pub groq_api_key: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Optional search enrichment key (serper.dev). Empty → the
    /// article pipeline runs without search context.
    #[serde(default)]
    pub search_api_key: String,

    /// Path to the task catalog (read-only from the kernel side).
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,
    /// Path to the mutable state document.
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// Root directory for handler artifacts.
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// Worker pool size. Values below 1 are clamped to 1.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Backoff sequence in seconds for retriable failures.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: Vec<f64>,
    /// Soft per-task deadline in seconds (logged, not enforced).
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Hard deadline for the whole batch.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Topic cap for the content batch handler.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Skip state save and webhook dispatch (exercise handlers only).
    #[serde(default)]
    pub dry_run: bool,

    /// Remote table backend, selected when all four are non-empty.
    #[serde(default)]
    pub table_app_id: String,
    #[serde(default)]
    pub table_app_secret: String,
    #[serde(default)]
    pub table_app_token: String,
    #[serde(default)]
    pub table_table_id: String,
}

fn default_llm_provider() -> String { "groq".into() }
fn default_groq_model() -> String { "llama-3.1-8b-instant".into() }
fn default_openai_model() -> String { "gpt-4o-mini".into() }
fn default_tasks_file() -> String { "tasks.json".into() }
fn default_state_file() -> String { "state.json".into() }
fn default_output_root() -> String { "outputs/articles".into() }
fn default_max_concurrency() -> usize { 5 }
fn default_retry_backoff() -> Vec<f64> { vec![1.0, 3.0, 7.0] }
fn default_task_timeout() -> u64 { 120 }
fn default_run_timeout() -> u64 { 600 }
fn default_top_n() -> usize { 3 }

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            mention: String::new(),
            llm_provider: default_llm_provider(),
            groq_api_key: String::new(),
            groq_model: default_groq_model(),
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            search_api_key: String::new(),
            tasks_file: default_tasks_file(),
            state_file: default_state_file(),
            output_root: default_output_root(),
            max_concurrency: default_max_concurrency(),
            retry_backoff: default_retry_backoff(),
            task_timeout_secs: default_task_timeout(),
            run_timeout_secs: default_run_timeout(),
            top_n: default_top_n(),
            dry_run: false,
            table_app_id: String::new(),
            table_app_secret: String::new(),
            table_app_token: String::new(),
            table_table_id: String::new(),
        }
    }
}

impl AgentConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).unwrap_or_default();
        let env_or = |key: &str, fallback: &str| {
            let v = env(key);
            if v.trim().is_empty() { fallback.to_string() } else { v }
        };

        Self {
            webhook_url: env("WEBHOOK_URL"),
            mention: env("MENTION"),
            llm_provider: env_or("LLM_PROVIDER", "groq").to_lowercase(),
            groq_api_key: env("GROQ_API_KEY"),
            groq_model: env_or("GROQ_MODEL", "llama-3.1-8b-instant"),
            openai_api_key: env("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            search_api_key: env("SEARCH_API_KEY"),
            tasks_file: env_or("TASKS_FILE", "tasks.json"),
            state_file: env_or("STATE_FILE", "state.json"),
            output_root: env_or("OUTPUT_ROOT", "outputs/articles"),
            max_concurrency: env("MAX_CONCURRENCY").parse().unwrap_or(5),
            retry_backoff: parse_backoff(&env_or("RETRY_BACKOFF", "1,3,7")),
            task_timeout_secs: env("TASK_TIMEOUT_SECS").parse().unwrap_or(120),
            run_timeout_secs: env("RUN_TIMEOUT_SECS").parse().unwrap_or(600),
            top_n: env("TOP_N").parse().unwrap_or(3),
            dry_run: matches!(env("DRY_RUN").to_lowercase().as_str(), "1" | "true" | "yes"),
            table_app_id: env("TABLE_APP_ID"),
            table_app_secret: env("TABLE_APP_SECRET"),
            table_app_token: env("TABLE_APP_TOKEN"),
            table_table_id: env("TABLE_TABLE_ID"),
        }
    }

    /// Provider ids to try in order: the configured primary first,
    /// then the rest of the default chain.
    pub fn provider_chain(&self) -> Vec<String> {
        let mut chain = vec![self.llm_provider.clone()];
        for candidate in ["groq", "openai", "dry_run"] {
            if !chain.iter().any(|c| c == candidate) {
                chain.push(candidate.to_string());
            }
        }
        chain
    }

    /// Whether all four remote-table fields are present.
    pub fn remote_table_configured(&self) -> bool {
        !self.table_app_id.is_empty()
            && !self.table_app_secret.is_empty()
            && !self.table_app_token.is_empty()
            && !self.table_table_id.is_empty()
    }
}

/// Parse a backoff spec like `1,3,7` (also tolerates `1s,3s,7s`).
fn parse_backoff(spec: &str) -> Vec<f64> {
    let parsed: Vec<f64> = spec
        .split(',')
        .filter_map(|item| {
            let item = item.trim().trim_end_matches(['s', 'S']);
            item.parse().ok()
        })
        .collect();
    if parsed.is_empty() {
        vec![1.0, 3.0, 7.0]
    } else {
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_plain_and_suffixed() {
        assert_eq!(parse_backoff("1,3,7"), vec![1.0, 3.0, 7.0]);
        assert_eq!(parse_backoff("1s,3s,7s"), vec![1.0, 3.0, 7.0]);
        assert_eq!(parse_backoff("0.5, 2"), vec![0.5, 2.0]);
        // Garbage falls back to defaults
        assert_eq!(parse_backoff(""), vec![1.0, 3.0, 7.0]);
    }

    #[test]
    fn provider_chain_starts_with_primary() {
        let mut cfg = AgentConfig::default();
        cfg.llm_provider = "openai".into();
        assert_eq!(cfg.provider_chain(), vec!["openai", "groq", "dry_run"]);

        cfg.llm_provider = "groq".into();
        assert_eq!(cfg.provider_chain(), vec!["groq", "openai", "dry_run"]);
    }

    #[test]
    fn remote_table_needs_all_four_fields() {
        let mut cfg = AgentConfig::default();
        assert!(!cfg.remote_table_configured());
        cfg.table_app_id = "app".into();
        cfg.table_app_secret = "secret".into();
        cfg.table_app_token = "token".into();
        assert!(!cfg.remote_table_configured());
        cfg.table_table_id = "tbl".into();
        assert!(cfg.remote_table_configured());
    }
}
