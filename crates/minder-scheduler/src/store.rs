//! Storage backends for the task catalog and runtime state.
//!
//! The two-file split is deliberate: `tasks.json` is human-edited
//! and commit-tracked, `state.json` changes every invocation. Only
//! state is ever written, and the write is atomic
//! (temp-write → fsync → rename) so a crash leaves either the old
//! or the new document fully intact.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use minder_core::{AgentConfig, AgentError, Result};

use crate::tasks::{TaskDefinition, TaskState};

/// The kernel's two storage operations.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the full catalog. Missing state is not an error (fresh
    /// deployment); a missing or malformed definitions file is.
    async fn load(&self) -> Result<(Vec<TaskDefinition>, Vec<TaskState>)>;

    /// Persist the state document atomically.
    async fn save(&self, states: &[TaskState]) -> Result<()>;
}

/// Pick the backend: the remote table when all four table fields are
/// configured, the local JSON files otherwise.
pub fn open_store(config: &AgentConfig) -> Box<dyn StateStore> {
    if config.remote_table_configured() {
        tracing::info!("🗄️ using remote table store (table {})", config.table_table_id);
        Box::new(RemoteTableStore::new(config))
    } else {
        Box::new(JsonFileStore::new(&config.tasks_file, &config.state_file))
    }
}

// ─── JSON file backend ──────────────────────────────────────────

pub struct JsonFileStore {
    tasks_file: PathBuf,
    state_file: PathBuf,
}

impl JsonFileStore {
    pub fn new(tasks_file: impl AsRef<Path>, state_file: impl AsRef<Path>) -> Self {
        Self {
            tasks_file: tasks_file.as_ref().to_path_buf(),
            state_file: state_file.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<(Vec<TaskDefinition>, Vec<TaskState>)> {
        if !self.tasks_file.exists() {
            return Err(AgentError::Config(format!(
                "task catalog not found at {}",
                self.tasks_file.display()
            )));
        }
        let raw = std::fs::read_to_string(&self.tasks_file)
            .map_err(|e| AgentError::Config(format!("read {}: {e}", self.tasks_file.display())))?;
        let definitions: Vec<TaskDefinition> = serde_json::from_str(&raw)
            .map_err(|e| AgentError::Config(format!("parse {}: {e}", self.tasks_file.display())))?;

        let states = if self.state_file.exists() {
            let raw = std::fs::read_to_string(&self.state_file)
                .map_err(|e| AgentError::Config(format!("read {}: {e}", self.state_file.display())))?;
            // A broken state file must never be silently overwritten.
            serde_json::from_str(&raw)
                .map_err(|e| AgentError::Config(format!("parse {}: {e}", self.state_file.display())))?
        } else {
            tracing::debug!("state file {} not found, starting fresh", self.state_file.display());
            Vec::new()
        };

        tracing::debug!(
            "📋 loaded {} definitions, {} state rows",
            definitions.len(),
            states.len()
        );
        Ok((definitions, states))
    }

    async fn save(&self, states: &[TaskState]) -> Result<()> {
        if let Some(parent) = self.state_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(states)?;
        let tmp = self.state_file.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            // The rename is only atomic if the temp contents hit disk first.
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.state_file)?;

        tracing::debug!(
            "💾 saved state for {} tasks to {}",
            states.len(),
            self.state_file.display()
        );
        Ok(())
    }
}

// ─── Remote table backend ───────────────────────────────────────

/// Table-API backend, auto-selected when all four table credentials
/// are configured. Each row mirrors one definition+state pair; JSON
/// columns carry the nested maps.
pub struct RemoteTableStore {
    app_id: String,
    app_secret: String,
    app_token: String,
    table_id: String,
    base_url: String,
    client: reqwest::Client,
    /// task id → record id, learned at load time so save can target
    /// the right rows.
    record_ids: Mutex<HashMap<String, String>>,
}

impl RemoteTableStore {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            app_id: config.table_app_id.clone(),
            app_secret: config.table_app_secret.clone(),
            app_token: config.table_app_token.clone(),
            table_id: config.table_table_id.clone(),
            base_url: "https://open.larksuite.com/open-apis".into(),
            client: reqwest::Client::new(),
            record_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn tenant_token(&self) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/auth/v3/tenant_access_token/internal", self.base_url))
            .json(&json!({ "app_id": self.app_id, "app_secret": self.app_secret }))
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| AgentError::Storage(format!("table auth: {e}")))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AgentError::Storage(format!("table auth decode: {e}")))?;
        body["tenant_access_token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AgentError::Storage("table auth: no token in response".into()))
    }

    fn records_url(&self) -> String {
        format!(
            "{}/bitable/v1/apps/{}/tables/{}/records",
            self.base_url, self.app_token, self.table_id
        )
    }

    fn state_fields(state: &TaskState) -> Value {
        json!({
            "status": serde_json::to_value(state.status).unwrap_or(Value::Null),
            "last_run_at": state.last_run_at.map(|t| t.to_rfc3339()),
            "next_run_at": state.next_run_at.map(|t| t.to_rfc3339()),
            "last_result_summary": state.last_result_summary,
            "last_error": state.last_error,
            "last_metrics": serde_json::to_string(&state.last_metrics).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl StateStore for RemoteTableStore {
    async fn load(&self) -> Result<(Vec<TaskDefinition>, Vec<TaskState>)> {
        let token = self.tenant_token().await?;
        let resp = self
            .client
            .get(format!("{}?page_size=500", self.records_url()))
            .header("Authorization", format!("Bearer {token}"))
            .timeout(std::time::Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| AgentError::Storage(format!("table list: {e}")))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AgentError::Storage(format!("table list decode: {e}")))?;

        let items = body["data"]["items"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut definitions = Vec::new();
        let mut states = Vec::new();
        let mut record_ids = self.record_ids.lock().await;
        record_ids.clear();

        for item in items {
            let fields = &item["fields"];
            let id = match fields["id"].as_str() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => continue,
            };
            if let Some(record_id) = item["record_id"].as_str() {
                record_ids.insert(id.clone(), record_id.to_string());
            }

            let def_value = json!({
                "id": id,
                "title": fields["title"].as_str().unwrap_or(""),
                "enabled": fields["enabled"].as_bool().unwrap_or(true),
                "frequency": fields["frequency"].as_str().unwrap_or("daily"),
                "timezone": fields["timezone"].as_str().unwrap_or("UTC"),
                "params": serde_json::from_str::<Value>(fields["params"].as_str().unwrap_or("{}"))
                    .unwrap_or_else(|_| json!({})),
            });
            let definition: TaskDefinition = serde_json::from_value(def_value)
                .map_err(|e| AgentError::Config(format!("table row '{id}': {e}")))?;

            let state_value = json!({
                "id": definition.id,
                "status": fields["status"].as_str().unwrap_or("scheduled"),
                "last_run_at": fields["last_run_at"].as_str(),
                "next_run_at": fields["next_run_at"].as_str(),
                "last_result_summary": fields["last_result_summary"].as_str(),
                "last_error": fields["last_error"].as_str(),
                "last_metrics": serde_json::from_str::<Value>(
                    fields["last_metrics"].as_str().unwrap_or("{}")
                ).unwrap_or_else(|_| json!({})),
            });
            let state: TaskState = serde_json::from_value(state_value)
                .map_err(|e| AgentError::Config(format!("table row '{}': {e}", definition.id)))?;

            definitions.push(definition);
            states.push(state);
        }

        tracing::debug!("📋 loaded {} rows from remote table", definitions.len());
        Ok((definitions, states))
    }

    async fn save(&self, states: &[TaskState]) -> Result<()> {
        let token = self.tenant_token().await?;
        let record_ids = self.record_ids.lock().await;

        let records: Vec<Value> = states
            .iter()
            .filter_map(|state| {
                record_ids.get(&state.id).map(|record_id| {
                    json!({ "record_id": record_id, "fields": Self::state_fields(state) })
                })
            })
            .collect();

        if records.is_empty() {
            return Ok(());
        }

        let resp = self
            .client
            .post(format!("{}/batch_update", self.records_url()))
            .header("Authorization", format!("Bearer {token}"))
            .json(&json!({ "records": records }))
            .timeout(std::time::Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| AgentError::Storage(format!("table update: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::Storage(format!("table update {status}: {text}")));
        }
        Ok(())
    }
}
