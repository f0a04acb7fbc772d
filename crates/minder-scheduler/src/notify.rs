//! Webhook notification — per-failure alert cards and the
//! consolidated run summary card.
//!
//! Card assembly is pure (testable without a network); transport is
//! a single POST per card. Transport failures are logged and never
//! abort the run — only the consolidated card's fate feeds into the
//! exit code, and only when a webhook is actually configured.

use serde_json::{json, Value};

use minder_core::util::{truncate, SUMMARY_CAP};
use minder_core::{AgentConfig, AgentError, Result};

use crate::engine::{RunReport, TaskOutcome};
use crate::tasks::ResultStatus;

pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    mention: String,
}

impl WebhookNotifier {
    pub fn from_config(config: &AgentConfig) -> Self {
        let webhook_url = if config.webhook_url.trim().is_empty() {
            None
        } else {
            Some(config.webhook_url.clone())
        };
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            mention: config.mention.clone(),
        }
    }

    /// Send per-failure alerts then the consolidated card. Returns
    /// whether the consolidated card went through (true when no
    /// webhook is configured, where there is nothing to fail).
    pub async fn dispatch(&self, report: &RunReport) -> bool {
        for outcome in &report.outcomes {
            if outcome.result.status != ResultStatus::Failed {
                continue;
            }
            let card = build_alert_card(outcome, &self.mention, &report.run_id);
            if let Err(e) = self.send(&card).await {
                tracing::error!("⚠️ failure alert for '{}' not delivered: {e}", outcome.definition.id);
            }
        }

        let card = build_summary_card(report);
        match self.send(&card).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("⚠️ summary card not delivered: {e}");
                false
            }
        }
    }

    async fn send(&self, payload: &Value) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("webhook not configured, skipping dispatch");
            return Ok(());
        };
        let resp = self
            .client
            .post(url)
            .json(payload)
            .timeout(std::time::Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| AgentError::Notifier(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AgentError::Notifier(format!(
                "webhook returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

fn non_empty(s: &str, fallback: &str) -> String {
    if s.trim().is_empty() {
        fallback.to_string()
    } else {
        s.to_string()
    }
}

/// One alert card per failed task.
pub fn build_alert_card(outcome: &TaskOutcome, mention: &str, run_id: &str) -> Value {
    let title = non_empty(&outcome.definition.title, "Untitled");
    let error = truncate(
        &non_empty(outcome.result.error.as_deref().unwrap_or(""), "Unknown error"),
        SUMMARY_CAP,
    );

    let mut body = format!("**Task ID:** {}\n**Error:** {error}", outcome.definition.id);
    if !mention.trim().is_empty() {
        body.push_str(&format!("\n<at user_id=\"{mention}\"></at>"));
    }

    json!({
        "msg_type": "interactive",
        "card": {
            "elements": [
                { "tag": "markdown", "content": format!("❌ **Task Failed: {title}**") },
                { "tag": "markdown", "content": body },
                { "tag": "markdown", "content": format!("_Run ID: `{run_id}`_") },
            ]
        }
    })
}

/// The consolidated per-run card. Always renders, even for an empty
/// run or a run where everything failed.
pub fn build_summary_card(report: &RunReport) -> Value {
    let ok = report.count(ResultStatus::Ok);
    let skipped = report.count(ResultStatus::Skipped);
    let failed = report.count(ResultStatus::Failed);
    let all_pass = failed == 0;

    let mut elements = Vec::new();
    elements.push(json!({
        "tag": "markdown",
        "content": format!("## {} Agent Run Results", if all_pass { "✅" } else { "⚠️" })
    }));
    elements.push(json!({
        "tag": "markdown",
        "content": format!(
            "**Status:** {}\n**Results:** {ok} ✓ · {skipped} ⊘ · {failed} ✗\n**Duration:** {:.2}s\n**Run ID:** `{}`",
            if all_pass { "🟢 All Pass" } else { "🔴 Some Issues" },
            report.duration_sec,
            report.run_id
        )
    }));

    // Provider extension: surface which LLM backend the article
    // pipeline actually used this run.
    if let Some(provider) = report
        .outcomes
        .iter()
        .find_map(|o| o.result.metrics.get("provider").and_then(|v| v.as_str()))
    {
        elements.push(json!({
            "tag": "markdown",
            "content": format!("**🤖 LLM Provider:** {}", non_empty(provider, "unknown"))
        }));
    }

    push_section(
        &mut elements,
        report,
        ResultStatus::Ok,
        "✅ Successful Tasks",
        5,
        |o| {
            format!(
                "**{}** ({:.2}s)\n_{}_",
                non_empty(&o.definition.title, "Untitled"),
                o.result.duration_sec,
                truncate(&non_empty(&o.result.summary, "No summary"), 60)
            )
        },
    );
    push_section(
        &mut elements,
        report,
        ResultStatus::Skipped,
        "⊘ Skipped Tasks",
        3,
        |o| {
            format!(
                "**{}**\n_{}_",
                non_empty(&o.definition.title, "Untitled"),
                truncate(&non_empty(&o.result.summary, "No reason"), 80)
            )
        },
    );
    push_section(
        &mut elements,
        report,
        ResultStatus::Failed,
        "❌ Failed Tasks",
        5,
        |o| {
            format!(
                "**{}**\n_❌ {}_",
                non_empty(&o.definition.title, "Untitled"),
                truncate(
                    &non_empty(o.result.error.as_deref().unwrap_or(""), "Unknown error"),
                    80
                )
            )
        },
    );

    json!({
        "msg_type": "interactive",
        "card": { "elements": elements }
    })
}

fn push_section(
    elements: &mut Vec<Value>,
    report: &RunReport,
    status: ResultStatus,
    header: &str,
    cap: usize,
    row: impl Fn(&TaskOutcome) -> String,
) {
    let matching: Vec<&TaskOutcome> = report
        .outcomes
        .iter()
        .filter(|o| o.result.status == status)
        .collect();
    if matching.is_empty() {
        return;
    }
    elements.push(json!({
        "tag": "markdown",
        "content": format!("**{header} ({})**", matching.len())
    }));
    for outcome in matching.iter().take(cap) {
        elements.push(json!({ "tag": "markdown", "content": row(outcome) }));
    }
    if matching.len() > cap {
        elements.push(json!({
            "tag": "markdown",
            "content": format!("_... and {} more_", matching.len() - cap)
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{Frequency, TaskDefinition, TaskResult};
    use chrono::Utc;
    use serde_json::Map;

    fn outcome(id: &str, title: &str, result: TaskResult) -> TaskOutcome {
        TaskOutcome {
            definition: TaskDefinition {
                id: id.into(),
                title: title.into(),
                enabled: true,
                frequency: Frequency::Daily,
                timezone: "UTC".into(),
                params: Map::new(),
            },
            result,
            persist: true,
        }
    }

    fn report(outcomes: Vec<TaskOutcome>) -> RunReport {
        RunReport {
            run_id: "run-test".into(),
            started_at: Utc::now(),
            duration_sec: 1.25,
            total_tasks: outcomes.len(),
            outcomes,
        }
    }

    fn card_text(card: &Value) -> String {
        card["card"]["elements"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["content"].as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn empty_run_still_renders_card() {
        let card = build_summary_card(&report(vec![]));
        let text = card_text(&card);
        assert!(text.contains("0 ✓ · 0 ⊘ · 0 ✗"));
        assert!(text.contains("All Pass"));
    }

    #[test]
    fn counts_and_sections() {
        let card = build_summary_card(&report(vec![
            outcome("a", "Alpha", TaskResult::ok("did things")),
            outcome("b", "Beta", TaskResult::failed("broke", "boom")),
            outcome("c", "Gamma", TaskResult::skipped("no key")),
        ]));
        let text = card_text(&card);
        assert!(text.contains("1 ✓ · 1 ⊘ · 1 ✗"));
        assert!(text.contains("Some Issues"));
        assert!(text.contains("✅ Successful Tasks (1)"));
        assert!(text.contains("⊘ Skipped Tasks (1)"));
        assert!(text.contains("❌ Failed Tasks (1)"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn null_fields_get_defaults() {
        let mut failed = TaskResult::failed("", "");
        failed.error = None;
        let card = build_summary_card(&report(vec![outcome("x", "", failed)]));
        let text = card_text(&card);
        assert!(text.contains("Untitled"));
        assert!(text.contains("Unknown error"));
    }

    #[test]
    fn provider_extension_row() {
        let mut result = TaskResult::ok("2 articles");
        result
            .metrics
            .insert("provider".into(), serde_json::json!("dry_run"));
        let card = build_summary_card(&report(vec![outcome("art", "Articles", result)]));
        assert!(card_text(&card).contains("**🤖 LLM Provider:** dry_run"));
    }

    #[test]
    fn alert_card_mentions_user() {
        let o = outcome("a", "Alpha", TaskResult::failed("broke", "boom"));
        let card = build_alert_card(&o, "ou_123", "run-1");
        let text = card_text(&card);
        assert!(text.contains("Task Failed: Alpha"));
        assert!(text.contains("boom"));
        assert!(text.contains("<at user_id=\"ou_123\"></at>"));

        let card = build_alert_card(&o, "", "run-1");
        assert!(!card_text(&card).contains("<at"));
    }

    #[test]
    fn long_error_is_capped_in_rows() {
        let long = "e".repeat(500);
        let o = outcome("a", "Alpha", TaskResult::failed("broke", long));
        let card = build_summary_card(&report(vec![o]));
        let text = card_text(&card);
        // Row cap is 80 chars; the raw 500-char error never appears
        assert!(!text.contains(&"e".repeat(100)));
    }

    #[tokio::test]
    async fn unconfigured_webhook_dispatch_succeeds() {
        let notifier = WebhookNotifier::from_config(&AgentConfig::default());
        assert!(notifier.dispatch(&report(vec![])).await);
    }
}
