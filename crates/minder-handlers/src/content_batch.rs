//! Daily content batch — selects trending topics (capped by the
//! configured TOP_N), generates styled article variants for each,
//! and writes a per-day index of what was produced. The index also
//! feeds the cooldown filter on later runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use minder_scheduler::{TaskDefinition, TaskHandler, TaskResult};

use crate::article::{aggregate_items, parse_string_list, ArticlePipeline, ItemOutcome};
use crate::topics::{RecentTopic, TopicSelector};

pub struct ContentBatchHandler {
    pipeline: Arc<ArticlePipeline>,
    selector: TopicSelector,
    top_n: usize,
}

impl ContentBatchHandler {
    pub fn new(pipeline: Arc<ArticlePipeline>, top_n: usize) -> Self {
        Self {
            pipeline,
            selector: TopicSelector::new(),
            top_n,
        }
    }

    pub fn with_selector(mut self, selector: TopicSelector) -> Self {
        self.selector = selector;
        self
    }
}

#[async_trait]
impl TaskHandler for ContentBatchHandler {
    async fn run(&self, def: &TaskDefinition) -> TaskResult {
        let started = Instant::now();
        let params = &def.params;

        let mut seed_keywords = parse_string_list(params.get("seed_keywords"));
        if seed_keywords.is_empty() {
            seed_keywords = vec![
                "AI".into(),
                "Cloud Computing".into(),
                "Web Development".into(),
            ];
        }
        let requested = params
            .get("daily_quota")
            .and_then(|v| v.as_u64())
            .unwrap_or(3) as usize;
        let quota = requested.min(self.top_n).max(1);
        let geo = params.get("geo").and_then(|v| v.as_str()).unwrap_or("US");
        let cooldown_days = params
            .get("cooldown_days")
            .and_then(|v| v.as_i64())
            .unwrap_or(3);
        let language = params
            .get("language")
            .and_then(|v| v.as_str())
            .unwrap_or("zh-CN");
        let mut styles = parse_string_list(params.get("styles"));
        if styles.is_empty() {
            styles = vec!["wechat".into(), "xiaohongshu".into()];
        }

        let recent = load_recent_topics(self.pipeline.output_root(), cooldown_days);
        let topics = self
            .selector
            .select_topics(&seed_keywords, quota, geo, cooldown_days, &recent)
            .await;
        tracing::info!(
            "🗞️ content batch: {} topic(s) selected (quota {quota})",
            topics.len()
        );

        let mut items: Vec<ItemOutcome> = Vec::new();
        for topic in &topics {
            for style in &styles {
                items.push(
                    self.pipeline
                        .generate_item(&topic.topic, language, Some(style))
                        .await,
                );
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        let generated: Vec<&ItemOutcome> = items
            .iter()
            .filter(|i| matches!(i, ItemOutcome::Success(_)))
            .collect();
        let failed_count = items
            .iter()
            .filter(|i| matches!(i, ItemOutcome::Failed { .. }))
            .count();
        let generated_count = generated.len();

        // Per-day index: what was produced, and the cooldown record
        // for future runs.
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let day_dir = self.pipeline.output_root().join(&date);
        if std::fs::create_dir_all(&day_dir).is_ok() {
            let index = json!({
                "date": date,
                "generated_count": generated_count,
                "failed_count": failed_count,
                "topics": topics.iter().map(|t| t.topic.clone()).collect::<Vec<_>>(),
                "duration_sec": elapsed,
            });
            if let Ok(pretty) = serde_json::to_string_pretty(&index) {
                if let Err(e) = std::fs::write(day_dir.join("index.json"), pretty) {
                    tracing::warn!("⚠️ failed to write daily index: {e}");
                }
            }
        }

        let mut result = aggregate_items(items, elapsed, &[]);
        result.summary = format!(
            "Generated {} item(s) across {} topic(s) ({}), {} failed, time: {elapsed:.1}s",
            generated_count,
            topics.len(),
            styles.join("+"),
            failed_count,
        );
        result
            .metrics
            .insert("topics_selected".into(), json!(topics.len()));
        result.metrics.insert("quota".into(), json!(quota));
        result
    }
}

/// Topics covered in the last `cooldown_days` daily indexes.
fn load_recent_topics(output_root: &Path, cooldown_days: i64) -> Vec<RecentTopic> {
    let mut recent = Vec::new();
    let today = Utc::now().date_naive();
    for delta in 0..cooldown_days.max(0) {
        let date = today - Duration::days(delta);
        let path = output_root
            .join(date.format("%Y-%m-%d").to_string())
            .join("index.json");
        let Ok(raw) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Ok(index) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        if let Some(topics) = index["topics"].as_array() {
            for topic in topics.iter().filter_map(|t| t.as_str()) {
                recent.push(RecentTopic {
                    topic: topic.to_string(),
                    date,
                });
            }
        }
    }
    recent
}
