//! HTTP health check — verifies status code, latency, and an
//! optional body keyword for a configured URL.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Map};

use minder_scheduler::{TaskDefinition, TaskHandler, TaskResult};

pub struct HttpCheckHandler {
    client: reqwest::Client,
}

impl HttpCheckHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpCheckHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHandler for HttpCheckHandler {
    async fn run(&self, def: &TaskDefinition) -> TaskResult {
        let params = &def.params;
        let Some(url) = params.get("url").and_then(|v| v.as_str()) else {
            return TaskResult::failed(
                "missing parameter",
                "http_check requires 'url' parameter",
            );
        };
        let timeout_sec = params
            .get("timeout_sec")
            .and_then(|v| v.as_u64())
            .unwrap_or(10);
        let expected_status = params
            .get("expected_status")
            .and_then(|v| v.as_u64())
            .unwrap_or(200) as u16;
        let expected_keyword = params.get("expected_keyword").and_then(|v| v.as_str());
        let max_latency_sec = params.get("max_latency_sec").and_then(|v| v.as_f64());

        let started = Instant::now();
        let resp = match self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(timeout_sec))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return TaskResult::failed(
                    format!("✗ {url} timeout after {timeout_sec}s"),
                    "timeout",
                )
                .with_retriable(true)
            }
            Err(e) => {
                return TaskResult::failed(format!("✗ {url} connection failed"), e.to_string())
                    .with_retriable(true)
            }
        };

        let status = resp.status().as_u16();
        let latency_sec = started.elapsed().as_secs_f64();
        let mut metrics = Map::new();
        metrics.insert("status_code".into(), json!(status));
        metrics.insert("latency_sec".into(), json!(latency_sec));

        if status != expected_status {
            return TaskResult::failed(
                format!("✗ {url} returned {status} (expected {expected_status})"),
                format!("HTTP {status}"),
            )
            .with_metrics(metrics);
        }

        if let Some(max_latency) = max_latency_sec {
            if latency_sec > max_latency {
                return TaskResult::failed(
                    format!("✗ {url} latency {latency_sec:.2}s exceeded max {max_latency}s"),
                    format!("latency {latency_sec:.2}s > {max_latency}s"),
                )
                .with_metrics(metrics);
            }
        }

        if let Some(keyword) = expected_keyword {
            let body = resp.text().await.unwrap_or_default();
            if !body.contains(keyword) {
                return TaskResult::failed(
                    format!("✗ {url} missing keyword '{keyword}'"),
                    "keyword not found",
                )
                .with_metrics(metrics);
            }
        }

        TaskResult::ok(format!("✓ {url} → {status} ({latency_sec:.2}s)")).with_metrics(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minder_scheduler::{Frequency, ResultStatus};

    fn def(params: serde_json::Value) -> TaskDefinition {
        TaskDefinition {
            id: "http_check".into(),
            title: "Health".into(),
            enabled: true,
            frequency: Frequency::Every5Min,
            timezone: "UTC".into(),
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn missing_url_fails_fast() {
        let result = HttpCheckHandler::new().run(&def(json!({}))).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(
            result.error.as_deref(),
            Some("http_check requires 'url' parameter")
        );
        assert!(!result.retriable);
    }

    #[tokio::test]
    async fn unreachable_host_is_retriable() {
        // Reserved TEST-NET address; connection refused/unroutable
        let result = HttpCheckHandler::new()
            .run(&def(json!({ "url": "http://192.0.2.1:9/", "timeout_sec": 1 })))
            .await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert!(result.retriable);
    }
}
