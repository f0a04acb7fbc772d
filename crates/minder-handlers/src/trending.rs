//! Trending watch — probes the GitHub trending page and reports the
//! repositories currently listed. No official API exists, so the
//! page is scanned with the same lightweight string extraction the
//! other watchers use.

use async_trait::async_trait;
use serde_json::{json, Map};

use minder_scheduler::{TaskDefinition, TaskHandler, TaskResult};

pub struct TrendingWatchHandler {
    client: reqwest::Client,
}

impl TrendingWatchHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for TrendingWatchHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHandler for TrendingWatchHandler {
    async fn run(&self, def: &TaskDefinition) -> TaskResult {
        let language = def
            .params
            .get("language")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase();
        let max_items = def
            .params
            .get("max_items")
            .and_then(|v| v.as_u64())
            .unwrap_or(5) as usize;

        let mut url = "https://github.com/trending".to_string();
        if !language.is_empty() {
            url.push('/');
            url.push_str(&urlencoding::encode(&language));
        }

        let resp = match self
            .client
            .get(&url)
            .header(
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            )
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return TaskResult::failed("Trending watch failed", e.to_string())
                    .with_retriable(true)
            }
        };
        if !resp.status().is_success() {
            return TaskResult::failed(
                "Trending watch failed",
                format!("HTTP {}", resp.status()),
            )
            .with_retriable(true);
        }

        let html = resp.text().await.unwrap_or_default();
        let repos = parse_trending_repos(&html, max_items);

        let mut metrics = Map::new();
        metrics.insert("language".into(), json!(language));
        metrics.insert("repos_found".into(), json!(repos.len()));

        let scope = if language.is_empty() {
            "(all languages)".to_string()
        } else {
            format!("in {language}")
        };
        let mut summary = format!("GitHub Trending {scope}: monitoring active");
        if !repos.is_empty() {
            summary.push('\n');
            summary.push_str(
                &repos
                    .iter()
                    .map(|r| format!("• {r}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
        TaskResult::ok(summary).with_metrics(metrics)
    }
}

/// Pull `owner/repo` names out of the trending page's article
/// headings.
pub fn parse_trending_repos(html: &str, max: usize) -> Vec<String> {
    let mut repos = Vec::new();
    for segment in html.split("<article").skip(1) {
        if repos.len() >= max {
            break;
        }
        let Some(href_start) = segment.find("href=\"/") else {
            continue;
        };
        let rest = &segment[href_start + 7..];
        let Some(end) = rest.find('"') else { continue };
        let path = &rest[..end];
        // owner/repo, nothing deeper
        if path.matches('/').count() == 1 && !path.is_empty() {
            repos.push(path.to_string());
        }
    }
    repos
}
