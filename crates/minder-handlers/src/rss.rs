//! RSS feed watcher — reports recent items from one or more feeds.
//!
//! Feeds are parsed with lightweight string scanning (no XML crate),
//! which covers the `<item><title>/<link>/<pubDate>` shape every
//! real-world feed emits, CDATA included.

use async_trait::async_trait;
use serde_json::{json, Map};

use minder_core::util::truncate;
use minder_scheduler::{TaskDefinition, TaskHandler, TaskResult};

use crate::article::parse_string_list;

/// One entry pulled out of a feed.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published: String,
}

pub struct RssWatchHandler {
    client: reqwest::Client,
}

impl RssWatchHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for RssWatchHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHandler for RssWatchHandler {
    async fn run(&self, def: &TaskDefinition) -> TaskResult {
        let feed_urls = {
            let primary = parse_string_list(def.params.get("feed_urls"));
            if primary.is_empty() {
                parse_string_list(def.params.get("feed_url"))
            } else {
                primary
            }
        };
        if feed_urls.is_empty() {
            return TaskResult::failed(
                "missing parameter",
                "rss_watch requires 'feed_urls' or 'feed_url' parameter",
            );
        }
        let max_items = def
            .params
            .get("max_items")
            .and_then(|v| v.as_u64())
            .unwrap_or(3) as usize;

        let mut items = Vec::new();
        let mut first_error: Option<String> = None;

        for url in &feed_urls {
            match self.fetch_feed(url).await {
                Ok(feed_items) => items.extend(feed_items.into_iter().take(max_items)),
                Err(e) => {
                    tracing::error!("✗ feed {url}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        let mut metrics = Map::new();
        metrics.insert("feeds".into(), json!(feed_urls.len()));
        metrics.insert("items".into(), json!(items.len()));

        if items.is_empty() {
            if let Some(error) = first_error {
                return TaskResult::failed("RSS watch failed", error)
                    .with_retriable(true)
                    .with_metrics(metrics);
            }
            return TaskResult::ok(format!("No new items in {} feed(s)", feed_urls.len()))
                .with_metrics(metrics);
        }

        let mut summary_lines = vec![format!("Found {} new items:", items.len())];
        for item in items.iter().take(max_items) {
            summary_lines.push(format!("• {}", truncate(&item.title, 60)));
        }
        TaskResult::ok(summary_lines.join("\n")).with_metrics(metrics)
    }
}

impl RssWatchHandler {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedItem>, String> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", "minder-agent/0.4")
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| format!("fetch: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let xml = resp.text().await.map_err(|e| format!("read: {e}"))?;
        Ok(parse_feed_items(&xml))
    }
}

/// Extract `<item>` entries from an RSS document.
pub fn parse_feed_items(xml: &str) -> Vec<FeedItem> {
    let mut items = Vec::new();
    for segment in xml.split("<item").skip(1) {
        let segment = match segment.split_once('>') {
            Some((_, rest)) => rest,
            None => continue,
        };
        let segment = segment.split("</item>").next().unwrap_or(segment);
        let title = tag_text(segment, "title").unwrap_or_else(|| "Untitled".into());
        let link = tag_text(segment, "link").unwrap_or_default();
        let published = tag_text(segment, "pubDate").unwrap_or_default();
        items.push(FeedItem {
            title,
            link,
            published,
        });
    }
    items
}

/// Inner text of the first `<tag>...</tag>`, unwrapping CDATA.
fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let start = xml.find(&open)?;
    let rest = &xml[start..];
    let content_start = rest.find('>')? + 1;
    let content = &rest[content_start..];
    let end = content.find(&close)?;
    let mut text = content[..end].trim();
    if let Some(inner) = text
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
    {
        text = inner.trim();
    }
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minder_scheduler::{Frequency, ResultStatus};

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Feed</title>
  <item>
    <title><![CDATA[First Post]]></title>
    <link>https://example.com/1</link>
    <pubDate>Sat, 01 Aug 2026 10:00:00 GMT</pubDate>
  </item>
  <item>
    <title>Second Post</title>
    <link>https://example.com/2</link>
  </item>
</channel></rss>"#;

    #[test]
    fn parses_items_and_cdata() {
        let items = parse_feed_items(FEED);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First Post");
        assert_eq!(items[0].link, "https://example.com/1");
        assert!(items[0].published.contains("2026"));
        assert_eq!(items[1].title, "Second Post");
        assert!(items[1].published.is_empty());
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(parse_feed_items("<rss></rss>").is_empty());
    }

    #[tokio::test]
    async fn missing_feed_urls_fails_fast() {
        let def = TaskDefinition {
            id: "rss_watch".into(),
            title: "RSS".into(),
            enabled: true,
            frequency: Frequency::Hourly,
            timezone: "UTC".into(),
            params: Map::new(),
        };
        let result = RssWatchHandler::new().run(&def).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert!(result.error.unwrap().contains("feed_urls"));
    }
}
