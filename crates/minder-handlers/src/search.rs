//! Search enrichment — fetches snippets for a keyword so articles
//! can cite real sources. Backed by the serper.dev API.
//!
//! Absence of an API key is not an error: callers get no client and
//! the pipeline proceeds with empty context.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One search hit used as article context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

pub struct SearchClient {
    api_key: String,
    client: reqwest::Client,
}

impl SearchClient {
    /// Returns `None` when no key is configured.
    pub fn new(api_key: &str) -> Option<Self> {
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchSnippet>, String> {
        let payload = json!({ "q": query, "num": limit.min(100) });
        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(std::time::Duration::from_secs(15))
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("search request: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("search returned {}", resp.status()));
        }
        let body: Value = resp.json().await.map_err(|e| format!("search decode: {e}"))?;

        let results: Vec<SearchSnippet> = body["organic"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .take(limit)
                    .map(|item| SearchSnippet {
                        title: item["title"].as_str().unwrap_or_default().to_string(),
                        url: item["link"].as_str().unwrap_or_default().to_string(),
                        snippet: item["snippet"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!("🔍 {} results for '{query}'", results.len());
        Ok(results)
    }

    /// First image candidate for a query, if any.
    pub async fn image_search(&self, query: &str) -> Result<Option<ImageCandidate>, String> {
        let resp = self
            .client
            .post("https://google.serper.dev/images")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(std::time::Duration::from_secs(15))
            .json(&json!({ "q": query, "num": 5 }))
            .send()
            .await
            .map_err(|e| format!("image search request: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("image search returned {}", resp.status()));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("image search decode: {e}"))?;

        let candidate = body["images"].as_array().and_then(|arr| {
            arr.iter().find_map(|item| {
                let url = item["imageUrl"].as_str()?;
                Some(ImageCandidate {
                    url: url.to_string(),
                    source_url: item["link"].as_str().unwrap_or_default().to_string(),
                    site_name: item["source"].as_str().unwrap_or_default().to_string(),
                })
            })
        });
        Ok(candidate)
    }

    /// Download raw image bytes, rejecting anything that does not
    /// look like an image.
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>, String> {
        let resp = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| format!("image download: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("image download returned {}", resp.status()));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| format!("image read: {e}"))?
            .to_vec();
        let is_png = bytes.starts_with(&[0x89, b'P', b'N', b'G']);
        let is_jpeg = bytes.starts_with(&[0xff, 0xd8, 0xff]);
        if !is_png && !is_jpeg {
            return Err("downloaded bytes are not PNG/JPEG".into());
        }
        Ok(bytes)
    }
}

/// An image hit with attribution.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub url: String,
    pub source_url: String,
    pub site_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_yields_no_client() {
        assert!(SearchClient::new("").is_none());
        assert!(SearchClient::new("   ").is_none());
        assert!(SearchClient::new("sk-123").is_some());
    }
}
