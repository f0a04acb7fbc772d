//! Dry-run provider — deterministic mock completions with no I/O.
//!
//! Terminal link of the fallback chain: it never fails, so a run
//! with no credentials still produces articles. The mock body is a
//! pure function of the prompt, which keeps repeated dry runs
//! byte-identical (timestamps are added later, outside the provider).
//! Search sources embedded in the prompt are carried into a
//! References section so mock articles still cite what was found.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::LlmProvider;

pub struct DryRunProvider;

impl DryRunProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DryRunProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for DryRunProvider {
    fn name(&self) -> &str {
        "dry_run"
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, ProviderError> {
        let topic = extract_quoted_topic(prompt).unwrap_or_else(|| "the topic".to_string());
        let sources = extract_prompt_sources(prompt);
        tracing::info!("🧪 dry_run mock article for: {topic} ({} sources)", sources.len());
        Ok(mock_article(&topic, &sources))
    }
}

/// Pull the first double-quoted phrase out of the prompt; article
/// prompts always quote the keyword.
fn extract_quoted_topic(prompt: &str) -> Option<String> {
    let start = prompt.find('"')? + 1;
    let rest = &prompt[start..];
    let end = rest.find('"')?;
    let topic = rest[..end].trim();
    if topic.is_empty() {
        None
    } else {
        Some(topic.to_string())
    }
}

/// Recover the numbered `N. [title](url)` source lines the article
/// prompt embeds for real providers, so the mock can cite them too.
fn extract_prompt_sources(prompt: &str) -> Vec<(String, String)> {
    let mut sources = Vec::new();
    for line in prompt.lines() {
        let line = line.trim_start();
        let Some(rest) = line
            .split_once(". [")
            .filter(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .map(|(_, rest)| rest)
        else {
            continue;
        };
        let Some((title, rest)) = rest.split_once("](") else {
            continue;
        };
        let Some((url, _)) = rest.split_once(')') else {
            continue;
        };
        if !title.is_empty() {
            sources.push((title.to_string(), url.to_string()));
        }
    }
    sources
}

fn mock_article(topic: &str, sources: &[(String, String)]) -> String {
    let mut markdown = format!(
        "# Understanding {topic}\n\n\
         ## Introduction\n\n\
         This article explores {topic} and its importance in today's world. \
         Understanding {topic} is crucial for professionals and organizations.\n\n\
         ## Body\n\n\
         {topic} is a significant subject that rewards careful study. Key aspects:\n\n\
         1. **Adoption**: {topic} has grown significantly in importance\n\
         2. **Investment**: organizations are increasingly focusing on {topic}\n\
         3. **Outlook**: the future of {topic} depends on several factors\n\n\
         ## Conclusion\n\n\
         {topic} continues to be an important area for development and innovation. \
         Stakeholders should stay informed about the latest developments.\n\n\
         ## References\n\n"
    );
    for (title, url) in sources {
        markdown.push_str(&format!("- [{title}]({url})\n"));
    }
    markdown
}
