//! Article generation pipeline.
//!
//! Per keyword: optional search enrichment, a walk down the LLM
//! provider chain, markdown + metadata artifact writing, and the
//! cover image sub-step. Keyword-level outcomes aggregate into the
//! task-level status: any success wins, an all-skipped run is
//! skipped, and a retriable-exhausted item makes the whole task a
//! retriable failure so the next run can recover.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};

use minder_core::util::{slugify, word_count};
use minder_core::AgentConfig;
use minder_providers::{complete_with_fallback, ChainFailure, ProviderFactory};
use minder_scheduler::{TaskDefinition, TaskHandler, TaskResult};

use crate::images::{provide_cover_image, CoverImage, Material};
use crate::search::{SearchClient, SearchSnippet};

const SYSTEM_PROMPT: &str =
    "You are a professional editor writing factual, well-researched articles.";

/// Everything needed to turn one keyword into an article on disk.
pub struct ArticlePipeline {
    factory: Arc<dyn ProviderFactory>,
    chain: Vec<String>,
    backoff: Vec<f64>,
    search: Option<SearchClient>,
    output_root: PathBuf,
}

/// Outcome for a single (keyword, style) work item.
pub enum ItemOutcome {
    Success(ArticleRecord),
    Skipped {
        keyword: String,
        reason: String,
    },
    Failed {
        keyword: String,
        kind: String,
        message: String,
        retriable: bool,
    },
}

/// A successfully written article.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub keyword: String,
    pub title: String,
    pub path: String,
    pub word_count: usize,
    pub provider: String,
    pub model: String,
    pub sources_count: usize,
    pub image: CoverImage,
}

impl ArticlePipeline {
    pub fn new(factory: Arc<dyn ProviderFactory>, config: &AgentConfig) -> Self {
        Self {
            factory,
            chain: config.provider_chain(),
            backoff: config.retry_backoff.clone(),
            search: SearchClient::new(&config.search_api_key),
            output_root: PathBuf::from(&config.output_root),
        }
    }

    /// Override the provider order (tests, batch variants).
    pub fn with_chain(mut self, chain: Vec<String>) -> Self {
        self.chain = chain;
        self
    }

    pub fn output_root(&self) -> &PathBuf {
        &self.output_root
    }

    /// Run the full per-keyword pipeline and materialize artifacts.
    pub async fn generate_item(
        &self,
        keyword: &str,
        language: &str,
        style: Option<&str>,
    ) -> ItemOutcome {
        // Step 1: optional search enrichment. No key → empty context;
        // a failing search is logged and also yields empty context.
        let snippets = match &self.search {
            Some(search) => match search.search(keyword, 5).await {
                Ok(snippets) => snippets,
                Err(e) => {
                    tracing::warn!("⚠️ search failed for '{keyword}': {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let key_points: Vec<String> = snippets
            .iter()
            .filter_map(|s| {
                let first = s.snippet.split(". ").next().unwrap_or("").trim();
                if first.is_empty() {
                    None
                } else {
                    Some(first.to_string())
                }
            })
            .take(6)
            .collect();

        // Step 2: provider chain.
        let prompt = build_prompt(keyword, language, &snippets, style);
        let completion = match complete_with_fallback(
            &*self.factory,
            &self.chain,
            &self.backoff,
            SYSTEM_PROMPT,
            &prompt,
        )
        .await
        {
            Ok(completion) => completion,
            Err(ChainFailure::Skipped { reason }) => {
                return ItemOutcome::Skipped {
                    keyword: keyword.to_string(),
                    reason: reason.as_str().to_string(),
                }
            }
            Err(ChainFailure::Failed { error }) => {
                return ItemOutcome::Failed {
                    keyword: keyword.to_string(),
                    kind: error.kind().to_string(),
                    message: error.to_string(),
                    retriable: true,
                }
            }
        };

        // Step 3: render and write artifacts.
        let title = extract_title(&completion.content)
            .unwrap_or_else(|| keyword.to_string());
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let day_dir = self.output_root.join(&date);
        if let Err(e) = std::fs::create_dir_all(&day_dir) {
            return io_failure(keyword, format!("create {}: {e}", day_dir.display()));
        }

        let mut slug = slugify(&title, 60);
        if slug.is_empty() {
            slug = slugify(keyword, 60);
        }
        if slug.is_empty() {
            slug = "article".into();
        }
        if let Some(style) = style {
            slug = format!("{slug}-{}", slugify(style, 20));
        }

        let md_path = day_dir.join(format!("{slug}.md"));
        if let Err(e) = std::fs::write(&md_path, &completion.content) {
            return io_failure(keyword, format!("write {}: {e}", md_path.display()));
        }

        let words = word_count(&completion.content, language);

        // Step 4: cover image.
        let material = Material {
            sources: Some(snippets.clone()),
            key_points,
        };
        let image = provide_cover_image(
            Some(&material),
            self.search.as_ref(),
            keyword,
            &day_dir,
            &slug,
        )
        .await;

        let metadata = json!({
            "title": title,
            "keyword": keyword,
            "language": language,
            "word_count": words,
            "provider": completion.provider,
            "model": completion.model,
            "sources": snippets,
            "created_at": Utc::now().to_rfc3339(),
            "file_path": md_path.display().to_string(),
            "image": image,
        });
        let json_path = day_dir.join(format!("{slug}.json"));
        let pretty = match serde_json::to_string_pretty(&metadata) {
            Ok(pretty) => pretty,
            Err(e) => return io_failure(keyword, format!("metadata encode: {e}")),
        };
        if let Err(e) = std::fs::write(&json_path, pretty) {
            return io_failure(keyword, format!("write {}: {e}", json_path.display()));
        }

        tracing::info!(
            "✅ generated '{title}' ({words} words, {})",
            completion.provider
        );
        ItemOutcome::Success(ArticleRecord {
            keyword: keyword.to_string(),
            title,
            path: md_path.display().to_string(),
            word_count: words,
            provider: completion.provider,
            model: completion.model,
            sources_count: snippets.len(),
            image,
        })
    }
}

fn io_failure(keyword: &str, message: String) -> ItemOutcome {
    tracing::error!("✗ article io failure for '{keyword}': {message}");
    ItemOutcome::Failed {
        keyword: keyword.to_string(),
        kind: "io".into(),
        message,
        retriable: false,
    }
}

/// First `#` heading, however deep.
fn extract_title(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let trimmed = line.trim_start();
        let stripped = trimmed.trim_start_matches('#');
        if stripped.len() != trimmed.len() {
            let title = stripped.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
        None
    })
}

fn style_profile(style: Option<&str>) -> (&'static str, usize, usize) {
    match style {
        Some("wechat") => ("structured long-form with title, intro, body, conclusion", 800, 1200),
        Some("xiaohongshu") => ("casual note with a hook, short points, and a closing question", 300, 600),
        _ => ("professional article with title, introduction, body, conclusion", 600, 800),
    }
}

fn build_prompt(
    keyword: &str,
    language: &str,
    snippets: &[SearchSnippet],
    style: Option<&str>,
) -> String {
    let (tone, min_words, max_words) = style_profile(style);

    let mut source_text = String::new();
    for (i, s) in snippets.iter().take(5).enumerate() {
        source_text.push_str(&format!(
            "{}. [{}]({})\n   {}\n\n",
            i + 1,
            s.title,
            s.url,
            s.snippet
        ));
    }

    if language.starts_with("zh") {
        let mut prompt = format!(
            "为关键词\"{keyword}\"写一篇 {min_words}-{max_words} 字的中文文章。\n\n"
        );
        if !source_text.is_empty() {
            prompt.push_str(&format!("搜索结果：\n{source_text}\n"));
            prompt.push_str("要求：\n1. 完全基于搜索结果的信息，不要编造数据\n2. 无法确定的信息用\"据称\"、\"据报道\"等措辞\n3. 文章末尾列出 3-5 个参考链接\n");
        } else {
            prompt.push_str("要求：\n1. 基于一般知识和常见认知进行创作\n");
        }
        prompt.push_str(&format!(
            "4. 使用 Markdown 格式，第一行为 # 标题\n5. 风格：{tone}\n6. 专业、客观的语态\n"
        ));
        prompt
    } else {
        let mut prompt = format!(
            "Write a {min_words}-{max_words} word English article about \"{keyword}\".\n\n"
        );
        if !source_text.is_empty() {
            prompt.push_str(&format!("Search results:\n{source_text}\n"));
            prompt.push_str("Requirements:\n1. Base the article on the search results only, no fabrication\n2. Use \"reportedly\" or \"according to\" for uncertain claims\n3. End with 3-5 reference links\n");
        } else {
            prompt.push_str("Requirements:\n1. Base the article on general knowledge\n");
        }
        prompt.push_str(&format!(
            "4. Markdown format, first line is a # title\n5. Style: {tone}\n6. Professional and objective tone\n"
        ));
        prompt
    }
}

// ─── Handler ────────────────────────────────────────────────────

pub struct ArticleGenerateHandler {
    pipeline: Arc<ArticlePipeline>,
}

impl ArticleGenerateHandler {
    pub fn new(pipeline: Arc<ArticlePipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl TaskHandler for ArticleGenerateHandler {
    async fn run(&self, def: &TaskDefinition) -> TaskResult {
        let started = Instant::now();

        let keywords = parse_string_list(def.params.get("keywords"));
        if keywords.is_empty() {
            return TaskResult::failed("No keywords provided", "keywords param is empty");
        }
        let language = def
            .params
            .get("language")
            .and_then(|v| v.as_str())
            .unwrap_or("zh-CN")
            .to_string();
        let styles = parse_string_list(def.params.get("styles"));

        tracing::info!(
            "📝 article generation: {} keyword(s), language {language}",
            keywords.len()
        );

        let mut items = Vec::new();
        for keyword in &keywords {
            if styles.is_empty() {
                items.push(self.pipeline.generate_item(keyword, &language, None).await);
            } else {
                for style in &styles {
                    items.push(
                        self.pipeline
                            .generate_item(keyword, &language, Some(style))
                            .await,
                    );
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        aggregate_items(items, elapsed, &self.pipeline.chain)
    }
}

/// Fold item outcomes into the task-level result.
pub(crate) fn aggregate_items(
    items: Vec<ItemOutcome>,
    elapsed: f64,
    chain: &[String],
) -> TaskResult {
    let mut successful = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    let mut provider_used: Option<String> = None;
    let mut any_retriable = false;

    for item in items {
        match item {
            ItemOutcome::Success(rec) => {
                provider_used.get_or_insert_with(|| rec.provider.clone());
                successful.push(json!({
                    "keyword": rec.keyword,
                    "title": rec.title,
                    "path": rec.path,
                    "word_count": rec.word_count,
                    "provider": rec.provider,
                    "model": rec.model,
                    "sources_count": rec.sources_count,
                    "image_status": rec.image.image_status,
                }));
            }
            ItemOutcome::Skipped { keyword, reason } => {
                skipped.push(json!({ "keyword": keyword, "reason": reason }));
            }
            ItemOutcome::Failed {
                keyword,
                kind,
                message,
                retriable,
            } => {
                any_retriable |= retriable;
                failed.push(json!({ "keyword": keyword, "kind": kind, "message": message }));
            }
        }
    }

    let status_emoji;
    let mut result = if !successful.is_empty() {
        status_emoji = "✅";
        TaskResult::ok("")
    } else if failed.is_empty() && !skipped.is_empty() {
        status_emoji = "⊘";
        TaskResult::skipped("")
    } else {
        status_emoji = "❌";
        TaskResult::failed("", "article generation produced no articles")
            .with_retriable(any_retriable)
    };

    let provider = provider_used
        .clone()
        .or_else(|| chain.first().cloned())
        .unwrap_or_else(|| "unknown".into());

    let mut summary = format!(
        "{status_emoji} Article Generation Results\n• Successful: {}\n• Failed: {}\n• Skipped: {}\n• Time: {elapsed:.1}s\n• Provider: {provider}",
        successful.len(),
        failed.len(),
        skipped.len(),
    );
    if let Some(first_skip) = skipped.first().and_then(|s| s["reason"].as_str()) {
        if successful.is_empty() && failed.is_empty() {
            summary.push_str(&format!("\n• Reason skipped: {first_skip}"));
        }
    }
    result.summary = summary;

    let mut metrics = Map::new();
    metrics.insert("successful".into(), json!(successful.len()));
    metrics.insert("failed".into(), json!(failed.len()));
    metrics.insert("skipped".into(), json!(skipped.len()));
    metrics.insert("elapsed_seconds".into(), json!(elapsed));
    metrics.insert("provider".into(), Value::String(provider));
    metrics.insert("successful_items".into(), Value::Array(successful));
    metrics.insert("failed_items".into(), Value::Array(failed));
    metrics.insert("skipped_items".into(), Value::Array(skipped));
    result.metrics = metrics;
    result
}

/// Accept a single string or a list of strings.
pub(crate) fn parse_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minder_providers::{DryRunProvider, LlmProvider, ProviderError};
    use minder_scheduler::{Frequency, ResultStatus};
    use std::path::Path;

    struct FailingProvider {
        error: ProviderError,
    }

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            self.error.provider()
        }
        fn model(&self) -> &str {
            "fake"
        }
        async fn complete(&self, _s: &str, _p: &str) -> Result<String, ProviderError> {
            Err(self.error.clone())
        }
    }

    /// Fake factory: providers listed in `missing` have no key;
    /// `rate_limited` ones always 429; everything else is dry_run.
    struct FakeFactory {
        missing: Vec<&'static str>,
        rate_limited: Vec<&'static str>,
    }

    impl ProviderFactory for FakeFactory {
        fn acquire(&self, id: &str) -> Result<Box<dyn LlmProvider>, ProviderError> {
            if self.missing.contains(&id) {
                return Err(ProviderError::MissingApiKey { provider: id.into() });
            }
            if self.rate_limited.contains(&id) {
                return Ok(Box::new(FailingProvider {
                    error: ProviderError::RateLimit { provider: id.into() },
                }));
            }
            Ok(Box::new(DryRunProvider::new()))
        }
    }

    fn pipeline(factory: FakeFactory, chain: &[&str], tag: &str) -> ArticlePipeline {
        let dir = std::env::temp_dir().join(format!("minder-article-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        let mut config = AgentConfig::default();
        config.output_root = dir.display().to_string();
        config.retry_backoff = vec![];
        ArticlePipeline::new(Arc::new(factory), &config)
            .with_chain(chain.iter().map(|s| s.to_string()).collect())
    }

    fn def(params: Value) -> TaskDefinition {
        TaskDefinition {
            id: "article_generate".into(),
            title: "Articles".into(),
            enabled: true,
            frequency: Frequency::Daily,
            timezone: "UTC".into(),
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    fn cleanup(p: &ArticlePipeline) {
        std::fs::remove_dir_all(p.output_root()).ok();
    }

    #[tokio::test]
    async fn missing_groq_key_falls_back_to_dry_run() {
        let p = pipeline(
            FakeFactory { missing: vec!["groq"], rate_limited: vec![] },
            &["groq", "dry_run"],
            "fallback",
        );
        let handler = ArticleGenerateHandler::new(Arc::new(p));
        let result = handler
            .run(&def(json!({ "keywords": ["ai", "cloud"], "language": "en-US" })))
            .await;

        assert_eq!(result.status, ResultStatus::Ok);
        let items = result.metrics["successful_items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(result.metrics["provider"], "dry_run");

        // Both artifact pairs exist and the metadata parses
        for item in items {
            let md = Path::new(item["path"].as_str().unwrap());
            assert!(md.exists());
            let json_path = md.with_extension("json");
            let meta: Value =
                serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
            assert_eq!(meta["provider"], "dry_run");
            assert!(meta["word_count"].as_u64().unwrap() > 0);
        }
        cleanup(&handler.pipeline);
    }

    #[tokio::test]
    async fn all_keys_missing_skips_every_keyword() {
        let p = pipeline(
            FakeFactory { missing: vec!["groq"], rate_limited: vec![] },
            &["groq"],
            "total-skip",
        );
        let handler = ArticleGenerateHandler::new(Arc::new(p));
        let result = handler
            .run(&def(json!({ "keywords": ["ai", "cloud"] })))
            .await;

        assert_eq!(result.status, ResultStatus::Skipped);
        assert!(!result.retriable);
        let skipped = result.metrics["skipped_items"].as_array().unwrap();
        assert_eq!(skipped.len(), 2);
        for item in skipped {
            assert_eq!(item["reason"], "missing_api_key");
        }
        assert!(result.summary.contains("Reason skipped: missing_api_key"));
        cleanup(&handler.pipeline);
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_is_retriable_failure() {
        let p = pipeline(
            FakeFactory { missing: vec![], rate_limited: vec!["groq"] },
            &["groq"],
            "rate-limit",
        );
        let handler = ArticleGenerateHandler::new(Arc::new(p));
        let result = handler.run(&def(json!({ "keywords": ["ai"] }))).await;

        assert_eq!(result.status, ResultStatus::Failed);
        assert!(result.retriable);
        let failed = result.metrics["failed_items"].as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["kind"], "rate_limit");
        cleanup(&handler.pipeline);
    }

    #[tokio::test]
    async fn empty_keywords_fails_fast() {
        let p = pipeline(
            FakeFactory { missing: vec![], rate_limited: vec![] },
            &["dry_run"],
            "no-keywords",
        );
        let handler = ArticleGenerateHandler::new(Arc::new(p));
        let result = handler.run(&def(json!({}))).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("keywords param is empty"));
        assert!(!result.retriable);
        cleanup(&handler.pipeline);
    }

    #[tokio::test]
    async fn styles_multiply_artifacts() {
        let p = pipeline(
            FakeFactory { missing: vec![], rate_limited: vec![] },
            &["dry_run"],
            "styles",
        );
        let handler = ArticleGenerateHandler::new(Arc::new(p));
        let result = handler
            .run(&def(json!({
                "keywords": ["rust"],
                "language": "en-US",
                "styles": ["wechat", "xiaohongshu"]
            })))
            .await;
        assert_eq!(result.status, ResultStatus::Ok);
        let items = result.metrics["successful_items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        let paths: Vec<&str> = items.iter().map(|i| i["path"].as_str().unwrap()).collect();
        assert!(paths[0].contains("-wechat"));
        assert!(paths[1].contains("-xiaohongshu"));
        cleanup(&handler.pipeline);
    }

    #[tokio::test]
    async fn dry_run_artifacts_are_deterministic_modulo_timestamp() {
        let p = pipeline(
            FakeFactory { missing: vec![], rate_limited: vec![] },
            &["dry_run"],
            "determinism",
        );
        let handler = ArticleGenerateHandler::new(Arc::new(p));
        let params = json!({ "keywords": ["ai"], "language": "en-US" });

        let first = handler.run(&def(params.clone())).await;
        let path = first.metrics["successful_items"][0]["path"]
            .as_str()
            .unwrap()
            .to_string();
        let md_one = std::fs::read_to_string(&path).unwrap();
        let mut json_one: Value = serde_json::from_str(
            &std::fs::read_to_string(Path::new(&path).with_extension("json")).unwrap(),
        )
        .unwrap();

        let _second = handler.run(&def(params)).await;
        let md_two = std::fs::read_to_string(&path).unwrap();
        let mut json_two: Value = serde_json::from_str(
            &std::fs::read_to_string(Path::new(&path).with_extension("json")).unwrap(),
        )
        .unwrap();

        assert_eq!(md_one, md_two);
        // Timestamps are the only allowed variance
        json_one["created_at"] = Value::Null;
        json_two["created_at"] = Value::Null;
        assert_eq!(json_one, json_two);
        cleanup(&handler.pipeline);
    }

    #[test]
    fn title_extraction() {
        assert_eq!(extract_title("# Hello World\n\nbody"), Some("Hello World".into()));
        assert_eq!(extract_title("intro\n## Sub Title\n"), Some("Sub Title".into()));
        assert_eq!(extract_title("no headings"), None);
    }

    #[test]
    fn keyword_param_accepts_string_or_list() {
        assert_eq!(parse_string_list(Some(&json!("solo"))), vec!["solo"]);
        assert_eq!(
            parse_string_list(Some(&json!(["a", "b"]))),
            vec!["a", "b"]
        );
        assert!(parse_string_list(Some(&json!(""))).is_empty());
        assert!(parse_string_list(None).is_empty());
    }
}
