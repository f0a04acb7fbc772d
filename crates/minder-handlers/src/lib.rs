//! # Minder Handlers
//!
//! Built-in task handlers. Each one parses its own `params`, does
//! its work, and reports through `TaskResult` — never by panicking.
//!
//! | task id            | handler                               |
//! |--------------------|---------------------------------------|
//! | `heartbeat`        | liveness beacon, always ok            |
//! | `http_check`       | URL status/latency/keyword check      |
//! | `rss_watch`        | recent items from RSS feeds           |
//! | `trending_watch`   | GitHub trending probe                 |
//! | `article_generate` | LLM article pipeline w/ fallback      |
//! | `content_batch`    | topic selection + styled articles     |

pub mod article;
pub mod content_batch;
pub mod heartbeat;
pub mod http_check;
pub mod images;
pub mod rss;
pub mod search;
pub mod topics;
pub mod trending;

use std::sync::Arc;

use minder_core::AgentConfig;
use minder_providers::ProviderFactory;
use minder_scheduler::HandlerRegistry;

pub use article::{ArticleGenerateHandler, ArticlePipeline};
pub use content_batch::ContentBatchHandler;
pub use heartbeat::HeartbeatHandler;
pub use http_check::HttpCheckHandler;
pub use images::{provide_cover_image, CoverImage, Material};
pub use rss::RssWatchHandler;
pub use search::{SearchClient, SearchSnippet};
pub use topics::TopicSelector;
pub use trending::TrendingWatchHandler;

/// Register every built-in handler under its task id.
pub fn register_builtins(
    registry: &mut HandlerRegistry,
    config: &AgentConfig,
    factory: Arc<dyn ProviderFactory>,
) {
    let pipeline = Arc::new(ArticlePipeline::new(factory, config));

    registry.register("heartbeat", Arc::new(HeartbeatHandler));
    registry.register("http_check", Arc::new(HttpCheckHandler::new()));
    registry.register("rss_watch", Arc::new(RssWatchHandler::new()));
    registry.register("trending_watch", Arc::new(TrendingWatchHandler::new()));
    registry.register(
        "article_generate",
        Arc::new(ArticleGenerateHandler::new(pipeline.clone())),
    );
    registry.register(
        "content_batch",
        Arc::new(ContentBatchHandler::new(pipeline, config.top_n)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use minder_providers::EnvProviderFactory;

    #[test]
    fn all_builtins_registered() {
        let config = AgentConfig::default();
        let mut registry = HandlerRegistry::new();
        register_builtins(
            &mut registry,
            &config,
            Arc::new(EnvProviderFactory::new(&config)),
        );
        for id in [
            "heartbeat",
            "http_check",
            "rss_watch",
            "trending_watch",
            "article_generate",
            "content_batch",
        ] {
            assert!(registry.get(id).is_some(), "missing handler: {id}");
        }
        assert_eq!(registry.len(), 6);
    }
}
