//! # Minder Providers
//!
//! LLM provider clients for article generation.
//!
//! All remote providers (Groq, OpenAI) share one
//! `OpenAiCompatibleProvider`; `DryRunProvider` is the zero-cost
//! mock that terminates the fallback chain. The `ProviderFactory`
//! trait exists so handlers receive providers by injection — tests
//! supply fakes instead of patching lookups.

pub mod chain;
pub mod dry_run;
pub mod error;
pub mod openai_compatible;
pub mod registry;

use async_trait::async_trait;
use minder_core::AgentConfig;

pub use chain::{complete_with_fallback, ChainFailure, Completion, SkipReason};
pub use dry_run::DryRunProvider;
pub use error::ProviderError;
pub use openai_compatible::OpenAiCompatibleProvider;

/// A text-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Constructs providers by id. Injected into handlers so tests can
/// substitute fakes.
pub trait ProviderFactory: Send + Sync {
    fn acquire(&self, provider_id: &str) -> Result<Box<dyn LlmProvider>, ProviderError>;
}

/// Check that a configured provider id names a known backend. Run
/// at startup so a typo in `LLM_PROVIDER` aborts the batch instead
/// of silently skipping every article.
pub fn validate_provider_id(provider_id: &str) -> Result<(), ProviderError> {
    if provider_id == "dry_run" || registry::get_provider_spec(provider_id).is_some() {
        Ok(())
    } else {
        Err(ProviderError::Api {
            provider: provider_id.into(),
            message: format!("unknown provider: {provider_id}"),
            retriable: false,
        })
    }
}

/// Factory backed by the agent configuration (credentials + models).
pub struct EnvProviderFactory {
    groq_api_key: String,
    groq_model: String,
    openai_api_key: String,
    openai_model: String,
}

impl EnvProviderFactory {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            groq_api_key: config.groq_api_key.clone(),
            groq_model: config.groq_model.clone(),
            openai_api_key: config.openai_api_key.clone(),
            openai_model: config.openai_model.clone(),
        }
    }
}

impl ProviderFactory for EnvProviderFactory {
    fn acquire(&self, provider_id: &str) -> Result<Box<dyn LlmProvider>, ProviderError> {
        match provider_id {
            "dry_run" => Ok(Box::new(DryRunProvider::new())),
            "groq" | "openai" => {
                let (key, model) = if provider_id == "groq" {
                    (&self.groq_api_key, &self.groq_model)
                } else {
                    (&self.openai_api_key, &self.openai_model)
                };
                if key.trim().is_empty() {
                    return Err(ProviderError::MissingApiKey {
                        provider: provider_id.into(),
                    });
                }
                let spec = registry::get_provider_spec(provider_id).ok_or_else(|| {
                    ProviderError::Api {
                        provider: provider_id.into(),
                        message: "not in provider registry".into(),
                        retriable: false,
                    }
                })?;
                tracing::info!("🤖 initialized {provider_id} client (model: {model})");
                Ok(Box::new(OpenAiCompatibleProvider::from_spec(spec, key, model)))
            }
            other => Err(ProviderError::Api {
                provider: other.into(),
                message: format!("unknown provider: {other}"),
                retriable: false,
            }),
        }
    }
}
