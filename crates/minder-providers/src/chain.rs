//! Provider fallback chain.
//!
//! Walks the configured providers in order. Non-retriable errors
//! (missing key, quota) fall straight through to the next provider;
//! retriable errors are retried in place with backoff and only then
//! fall through. The distinction survives to the caller: a chain
//! that died on retriable errors reports `Failed` (a later run may
//! recover), a chain where everything was skipped reports `Skipped`.

use crate::error::ProviderError;
use crate::ProviderFactory;

/// A successful completion, tagged with the provider that produced it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub provider: String,
    pub model: String,
}

/// Why an all-skipped chain produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingApiKey,
    QuotaExhausted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingApiKey => "missing_api_key",
            SkipReason::QuotaExhausted => "quota_exhausted",
        }
    }
}

/// Terminal outcome of a fully exhausted chain.
#[derive(Debug, Clone)]
pub enum ChainFailure {
    /// Every provider was skipped for a non-retriable reason.
    Skipped { reason: SkipReason },
    /// At least one provider exhausted its retries on a retriable
    /// error; retrying the whole task later may succeed.
    Failed { error: ProviderError },
}

/// Try each provider in `chain` until one returns content.
pub async fn complete_with_fallback(
    factory: &dyn ProviderFactory,
    chain: &[String],
    backoff: &[f64],
    system: &str,
    prompt: &str,
) -> Result<Completion, ChainFailure> {
    let mut retriable_exhausted: Option<ProviderError> = None;
    let mut saw_quota = false;

    for (idx, provider_id) in chain.iter().enumerate() {
        let provider = match factory.acquire(provider_id) {
            Ok(p) => p,
            Err(e) => {
                if matches!(e, ProviderError::InsufficientQuota { .. }) {
                    saw_quota = true;
                }
                tracing::warn!("⏭️ skipping provider {provider_id}: {e}");
                continue;
            }
        };

        let mut attempt = 0;
        loop {
            match provider.complete(system, prompt).await {
                Ok(content) => {
                    if idx > 0 {
                        tracing::info!("🔄 fallback: {} → {} (success)", chain[0], provider.name());
                    }
                    return Ok(Completion {
                        content,
                        provider: provider.name().to_string(),
                        model: provider.model().to_string(),
                    });
                }
                Err(e) if e.retriable() && attempt < backoff.len() => {
                    let wait = backoff[attempt];
                    tracing::warn!(
                        "⚠️ {} attempt {} failed ({e}), retrying in {wait}s",
                        provider.name(),
                        attempt + 1
                    );
                    tokio::time::sleep(std::time::Duration::from_secs_f64(wait)).await;
                    attempt += 1;
                }
                Err(e) if e.retriable() => {
                    tracing::warn!("⚠️ {} exhausted retries: {e}", provider.name());
                    retriable_exhausted = Some(e);
                    break;
                }
                Err(e) => {
                    if matches!(e, ProviderError::InsufficientQuota { .. }) {
                        saw_quota = true;
                    }
                    tracing::warn!("⏭️ {} non-retriable ({e}), trying next provider", provider.name());
                    break;
                }
            }
        }
    }

    match retriable_exhausted {
        Some(error) => Err(ChainFailure::Failed { error }),
        None => Err(ChainFailure::Skipped {
            reason: if saw_quota {
                SkipReason::QuotaExhausted
            } else {
                SkipReason::MissingApiKey
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LlmProvider, ProviderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FakeProvider {
        name: String,
        responses: Arc<dyn Fn(u32) -> Result<String, ProviderError> + Send + Sync>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }
        fn model(&self) -> &str {
            "fake"
        }
        async fn complete(&self, _s: &str, _p: &str) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.responses)(n)
        }
    }

    struct FakeFactory {
        missing: Vec<String>,
        behavior: Arc<dyn Fn(u32) -> Result<String, ProviderError> + Send + Sync>,
        calls: Arc<AtomicU32>,
    }

    impl crate::ProviderFactory for FakeFactory {
        fn acquire(&self, id: &str) -> Result<Box<dyn LlmProvider>, ProviderError> {
            if self.missing.iter().any(|m| m == id) {
                return Err(ProviderError::MissingApiKey { provider: id.into() });
            }
            if id == "dry_run" {
                return Ok(Box::new(crate::DryRunProvider::new()));
            }
            Ok(Box::new(FakeProvider {
                name: id.to_string(),
                responses: self.behavior.clone(),
                calls: self.calls.clone(),
            }))
        }
    }

    fn chain(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_key_falls_through_to_dry_run() {
        let factory = FakeFactory {
            missing: vec!["groq".into()],
            behavior: Arc::new(|_| unreachable!()),
            calls: Arc::new(AtomicU32::new(0)),
        };
        let got = complete_with_fallback(&factory, &chain(&["groq", "dry_run"]), &[], "s", "about \"ai\"")
            .await
            .unwrap();
        assert_eq!(got.provider, "dry_run");
        assert!(got.content.contains("ai"));
    }

    #[tokio::test]
    async fn all_missing_reports_skipped() {
        let factory = FakeFactory {
            missing: vec!["groq".into(), "openai".into()],
            behavior: Arc::new(|_| unreachable!()),
            calls: Arc::new(AtomicU32::new(0)),
        };
        let err = complete_with_fallback(&factory, &chain(&["groq", "openai"]), &[], "s", "p")
            .await
            .unwrap_err();
        match err {
            ChainFailure::Skipped { reason } => assert_eq!(reason, SkipReason::MissingApiKey),
            other => panic!("expected skipped, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retriable_exhaustion_reports_failed() {
        let factory = FakeFactory {
            missing: vec![],
            behavior: Arc::new(|_| {
                Err(ProviderError::RateLimit {
                    provider: "groq".into(),
                })
            }),
            calls: Arc::new(AtomicU32::new(0)),
        };
        let err = complete_with_fallback(&factory, &chain(&["groq"]), &[0.0, 0.0], "s", "p")
            .await
            .unwrap_err();
        assert!(matches!(err, ChainFailure::Failed { .. }));
        // initial attempt + two retries
        assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retriable_error_recovers_within_provider() {
        let factory = FakeFactory {
            missing: vec![],
            behavior: Arc::new(|n| {
                if n == 0 {
                    Err(ProviderError::Transient {
                        provider: "groq".into(),
                        message: "reset".into(),
                    })
                } else {
                    Ok("# Title\n\nbody".into())
                }
            }),
            calls: Arc::new(AtomicU32::new(0)),
        };
        let got = complete_with_fallback(&factory, &chain(&["groq"]), &[0.0], "s", "p")
            .await
            .unwrap();
        assert_eq!(got.provider, "groq");
    }

    #[tokio::test]
    async fn quota_wins_skip_reason() {
        let factory = FakeFactory {
            missing: vec!["openai".into()],
            behavior: Arc::new(|_| {
                Err(ProviderError::InsufficientQuota {
                    provider: "groq".into(),
                })
            }),
            calls: Arc::new(AtomicU32::new(0)),
        };
        let err = complete_with_fallback(&factory, &chain(&["groq", "openai"]), &[], "s", "p")
            .await
            .unwrap_err();
        match err {
            ChainFailure::Skipped { reason } => assert_eq!(reason, SkipReason::QuotaExhausted),
            other => panic!("expected skipped, got {other:?}"),
        }
    }
}
