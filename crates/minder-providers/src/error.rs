//! Provider error taxonomy.
//!
//! The split drives two different recoveries: retriable errors are
//! retried in place with backoff, non-retriable errors fall through
//! to the next provider in the chain without retrying.

use minder_core::AgentError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Credential not configured or rejected. Retrying the same
    /// provider cannot succeed.
    #[error("[{provider}] API key not configured")]
    MissingApiKey { provider: String },

    /// Quota exhausted or billing issue.
    #[error("[{provider}] insufficient quota / billing issue")]
    InsufficientQuota { provider: String },

    /// Rate limited. Worth backing off and retrying.
    #[error("[{provider}] rate limited")]
    RateLimit { provider: String },

    /// Network failure, timeout, or 5xx.
    #[error("[{provider}] transient error: {message}")]
    Transient { provider: String, message: String },

    /// Anything else the API returned.
    #[error("[{provider}] API error: {message}")]
    Api {
        provider: String,
        message: String,
        retriable: bool,
    },
}

impl ProviderError {
    pub fn retriable(&self) -> bool {
        match self {
            ProviderError::MissingApiKey { .. } | ProviderError::InsufficientQuota { .. } => false,
            ProviderError::RateLimit { .. } | ProviderError::Transient { .. } => true,
            ProviderError::Api { retriable, .. } => *retriable,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            ProviderError::MissingApiKey { provider }
            | ProviderError::InsufficientQuota { provider }
            | ProviderError::RateLimit { provider }
            | ProviderError::Transient { provider, .. }
            | ProviderError::Api { provider, .. } => provider,
        }
    }

    /// Stable kind tag for item-level metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::MissingApiKey { .. } => "missing_api_key",
            ProviderError::InsufficientQuota { .. } => "insufficient_quota",
            ProviderError::RateLimit { .. } => "rate_limit",
            ProviderError::Transient { .. } => "transient",
            ProviderError::Api { .. } => "api_error",
        }
    }
}

/// Provider failures that escape to the kernel (startup validation,
/// not per-item handling) travel as the kernel's `Provider` variant.
impl From<ProviderError> for AgentError {
    fn from(e: ProviderError) -> Self {
        AgentError::Provider(e.to_string())
    }
}

/// Map an HTTP status + response body into the taxonomy.
pub fn classify_api_error(provider: &str, status: u16, body: &str) -> ProviderError {
    let lower = body.to_lowercase();
    if lower.contains("insufficient_quota") || lower.contains("billing") || lower.contains("quota")
    {
        return ProviderError::InsufficientQuota {
            provider: provider.into(),
        };
    }
    if status == 401 || lower.contains("invalid_api_key") || lower.contains("unauthorized") {
        return ProviderError::MissingApiKey {
            provider: provider.into(),
        };
    }
    if status == 429 || lower.contains("rate_limit") {
        return ProviderError::RateLimit {
            provider: provider.into(),
        };
    }
    if status >= 500 {
        return ProviderError::Transient {
            provider: provider.into(),
            message: format!("HTTP {status}"),
        };
    }
    ProviderError::Api {
        provider: provider.into(),
        message: format!("HTTP {status}: {}", minder_core::util::truncate(body, 200)),
        retriable: true,
    }
}

/// Map a reqwest transport failure into the taxonomy.
pub fn classify_transport_error(provider: &str, e: &reqwest::Error) -> ProviderError {
    ProviderError::Transient {
        provider: provider.into(),
        message: e.to_string(),
    }
}
