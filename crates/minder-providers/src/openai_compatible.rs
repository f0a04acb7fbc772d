//! Unified OpenAI-compatible provider.
//!
//! A single struct handles chat completions for every provider with
//! an OpenAI-shaped API (Groq, OpenAI). Providers differ only by
//! endpoint URL and API key.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{classify_api_error, classify_transport_error, ProviderError};
use crate::registry::ProviderSpec;
use crate::LlmProvider;

pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    base_url: String,
    chat_path: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn from_spec(spec: &ProviderSpec, api_key: &str, model: &str) -> Self {
        Self {
            name: spec.name.to_string(),
            api_key: api_key.to_string(),
            base_url: spec.base_url.to_string(),
            chat_path: spec.chat_path.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey {
                provider: self.name.clone(),
            });
        }

        let body = json!({
            "model": self.model,
            "temperature": 0.7,
            "max_tokens": 1200,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });

        let url = format!("{}{}", self.base_url, self.chat_path);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(std::time::Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&self.name, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_api_error(&self.name, status.as_u16(), &text));
        }

        let json: Value = resp.json().await.map_err(|e| ProviderError::Transient {
            provider: self.name.clone(),
            message: format!("response decode: {e}"),
        })?;

        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| ProviderError::Api {
                provider: self.name.clone(),
                message: "no choices in response".into(),
                retriable: true,
            })?;

        tracing::debug!("🧠 {} completion: {} chars", self.name, content.len());
        Ok(content.trim().to_string())
    }
}
