use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{AtelierError, Result};
use crate::prompt::Message;

/// Per-call completion parameters, taken from the session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw provider output: the completion text plus token usage when the
/// provider reports it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub total_tokens: Option<u32>,
}

/// The one operation the generation pipeline needs from a provider.
/// [`LlmService`] is the production implementation; tests substitute stubs.
pub trait CompletionBackend: Send + Sync {
    fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> impl std::future::Future<Output = Result<Completion>> + Send;
}

/// Completion client for the configured provider. Constructed once at
/// startup and passed into the operations that need it; issues exactly one
/// network call per `complete` and never retries — regeneration is a
/// user-initiated replay, not an error-driven retry.
pub struct LlmService {
    provider: Provider,
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.provider)
            .field("model", &self.config.model)
            .finish()
    }
}

#[derive(Debug)]
enum Provider {
    /// Direct OpenAI API.
    OpenAi,
    /// OpenAI-compatible gateway (openrouter.ai). Same request shape,
    /// different base URL and attribution headers.
    OpenRouter,
}

impl LlmService {
    /// Create a completion client from configuration. Fails with a
    /// configuration error when the provider is unknown or no API key is
    /// available; callers treat that as "AI features disabled" rather than
    /// fatal for the whole app.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "openai" => Provider::OpenAi,
            "openrouter" => Provider::OpenRouter,
            other => {
                return Err(AtelierError::Config(format!(
                    "unknown LLM provider: '{other}' (expected 'openai' or 'openrouter')"
                )));
            }
        };

        let api_key = match provider {
            Provider::OpenAi => resolve_api_key(config, "OPENAI_API_KEY")?,
            Provider::OpenRouter => resolve_api_key(config, "OPENROUTER_API_KEY")?,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AtelierError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            provider,
            config: config.clone(),
            api_key,
            client,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.config.model
    }

    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
        }
    }

    fn chat_completions_url(&self) -> String {
        let default = match self.provider {
            Provider::OpenAi => "https://api.openai.com",
            Provider::OpenRouter => "https://openrouter.ai/api",
        };
        let base = self.config.base_url.as_deref().unwrap_or(default);
        format!("{}/v1/chat/completions", base.trim_end_matches('/'))
    }

    /// POST {base_url}/v1/chat/completions
    async fn call_chat_completions(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<Completion> {
        let body = serde_json::json!({
            "model": params.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let mut request = self
            .client
            .post(self.chat_completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        if matches!(self.provider, Provider::OpenRouter) {
            // OpenRouter uses these for app attribution and ranking.
            request = request
                .header("HTTP-Referer", "https://github.com/atelier-dev/atelier")
                .header("X-Title", "Atelier");
        }

        let name = self.provider_name();
        let resp = request
            .send()
            .await
            .map_err(|e| AtelierError::from_request(e, &format!("{name} completion request")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AtelierError::Provider(format!(
                "{name} completion error {status}: {text}"
            )));
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| {
            AtelierError::Provider(format!("{name} completion response parse error: {e}"))
        })?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                AtelierError::Provider(format!("{name} completion response missing content"))
            })?;

        let total_tokens = json["usage"]["total_tokens"]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok());

        Ok(Completion { text, total_tokens })
    }
}

impl CompletionBackend for LlmService {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<Completion> {
        // Both providers honor the same chat-completions request shape.
        self.call_chat_completions(messages, params).await
    }
}

/// Resolve an API key from config, a custom env var, or a default env var.
fn resolve_api_key(config: &LlmConfig, default_env_var: &str) -> Result<String> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    let env_var_name = config.env_var.as_deref().unwrap_or(default_env_var);

    std::env::var(env_var_name).map_err(|_| {
        AtelierError::Config(format!(
            "{} provider requires an API key (set llm.api_key or {})",
            config.provider, env_var_name
        ))
    })
}
