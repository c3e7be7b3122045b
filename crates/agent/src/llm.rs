use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use billroute_core::config::{LlmConfig, LlmProvider};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_RESPONSE_TOKENS: u32 = 64;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm provider `{0}` requires an api key")]
    MissingApiKey(&'static str),
    #[error("could not build http client: {0}")]
    Client(String),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm provider returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected llm response: {0}")]
    Response(String),
}

/// Single-shot completion client for the supported hosted and local providers.
pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() && config.provider != LlmProvider::Ollama {
            return Err(LlmError::MissingApiKey(provider_name(config.provider)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Client(error.to_string()))?;

        Ok(Self {
            client,
            provider: config.provider,
            endpoint: endpoint(config.provider, config.base_url.as_deref(), &config.model),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, prompt: &str) -> Result<String, LlmError> {
        let mut request =
            self.client.post(&self.endpoint).json(&request_body(self.provider, &self.model, prompt));

        if let Some(key) = &self.api_key {
            let key = key.expose_secret();
            request = match self.provider {
                LlmProvider::OpenAi => request.bearer_auth(key),
                LlmProvider::Anthropic => request
                    .header("x-api-key", key)
                    .header("anthropic-version", ANTHROPIC_VERSION),
                LlmProvider::Gemini => request.header("x-goog-api-key", key),
                LlmProvider::Ollama => request,
            };
        }

        let response =
            request.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let payload: Value =
            response.json().await.map_err(|error| LlmError::Response(error.to_string()))?;
        extract_text(self.provider, &payload)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(
            event_name = "llm.request.started",
            provider = provider_name(self.provider),
            model = self.model.as_str(),
            "sending completion request"
        );
        Ok(self.send(prompt).await?)
    }
}

fn provider_name(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "openai",
        LlmProvider::Anthropic => "anthropic",
        LlmProvider::Ollama => "ollama",
        LlmProvider::Gemini => "gemini",
    }
}

fn endpoint(provider: LlmProvider, base_url: Option<&str>, model: &str) -> String {
    let default_base = match provider {
        LlmProvider::OpenAi => "https://api.openai.com",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434",
        LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
    };
    let base = base_url.unwrap_or(default_base).trim_end_matches('/');

    match provider {
        LlmProvider::OpenAi => format!("{base}/v1/chat/completions"),
        LlmProvider::Anthropic => format!("{base}/v1/messages"),
        LlmProvider::Ollama => format!("{base}/api/generate"),
        LlmProvider::Gemini => format!("{base}/v1beta/models/{model}:generateContent"),
    }
}

fn request_body(provider: LlmProvider, model: &str, prompt: &str) -> Value {
    match provider {
        LlmProvider::OpenAi => json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
            "max_tokens": MAX_RESPONSE_TOKENS,
        }),
        LlmProvider::Anthropic => json!({
            "model": model,
            "max_tokens": MAX_RESPONSE_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        }),
        LlmProvider::Ollama => json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0 },
        }),
        LlmProvider::Gemini => json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0, "maxOutputTokens": MAX_RESPONSE_TOKENS },
        }),
    }
}

fn extract_text(provider: LlmProvider, payload: &Value) -> Result<String, LlmError> {
    let text = match provider {
        LlmProvider::OpenAi => payload.pointer("/choices/0/message/content"),
        LlmProvider::Anthropic => payload.pointer("/content/0/text"),
        LlmProvider::Ollama => payload.get("response"),
        LlmProvider::Gemini => payload.pointer("/candidates/0/content/parts/0/text"),
    };

    text.and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
        LlmError::Response(format!("{} response carried no text", provider_name(provider)))
    })
}
