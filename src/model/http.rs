use super::{apply_stop, ModelProvider};
use crate::utils::truncate;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::debug;

/// Client for an OpenAI-compatible text completion endpoint (`POST {base_url}/completions`).
pub struct HttpModelProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl HttpModelProvider {
    /// Build a provider. The API key comes from `FN_RUNTIME_API_KEY`, falling back to
    /// `OPENAI_API_KEY`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let timeout_secs = env::var("FN_RUNTIME_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("FN_RUNTIME_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("http_model"),
            )
        })?;

        let api_key = env::var("FN_RUNTIME_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok();

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            max_tokens: 512,
            temperature: 0.0,
        })
    }

    /// Provider configured by `FN_RUNTIME_BASE_URL` and `FN_RUNTIME_MODEL`.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("FN_RUNTIME_BASE_URL").map_err(|_| {
            Error::configuration_with_context(
                "FN_RUNTIME_BASE_URL is not set",
                ErrorContext::new().with_source("env"),
            )
        })?;
        let model = env::var("FN_RUNTIME_MODEL").unwrap_or_else(|_| "default".to_string());
        Self::new(base_url, model)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn extract_text(body: &Value) -> Option<String> {
        let choice = body.get("choices")?.get(0)?;
        choice
            .get("text")
            .and_then(Value::as_str)
            .or_else(|| {
                choice
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string)
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn generate(&self, prompt: &str, stop: &[String]) -> Result<String> {
        let url = format!("{}/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stop": stop,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| {
            Error::model_with_context(
                format!("request failed: {}", e),
                ErrorContext::new().with_source("http_model").with_details(url.clone()),
            )
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            Error::model_with_context(
                format!("failed to read response body: {}", e),
                ErrorContext::new().with_source("http_model"),
            )
        })?;
        debug!(status = status.as_u16(), model = %self.model, bytes = text.len(), "model response");

        if !status.is_success() {
            return Err(Error::model_with_context(
                format!("HTTP {}", status.as_u16()),
                ErrorContext::new()
                    .with_source("http_model")
                    .with_details(truncate(&text, 200)),
            ));
        }

        let parsed: Value = serde_json::from_str(&text).map_err(|e| {
            Error::model_with_context(
                format!("invalid JSON response: {}", e),
                ErrorContext::new().with_source("http_model"),
            )
        })?;
        let completion = Self::extract_text(&parsed).ok_or_else(|| {
            Error::model_with_context(
                "response has no completion text",
                ErrorContext::new()
                    .with_source("http_model")
                    .with_field_path("choices[0].text"),
            )
        })?;
        Ok(apply_stop(&completion, stop))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for HttpModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
