use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// One prompt, with an optional system message in front of it.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub prompt: String,
    pub system: Option<String>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Run the request and return the assistant's reply, trimmed.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

pub struct OpenAiChat {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| LlmError::InvalidRequest(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_payload(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.prompt}));

        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }

    fn parse_response(body: &Value) -> Result<String, LlmError> {
        body.get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or(LlmError::NoContent)
    }

    fn map_error(status: u16, body: &str) -> LlmError {
        if status == 401 || status == 403 {
            return LlmError::Authentication(body.to_string());
        }
        if status == 429 {
            return LlmError::RateLimited;
        }
        LlmError::Api {
            status,
            message: body.to_string(),
        }
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        if request.prompt.trim().is_empty() {
            return Err(LlmError::InvalidRequest("prompt is empty".into()));
        }

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(url)
            .headers(self.build_headers()?)
            .json(&self.build_payload(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Chat completion failed");
            return Err(Self::map_error(status.as_u16(), &body));
        }

        let body: Value = response.json().await?;
        let content = Self::parse_response(&body)?;
        tracing::debug!(model = %self.config.model, chars = content.len(), "Chat completion done");
        Ok(content)
    }
}
