//! Language-model backend (C10's pluggable generation seam).
//!
//! A trait so the orchestrator never hard-codes a provider. Two concrete
//! implementations ship: [`OllamaBackend`] for a local Ollama daemon (the
//! default per `llm.provider = "ollama"`), and [`OpenAiCompatBackend`] for
//! any OpenAI-chat-completions-shaped HTTP endpoint (covers hosted "cloud"
//! providers and local servers like llama.cpp's server mode that mimic the
//! same API). Both are thin `reqwest` clients; neither retries — a single
//! failed call is a degraded-capability event the orchestrator handles by
//! falling back to the canned offline answer (spec §4.10, §7).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default LLM call timeout (spec §5): 120s, overridable by the caller.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} response was not valid JSON: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} response had no generated content")]
    EmptyResponse { provider: &'static str },
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// One generation request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub system: Option<&'a str>,
    pub model: &'a str,
    pub json_mode: bool,
    pub temperature: f32,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(prompt: &'a str, model: &'a str) -> Self {
        Self {
            prompt,
            system: None,
            model,
            json_mode: false,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: &'a str) -> Self {
        self.system = Some(system);
        self
    }

    pub fn json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// C10's LLM seam: `generate` is the only operation the orchestrator needs.
/// Implementations are expected to be cheap to construct and safe to share
/// across concurrent callers (no daemon-held mutable state).
#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String>;

    /// Human-readable provider name, used in logs and the "degraded
    /// capability logged once" rule (spec §7.2).
    fn provider_name(&self) -> &'static str;
}

/// Ollama's `/api/generate` endpoint (`stream: false`).
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

#[async_trait::async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaRequest {
            model: request.model,
            prompt: request.prompt,
            stream: false,
            temperature: request.temperature,
            system: request.system,
            format: request.json_mode.then_some("json"),
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| LlmError::Request { url: url.clone(), source })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { provider: "ollama", status, body });
        }

        let decoded: OllamaResponse = resp
            .json()
            .await
            .map_err(|source| LlmError::Decode { provider: "ollama", source })?;

        if decoded.response.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "ollama" });
        }
        Ok(decoded.response)
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

/// An OpenAI-chat-completions-shaped endpoint: `/v1/chat/completions` with a
/// bearer token. Covers hosted cloud providers and any local server that
/// mimics the same contract.
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_timeout(base_url, api_key, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait::async_trait]
impl LlmBackend for OpenAiCompatBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: request.prompt });

        let body = ChatRequest {
            model: request.model,
            messages,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|source| LlmError::Request { url: url.clone(), source })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { provider: "openai-compatible", status, body });
        }

        let decoded: ChatResponse = resp
            .json()
            .await
            .map_err(|source| LlmError::Decode { provider: "openai-compatible", source })?;

        let content = decoded
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "openai-compatible" });
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Always fails. Used in tests that exercise the offline-answer fallback,
/// and as the backend a caller gets when no LLM URL is configured at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

#[async_trait::async_trait]
impl LlmBackend for UnavailableBackend {
    async fn generate(&self, _request: GenerateRequest<'_>) -> Result<String> {
        Err(LlmError::EmptyResponse { provider: "none" })
    }

    fn provider_name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_backend_always_errors() {
        let backend = UnavailableBackend;
        let result = backend.generate(GenerateRequest::new("hi", "fast")).await;
        assert!(result.is_err());
    }
}
