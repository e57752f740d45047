//! Generation Clients
//!
//! Defines the client trait and implementations for the supported text
//! generation backends. Clients make exactly one call per `generate`; they do
//! not retry and do not impose a timeout of their own.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::types::{GenerationError, GenerationProvider};
use crate::config::GenerationConfig;

/// Text-generation client trait
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Get the provider type
    fn provider(&self) -> GenerationProvider;

    /// Check if the provider is reachable
    async fn is_available(&self) -> bool;

    /// Send a prompt and return the raw generated text
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Build the client described by the configuration
pub fn client_from_config(
    config: &GenerationConfig,
) -> Result<Arc<dyn GenerationClient>, GenerationError> {
    match config.provider {
        GenerationProvider::Gemini => {
            let api_key = config
                .api_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .ok_or(GenerationError::MissingCredentials("gemini"))?;
            Ok(Arc::new(GeminiClient::new(
                &config.base_url,
                &config.model,
                api_key,
            )))
        }
        GenerationProvider::Ollama => Ok(Arc::new(OllamaClient::new(
            &config.base_url,
            &config.model,
        ))),
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: reqwest::StatusCode, body: String) -> GenerationError {
    match status.as_u16() {
        401 | 403 => GenerationError::Authentication(body),
        429 => GenerationError::QuotaExceeded(body),
        code => GenerationError::Api { status: code, body },
    }
}

/// Google Gemini provider
pub struct GeminiClient {
    http: reqwest::Client,
    /// API base URL
    base_url: String,
    /// Model name (e.g., "gemini-2.5-flash")
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text parts of the first candidate
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn provider(&self) -> GenerationProvider {
        GenerationProvider::Gemini
    }

    async fn is_available(&self) -> bool {
        match self
            .http
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}:generateContent", self.model_url());

        let request = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let result: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        result
            .into_text()
            .ok_or_else(|| GenerationError::InvalidResponse("Response contained no text".to_string()))
    }
}

/// Ollama provider (local LLM)
pub struct OllamaClient {
    http: reqwest::Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llama3.1")
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    fn provider(&self) -> GenerationProvider {
        GenerationProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        result["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::InvalidResponse("Missing `response` field".to_string()))
    }
}

/// Mock client for testing
#[cfg(test)]
pub struct MockClient {
    response: std::sync::Mutex<String>,
    fail: bool,
    delay: Option<std::time::Duration>,
    calls: std::sync::atomic::AtomicUsize,
    finished: std::sync::atomic::AtomicUsize,
    prompts: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: std::sync::Mutex::new(response.into()),
            fail: false,
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
            finished: std::sync::atomic::AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_response(&self, response: impl Into<String>) {
        *self.response.lock().unwrap() = response.into();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Calls that ran to completion instead of being cancelled
    pub fn finished(&self) -> usize {
        self.finished.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl GenerationClient for MockClient {
    fn provider(&self) -> GenerationProvider {
        GenerationProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        !self.fail
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail {
            return Err(GenerationError::QuotaExceeded("mock quota".to_string()));
        }
        Ok(self.response.lock().unwrap().clone())
    }
}
