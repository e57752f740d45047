//! Generation Types

use serde::{Deserialize, Serialize};

/// Text-generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Google Gemini API
    Gemini,
    /// Ollama (local LLM)
    Ollama,
}

impl Default for GenerationProvider {
    fn default() -> Self {
        Self::Gemini
    }
}

impl GenerationProvider {
    /// Parse a provider name, falling back to Gemini for unknown values
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Self::Ollama,
            _ => Self::Gemini,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::Ollama => "llama3.1",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

/// Generation error types
///
/// Every variant is reported to callers as "generation unavailable";
/// retrying is left to the caller.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Request to generation provider failed: {0}")]
    Request(String),

    #[error("Generation provider rejected credentials: {0}")]
    Authentication(String),

    #[error("Generation quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Generation provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response from generation provider: {0}")]
    InvalidResponse(String),

    #[error("Missing credentials for {0} provider")]
    MissingCredentials(&'static str),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Request(err.to_string())
    }
}
