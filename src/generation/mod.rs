//! Generation Module
//!
//! Boundary to the external text-generation capability.
//!
//! Supports multiple backends:
//! - Google Gemini (hosted)
//! - Ollama (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use study_artifacts_server::config::GenerationConfig;
//! use study_artifacts_server::generation::{client_from_config, prompt, GenerationProvider};
//!
//! let config = GenerationConfig::for_provider(GenerationProvider::Ollama);
//! let client = client_from_config(&config)?;
//!
//! let raw = client.generate(&prompt::summary_prompt(&document.content)).await?;
//! ```

mod client;
pub mod prompt;
mod types;

pub use client::{client_from_config, GeminiClient, GenerationClient, OllamaClient};
pub use types::{GenerationError, GenerationProvider};

#[cfg(test)]
pub use client::MockClient;
