//! Configuration management for the study artifacts server

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::generation::GenerationProvider;

/// Default bounded budget for one generation call
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 45;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    /// Required for Gemini, ignored by Ollama
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl GenerationConfig {
    /// Defaults for a provider, without credentials
    pub fn for_provider(provider: GenerationProvider) -> Self {
        Self {
            provider,
            api_key: None,
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./study-artifacts.db".to_string(),
            },
            generation: GenerationConfig::for_provider(GenerationProvider::Gemini),
        }
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Unset or unparsable variables take their defaults. A missing API key
    /// is not an error here; building the generation client reports it.
    pub fn from_env() -> Self {
        let provider = GenerationProvider::parse(
            &env::var("GENERATION_PROVIDER").unwrap_or_else(|_| "gemini".to_string()),
        );

        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./study-artifacts.db".to_string()),
            },
            generation: GenerationConfig {
                provider,
                api_key,
                model: env::var("GENERATION_MODEL")
                    .unwrap_or_else(|_| provider.default_model().to_string()),
                base_url: env::var("GENERATION_BASE_URL")
                    .unwrap_or_else(|_| provider.default_base_url().to_string()),
                timeout_secs: env::var("GENERATION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS),
            },
        }
    }
}
