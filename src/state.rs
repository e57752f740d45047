//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::artifacts::{ArtifactCache, ArtifactService, SqliteArtifactStore};
use crate::config::Config;
use crate::documents::SqliteDocumentStore;
use crate::generation::{client_from_config, GenerationClient, GenerationError};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to initialize generation client: {0}")]
    GenerationInit(#[from] GenerationError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pub config: Config,
    pub db: SqlitePool,
    pub artifacts: ArtifactService,
}

impl AppState {
    /// Create a new application state with the configured generation client
    pub fn new(config: Config, db: SqlitePool) -> Result<Self, StateError> {
        let client = client_from_config(&config.generation)?;
        Ok(Self::with_client(config, db, client))
    }

    /// Create a new application state around an existing generation client
    pub fn with_client(config: Config, db: SqlitePool, client: Arc<dyn GenerationClient>) -> Self {
        let documents = Arc::new(SqliteDocumentStore::new(db.clone()));
        let cache = ArtifactCache::new(Arc::new(SqliteArtifactStore::new(db.clone())));
        let artifacts =
            ArtifactService::new(documents, cache, client, config.generation.timeout());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                artifacts,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the artifact service
    pub fn artifacts(&self) -> &ArtifactService {
        &self.inner.artifacts
    }
}
