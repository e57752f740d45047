//! Persistent artifact cache
//!
//! Entries are append-only: payloads are never updated or deleted once
//! written. An entry whose payload cannot be decoded is quarantined: it stays
//! in the table but is no longer served, counted or considered by the
//! uniqueness rule. Summaries and flashcard decks have at most one live entry
//! per document and owner; quizzes may have one per distinct question count.
//!
//! # Layers
//!
//! - `ArtifactStore`: raw rows (payload JSON plus key columns)
//! - `ArtifactCache`: typed lookups, including the quiz reuse rule

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::types::{ArtifactKind, StudyArtifact};

/// Artifact cache error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode artifact: {0}")]
    Encode(serde_json::Error),
}

/// Stored cache entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredEntry {
    pub id: String,
    pub document_id: String,
    pub owner_id: String,
    pub kind: String,
    pub size_parameter: Option<i64>,
    /// Artifact in its wire shape
    pub payload: String,
    pub created_at: String,
}

/// Entry to append to the store
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub document_id: &'a str,
    pub owner_id: &'a str,
    pub kind: ArtifactKind,
    pub size_parameter: Option<u32>,
    pub payload: String,
}

/// Raw persistence for cache entries
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Find the live entry to serve for a key
    ///
    /// With `min_size`, only entries whose size parameter is at least
    /// `min_size` qualify and the smallest of them is returned.
    async fn find(
        &self,
        document_id: &str,
        owner_id: &str,
        kind: ArtifactKind,
        min_size: Option<u32>,
    ) -> Result<Option<StoredEntry>, CacheError>;

    /// Append a new entry
    async fn insert(&self, entry: NewEntry<'_>) -> Result<StoredEntry, CacheError>;

    /// Stop serving an entry whose payload is unreadable
    async fn quarantine(&self, id: &str) -> Result<(), CacheError>;

    /// Count live entries for a document, owner and kind
    async fn count(
        &self,
        document_id: &str,
        owner_id: &str,
        kind: ArtifactKind,
    ) -> Result<i64, CacheError>;
}

/// SQLite-backed artifact store
#[derive(Clone)]
pub struct SqliteArtifactStore {
    pool: SqlitePool,
}

impl SqliteArtifactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn find(
        &self,
        document_id: &str,
        owner_id: &str,
        kind: ArtifactKind,
        min_size: Option<u32>,
    ) -> Result<Option<StoredEntry>, CacheError> {
        let entry = match min_size {
            Some(min_size) => {
                sqlx::query_as::<_, StoredEntry>(
                    r#"
                    SELECT id, document_id, owner_id, kind, size_parameter, payload, created_at
                    FROM artifacts
                    WHERE document_id = ? AND owner_id = ? AND kind = ?
                      AND quarantined = 0 AND size_parameter >= ?
                    ORDER BY size_parameter ASC, created_at ASC
                    LIMIT 1
                    "#,
                )
                .bind(document_id)
                .bind(owner_id)
                .bind(kind.as_str())
                .bind(i64::from(min_size))
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StoredEntry>(
                    r#"
                    SELECT id, document_id, owner_id, kind, size_parameter, payload, created_at
                    FROM artifacts
                    WHERE document_id = ? AND owner_id = ? AND kind = ?
                      AND quarantined = 0
                    ORDER BY created_at ASC
                    LIMIT 1
                    "#,
                )
                .bind(document_id)
                .bind(owner_id)
                .bind(kind.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(entry)
    }

    async fn insert(&self, entry: NewEntry<'_>) -> Result<StoredEntry, CacheError> {
        let stored = StoredEntry {
            id: Uuid::new_v4().to_string(),
            document_id: entry.document_id.to_string(),
            owner_id: entry.owner_id.to_string(),
            kind: entry.kind.as_str().to_string(),
            size_parameter: entry.size_parameter.map(i64::from),
            payload: entry.payload,
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            r#"
            INSERT INTO artifacts (id, document_id, owner_id, kind, size_parameter, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.document_id)
        .bind(&stored.owner_id)
        .bind(&stored.kind)
        .bind(stored.size_parameter)
        .bind(&stored.payload)
        .bind(&stored.created_at)
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn quarantine(&self, id: &str) -> Result<(), CacheError> {
        sqlx::query("UPDATE artifacts SET quarantined = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count(
        &self,
        document_id: &str,
        owner_id: &str,
        kind: ArtifactKind,
    ) -> Result<i64, CacheError> {
        let result: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM artifacts
            WHERE document_id = ? AND owner_id = ? AND kind = ? AND quarantined = 0
            "#,
        )
        .bind(document_id)
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(result.0)
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit {
        artifact: T,
        /// Size parameter of the entry that served the hit
        stored_size: Option<u32>,
    },
    Miss,
}

/// Typed artifact cache
#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Look up an artifact
    ///
    /// For quizzes, `min_size` selects the smallest stored quiz with at least
    /// that many questions and trims it to exactly `min_size` questions.
    /// Unreadable entries are quarantined and the next qualifying entry is
    /// tried.
    pub async fn get<T: StudyArtifact>(
        &self,
        document_id: &str,
        owner_id: &str,
        min_size: Option<u32>,
    ) -> Result<CacheLookup<T>, CacheError> {
        loop {
            let Some(entry) = self
                .store
                .find(document_id, owner_id, T::KIND, min_size)
                .await?
            else {
                return Ok(CacheLookup::Miss);
            };

            let artifact: T = match serde_json::from_str(&entry.payload) {
                Ok(artifact) => artifact,
                Err(e) => {
                    tracing::warn!(
                        "Quarantining unreadable {} cache entry {}: {}",
                        T::KIND,
                        entry.id,
                        e
                    );
                    self.store.quarantine(&entry.id).await?;
                    continue;
                }
            };

            let artifact = match min_size {
                Some(size) => artifact.trimmed(size),
                None => artifact,
            };

            return Ok(CacheLookup::Hit {
                artifact,
                stored_size: entry
                    .size_parameter
                    .and_then(|size| u32::try_from(size).ok()),
            });
        }
    }

    /// Append a freshly generated artifact
    pub async fn put<T: StudyArtifact>(
        &self,
        document_id: &str,
        owner_id: &str,
        artifact: &T,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(artifact).map_err(CacheError::Encode)?;

        self.store
            .insert(NewEntry {
                document_id,
                owner_id,
                kind: T::KIND,
                size_parameter: if T::KIND.is_sized() {
                    artifact.size()
                } else {
                    None
                },
                payload,
            })
            .await?;

        Ok(())
    }

    /// Number of stored entries of a kind
    pub async fn count(
        &self,
        document_id: &str,
        owner_id: &str,
        kind: ArtifactKind,
    ) -> Result<i64, CacheError> {
        self.store.count(document_id, owner_id, kind).await
    }
}
