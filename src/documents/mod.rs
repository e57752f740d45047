//! Document store access
//!
//! Documents are owned and kept immutable by the ingestion side; the artifact
//! engine only resolves them by id and owner.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

/// Stored document record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
}

/// Read access to stored documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolve a document owned by `owner_id`
    ///
    /// Returns `None` both when the document does not exist and when it
    /// belongs to someone else.
    async fn get(&self, document_id: &str, owner_id: &str) -> Result<Option<Document>>;
}

/// SQLite-backed document store
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new document for `owner_id`
    pub async fn insert(&self, owner_id: &str, content: &str) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, content, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.owner_id)
        .bind(&document.content)
        .bind(&document.created_at)
        .execute(&self.pool)
        .await?;

        Ok(document)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, document_id: &str, owner_id: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(
            r#"
            SELECT id, owner_id, content, created_at
            FROM documents
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(document_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }
}
