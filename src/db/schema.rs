//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Documents (written by the ingestion side, read-only here)
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_documents_owner_id ON documents(owner_id);

-- Generated artifacts (append-only)
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    -- 'summary', 'flashcards' or 'quiz'
    kind TEXT NOT NULL,
    -- Number of quiz questions; NULL for other kinds
    size_parameter INTEGER,
    -- Artifact in its wire shape (JSON)
    payload TEXT NOT NULL,
    -- Set once the payload failed to decode; such rows are never served
    quarantined INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_artifacts_lookup
    ON artifacts(document_id, owner_id, kind, size_parameter);

-- At most one summary / flashcard deck per document and owner
CREATE UNIQUE INDEX IF NOT EXISTS idx_artifacts_unsized_unique
    ON artifacts(document_id, owner_id, kind)
    WHERE kind <> 'quiz' AND quarantined = 0;
"#;
