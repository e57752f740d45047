//! Derived artifact generation and caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  ArtifactService                        │
//! │  (owner check, single-flight, generation budget)        │
//! └─────────────────────────────────────────────────────────┘
//!           │                │                  │
//!           ▼                ▼                  ▼
//!   ┌──────────────┐ ┌──────────────┐ ┌──────────────────┐
//!   │ArtifactCache │ │Generation    │ │ parser           │
//!   │ (SQLite)     │ │Client        │ │ (decode/fallback)│
//!   └──────────────┘ └──────────────┘ └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use study_artifacts_server::artifacts::{ArtifactCache, ArtifactService, SqliteArtifactStore};
//!
//! let cache = ArtifactCache::new(Arc::new(SqliteArtifactStore::new(pool.clone())));
//! let service = ArtifactService::new(documents, cache, client, Duration::from_secs(45));
//!
//! let quiz = service.quiz(&document_id, &user_id, 15).await?;
//! ```

mod cache;
mod flight;
pub mod parser;
mod service;
mod types;

pub use cache::{
    ArtifactCache, ArtifactStore, CacheError, CacheLookup, NewEntry, SqliteArtifactStore,
    StoredEntry,
};
pub use flight::{FlightGuard, FlightKey, FlightTable};
pub use parser::MalformedResponse;
pub use service::{ArtifactService, DEFAULT_QUIZ_QUESTIONS};
pub use types::{
    ArtifactKind, Flashcard, FlashcardDeck, Quiz, QuizQuestion, StudyArtifact, Summary, Topic,
};
