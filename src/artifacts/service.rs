//! Artifact Service
//!
//! Orchestrates artifact requests:
//!
//! ```text
//! resolve document (owner check)
//!   └─ cache lookup ── hit ──────────────────────────────► return
//!        └─ miss ─ acquire key ─ re-check ── hit ────────► return
//!                     └─ miss ─ prompt ─ generate ─ parse ─ persist ─► return
//! ```
//!
//! Generation runs on its own task under a bounded budget. Persisting is
//! best effort: a failed write is logged and the fresh artifact is returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::cache::{ArtifactCache, CacheLookup};
use super::flight::{FlightKey, FlightTable};
use super::parser;
use super::types::{FlashcardDeck, Quiz, StudyArtifact, Summary};
use crate::documents::{Document, DocumentStore};
use crate::error::{AppError, Result};
use crate::generation::{prompt, GenerationClient, GenerationProvider};

/// Question count used when a quiz request does not specify one
pub const DEFAULT_QUIZ_QUESTIONS: u32 = 20;

/// Artifact generation and caching engine
pub struct ArtifactService {
    documents: Arc<dyn DocumentStore>,
    cache: ArtifactCache,
    client: Arc<dyn GenerationClient>,
    flights: FlightTable,
    generation_timeout: Duration,
}

impl ArtifactService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        cache: ArtifactCache,
        client: Arc<dyn GenerationClient>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            documents,
            cache,
            client,
            flights: FlightTable::new(),
            generation_timeout,
        }
    }

    /// Provider behind the generation client
    pub fn provider(&self) -> GenerationProvider {
        self.client.provider()
    }

    /// Whether the generation service answers a cheap probe
    pub async fn generation_available(&self) -> bool {
        self.client.is_available().await
    }

    /// Number of keys with a generation in progress or queued
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Topic-wise summary of a document
    pub async fn summary(&self, document_id: &str, requester: &str) -> Result<Summary> {
        self.resolve(
            document_id,
            requester,
            None,
            |doc| prompt::summary_prompt(&doc.content),
            |raw, _| parser::parse_summary(&raw),
        )
        .await
    }

    /// Flashcard deck for a document
    pub async fn flashcards(&self, document_id: &str, requester: &str) -> Result<FlashcardDeck> {
        self.resolve(
            document_id,
            requester,
            None,
            |doc| prompt::flashcards_prompt(&doc.content),
            |raw, doc| parser::parse_flashcards(&raw, &doc.content),
        )
        .await
    }

    /// Quiz of `question_count` questions
    ///
    /// A cached quiz with at least that many questions is reused and trimmed;
    /// otherwise exactly `question_count` questions are requested.
    pub async fn quiz(&self, document_id: &str, requester: &str, question_count: u32) -> Result<Quiz> {
        if question_count == 0 {
            return Err(AppError::BadRequest(
                "Question count must be a positive integer".to_string(),
            ));
        }

        self.resolve(
            document_id,
            requester,
            Some(question_count),
            |doc| prompt::quiz_prompt(&doc.content, question_count),
            |raw, _| parser::parse_quiz(&raw, question_count),
        )
        .await
    }

    async fn resolve<T, P, F>(
        &self,
        document_id: &str,
        requester: &str,
        size: Option<u32>,
        build_prompt: P,
        parse: F,
    ) -> Result<T>
    where
        T: StudyArtifact,
        P: FnOnce(&Document) -> String,
        F: FnOnce(String, &Document) -> T,
    {
        let document = self
            .documents
            .get(document_id, requester)
            .await?
            .ok_or_else(|| AppError::NotFoundOrForbidden(document_id.to_string()))?;

        if let Some(artifact) = self.lookup::<T>(document_id, requester, size).await? {
            tracing::debug!("{} cache hit for document {}", T::KIND, document_id);
            return Ok(artifact);
        }

        let _flight = self
            .flights
            .acquire(FlightKey::new(document_id, requester, T::KIND, size))
            .await;

        // A concurrent request for the same key may have finished meanwhile
        if let Some(artifact) = self.lookup::<T>(document_id, requester, size).await? {
            tracing::debug!(
                "{} for document {} produced by a concurrent request",
                T::KIND,
                document_id
            );
            return Ok(artifact);
        }

        tracing::debug!("{} cache miss for document {}", T::KIND, document_id);

        let raw = self.generate(build_prompt(&document)).await?;
        let artifact = parse(raw, &document);

        if let Err(e) = self.cache.put(document_id, requester, &artifact).await {
            tracing::error!(
                "Failed to persist {} for document {} (owner {}), returning it uncached: {}",
                T::KIND,
                document_id,
                requester,
                e
            );
        }

        Ok(artifact)
    }

    async fn lookup<T: StudyArtifact>(
        &self,
        document_id: &str,
        owner_id: &str,
        size: Option<u32>,
    ) -> Result<Option<T>> {
        match self.cache.get::<T>(document_id, owner_id, size).await? {
            CacheLookup::Hit { artifact, .. } => Ok(Some(artifact)),
            CacheLookup::Miss => Ok(None),
        }
    }

    /// Run one generation call on its own task, bounded by the budget
    ///
    /// The task is aborted when the budget expires or when the caller stops
    /// waiting for it.
    async fn generate(&self, prompt: String) -> Result<String> {
        let client = Arc::clone(&self.client);
        let started = Instant::now();
        tracing::info!("Requesting generation from {}", client.provider().as_str());

        let mut task = AbortOnDrop(tokio::spawn(async move { client.generate(&prompt).await }));

        match timeout(self.generation_timeout, &mut task.0).await {
            Ok(Ok(result)) => {
                let raw = result?;
                tracing::info!(
                    "Generation finished in {} ms ({} chars)",
                    started.elapsed().as_millis(),
                    raw.len()
                );
                Ok(raw)
            }
            Ok(Err(join_error)) => Err(AppError::Internal(format!(
                "Generation task failed: {}",
                join_error
            ))),
            Err(_) => Err(AppError::GenerationTimeout(self.generation_timeout)),
        }
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::cache::{
        ArtifactStore, CacheError, NewEntry, SqliteArtifactStore, StoredEntry,
    };
    use crate::artifacts::parser::FALLBACK_TOPIC_TITLE;
    use crate::artifacts::types::ArtifactKind;
    use crate::db::memory_pool;
    use crate::documents::SqliteDocumentStore;
    use crate::generation::MockClient;
    use async_trait::async_trait;

    const MITOCHONDRIA: &str = "The mitochondria is the powerhouse of the cell.";

    const SUMMARY_JSON: &str = r#"```json
{"summary":"Mitochondria produce energy.","topics":[{"title":"Organelles","content":"Mitochondria make ATP."}]}
```"#;

    fn quiz_json(count: usize) -> String {
        let questions: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Question number {}", i),
                    "options": ["a", "b", "c", "d"],
                    "correctAnswer": i % 4
                })
            })
            .collect();
        serde_json::to_string(&questions).unwrap()
    }

    struct Fixture {
        pool: sqlx::SqlitePool,
        service: Arc<ArtifactService>,
        client: Arc<MockClient>,
        documents: SqliteDocumentStore,
        cache: ArtifactCache,
    }

    async fn fixture_with(client: MockClient, timeout: Duration) -> Fixture {
        let pool = memory_pool().await;
        let documents = SqliteDocumentStore::new(pool.clone());
        let cache = ArtifactCache::new(Arc::new(SqliteArtifactStore::new(pool.clone())));
        let client = Arc::new(client);
        let service = Arc::new(ArtifactService::new(
            Arc::new(documents.clone()),
            cache.clone(),
            client.clone(),
            timeout,
        ));
        Fixture {
            pool,
            service,
            client,
            documents,
            cache,
        }
    }

    async fn fixture(response: &str) -> Fixture {
        fixture_with(MockClient::new(response), Duration::from_secs(5)).await
    }

    #[tokio::test]
    async fn test_summary_generated_once_then_cached() {
        let fx = fixture(SUMMARY_JSON).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let first = fx.service.summary(&doc.id, "alice").await.unwrap();
        assert_eq!(fx.client.calls(), 1);
        assert!(fx.client.last_prompt().unwrap().contains(MITOCHONDRIA));
        assert_eq!(first.overall_text, "Mitochondria produce energy.");
        assert_eq!(
            fx.cache.count(&doc.id, "alice", ArtifactKind::Summary).await.unwrap(),
            1
        );

        let second = fx.service.summary(&doc.id, "alice").await.unwrap();
        assert_eq!(fx.client.calls(), 1);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_flashcards_idempotent() {
        let fx = fixture(r#"[{"question":"What is ATP?","answer":"Energy currency"}]"#).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let first = fx.service.flashcards(&doc.id, "alice").await.unwrap();
        fx.client.set_response("[]");
        let second = fx.service.flashcards(&doc.id, "alice").await.unwrap();

        assert_eq!(fx.client.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.cards[0].answer, "Energy currency");
    }

    #[tokio::test]
    async fn test_flashcard_fallback_quotes_document() {
        let fx = fixture("I'd rather not.").await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let deck = fx.service.flashcards(&doc.id, "alice").await.unwrap();
        assert_eq!(deck.cards.len(), 2);
        assert_eq!(deck.cards[0].answer, format!("{}...", MITOCHONDRIA));
    }

    #[tokio::test]
    async fn test_summary_fallback_is_cached() {
        let fx = fixture("plain prose answer").await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let summary = fx.service.summary(&doc.id, "alice").await.unwrap();
        assert_eq!(summary.overall_text, "plain prose answer");
        assert_eq!(summary.topics[0].title, FALLBACK_TOPIC_TITLE);

        fx.service.summary(&doc.id, "alice").await.unwrap();
        assert_eq!(fx.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_quiz_reuses_larger_entry() {
        let fx = fixture(&quiz_json(25)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let full = fx.service.quiz(&doc.id, "alice", 25).await.unwrap();
        assert_eq!(full.len(), 25);
        assert_eq!(fx.client.calls(), 1);

        let partial = fx.service.quiz(&doc.id, "alice", 15).await.unwrap();
        assert_eq!(fx.client.calls(), 1);
        assert_eq!(partial.len(), 15);
        assert_eq!(partial.questions[..], full.questions[..15]);
    }

    #[tokio::test]
    async fn test_quiz_miss_and_grow() {
        let fx = fixture(&quiz_json(15)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        fx.service.quiz(&doc.id, "alice", 15).await.unwrap();
        assert_eq!(fx.client.calls(), 1);

        fx.client.set_response(quiz_json(25));
        let grown = fx.service.quiz(&doc.id, "alice", 25).await.unwrap();
        assert_eq!(fx.client.calls(), 2);
        assert_eq!(grown.len(), 25);
        assert!(fx.client.last_prompt().unwrap().contains("exactly 25 questions"));
        assert_eq!(
            fx.cache.count(&doc.id, "alice", ArtifactKind::Quiz).await.unwrap(),
            2
        );

        // The 15-question entry is still there and still preferred
        match fx.cache.get::<Quiz>(&doc.id, "alice", Some(15)).await.unwrap() {
            CacheLookup::Hit { stored_size, .. } => assert_eq!(stored_size, Some(15)),
            CacheLookup::Miss => panic!("expected hit"),
        }
    }

    #[tokio::test]
    async fn test_fresh_quiz_is_not_trimmed() {
        // Provider over-delivers; only cache hits are trimmed
        let fx = fixture(&quiz_json(12)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let quiz = fx.service.quiz(&doc.id, "alice", 10).await.unwrap();
        assert_eq!(quiz.len(), 12);
    }

    #[tokio::test]
    async fn test_quiz_rejects_zero_questions() {
        let fx = fixture(&quiz_json(1)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let result = fx.service.quiz(&doc.id, "alice", 0).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(fx.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_ownership_enforced_even_with_cache_entry() {
        let fx = fixture(SUMMARY_JSON).await;
        let doc = fx.documents.insert("bob", MITOCHONDRIA).await.unwrap();

        fx.service.summary(&doc.id, "bob").await.unwrap();
        fx.service.quiz(&doc.id, "bob", 5).await.unwrap();
        let calls = fx.client.calls();

        let summary = fx.service.summary(&doc.id, "alice").await;
        let deck = fx.service.flashcards(&doc.id, "alice").await;
        let quiz = fx.service.quiz(&doc.id, "alice", 5).await;

        assert!(matches!(summary, Err(AppError::NotFoundOrForbidden(_))));
        assert!(matches!(deck, Err(AppError::NotFoundOrForbidden(_))));
        assert!(matches!(quiz, Err(AppError::NotFoundOrForbidden(_))));
        assert_eq!(fx.client.calls(), calls);
    }

    #[tokio::test]
    async fn test_missing_document() {
        let fx = fixture(SUMMARY_JSON).await;
        let result = fx.service.summary("no-such-doc", "alice").await;
        assert!(matches!(result, Err(AppError::NotFoundOrForbidden(_))));
        assert_eq!(fx.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates_and_is_not_cached() {
        let fx = fixture_with(MockClient::failing(), Duration::from_secs(5)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let result = fx.service.summary(&doc.id, "alice").await;
        assert!(matches!(result, Err(AppError::GenerationUnavailable(_))));
        assert_eq!(
            fx.cache.count(&doc.id, "alice", ArtifactKind::Summary).await.unwrap(),
            0
        );

        // No internal retry
        assert_eq!(fx.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let client = MockClient::new(SUMMARY_JSON).with_delay(Duration::from_secs(2));
        let fx = fixture_with(client, Duration::from_millis(50)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let result = fx.service.summary(&doc.id, "alice").await;
        assert!(matches!(result, Err(AppError::GenerationTimeout(_))));
        assert_eq!(fx.service.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_generation() {
        let client = MockClient::new(SUMMARY_JSON).with_delay(Duration::from_millis(100));
        let fx = fixture_with(client, Duration::from_secs(5)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let requests = (0..5).map(|_| {
            let service = Arc::clone(&fx.service);
            let id = doc.id.clone();
            tokio::spawn(async move { service.summary(&id, "alice").await })
        });
        let results = futures::future::join_all(requests).await;

        let summaries: Vec<Summary> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();
        assert!(summaries.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(fx.client.calls(), 1);
        assert_eq!(
            fx.cache.count(&doc.id, "alice", ArtifactKind::Summary).await.unwrap(),
            1
        );
        assert_eq!(fx.service.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_other_keys_not_blocked_by_slow_generation() {
        let client = MockClient::new(quiz_json(3)).with_delay(Duration::from_millis(300));
        let fx = fixture_with(client, Duration::from_secs(5)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();
        let other = fx.documents.insert("alice", "Photosynthesis").await.unwrap();

        // Pre-populate a quiz for the other document directly in the cache
        let cached = parser::parse_quiz(&quiz_json(3), 3);
        fx.cache.put(&other.id, "alice", &cached).await.unwrap();

        let slow = {
            let service = Arc::clone(&fx.service);
            let id = doc.id.clone();
            tokio::spawn(async move { service.quiz(&id, "alice", 3).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        let fast = fx.service.quiz(&other.id, "alice", 3).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(fast, cached);

        slow.await.unwrap().unwrap();
        assert_eq!(fx.client.calls(), 1);
    }

    /// Store whose writes always fail
    struct ReadOnlyStore(SqliteArtifactStore);

    #[async_trait]
    impl ArtifactStore for ReadOnlyStore {
        async fn find(
            &self,
            document_id: &str,
            owner_id: &str,
            kind: ArtifactKind,
            min_size: Option<u32>,
        ) -> std::result::Result<Option<StoredEntry>, CacheError> {
            self.0.find(document_id, owner_id, kind, min_size).await
        }

        async fn insert(
            &self,
            _entry: NewEntry<'_>,
        ) -> std::result::Result<StoredEntry, CacheError> {
            Err(CacheError::Database(sqlx::Error::PoolClosed))
        }

        async fn quarantine(&self, id: &str) -> std::result::Result<(), CacheError> {
            self.0.quarantine(id).await
        }

        async fn count(
            &self,
            document_id: &str,
            owner_id: &str,
            kind: ArtifactKind,
        ) -> std::result::Result<i64, CacheError> {
            self.0.count(document_id, owner_id, kind).await
        }
    }

    #[tokio::test]
    async fn test_persist_failure_still_returns_artifact() {
        let pool = memory_pool().await;
        let documents = SqliteDocumentStore::new(pool.clone());
        let cache = ArtifactCache::new(Arc::new(ReadOnlyStore(SqliteArtifactStore::new(pool))));
        let client = Arc::new(MockClient::new(SUMMARY_JSON));
        let service = ArtifactService::new(
            Arc::new(documents.clone()),
            cache,
            client.clone(),
            Duration::from_secs(5),
        );
        let doc = documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let summary = service.summary(&doc.id, "alice").await.unwrap();
        assert_eq!(summary.overall_text, "Mitochondria produce energy.");

        // Nothing was stored, so the next request generates again
        service.summary(&doc.id, "alice").await.unwrap();
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_regenerated() {
        let fx = fixture(&quiz_json(2)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        SqliteArtifactStore::new(fx.pool.clone())
            .insert(NewEntry {
                document_id: &doc.id,
                owner_id: "alice",
                kind: ArtifactKind::Quiz,
                size_parameter: Some(2),
                payload: "{\"questions\": 42}".to_string(),
            })
            .await
            .unwrap();

        let quiz = fx.service.quiz(&doc.id, "alice", 2).await.unwrap();
        assert_eq!(quiz.len(), 2);
        assert_eq!(fx.client.calls(), 1);

        // The regenerated entry is served from now on
        for _ in 0..2 {
            let again = fx.service.quiz(&doc.id, "alice", 2).await.unwrap();
            assert_eq!(again, quiz);
        }
        assert_eq!(fx.client.calls(), 1);
        assert_eq!(
            fx.cache.count(&doc.id, "alice", ArtifactKind::Quiz).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_corrupt_summary_is_replaced() {
        let fx = fixture(SUMMARY_JSON).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        SqliteArtifactStore::new(fx.pool.clone())
            .insert(NewEntry {
                document_id: &doc.id,
                owner_id: "alice",
                kind: ArtifactKind::Summary,
                size_parameter: None,
                payload: "{\"content\": 7}".to_string(),
            })
            .await
            .unwrap();

        let first = fx.service.summary(&doc.id, "alice").await.unwrap();
        let second = fx.service.summary(&doc.id, "alice").await.unwrap();
        let third = fx.service.summary(&doc.id, "alice").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(fx.client.calls(), 1);
        assert_eq!(
            fx.cache.count(&doc.id, "alice", ArtifactKind::Summary).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_abandoned_request_cancels_generation() {
        let client = MockClient::new(SUMMARY_JSON).with_delay(Duration::from_millis(200));
        let fx = fixture_with(client, Duration::from_secs(5)).await;
        let doc = fx.documents.insert("alice", MITOCHONDRIA).await.unwrap();

        let request = {
            let service = Arc::clone(&fx.service);
            let id = doc.id.clone();
            tokio::spawn(async move { service.summary(&id, "alice").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.client.calls(), 1);

        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fx.client.finished(), 0);
        assert_eq!(fx.service.in_flight(), 0);
        assert_eq!(
            fx.cache.count(&doc.id, "alice", ArtifactKind::Summary).await.unwrap(),
            0
        );
    }
}
