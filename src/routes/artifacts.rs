//! Study artifact API routes
//!
//! - `GET /:document_id/summary`
//! - `GET /:document_id/flashcards`
//! - `GET /:document_id/quiz?questions=N` (default 20)
//!
//! Each artifact is generated on first request and served from the cache
//! afterwards.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::identity::Requester;
use crate::artifacts::{FlashcardDeck, Quiz, Summary, DEFAULT_QUIZ_QUESTIONS};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the artifacts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:document_id/summary", get(get_summary))
        .route("/:document_id/flashcards", get(get_flashcards))
        .route("/:document_id/quiz", get(get_quiz))
}

/// Quiz query parameters
///
/// `questions` is kept as text so that a bad value is reported through
/// `AppError` instead of the extractor's plain-text rejection.
#[derive(Debug, Deserialize)]
struct QuizQuery {
    questions: Option<String>,
}

impl QuizQuery {
    fn question_count(&self) -> Result<u32> {
        match self.questions.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_QUIZ_QUESTIONS),
            Some(value) => value.parse().map_err(|_| {
                AppError::BadRequest(format!(
                    "questions must be a positive integer, got {:?}",
                    value
                ))
            }),
        }
    }
}

/// Get or generate the summary of a document
async fn get_summary(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Requester(user_id): Requester,
) -> Result<Json<Summary>> {
    let summary = state.artifacts().summary(&document_id, &user_id).await?;
    Ok(Json(summary))
}

/// Get or generate the flashcard deck of a document
async fn get_flashcards(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Requester(user_id): Requester,
) -> Result<Json<FlashcardDeck>> {
    let deck = state.artifacts().flashcards(&document_id, &user_id).await?;
    Ok(Json(deck))
}

/// Get or generate a quiz for a document
async fn get_quiz(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<QuizQuery>,
    Requester(user_id): Requester,
) -> Result<Json<Quiz>> {
    let count = query.question_count()?;
    let quiz = state.artifacts().quiz(&document_id, &user_id, count).await?;
    Ok(Json(quiz))
}
