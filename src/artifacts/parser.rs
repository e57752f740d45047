//! Response parsing
//!
//! Decodes raw generated text into artifacts. Each kind has an explicit
//! decode attempt (`decode_*`) returning `MalformedResponse` on failure, and a
//! fallback constructor (`fallback_*`). The `parse_*` entry points combine the
//! two and never fail: malformed output degrades to placeholder content.

use serde::Deserialize;

use super::types::{Flashcard, FlashcardDeck, Quiz, QuizQuestion, Summary, Topic};

/// Characters of document text quoted by the fallback flashcard
const FALLBACK_EXCERPT_CHARS: usize = 300;
/// Upper bound on placeholder quiz questions
const MAX_FALLBACK_QUESTIONS: u32 = 5;
/// Title of the single topic in a fallback summary
pub const FALLBACK_TOPIC_TITLE: &str = "Main Content";

/// Generated text could not be decoded into the expected shape
#[derive(Debug, thiserror::Error)]
pub enum MalformedResponse {
    #[error("invalid JSON for expected shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no usable items in response")]
    Empty,
}

/// A JSON array, or a single object standing in for a one-element array
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
struct RawSummary {
    summary: String,
    #[serde(default)]
    topics: Option<Vec<RawTopic>>,
}

#[derive(Deserialize)]
struct RawTopic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    correct_answer: i64,
}

impl RawQuestion {
    fn into_question(self) -> Option<QuizQuestion> {
        let correct_index = u8::try_from(self.correct_answer).ok().filter(|i| *i <= 3)?;
        let options: [String; 4] = self.options.try_into().ok()?;
        Some(QuizQuestion {
            prompt: self.question,
            options,
            correct_index,
        })
    }
}

/// Strip an optional fenced code block marker and surrounding whitespace
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

pub fn decode_summary(raw: &str) -> Result<Summary, MalformedResponse> {
    let parsed: RawSummary = serde_json::from_str(strip_fences(raw))?;
    Ok(Summary {
        overall_text: parsed.summary,
        topics: parsed
            .topics
            .unwrap_or_default()
            .into_iter()
            .map(|t| Topic {
                title: t.title,
                body: t.content,
            })
            .collect(),
    })
}

pub fn decode_flashcards(raw: &str) -> Result<FlashcardDeck, MalformedResponse> {
    let parsed: OneOrMany<Flashcard> = serde_json::from_str(strip_fences(raw))?;
    let cards = parsed.into_vec();
    if cards.is_empty() {
        return Err(MalformedResponse::Empty);
    }
    Ok(FlashcardDeck { cards })
}

/// Decode a quiz question by question
///
/// A question is dropped when it is missing a field, has a field of the wrong
/// type, does not have exactly four options or has an out-of-range answer
/// index. The rest of the quiz is kept.
pub fn decode_quiz(raw: &str) -> Result<Quiz, MalformedResponse> {
    let parsed: OneOrMany<serde_json::Value> = serde_json::from_str(strip_fences(raw))?;
    let raw_questions = parsed.into_vec();
    let total = raw_questions.len();

    let questions: Vec<QuizQuestion> = raw_questions
        .into_iter()
        .filter_map(|value| serde_json::from_value::<RawQuestion>(value).ok())
        .filter_map(RawQuestion::into_question)
        .collect();

    if questions.len() < total {
        tracing::warn!(
            "Dropped {} of {} generated quiz questions that were incomplete or invalid",
            total - questions.len(),
            total
        );
    }
    if questions.is_empty() {
        return Err(MalformedResponse::Empty);
    }
    Ok(Quiz { questions })
}

/// Degraded summary carrying the raw text verbatim
pub fn fallback_summary(raw: &str) -> Summary {
    Summary {
        overall_text: raw.to_string(),
        topics: vec![Topic {
            title: FALLBACK_TOPIC_TITLE.to_string(),
            body: raw.to_string(),
        }],
    }
}

/// Two-card deck quoting the start of the document
pub fn fallback_flashcards(excerpt: &str) -> FlashcardDeck {
    let quoted: String = excerpt.chars().take(FALLBACK_EXCERPT_CHARS).collect();
    FlashcardDeck {
        cards: vec![
            Flashcard {
                question: "What is the main topic of this content?".to_string(),
                answer: format!("{}...", quoted),
            },
            Flashcard {
                question: "What are the key concepts discussed?".to_string(),
                answer: "The content covers several important topics that need further study."
                    .to_string(),
            },
        ],
    }
}

/// Up to five placeholder questions, each answered by the first option
pub fn fallback_quiz(requested: u32) -> Quiz {
    let count = requested.min(MAX_FALLBACK_QUESTIONS);
    Quiz {
        questions: (1..=count)
            .map(|i| QuizQuestion {
                prompt: format!("Question {}: What is discussed in this content?", i),
                options: [
                    "Option A".to_string(),
                    "Option B".to_string(),
                    "Option C".to_string(),
                    "Option D".to_string(),
                ],
                correct_index: 0,
            })
            .collect(),
    }
}

pub fn parse_summary(raw: &str) -> Summary {
    decode_summary(raw).unwrap_or_else(|e| {
        tracing::warn!("Summary response malformed ({}), using fallback", e);
        fallback_summary(raw)
    })
}

pub fn parse_flashcards(raw: &str, fallback_excerpt: &str) -> FlashcardDeck {
    decode_flashcards(raw).unwrap_or_else(|e| {
        tracing::warn!("Flashcard response malformed ({}), using fallback", e);
        fallback_flashcards(fallback_excerpt)
    })
}

pub fn parse_quiz(raw: &str, requested: u32) -> Quiz {
    decode_quiz(raw).unwrap_or_else(|e| {
        tracing::warn!("Quiz response malformed ({}), using fallback", e);
        fallback_quiz(requested)
    })
}
