//! Artifact types
//!
//! Field names follow the data model; serde renames give the persisted and
//! wire shapes (`content`, `question`, `correctAnswer`).

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Kind of derived study artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Summary,
    Flashcards,
    Quiz,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Flashcards => "flashcards",
            Self::Quiz => "quiz",
        }
    }

    /// Whether cache entries of this kind carry a size parameter
    pub fn is_sized(&self) -> bool {
        matches!(self, Self::Quiz)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One topic of a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    #[serde(rename = "content")]
    pub body: String,
}

/// Topic-wise overview of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "content")]
    pub overall_text: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub cards: Vec<Flashcard>,
}

/// Multiple-choice question with exactly four options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: [String; 4],
    /// Index into `options`, always in `0..=3`
    #[serde(rename = "correctAnswer")]
    pub correct_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// An artifact that can be generated, cached and served
pub trait StudyArtifact: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ArtifactKind;

    /// Size parameter recorded with the cache entry
    fn size(&self) -> Option<u32> {
        None
    }

    /// Narrow a cached artifact to the first `size` items
    fn trimmed(self, _size: u32) -> Self {
        self
    }
}

impl StudyArtifact for Summary {
    const KIND: ArtifactKind = ArtifactKind::Summary;
}

impl StudyArtifact for FlashcardDeck {
    const KIND: ArtifactKind = ArtifactKind::Flashcards;
}

impl StudyArtifact for Quiz {
    const KIND: ArtifactKind = ArtifactKind::Quiz;

    fn size(&self) -> Option<u32> {
        Some(u32::try_from(self.questions.len()).unwrap_or(u32::MAX))
    }

    fn trimmed(mut self, size: u32) -> Self {
        self.questions.truncate(size as usize);
        self
    }
}
