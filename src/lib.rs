//! Study Artifacts Server Library
//!
//! Turns stored documents into derived study artifacts (summaries, flashcard
//! decks and multiple-choice quizzes) through an external text-generation
//! provider, and memoizes every result so repeated requests are served from
//! the artifact cache.
//!
//! # Modules
//!
//! - `artifacts`: Artifact types, response parsing, caching and orchestration
//! - `generation`: Generation provider boundary and prompt construction
//! - `documents`: Read access to the document store
//! - `routes`: HTTP surface

pub mod artifacts;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod generation;
pub mod routes;
pub mod state;
