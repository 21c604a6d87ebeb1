//! services/api/src/generation/mod.rs
//!
//! The generation engine: builds bounded prompts, calls the text backend and
//! interprets the result. None of these operations fail; every error is
//! logged and replaced with fallback content.

pub mod parse;
pub mod prompts;
pub mod retry;

use std::sync::Arc;
use study_genie_core::domain::{Flashcard, Question};
use study_genie_core::ports::{PortError, TextGenerationService};
use tracing::{error, info, warn};

use parse::{fallback_quiz, parse_json_array, valid_flashcards, valid_questions};
use prompts::{
    flashcard_prompt, quiz_prompt, summary_prompt, tutor_system, FLASHCARD_SYSTEM, QUIZ_SYSTEM,
    SUMMARY_SYSTEM,
};
use retry::retry_bounded;

/// Total quiz attempts; each attempt queries the backend again.
pub const QUIZ_ATTEMPTS: usize = 3;

pub const SUMMARY_FALLBACK: &str = "Unable to generate summary at this time.";
pub const CHAT_FALLBACK: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again.";

/// Internal failure of one generation call. Never leaves this module.
#[derive(Debug, thiserror::Error)]
enum GenerationError {
    #[error("backend call failed: {0}")]
    Backend(#[from] PortError),
    #[error("response was not a JSON array: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("backend returned an empty response")]
    Empty,
}

/// Produces summaries, quizzes, flashcards and tutor answers for a document.
#[derive(Clone)]
pub struct GenerationEngine {
    backend: Arc<dyn TextGenerationService>,
    quiz_attempts: usize,
}

impl GenerationEngine {
    pub fn new(backend: Arc<dyn TextGenerationService>) -> Self {
        Self {
            backend,
            quiz_attempts: QUIZ_ATTEMPTS,
        }
    }

    async fn free_text(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let text = self.backend.complete(system, prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text.to_string())
    }

    /// Summarises the first 8000 characters of `text`.
    pub async fn generate_summary(&self, text: &str) -> String {
        match self.free_text(SUMMARY_SYSTEM, &summary_prompt(text)).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Error generating summary: {}", e);
                SUMMARY_FALLBACK.to_string()
            }
        }
    }

    /// Generates up to ten questions, or the two-question fallback quiz.
    pub async fn generate_quiz(&self, text: &str) -> Vec<Question> {
        let prompt = quiz_prompt(text);
        let prompt = prompt.as_str();
        let backend = self.backend.as_ref();

        let parsed = retry_bounded("Quiz generation", self.quiz_attempts, |_| async move {
            let raw = backend
                .complete(QUIZ_SYSTEM, prompt)
                .await
                .map_err(GenerationError::Backend)?;
            parse_json_array(&raw).map_err(GenerationError::Parse)
        })
        .await;

        match parsed {
            Ok(items) => {
                let questions = valid_questions(items);
                if questions.is_empty() {
                    warn!("Quiz response contained no valid questions; using fallback quiz");
                    fallback_quiz()
                } else {
                    info!("Successfully generated {} quiz questions", questions.len());
                    questions
                }
            }
            Err(e) => {
                error!("Failed to generate quiz, using fallback quiz: {}", e);
                fallback_quiz()
            }
        }
    }

    /// Generates flashcards; an empty result means nothing usable came back.
    pub async fn generate_flashcards(&self, text: &str) -> Vec<Flashcard> {
        let result = async {
            let raw = self.backend.complete(FLASHCARD_SYSTEM, &flashcard_prompt(text)).await?;
            Ok::<_, GenerationError>(valid_flashcards(parse_json_array(&raw)?))
        }
        .await;

        match result {
            Ok(cards) => cards,
            Err(e) => {
                error!("Failed to generate flashcards: {}", e);
                Vec::new()
            }
        }
    }

    /// Answers `question` using the document as reference material.
    pub async fn chat(&self, document_text: &str, question: &str) -> String {
        match self.free_text(&tutor_system(document_text), question).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error in tutor chat: {}", e);
                CHAT_FALLBACK.to_string()
            }
        }
    }
}
