//! Decoding and validation of the JSON the backend returns for quizzes and
//! flashcards. Elements are validated one by one; a malformed element is
//! dropped without rejecting its neighbours.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use study_genie_core::domain::{Flashcard, Question};

/// Quizzes keep at most this many questions.
pub const MAX_QUIZ_QUESTIONS: usize = 10;
/// A question needs at least this many options to be usable.
pub const MIN_QUIZ_OPTIONS: usize = 4;

static RE_OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").unwrap());
static RE_CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```$").unwrap());

/// Removes a surrounding ```` ``` ```` or ```` ```json ```` fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = match RE_OPENING_FENCE.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => return trimmed,
    };
    match RE_CLOSING_FENCE.find(without_open) {
        Some(m) => without_open[..m.start()].trim(),
        None => without_open.trim(),
    }
}

/// Parses the (unfenced) response as a JSON array.
pub fn parse_json_array(raw: &str) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::from_str::<Vec<Value>>(strip_code_fence(raw))
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize)]
struct RawFlashcard {
    term: String,
    definition: String,
}

/// Keeps the well-formed questions, in order, capped at [`MAX_QUIZ_QUESTIONS`].
pub fn valid_questions(items: Vec<Value>) -> Vec<Question> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawQuestion>(item).ok())
        .filter(|q| q.options.len() >= MIN_QUIZ_OPTIONS)
        .take(MAX_QUIZ_QUESTIONS)
        .map(|q| Question {
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
            explanation: q.explanation.unwrap_or_default(),
        })
        .collect()
}

/// Keeps the flashcards with a non-blank term and definition.
pub fn valid_flashcards(items: Vec<Value>) -> Vec<Flashcard> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawFlashcard>(item).ok())
        .filter(|c| !c.term.trim().is_empty() && !c.definition.trim().is_empty())
        .map(|c| Flashcard {
            term: c.term,
            definition: c.definition,
        })
        .collect()
}

/// The document-independent quiz served when generation or parsing fails.
pub fn fallback_quiz() -> Vec<Question> {
    vec![
        Question {
            question: "Based on the uploaded material, what is the main topic discussed?".to_string(),
            options: vec![
                "A) The content covers various educational concepts".to_string(),
                "B) The material focuses on technical information".to_string(),
                "C) The document contains study-related content".to_string(),
                "D) The text discusses academic subjects".to_string(),
            ],
            correct_answer: "A".to_string(),
            explanation: "This is a general question based on your study material.".to_string(),
        },
        Question {
            question: "What type of document did you upload?".to_string(),
            options: vec![
                "A) Study notes or educational material".to_string(),
                "B) Entertainment content".to_string(),
                "C) Marketing material".to_string(),
                "D) News article".to_string(),
            ],
            correct_answer: "A".to_string(),
            explanation: "You uploaded this document to create study materials.".to_string(),
        },
    ]
}
