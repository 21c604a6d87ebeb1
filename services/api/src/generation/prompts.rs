//! Instructions and prompt templates for the study-material generators.
//!
//! Each prompt embeds the document text after truncating it to a per-task
//! character budget so requests stay inside the backend's input limits.

/// Character budget for the summary prompt.
pub const SUMMARY_TEXT_BUDGET: usize = 8000;
/// Character budget for the quiz, flashcard and chat prompts.
pub const STUDY_TEXT_BUDGET: usize = 6000;

pub const SUMMARY_SYSTEM: &str = "You are an expert at creating concise, informative summaries \
of study materials. Create clear, structured summaries that capture the key concepts and main points.";

pub const QUIZ_SYSTEM: &str = "You are an expert quiz creator. You MUST respond with valid JSON only. \
Do not include any text before or after the JSON array.";

pub const FLASHCARD_SYSTEM: &str = "You are an expert at creating educational flashcards. \
Extract key terms, concepts, and definitions from study materials. Respond with a JSON array only.";

const QUIZ_TEMPLATE: &str = r#"Create exactly 10 multiple-choice questions based on this study material.

CRITICAL: Respond with ONLY a valid JSON array. No additional text, no markdown, no explanations.

Required JSON format:
[
  {
    "question": "What is the main concept discussed?",
    "options": ["A) First option", "B) Second option", "C) Third option", "D) Fourth option"],
    "correct_answer": "A",
    "explanation": "Brief explanation why this is correct"
  }
]

Study Material:
{text}"#;

const FLASHCARD_TEMPLATE: &str = r#"Create flashcards from this study material. Return ONLY a JSON array in this exact format:
[
  {
    "term": "Key term or concept",
    "definition": "Clear, concise definition or explanation"
  }
]

Create 15-20 flashcards covering the most important concepts. Study Material:
{text}"#;

/// Returns at most `budget` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Please create a comprehensive summary of the following study material. Focus on key \
         concepts, main points, and important details that a student should remember:\n\n{}",
        truncate_chars(text, SUMMARY_TEXT_BUDGET)
    )
}

pub fn quiz_prompt(text: &str) -> String {
    QUIZ_TEMPLATE.replace("{text}", truncate_chars(text, STUDY_TEXT_BUDGET))
}

pub fn flashcard_prompt(text: &str) -> String {
    FLASHCARD_TEMPLATE.replace("{text}", truncate_chars(text, STUDY_TEXT_BUDGET))
}

/// The tutor's system instruction carries the document as reference material.
pub fn tutor_system(document_text: &str) -> String {
    format!(
        "You are an AI tutor helping students understand their study material. Answer questions \
         based on the provided document content. Be helpful, clear, and educational. Here's the \
         document content for reference:\n\n{}",
        truncate_chars(document_text, STUDY_TEXT_BUDGET)
    )
}
