//! crates/study_genie_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a user who has signed in through the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// The identity provider's subject id (`sub`).
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl User {
    /// Seeds a brand-new user from verified identity claims.
    pub fn from_claims(claims: &IdentityClaims, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: claims.external_id.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            picture: claims.picture.clone(),
            created_at: now,
            last_login_at: now,
        }
    }
}

/// The broad kind of an uploaded file, as detected from its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Pdf,
    Image,
}

/// Represents a study document uploaded by a user.
///
/// `summary` and `processed_at` are filled in by the generation pipeline;
/// `processed_at` is set exactly when the summary step has concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    /// The sniffed MIME type, e.g. `application/pdf`.
    pub file_type: String,
    pub content: String,
    pub summary: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub question: String,
    /// At least four labelled options, e.g. `"A) ..."`.
    pub options: Vec<String>,
    /// The label of the correct option, e.g. `"A"`.
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    pub id: Uuid,
    pub document_id: Uuid,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlashcardSet {
    pub id: Uuid,
    pub document_id: Uuid,
    pub cards: Vec<Flashcard>,
    pub created_at: DateTime<Utc>,
}

/// Represents a single question-and-answer exchange about a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub document_id: Uuid,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Claims extracted from a verified identity-provider token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub email_verified: bool,
}

/// The contents of a verified session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}
