//! crates/study_genie_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ContentCategory, Document, FlashcardSet, IdentityClaims, Quiz, User,
};

//=========================================================================================
// Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failures of identity verification and session handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid identity token")]
    InvalidToken,
    #[error("Token not issued for this application")]
    AudienceMismatch,
    #[error("Session has expired")]
    Expired,
    #[error("Malformed session credential")]
    Malformed,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("User not found")]
    NotFound,
}

/// Failures of turning uploaded bytes into text. Both are client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Unsupported file type. Please upload PDF or image files.")]
    UnsupportedType,
    #[error("No text could be extracted from the file.")]
    NoTextFound,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The record store. Every lookup that takes an `owner_id` must treat a
/// record owned by someone else exactly like a missing one.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---

    /// Inserts `candidate` if no user has its email yet; otherwise only bumps
    /// the stored user's `last_login_at` to `candidate.last_login_at`.
    /// Returns the stored record either way.
    async fn upsert_user_login(&self, candidate: User) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    // --- Document Management ---
    async fn create_document(&self, document: Document) -> PortResult<Document>;

    async fn get_document_for_owner(&self, document_id: Uuid, owner_id: Uuid)
        -> PortResult<Document>;

    /// Newest first.
    async fn list_documents_for_owner(&self, owner_id: Uuid, limit: usize)
        -> PortResult<Vec<Document>>;

    async fn set_document_summary(
        &self,
        document_id: Uuid,
        summary: &str,
        processed_at: DateTime<Utc>,
    ) -> PortResult<()>;

    // --- Generated Study Material ---
    async fn save_quiz(&self, quiz: Quiz) -> PortResult<()>;

    /// The most recently created quiz for the document.
    async fn get_quiz_for_document(&self, document_id: Uuid) -> PortResult<Quiz>;

    async fn save_flashcard_set(&self, set: FlashcardSet) -> PortResult<()>;

    async fn get_flashcard_set_for_document(&self, document_id: Uuid)
        -> PortResult<FlashcardSet>;

    // --- Chat History ---
    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()>;

    /// Oldest first.
    async fn get_chat_messages_for_document(
        &self,
        document_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<ChatMessage>>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validates an identity token issued by the external provider.
    async fn verify_identity_token(&self, token: &str) -> Result<IdentityClaims, AuthError>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Runs a single completion with a system instruction and a user prompt.
    async fn complete(&self, system: &str, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Extracts the readable text from a file of the given category.
    async fn extract_text(
        &self,
        bytes: &[u8],
        category: ContentCategory,
    ) -> Result<String, ExtractionError>;
}
