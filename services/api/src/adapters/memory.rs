//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Selected with
//! `DATABASE_URL=memory` for local runs and used by the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use study_genie_core::domain::{ChatMessage, Document, FlashcardSet, Quiz, User};
use study_genie_core::ports::{DatabaseService, PortError, PortResult};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    documents: HashMap<Uuid, Document>,
    quizzes: Vec<Quiz>,
    flashcard_sets: Vec<FlashcardSet>,
    chat_messages: Vec<ChatMessage>,
}

/// Every collection sits behind one lock, so each operation is atomic.
#[derive(Default)]
pub struct InMemoryDb {
    tables: RwLock<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn quiz_count(&self, document_id: Uuid) -> usize {
        let tables = self.tables.read().await;
        tables.quizzes.iter().filter(|q| q.document_id == document_id).count()
    }

    pub async fn flashcard_set_count(&self, document_id: Uuid) -> usize {
        let tables = self.tables.read().await;
        tables
            .flashcard_sets
            .iter()
            .filter(|s| s.document_id == document_id)
            .count()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn upsert_user_login(&self, candidate: User) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.users.values_mut().find(|u| u.email == candidate.email) {
            existing.last_login_at = candidate.last_login_at;
            return Ok(existing.clone());
        }
        tables.users.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.tables
            .read()
            .await
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_document(&self, document: Document) -> PortResult<Document> {
        let mut tables = self.tables.write().await;
        if tables.documents.contains_key(&document.id) {
            return Err(PortError::Unexpected(format!(
                "Document {} already exists",
                document.id
            )));
        }
        tables.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document_for_owner(
        &self,
        document_id: Uuid,
        owner_id: Uuid,
    ) -> PortResult<Document> {
        self.tables
            .read()
            .await
            .documents
            .get(&document_id)
            .filter(|d| d.user_id == owner_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))
    }

    async fn list_documents_for_owner(
        &self,
        owner_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<Document>> {
        let tables = self.tables.read().await;
        let mut documents: Vec<Document> = tables
            .documents
            .values()
            .filter(|d| d.user_id == owner_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        documents.truncate(limit);
        Ok(documents)
    }

    async fn set_document_summary(
        &self,
        document_id: Uuid,
        summary: &str,
        processed_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let document = tables
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))?;
        document.summary = Some(summary.to_string());
        document.processed_at = Some(processed_at);
        Ok(())
    }

    async fn save_quiz(&self, quiz: Quiz) -> PortResult<()> {
        self.tables.write().await.quizzes.push(quiz);
        Ok(())
    }

    async fn get_quiz_for_document(&self, document_id: Uuid) -> PortResult<Quiz> {
        // Records are appended in creation order, so the last match is the newest.
        let tables = self.tables.read().await;
        tables
            .quizzes
            .iter()
            .rev()
            .find(|q| q.document_id == document_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Quiz for {} not found", document_id)))
    }

    async fn save_flashcard_set(&self, set: FlashcardSet) -> PortResult<()> {
        self.tables.write().await.flashcard_sets.push(set);
        Ok(())
    }

    async fn get_flashcard_set_for_document(&self, document_id: Uuid) -> PortResult<FlashcardSet> {
        let tables = self.tables.read().await;
        tables
            .flashcard_sets
            .iter()
            .rev()
            .find(|s| s.document_id == document_id)
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Flashcards for {} not found", document_id))
            })
    }

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()> {
        self.tables.write().await.chat_messages.push(message);
        Ok(())
    }

    async fn get_chat_messages_for_document(
        &self,
        document_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<ChatMessage>> {
        let tables = self.tables.read().await;
        let mut messages: Vec<ChatMessage> = tables
            .chat_messages
            .iter()
            .filter(|m| m.document_id == document_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        messages.truncate(limit);
        Ok(messages)
    }
}
