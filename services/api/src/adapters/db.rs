//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use study_genie_core::domain::{
    ChatMessage, Document, Flashcard, FlashcardSet, Question, Quiz, User,
};
use study_genie_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    external_id: String,
    email: String,
    name: String,
    picture: String,
    created_at: DateTime<Utc>,
    last_login_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            external_id: self.external_id,
            email: self.email,
            name: self.name,
            picture: self.picture,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    filename: String,
    file_type: String,
    content: String,
    summary: Option<String>,
    uploaded_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            user_id: self.user_id,
            filename: self.filename,
            file_type: self.file_type,
            content: self.content,
            summary: self.summary,
            uploaded_at: self.uploaded_at,
            processed_at: self.processed_at,
        }
    }
}

/// JSONB shape of one stored quiz question.
#[derive(Serialize, Deserialize)]
struct QuestionJson {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    #[serde(default)]
    explanation: String,
}

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    document_id: Uuid,
    questions: Json<Vec<QuestionJson>>,
    created_at: DateTime<Utc>,
}
impl QuizRecord {
    fn to_domain(self) -> Quiz {
        Quiz {
            id: self.id,
            document_id: self.document_id,
            questions: self
                .questions
                .0
                .into_iter()
                .map(|q| Question {
                    question: q.question,
                    options: q.options,
                    correct_answer: q.correct_answer,
                    explanation: q.explanation,
                })
                .collect(),
            created_at: self.created_at,
        }
    }
}

/// JSONB shape of one stored flashcard.
#[derive(Serialize, Deserialize)]
struct FlashcardJson {
    term: String,
    definition: String,
}

#[derive(FromRow)]
struct FlashcardSetRecord {
    id: Uuid,
    document_id: Uuid,
    cards: Json<Vec<FlashcardJson>>,
    created_at: DateTime<Utc>,
}
impl FlashcardSetRecord {
    fn to_domain(self) -> FlashcardSet {
        FlashcardSet {
            id: self.id,
            document_id: self.document_id,
            cards: self
                .cards
                .0
                .into_iter()
                .map(|c| Flashcard {
                    term: c.term,
                    definition: c.definition,
                })
                .collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    document_id: Uuid,
    message: String,
    response: String,
    timestamp: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            document_id: self.document_id,
            message: self.message,
            response: self.response,
            timestamp: self.timestamp,
        }
    }
}

const USER_COLUMNS: &str = "id, external_id, email, name, picture, created_at, last_login_at";
const DOCUMENT_COLUMNS: &str =
    "id, user_id, filename, file_type, content, summary, uploaded_at, processed_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn upsert_user_login(&self, candidate: User) -> PortResult<User> {
        // The unique index on email makes concurrent first logins converge on one row.
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (email) DO UPDATE SET last_login_at = EXCLUDED.last_login_at \
             RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(candidate.id)
            .bind(&candidate.external_id)
            .bind(&candidate.email)
            .bind(&candidate.name)
            .bind(&candidate.picture)
            .bind(candidate.created_at)
            .bind(candidate.last_login_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn create_document(&self, document: Document) -> PortResult<Document> {
        let sql = format!(
            "INSERT INTO documents ({DOCUMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(document.id)
            .bind(document.user_id)
            .bind(&document.filename)
            .bind(&document.file_type)
            .bind(&document.content)
            .bind(&document.summary)
            .bind(document.uploaded_at)
            .bind(document.processed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_document_for_owner(
        &self,
        document_id: Uuid,
        owner_id: Uuid,
    ) -> PortResult<Document> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND user_id = $2");
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(document_id)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                not_found_or_unexpected(e, format!("Document {} not found", document_id))
            })?;
        Ok(record.to_domain())
    }

    async fn list_documents_for_owner(
        &self,
        owner_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = $1 \
             ORDER BY uploaded_at DESC LIMIT $2"
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(owner_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn set_document_summary(
        &self,
        document_id: Uuid,
        summary: &str,
        processed_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE documents SET summary = $1, processed_at = $2 WHERE id = $3")
            .bind(summary)
            .bind(processed_at)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }
        Ok(())
    }

    async fn save_quiz(&self, quiz: Quiz) -> PortResult<()> {
        let questions: Vec<QuestionJson> = quiz
            .questions
            .into_iter()
            .map(|q| QuestionJson {
                question: q.question,
                options: q.options,
                correct_answer: q.correct_answer,
                explanation: q.explanation,
            })
            .collect();
        sqlx::query(
            "INSERT INTO quizzes (id, document_id, questions, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(quiz.id)
        .bind(quiz.document_id)
        .bind(Json(questions))
        .bind(quiz.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_quiz_for_document(&self, document_id: Uuid) -> PortResult<Quiz> {
        let record = sqlx::query_as::<_, QuizRecord>(
            "SELECT id, document_id, questions, created_at FROM quizzes \
             WHERE document_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Quiz for {} not found", document_id)))?;
        Ok(record.to_domain())
    }

    async fn save_flashcard_set(&self, set: FlashcardSet) -> PortResult<()> {
        let cards: Vec<FlashcardJson> = set
            .cards
            .into_iter()
            .map(|c| FlashcardJson {
                term: c.term,
                definition: c.definition,
            })
            .collect();
        sqlx::query(
            "INSERT INTO flashcard_sets (id, document_id, cards, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(set.id)
        .bind(set.document_id)
        .bind(Json(cards))
        .bind(set.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_flashcard_set_for_document(&self, document_id: Uuid) -> PortResult<FlashcardSet> {
        let record = sqlx::query_as::<_, FlashcardSetRecord>(
            "SELECT id, document_id, cards, created_at FROM flashcard_sets \
             WHERE document_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            not_found_or_unexpected(e, format!("Flashcards for {} not found", document_id))
        })?;
        Ok(record.to_domain())
    }

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, document_id, message, response, timestamp) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.document_id)
        .bind(&message.message)
        .bind(&message.response)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_chat_messages_for_document(
        &self,
        document_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, document_id, message, response, timestamp FROM chat_messages \
             WHERE document_id = $1 ORDER BY timestamp ASC LIMIT $2",
        )
        .bind(document_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
