//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::extraction::sniff_content_type;
use crate::web::auth::{
    self, LoginRequest, LoginResponse, MessageResponse, UserResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_genie_core::domain::{ChatMessage, Document, FlashcardSet, Quiz, User};
use study_genie_core::ports::{ExtractionError, PortError};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// Upper bound on documents returned by the listing endpoint.
pub const DOCUMENT_LIST_LIMIT: usize = 100;
/// Upper bound on chat messages returned for a document.
pub const CHAT_HISTORY_LIMIT: usize = 100;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        root_handler,
        auth::google_login_handler,
        auth::me_handler,
        auth::logout_handler,
        upload_handler,
        list_documents_handler,
        get_document_handler,
        get_quiz_handler,
        get_flashcards_handler,
        chat_history_handler,
        chat_handler,
    ),
    components(
        schemas(
            StatusResponse,
            LoginRequest,
            LoginResponse,
            UserResponse,
            MessageResponse,
            DocumentResponse,
            QuestionResponse,
            QuizResponse,
            FlashcardResponse,
            FlashcardSetResponse,
            ChatMessageResponse,
            ChatRequest,
            ChatResponse,
        )
    ),
    tags(
        (name = "StudyGenie API", description = "Upload study material and get summaries, quizzes, flashcards and a tutor.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub message: String,
    /// Email of the signed-in caller, when a valid credential was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub file_type: String,
    pub content: String,
    /// `null` until the background summary step has finished.
    pub summary: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            filename: doc.filename,
            file_type: doc.file_type,
            content: doc.content,
            summary: doc.summary,
            uploaded_at: doc.uploaded_at,
            processed_at: doc.processed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Serialize, ToSchema)]
pub struct QuizResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub questions: Vec<QuestionResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<Quiz> for QuizResponse {
    fn from(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            document_id: quiz.document_id,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuestionResponse {
                    question: q.question,
                    options: q.options,
                    correct_answer: q.correct_answer,
                    explanation: q.explanation,
                })
                .collect(),
            created_at: quiz.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardResponse {
    pub term: String,
    pub definition: String,
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardSetResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub cards: Vec<FlashcardResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<FlashcardSet> for FlashcardSetResponse {
    fn from(set: FlashcardSet) -> Self {
        Self {
            id: set.id,
            document_id: set.document_id,
            cards: set
                .cards
                .into_iter()
                .map(|c| FlashcardResponse {
                    term: c.term,
                    definition: c.definition,
                })
                .collect(),
            created_at: set.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ChatMessage> for ChatMessageResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            document_id: m.document_id,
            message: m.message,
            response: m.response,
            timestamp: m.timestamp,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub document_id: Uuid,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
}

type HandlerError = (StatusCode, String);

/// Maps a store failure, treating `NotFound` as 404 with `not_found` as the message.
fn port_failure(e: PortError, not_found: &str, context: &str) -> HandlerError {
    match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, not_found.to_string()),
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

/// A path id that is not a UUID names no document.
fn parse_document_id(raw: &str) -> Result<Uuid, HandlerError> {
    Uuid::parse_str(raw).map_err(|_| (StatusCode::NOT_FOUND, "Document not found".to_string()))
}

/// Loads a document only if `user` owns it. Non-owned and missing look the same.
async fn owned_document(
    app_state: &AppState,
    user: &User,
    document_id: Uuid,
    context: &str,
) -> Result<Document, HandlerError> {
    app_state
        .db
        .get_document_for_owner(document_id, user.id)
        .await
        .map_err(|e| port_failure(e, "Document not found", context))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check. Reports the caller's email when a valid credential is sent.
#[utoipa::path(
    get,
    path = "/api/",
    responses((status = 200, description = "Service is running", body = StatusResponse))
)]
pub async fn root_handler(Extension(user): Extension<Option<User>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "StudyGenie API is running!".to_string(),
        user: user.map(|u| u.email),
    })
}

/// Upload a PDF or image, extract its text and start generating study material.
///
/// The response is sent once the document is stored; summary, quiz and
/// flashcards are produced in the background.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "The document to upload, in a `file` field."),
    responses(
        (status = 200, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "Missing file, unsupported type or no extractable text"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        upload = Some((name, data));
        break;
    }
    let (filename, data) = upload.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        )
    })?;

    let (category, file_type) = sniff_content_type(&data).ok_or_else(|| {
        warn!("Rejected upload '{}' with unrecognised content", filename);
        (
            StatusCode::BAD_REQUEST,
            ExtractionError::UnsupportedType.to_string(),
        )
    })?;

    let content = app_state
        .extractor
        .extract_text(&data, category)
        .await
        .map_err(|e| {
            warn!("Extraction failed for '{}': {}", filename, e);
            (StatusCode::BAD_REQUEST, e.to_string())
        })?;

    let document = Document {
        id: Uuid::new_v4(),
        user_id: user.id,
        filename,
        file_type: file_type.to_string(),
        content,
        summary: None,
        uploaded_at: Utc::now(),
        processed_at: None,
    };
    let document = app_state.db.create_document(document).await.map_err(|e| {
        error!("Failed to store document: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to process document".to_string(),
        )
    })?;
    info!("Stored document {} for user {}", document.id, user.id);

    // Fire and forget; the pipeline is tracked for shutdown.
    let _ = app_state
        .pipeline
        .launch(document.id, document.content.clone());

    Ok(Json(DocumentResponse::from(document)))
}

/// List the caller's documents, newest first.
#[utoipa::path(
    get,
    path = "/api/documents",
    responses(
        (status = 200, description = "The caller's documents", body = [DocumentResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_documents_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HandlerError> {
    let documents = app_state
        .db
        .list_documents_for_owner(user.id, DOCUMENT_LIST_LIMIT)
        .await
        .map_err(|e| port_failure(e, "Documents not found", "Failed to fetch documents"))?;
    let body: Vec<DocumentResponse> = documents.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/documents/{document_id}",
    params(("document_id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "The document", body = DocumentResponse),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_document_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let document_id = parse_document_id(&document_id)?;
    let document = owned_document(&app_state, &user, document_id, "Failed to fetch document").await?;
    Ok(Json(DocumentResponse::from(document)))
}

/// The most recent quiz generated for a document.
#[utoipa::path(
    get,
    path = "/api/documents/{document_id}/quiz",
    params(("document_id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "The quiz", body = QuizResponse),
        (status = 404, description = "Document or quiz not found")
    )
)]
pub async fn get_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let document_id = parse_document_id(&document_id)?;
    owned_document(&app_state, &user, document_id, "Failed to fetch quiz").await?;
    let quiz = app_state
        .db
        .get_quiz_for_document(document_id)
        .await
        .map_err(|e| port_failure(e, "Quiz not found", "Failed to fetch quiz"))?;
    Ok(Json(QuizResponse::from(quiz)))
}

/// The most recent flashcard set generated for a document.
#[utoipa::path(
    get,
    path = "/api/documents/{document_id}/flashcards",
    params(("document_id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "The flashcards", body = FlashcardSetResponse),
        (status = 404, description = "Document or flashcards not found")
    )
)]
pub async fn get_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let document_id = parse_document_id(&document_id)?;
    owned_document(&app_state, &user, document_id, "Failed to fetch flashcards").await?;
    let set = app_state
        .db
        .get_flashcard_set_for_document(document_id)
        .await
        .map_err(|e| port_failure(e, "Flashcards not found", "Failed to fetch flashcards"))?;
    Ok(Json(FlashcardSetResponse::from(set)))
}

#[utoipa::path(
    get,
    path = "/api/documents/{document_id}/chat-history",
    params(("document_id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Chat messages, oldest first", body = [ChatMessageResponse]),
        (status = 404, description = "Document not found")
    )
)]
pub async fn chat_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let document_id = parse_document_id(&document_id)?;
    owned_document(&app_state, &user, document_id, "Failed to fetch chat history").await?;
    let messages = app_state
        .db
        .get_chat_messages_for_document(document_id, CHAT_HISTORY_LIMIT)
        .await
        .map_err(|e| port_failure(e, "Document not found", "Failed to fetch chat history"))?;
    let body: Vec<ChatMessageResponse> = messages.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Ask the tutor a question about one of the caller's documents.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The tutor's answer", body = ChatResponse),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Chat service unavailable")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let document =
        owned_document(&app_state, &user, req.document_id, "Chat service unavailable").await?;

    let response = app_state.engine.chat(&document.content, &req.message).await;

    let message = ChatMessage {
        id: Uuid::new_v4(),
        document_id: document.id,
        message: req.message,
        response: response.clone(),
        timestamp: Utc::now(),
    };
    app_state.db.save_chat_message(message).await.map_err(|e| {
        error!("Failed to save chat message: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Chat service unavailable".to_string(),
        )
    })?;

    Ok(Json(ChatResponse { response }))
}
