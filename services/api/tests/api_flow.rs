//! End-to-end tests of the HTTP surface against the in-memory record store
//! and scripted generation, identity and extraction backends.

use api_lib::adapters::InMemoryDb;
use api_lib::config::Config;
use api_lib::generation::GenerationEngine;
use api_lib::session::SessionService;
use api_lib::web::{router, AppState, GenerationPipeline};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use study_genie_core::domain::{ContentCategory, IdentityClaims};
use study_genie_core::ports::{
    AuthError, ExtractionError, IdentityProvider, PortError, PortResult, TextExtractionService,
    TextGenerationService,
};
use tower::ServiceExt;

const BOUNDARY: &str = "studygenie-boundary";

struct FakeBackend;

#[async_trait]
impl TextGenerationService for FakeBackend {
    async fn complete(&self, system: &str, _prompt: &str) -> PortResult<String> {
        if system.contains("summaries") {
            Ok("Plants convert light into chemical energy.".to_string())
        } else if system.contains("quiz") {
            Ok(json!([{
                "question": "What do plants produce?",
                "options": ["A) Sugar", "B) Salt", "C) Iron", "D) Gold"],
                "correct_answer": "A",
                "explanation": "Photosynthesis produces glucose."
            }])
            .to_string())
        } else if system.contains("flashcards") {
            Ok(r#"```json
[{"term": "Chlorophyll", "definition": "The green pigment that absorbs light"}]
```"#
                .to_string())
        } else if system.contains("tutor") {
            Ok("Chlorophyll absorbs light.".to_string())
        } else {
            Err(PortError::Unexpected("unexpected prompt".to_string()))
        }
    }
}

struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_identity_token(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let email = match token {
            "alice-token" => "alice@example.com",
            "bob-token" => "bob@example.com",
            "foreign-token" => return Err(AuthError::AudienceMismatch),
            _ => return Err(AuthError::InvalidToken),
        };
        Ok(IdentityClaims {
            external_id: format!("google-{}", email),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            picture: String::new(),
            email_verified: true,
        })
    }
}

struct FakeExtractor;

#[async_trait]
impl TextExtractionService for FakeExtractor {
    async fn extract_text(
        &self,
        bytes: &[u8],
        _category: ContentCategory,
    ) -> Result<String, ExtractionError> {
        let text = String::from_utf8_lossy(bytes);
        if text.contains("BLANK") {
            return Err(ExtractionError::NoTextFound);
        }
        Ok("Photosynthesis turns light, water and carbon dioxide into sugar.".to_string())
    }
}

struct TestApp {
    app: Router,
    pipeline: Arc<GenerationPipeline>,
}

fn test_app() -> TestApp {
    let vars = [
        ("DATABASE_URL", "memory"),
        ("OPENAI_API_KEY", "sk-test"),
        ("GOOGLE_CLIENT_ID", "client-id"),
        ("JWT_SECRET", "integration-secret"),
    ];
    let config = Config::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .unwrap();

    let db = Arc::new(InMemoryDb::new());
    let engine = GenerationEngine::new(Arc::new(FakeBackend));
    let pipeline = Arc::new(GenerationPipeline::new(db.clone(), engine.clone()));
    let sessions = Arc::new(SessionService::new(
        db.clone(),
        Arc::new(FakeIdentity),
        &config.jwt_secret,
    ));
    let state = Arc::new(AppState {
        db,
        config: Arc::new(config),
        sessions,
        extractor: Arc::new(FakeExtractor),
        engine,
        pipeline: pipeline.clone(),
    });
    TestApp {
        app: router(state),
        pipeline,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<(String, String)>, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn upload(token: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn login(app: &Router, identity_token: &str) -> String {
    let (status, _, body) = send(
        app,
        post_json("/api/auth/google", None, json!({ "token": identity_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

fn set_cookie(headers: &[(String, String)]) -> Option<&str> {
    headers
        .iter()
        .find(|(k, _)| k == "set-cookie")
        .map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn root_reports_optional_user() {
    let t = test_app();
    let (status, _, body) = send(&t.app, get("/api/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "StudyGenie API is running!");
    assert!(body.get("user").is_none());

    let token = login(&t.app, "alice-token").await;
    let (_, _, body) = send(&t.app, get("/api/", Some(&token))).await;
    assert_eq!(body["user"], "alice@example.com");

    let (status, _, _) = send(&t.app, get("/api/", Some("garbage"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_sets_cookie_and_returns_bearer_credential() {
    let t = test_app();
    let (status, headers, body) = send(
        &t.app,
        post_json("/api/auth/google", None, json!({ "token": "alice-token" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["email"], "alice@example.com");
    let token = body["access_token"].as_str().unwrap();
    let cookie = set_cookie(&headers).unwrap();
    assert!(cookie.starts_with(&format!("access_token={};", token)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=604800"));
}

#[tokio::test]
async fn rejected_identity_tokens_are_unauthorized() {
    let t = test_app();
    for token in ["foreign-token", "forged-token"] {
        let (status, headers, _) = send(
            &t.app,
            post_json("/api/auth/google", None, json!({ "token": token })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(set_cookie(&headers).is_none());
    }
}

#[tokio::test]
async fn protected_routes_require_a_credential() {
    let t = test_app();
    for uri in ["/api/auth/me", "/api/documents"] {
        let (status, _, _) = send(&t.app, get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _, _) = send(&t.app, get(uri, Some("not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn cookie_credential_is_accepted() {
    let t = test_app();
    let token = login(&t.app, "bob-token").await;
    let req = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("theme=dark; access_token={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "bob@example.com");
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let t = test_app();
    let (status, headers, body) = send(&t.app, post_json("/api/auth/logout", None, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
    let cookie = set_cookie(&headers).unwrap();
    assert!(cookie.starts_with("access_token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn upload_returns_before_generation_and_content_appears_later() {
    let t = test_app();
    let token = login(&t.app, "alice-token").await;

    let (status, _, doc) = send(&t.app, upload(&token, "plants.pdf", b"%PDF-1.4 plants")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["filename"], "plants.pdf");
    assert_eq!(doc["file_type"], "application/pdf");
    assert!(doc["summary"].is_null());
    assert!(doc["processed_at"].is_null());
    let id = doc["id"].as_str().unwrap().to_string();

    // Wait for the background pipeline to settle.
    let mut summary = Value::Null;
    for _ in 0..100 {
        let (_, _, current) = send(&t.app, get(&format!("/api/documents/{}", id), Some(&token))).await;
        if !current["summary"].is_null() {
            assert!(!current["processed_at"].is_null());
            summary = current["summary"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(summary, "Plants convert light into chemical energy.");
    t.pipeline.shutdown().await;

    let (status, _, quiz) = send(&t.app, get(&format!("/api/documents/{}/quiz", id), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 1);
    assert_eq!(quiz["questions"][0]["correct_answer"], "A");

    let (status, _, cards) =
        send(&t.app, get(&format!("/api/documents/{}/flashcards", id), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cards["cards"][0]["term"], "Chlorophyll");

    let (status, _, list) = send(&t.app, get("/api/documents", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unsupported_and_blank_uploads_are_rejected() {
    let t = test_app();
    let token = login(&t.app, "alice-token").await;

    let (status, _, _) = send(&t.app, upload(&token, "notes.txt", b"just some text")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&t.app, upload(&token, "blank.pdf", b"%PDF-1.4 BLANK")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, list) = send(&t.app, get("/api/documents", Some(&token))).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn other_users_documents_look_nonexistent() {
    let t = test_app();
    let alice = login(&t.app, "alice-token").await;
    let bob = login(&t.app, "bob-token").await;

    let (_, _, doc) = send(&t.app, upload(&alice, "plants.pdf", b"%PDF-1.4 plants")).await;
    let id = doc["id"].as_str().unwrap().to_string();
    let missing = uuid::Uuid::new_v4();

    for suffix in ["", "/quiz", "/flashcards", "/chat-history"] {
        let (foreign_status, _, foreign_body) =
            send(&t.app, get(&format!("/api/documents/{}{}", id, suffix), Some(&bob))).await;
        let (missing_status, _, missing_body) =
            send(&t.app, get(&format!("/api/documents/{}{}", missing, suffix), Some(&bob))).await;
        assert_eq!(foreign_status, StatusCode::NOT_FOUND);
        assert_eq!(foreign_status, missing_status);
        assert_eq!(foreign_body, missing_body);
    }

    for suffix in ["", "/quiz", "/flashcards", "/chat-history"] {
        let (status, _, _) =
            send(&t.app, get(&format!("/api/documents/not-a-uuid{}", suffix), Some(&bob))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, _, _) = send(
        &t.app,
        post_json("/api/chat", Some(&bob), json!({ "document_id": id, "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, bob_docs) = send(&t.app, get("/api/documents", Some(&bob))).await;
    assert!(bob_docs.as_array().unwrap().is_empty());
    t.pipeline.shutdown().await;
}

#[tokio::test]
async fn chat_answers_and_records_history() {
    let t = test_app();
    let token = login(&t.app, "alice-token").await;
    let (_, _, doc) = send(&t.app, upload(&token, "plants.png", b"\x89PNG\r\n\x1a\nimage")).await;
    assert_eq!(doc["file_type"], "image/png");
    let id = doc["id"].as_str().unwrap().to_string();

    for question in ["What is chlorophyll?", "Why is it green?"] {
        let (status, _, body) = send(
            &t.app,
            post_json("/api/chat", Some(&token), json!({ "document_id": id, "message": question })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Chlorophyll absorbs light.");
    }

    let (status, _, history) =
        send(&t.app, get(&format!("/api/documents/{}/chat-history", id), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["message"], "What is chlorophyll?");
    assert_eq!(history[1]["message"], "Why is it green?");
    t.pipeline.shutdown().await;
}
