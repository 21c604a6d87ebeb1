pub mod auth;
pub mod generation_task;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use generation_task::GenerationPipeline;
pub use middleware::{optional_auth, require_auth};
pub use rest::ApiDoc;
pub use state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}

/// Builds the full application router: API routes under `/api` plus Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Routes that work with or without a session
    let open_routes = Router::new()
        .route("/api", get(rest::root_handler))
        .route("/api/", get(rest::root_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/auth/google", post(auth::google_login_handler))
        .route("/api/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me_handler))
        .route("/api/upload", post(rest::upload_handler))
        .route("/api/documents", get(rest::list_documents_handler))
        .route("/api/documents/{document_id}", get(rest::get_document_handler))
        .route("/api/documents/{document_id}/quiz", get(rest::get_quiz_handler))
        .route(
            "/api/documents/{document_id}/flashcards",
            get(rest::get_flashcards_handler),
        )
        .route(
            "/api/documents/{document_id}/chat-history",
            get(rest::chat_history_handler),
        )
        .route("/api/chat", post(rest::chat_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(open_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .layer(cors_layer(&app_state.config.cors_origins))
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}
