//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: identity-provider login, current user and logout.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_genie_core::domain::User;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::session::SESSION_TTL_DAYS;
use crate::web::middleware::SESSION_COOKIE;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// The identity token obtained by the client from Google Sign-In.
    pub token: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            picture: user.picture,
            created_at: user.created_at,
            last_login: user.last_login_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        Duration::days(SESSION_TTL_DAYS).num_seconds()
    )
}

fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/google - Exchange a Google identity token for a session
#[utoipa::path(
    post,
    path = "/api/auth/google",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Identity token rejected"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn google_login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Verify the identity token with the provider
    let claims = state.sessions.verify_identity(&req.token).await.map_err(|e| {
        warn!("Identity verification failed: {}", e);
        (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
    })?;

    // 2. Find or create the local user
    let user = state.sessions.resolve_user(&claims).await.map_err(|e| {
        error!("Failed to resolve user for login: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in".to_string())
    })?;

    // 3. Issue the session credential
    let access_token = state.sessions.issue_credential(&user).map_err(|e| {
        error!("Failed to issue credential: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in".to_string())
    })?;

    info!("User {} signed in", user.id);
    let cookie = session_cookie(&access_token);
    let response = LoginResponse {
        user: user.into(),
        access_token,
        token_type: "bearer".to_string(),
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// GET /api/auth/me - The currently signed-in user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me_handler(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(user.into())
}

/// POST /api/auth/logout - Clear the session cookie
///
/// Credentials are stateless, so there is nothing to revoke server-side.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse)
    )
)]
pub async fn logout_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cleared_cookie())],
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}
