//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::session::SessionError;
use crate::web::state::AppState;

/// Name of the cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "access_token";

/// Finds the session credential on a request.
///
/// An `Authorization: Bearer` header wins over the cookie.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Maps a session failure onto an HTTP status and message.
pub fn session_failure(e: SessionError) -> (StatusCode, String) {
    match e {
        SessionError::Auth(auth) => {
            warn!("Rejected request: {}", auth);
            (StatusCode::UNAUTHORIZED, auth.to_string())
        }
        SessionError::Store(store) => {
            error!("Failed to resolve current user: {:?}", store);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to resolve current user".to_string(),
            )
        }
    }
}

/// Middleware that validates the session credential and loads the user.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let credential = credential_from_headers(req.headers());
    let user = state
        .sessions
        .authenticate(credential.as_deref())
        .await
        .map_err(session_failure)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Like `require_auth`, but never rejects: inserts `Option<User>`.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let credential = credential_from_headers(req.headers());
    let user = state.sessions.authenticate_optional(credential.as_deref()).await;
    req.extensions_mut().insert(user);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_header_is_preferred_over_cookie() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "access_token=from-cookie"),
        ]);
        assert_eq!(credential_from_headers(&map).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_found_among_others() {
        let map = headers(&[(header::COOKIE, "theme=dark; access_token=abc.def.ghi; lang=en")]);
        assert_eq!(credential_from_headers(&map).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn similarly_named_cookie_is_ignored() {
        let map = headers(&[(header::COOKIE, "access_token_old=stale")]);
        assert_eq!(credential_from_headers(&map), None);
    }

    #[test]
    fn other_schemes_and_empty_values_are_ignored() {
        let map = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(credential_from_headers(&map), None);
        let map = headers(&[(header::COOKIE, "access_token=")]);
        assert_eq!(credential_from_headers(&map), None);
    }
}
