//! services/api/src/adapters/identity.rs
//!
//! This module contains the adapter for Google's token-info endpoint.
//! It implements the `IdentityProvider` port from the `core` crate.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use study_genie_core::domain::IdentityClaims;
use study_genie_core::ports::{AuthError, IdentityProvider};
use tracing::warn;

/// The subset of the token-info payload this service relies on.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
    /// Google encodes this as the string `"true"`/`"false"`, other providers as a bool.
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
}

impl TokenInfo {
    fn email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Checks the audience and pulls out the claims.
    fn into_claims(self, expected_audience: &str) -> Result<IdentityClaims, AuthError> {
        if self.aud.as_deref() != Some(expected_audience) {
            return Err(AuthError::AudienceMismatch);
        }
        let email_verified = self.email_verified();
        let external_id = self.sub.ok_or(AuthError::InvalidToken)?;
        let email = self.email.ok_or(AuthError::InvalidToken)?;
        Ok(IdentityClaims {
            external_id,
            email,
            name: self.name.unwrap_or_default(),
            picture: self.picture.unwrap_or_default(),
            email_verified,
        })
    }
}

/// An adapter that verifies Google ID tokens by introspection.
#[derive(Clone)]
pub struct GoogleIdentityAdapter {
    http: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
}

impl GoogleIdentityAdapter {
    pub fn new(
        tokeninfo_url: String,
        client_id: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            tokeninfo_url,
            client_id,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityAdapter {
    async fn verify_identity_token(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let response = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| {
                warn!("Identity provider request failed: {}", e);
                AuthError::InvalidToken
            })?;

        if !response.status().is_success() {
            warn!("Identity provider rejected token with status {}", response.status());
            return Err(AuthError::InvalidToken);
        }

        let info = response.json::<TokenInfo>().await.map_err(|e| {
            warn!("Identity provider returned an unreadable payload: {}", e);
            AuthError::InvalidToken
        })?;

        info.into_claims(&self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
    use std::collections::HashMap;

    fn info(json: &str) -> TokenInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn matching_audience_yields_claims() {
        let claims = info(
            r#"{"aud":"client-1","sub":"1234","email":"ada@example.com","name":"Ada",
                "picture":"https://example.com/a.png","email_verified":"true"}"#,
        )
        .into_claims("client-1")
        .unwrap();

        assert_eq!(claims.external_id, "1234");
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.email_verified);
    }

    #[test]
    fn foreign_audience_is_rejected() {
        let result = info(r#"{"aud":"someone-else","sub":"1","email":"a@b.c"}"#).into_claims("client-1");
        assert_eq!(result, Err(AuthError::AudienceMismatch));
    }

    #[test]
    fn missing_audience_is_rejected() {
        let result = info(r#"{"sub":"1","email":"a@b.c"}"#).into_claims("client-1");
        assert_eq!(result, Err(AuthError::AudienceMismatch));
    }

    #[test]
    fn missing_email_is_invalid() {
        let result = info(r#"{"aud":"client-1","sub":"1"}"#).into_claims("client-1");
        assert_eq!(result, Err(AuthError::InvalidToken));
    }

    #[test]
    fn boolean_email_verified_is_accepted() {
        let claims = info(r#"{"aud":"c","sub":"1","email":"a@b.c","email_verified":true}"#)
            .into_claims("c")
            .unwrap();
        assert!(claims.email_verified);
        assert_eq!(claims.name, "");
    }

    /// Answers like the token-info endpoint, keyed on the `id_token` query value.
    async fn tokeninfo(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
        match params.get("id_token").map(String::as_str) {
            Some("ours") => Json(serde_json::json!({
                "aud": "client-1",
                "sub": "42",
                "email": "ada@example.com",
                "name": "Ada",
                "email_verified": "true"
            }))
            .into_response(),
            Some("theirs") => Json(serde_json::json!({
                "aud": "other-client",
                "sub": "43",
                "email": "eve@example.com"
            }))
            .into_response(),
            Some("garbled") => (StatusCode::OK, "not json").into_response(),
            _ => (StatusCode::BAD_REQUEST, "invalid_token").into_response(),
        }
    }

    async fn adapter_against_local_provider() -> GoogleIdentityAdapter {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/tokeninfo", get(tokeninfo)))
                .await
                .unwrap();
        });
        GoogleIdentityAdapter::new(
            format!("http://{}/tokeninfo", addr),
            "client-1".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn provider_rejection_is_invalid_token() {
        let adapter = adapter_against_local_provider().await;
        assert_eq!(
            adapter.verify_identity_token("expired").await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn token_for_another_client_is_audience_mismatch() {
        let adapter = adapter_against_local_provider().await;
        assert_eq!(
            adapter.verify_identity_token("theirs").await,
            Err(AuthError::AudienceMismatch)
        );
    }

    #[tokio::test]
    async fn accepted_token_yields_claims() {
        let adapter = adapter_against_local_provider().await;
        let claims = adapter.verify_identity_token("ours").await.unwrap();
        assert_eq!(claims.external_id, "42");
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.name, "Ada");
        assert!(claims.email_verified);
    }

    #[tokio::test]
    async fn unreadable_payload_is_invalid_token() {
        let adapter = adapter_against_local_provider().await;
        assert_eq!(
            adapter.verify_identity_token("garbled").await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn unreachable_provider_is_invalid_token() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let adapter = GoogleIdentityAdapter::new(
            format!("http://{}/tokeninfo", addr),
            "client-1".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(
            adapter.verify_identity_token("ours").await,
            Err(AuthError::InvalidToken)
        );
    }
}
