//! services/api/src/session.rs
//!
//! Turns verified identities into local users and issues the signed,
//! stateless session credential (HS256 JWT) that gates every other endpoint.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_genie_core::domain::{IdentityClaims, SessionClaims, User};
use study_genie_core::ports::{AuthError, DatabaseService, IdentityProvider, PortError};
use tracing::{info, warn};
use uuid::Uuid;

/// Lifetime of a session credential and of its cookie.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Failure of a session operation: either the caller is not authenticated,
/// or the record store could not be reached.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] PortError),
}

/// The JWT payload.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialClaims {
    sub: String,
    email: String,
    exp: i64,
    iat: i64,
}

/// Verifies identities, resolves users and issues/validates credentials.
pub struct SessionService {
    db: Arc<dyn DatabaseService>,
    identity: Arc<dyn IdentityProvider>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        identity: Arc<dyn IdentityProvider>,
        secret: &str,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            db,
            identity,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Checks an identity-provider token and returns its claims.
    pub async fn verify_identity(&self, identity_token: &str) -> Result<IdentityClaims, AuthError> {
        self.identity.verify_identity_token(identity_token).await
    }

    /// Finds the user by exact email, creating it on first login.
    ///
    /// An existing user only has `last_login_at` refreshed; id, name and
    /// avatar keep their stored values.
    pub async fn resolve_user(&self, claims: &IdentityClaims) -> Result<User, PortError> {
        let candidate = User::from_claims(claims, Utc::now());
        let candidate_id = candidate.id;
        let user = self.db.upsert_user_login(candidate).await?;
        if user.id == candidate_id {
            info!("Created user {} for {}", user.id, user.email);
        } else {
            info!("User {} logged in", user.id);
        }
        Ok(user)
    }

    /// Signs a credential for `user` that expires in [`SESSION_TTL_DAYS`].
    pub fn issue_credential(&self, user: &User) -> Result<String, PortError> {
        self.issue_credential_at(user, Utc::now())
    }

    fn issue_credential_at(&self, user: &User, issued_at: DateTime<Utc>) -> Result<String, PortError> {
        let expires_at = issued_at + Duration::days(SESSION_TTL_DAYS);
        let claims = CredentialClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PortError::Unexpected(format!("Failed to sign credential: {}", e)))
    }

    /// Checks signature, structure and expiry of a session credential.
    pub fn verify_credential(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let data = decode::<CredentialClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            })?;
        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Malformed)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(AuthError::Malformed)?;
        Ok(SessionClaims {
            user_id,
            email: claims.email,
            expires_at,
        })
    }

    /// Loads the user a verified credential refers to.
    pub async fn current_user(&self, claims: &SessionClaims) -> Result<User, SessionError> {
        match self.db.get_user_by_id(claims.user_id).await {
            Ok(user) => Ok(user),
            Err(PortError::NotFound(_)) => {
                warn!("Credential refers to missing user {}", claims.user_id);
                Err(AuthError::NotFound.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves the caller of a request. A missing credential is `Unauthenticated`.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<User, SessionError> {
        let token = credential.ok_or(AuthError::Unauthenticated)?;
        let claims = self.verify_credential(token)?;
        self.current_user(&claims).await
    }

    /// Like [`authenticate`](Self::authenticate), but any failure means "no user".
    pub async fn authenticate_optional(&self, credential: Option<&str>) -> Option<User> {
        self.authenticate(credential).await.ok()
    }
}
