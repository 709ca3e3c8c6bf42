use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::errors::{AppError, AuthError, ErrorCode};
use crate::types::auth::{decode_session, Session};

/// Access tokens signed out before they expired.
///
/// Entries are dropped once the token would have expired anyway.
#[derive(Clone, Default)]
pub struct RevokedTokens {
    tokens: Arc<RwLock<HashMap<String, i64>>>,
}

impl RevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn revoke(&self, session: &Session) {
        let now = Utc::now().timestamp();
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, expires_at| *expires_at > now);
        tokens.insert(session.access_token.clone(), session.expires_at);
    }

    pub async fn is_revoked(&self, token: &str) -> bool {
        self.tokens.read().await.contains_key(token)
    }
}

/// State that knows how to verify session tokens.
pub trait SessionKeys {
    fn jwt_secret(&self) -> &str;

    /// Tokens that must no longer resolve to a session.
    fn revoked_tokens(&self) -> Option<&RevokedTokens> {
        None
    }
}

impl<T: SessionKeys> SessionKeys for Arc<T> {
    fn jwt_secret(&self) -> &str {
        self.as_ref().jwt_secret()
    }

    fn revoked_tokens(&self) -> Option<&RevokedTokens> {
        self.as_ref().revoked_tokens()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: SessionKeys + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let session = decode_session(&token, state.jwt_secret())?;
        if let Some(revoked) = state.revoked_tokens() {
            if revoked.is_revoked(&token).await {
                return Err(AuthError::InvalidToken("session has been signed out".into()).into());
            }
        }
        Ok(session)
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::new(ErrorCode::Unauthorized, "authorization header must use Bearer scheme")
        })
}

/// Session if the request carries a valid token, `None` otherwise.
///
/// An expired or forged token counts as signed out.
pub struct OptionalSession(pub Option<Session>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
    S: SessionKeys + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Session::from_request_parts(parts, state).await {
            Ok(session) => Ok(Self(Some(session))),
            Err(e) => {
                if parts.headers.contains_key("Authorization") {
                    tracing::debug!(error = %e, "ignoring unusable session token");
                }
                Ok(Self(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::issue_token;
    use axum::http::Request;
    use uuid::Uuid;

    struct Keys;

    impl SessionKeys for Keys {
        fn jwt_secret(&self) -> &str {
            "extractor-secret"
        }
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/profile");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn bearer_token_yields_session() {
        let user_id = Uuid::new_v4();
        let token = issue_token("extractor-secret", user_id, None, 600).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));

        let session = Session::from_request_parts(&mut parts, &Keys).await.unwrap();
        assert_eq!(session.user_id, user_id);
    }

    #[derive(Default)]
    struct RevokingKeys {
        revoked: RevokedTokens,
    }

    impl SessionKeys for RevokingKeys {
        fn jwt_secret(&self) -> &str {
            "extractor-secret"
        }

        fn revoked_tokens(&self) -> Option<&RevokedTokens> {
            Some(&self.revoked)
        }
    }

    #[tokio::test]
    async fn signed_out_tokens_no_longer_resolve() {
        let keys = RevokingKeys::default();
        let token = issue_token("extractor-secret", Uuid::new_v4(), None, 600).unwrap();
        let header = format!("Bearer {token}");

        let session = Session::from_request_parts(&mut parts_with(Some(&header)), &keys).await.unwrap();
        keys.revoked.revoke(&session).await;

        let err = Session::from_request_parts(&mut parts_with(Some(&header)), &keys).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionInvalid);

        let OptionalSession(session) = OptionalSession::from_request_parts(&mut parts_with(Some(&header)), &keys)
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let mut parts = parts_with(None);
        let err = Session::from_request_parts(&mut parts, &Keys).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn optional_session_swallows_bad_tokens() {
        let mut parts = parts_with(Some("Bearer garbage"));
        let OptionalSession(session) = OptionalSession::from_request_parts(&mut parts, &Keys)
            .await
            .unwrap();
        assert!(session.is_none());

        let mut parts = parts_with(Some("Basic abc"));
        let OptionalSession(session) = OptionalSession::from_request_parts(&mut parts, &Keys)
            .await
            .unwrap();
        assert!(session.is_none());
    }
}
