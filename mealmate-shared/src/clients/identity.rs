use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::memory::MemoryStore;
use super::remote::RemoteData;
use crate::errors::AuthError;
use crate::types::auth::{decode_session, issue_token, Identity, Session, SignUpMetadata};

/// The hosted authentication service.
#[axum::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Create an identity; the data store derives the profile row from `metadata`.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Identity, AuthError>;

    /// Send a password-reset email. Unknown addresses are not revealed.
    async fn recover(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

/// HTTPS client for the hosted auth API.
#[derive(Clone)]
pub struct GoTrueClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

/// Sign-up answers with a full session when email confirmation is off and
/// with the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    WithSession { user: Identity },
    User(Identity),
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthErrorBody {
    fn into_message(self, fallback: StatusCode) -> String {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .unwrap_or_else(|| fallback.to_string())
    }
}

impl GoTrueClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn failure_message(response: Response) -> String {
        let status = response.status();
        let body: AuthErrorBody = response.json().await.unwrap_or_default();
        body.into_message(status)
    }
}

#[axum::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let message = Self::failure_message(response).await;
            tracing::error!(status = status.as_u16(), error = %message, "sign in failed");
            return Err(AuthError::Unavailable(message));
        }

        let token: TokenResponse = response.json().await?;
        Ok(Session {
            user_id: token.user.id,
            email: token.user.email,
            expires_at: token
                .expires_at
                .unwrap_or_else(|| Utc::now().timestamp() + token.expires_in),
            access_token: token.access_token,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Identity, AuthError> {
        let response = self
            .client
            .post(self.endpoint("signup"))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::failure_message(response).await;
            tracing::warn!(status = status.as_u16(), error = %message, "sign up rejected");
            return Err(if status.is_server_error() {
                AuthError::Unavailable(message)
            } else {
                AuthError::SignUp(message)
            });
        }

        match response.json::<SignUpResponse>().await? {
            SignUpResponse::WithSession { user } | SignUpResponse::User(user) => Ok(user),
        }
    }

    async fn recover(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        let mut request = self
            .client
            .post(self.endpoint("recover"))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email }));
        if let Some(target) = redirect_to {
            request = request.query(&[("redirect_to", target)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let message = Self::failure_message(response).await;
            tracing::warn!(error = %message, "password recovery rejected");
            return Err(AuthError::Recovery(message));
        }
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            // token already revoked or expired
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => {
                let message = Self::failure_message(response).await;
                tracing::error!(status = status.as_u16(), error = %message, "sign out failed");
                Err(AuthError::Unavailable(message))
            }
        }
    }
}

struct Account {
    id: Uuid,
    password_hash: String,
}

/// In-process identity provider for tests and the offline demo.
///
/// Tokens are signed with the same secret the web service verifies with.
/// When a profile store is attached, sign-up writes the profile row the
/// hosted database would create from the sign-up metadata.
#[derive(Clone)]
pub struct MemoryIdentity {
    jwt_secret: String,
    ttl_secs: i64,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    profiles: Option<MemoryStore>,
}

impl MemoryIdentity {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            ttl_secs: 3600,
            accounts: Arc::new(RwLock::new(HashMap::new())),
            profiles: None,
        }
    }

    pub fn with_profile_store(mut self, store: MemoryStore) -> Self {
        self.profiles = Some(store);
        self
    }

    /// Register credentials for an existing profile id.
    pub async fn add_account(&self, id: Uuid, email: &str, password: &str) -> Result<(), AuthError> {
        let password_hash = hash_password(password)?;
        self.accounts
            .write()
            .await
            .insert(email.to_lowercase(), Account { id, password_hash });
        Ok(())
    }

    fn session_for(&self, id: Uuid, email: &str) -> Result<Session, AuthError> {
        let token = issue_token(&self.jwt_secret, id, Some(email.to_string()), self.ttl_secs)?;
        decode_session(&token, &self.jwt_secret)
    }
}

#[axum::async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let id = {
            let accounts = self.accounts.read().await;
            let account = accounts
                .get(&email.to_lowercase())
                .ok_or(AuthError::InvalidCredentials)?;
            if !verify_password(password, &account.password_hash)? {
                return Err(AuthError::InvalidCredentials);
            }
            account.id
        };
        self.session_for(id, email)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Identity, AuthError> {
        let key = email.to_lowercase();
        if self.accounts.read().await.contains_key(&key) {
            return Err(AuthError::SignUp("User already registered".into()));
        }

        let id = Uuid::new_v4();
        self.add_account(id, email, password).await?;

        if let Some(store) = &self.profiles {
            let row = json!({
                "id": id,
                "first_name": metadata.first_name,
                "last_name": metadata.last_name,
                "role": metadata.role,
            });
            store
                .insert("profiles", row)
                .await
                .map_err(|e| AuthError::SignUp(format!("database error saving new user: {e}")))?;
        }

        Ok(Identity { id, email: Some(email.to_string()) })
    }

    async fn recover(&self, email: &str, _redirect_to: Option<&str>) -> Result<(), AuthError> {
        let known = self.accounts.read().await.contains_key(&email.to_lowercase());
        tracing::debug!(known, "password recovery requested");
        Ok(())
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Unavailable(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Unavailable(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::UserRole;

    fn metadata(role: UserRole) -> SignUpMetadata {
        SignUpMetadata {
            first_name: "Priya".into(),
            last_name: "Nair".into(),
            role,
            location: Some("Indiranagar, Bangalore".into()),
        }
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let store = MemoryStore::new();
        let identity = MemoryIdentity::new("secret").with_profile_store(store.clone());

        let created = identity
            .sign_up("priya@example.in", "hunter22", &metadata(UserRole::Customer))
            .await
            .unwrap();

        let profiles = store.rows("profiles").await;
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["id"], created.id.to_string());
        assert_eq!(profiles[0]["role"], "customer");

        let session = identity.sign_in("Priya@Example.in", "hunter22").await.unwrap();
        assert_eq!(session.user_id, created.id);
        assert_eq!(decode_session(&session.access_token, "secret").unwrap().user_id, created.id);
    }

    #[tokio::test]
    async fn wrong_password_and_duplicates_are_rejected() {
        let identity = MemoryIdentity::new("secret");
        identity.add_account(Uuid::new_v4(), "a@b.in", "secret1").await.unwrap();

        assert_eq!(
            identity.sign_in("a@b.in", "secret2").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            identity.sign_in("nobody@b.in", "secret1").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert!(matches!(
            identity.sign_up("a@b.in", "secret1", &metadata(UserRole::Cook)).await,
            Err(AuthError::SignUp(_))
        ));
    }

    #[test]
    fn sign_up_response_shapes() {
        let id = Uuid::new_v4();
        let bare: SignUpResponse =
            serde_json::from_value(json!({"id": id, "email": "x@y.in", "aud": "authenticated"})).unwrap();
        let wrapped: SignUpResponse = serde_json::from_value(
            json!({"access_token": "t", "user": {"id": id, "email": "x@y.in"}}),
        )
        .unwrap();

        for response in [bare, wrapped] {
            match response {
                SignUpResponse::WithSession { user } | SignUpResponse::User(user) => {
                    assert_eq!(user.id, id)
                }
            }
        }
    }

    #[test]
    fn error_body_prefers_provider_message() {
        let body: AuthErrorBody = serde_json::from_value(json!({"msg": "User already registered"})).unwrap();
        assert_eq!(body.into_message(StatusCode::BAD_REQUEST), "User already registered");
        assert_eq!(
            AuthErrorBody::default().into_message(StatusCode::BAD_REQUEST),
            "400 Bad Request"
        );
    }
}
