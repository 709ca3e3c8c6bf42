use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use mealmate_shared::errors::AppResult;
use mealmate_shared::types::auth::{Identity, Session};
use mealmate_shared::types::{ApiResponse, Notification};

use crate::services::analytics::CACHE_PREFIX;
use crate::services::profiles::{self, RegisterRequest};
use crate::AppState;

/// Static description of an auth form.
#[derive(Debug, Serialize)]
pub struct FormPage {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub fields: &'static [&'static str],
}

// --- /login ---

pub async fn login_form() -> Json<ApiResponse<FormPage>> {
    Json(ApiResponse::ok(FormPage {
        title: "Welcome back",
        subtitle: "Enter your credentials to sign in to your account",
        fields: &["email", "password"],
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub access_token: String,
    pub expires_at: i64,
}

impl From<Session> for LoginResponse {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            email: session.email,
            access_token: session.access_token,
            expires_at: session.expires_at,
        }
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    req.validate()?;

    let session = state.identity.sign_in(&req.email, &req.password).await?;
    tracing::info!(user_id = %session.user_id, "user signed in");

    Ok(Json(
        ApiResponse::ok(LoginResponse::from(session))
            .with_notification(Notification::info("Login successful", "Welcome back!")),
    ))
}

// --- /register ---

pub async fn register_form() -> Json<ApiResponse<FormPage>> {
    Json(ApiResponse::ok(FormPage {
        title: "Create an account",
        subtitle: "Join MealMate as a student or a home cook",
        fields: &["name", "email", "password", "role", "location"],
    }))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<Identity>>> {
    let created = profiles::register(state.identity.as_ref(), state.remote.as_ref(), &req).await?;
    state.cache.invalidate_prefix(CACHE_PREFIX).await;

    Ok(Json(ApiResponse::ok(created).with_notification(Notification::info(
        "Registration successful",
        "You have successfully registered. You can now login.",
    ))))
}

// --- /forgot-password ---

pub async fn forgot_password_form() -> Json<ApiResponse<FormPage>> {
    Json(ApiResponse::ok(FormPage {
        title: "Forgot password",
        subtitle: "Enter your email and we'll send you a reset link",
        fields: &["email"],
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
}

/// The response is the same whether or not the address has an account.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    req.validate()?;
    state.identity.recover(&req.email, None).await?;

    Ok(Json(ApiResponse::ok(()).with_notification(Notification::info(
        "Password reset link sent",
        "Check your email for a password reset link.",
    ))))
}

// --- POST /logout ---

/// The token stops resolving to a session here even if the provider call fails.
pub async fn logout(session: Session, State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<()>>> {
    state.revoked.revoke(&session).await;
    state.identity.sign_out(&session.access_token).await?;
    tracing::info!(user_id = %session.user_id, "user signed out");

    Ok(Json(ApiResponse::ok(()).with_notification(Notification::info(
        "Logged out successfully",
        "You have been logged out of your account",
    ))))
}
