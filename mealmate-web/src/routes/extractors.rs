use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use mealmate_shared::middleware::OptionalSession;
use mealmate_shared::types::auth::Session;
use mealmate_shared::types::Notification;

use crate::services::guard::{GuardState, RoleGuard, LOGIN_PATH};
use crate::AppState;

/// Sends the visitor elsewhere with a toast explaining why.
#[derive(Debug, Serialize)]
pub struct GuardRejection {
    pub success: bool,
    pub redirect: &'static str,
    pub notification: Notification,
}

impl GuardRejection {
    pub fn new(redirect: &'static str, notification: Notification) -> Self {
        Self { success: false, redirect, notification }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        (StatusCode::SEE_OTHER, [(header::LOCATION, self.redirect)], Json(self)).into_response()
    }
}

/// A live session; anyone else is sent to the login page.
pub struct SignedIn(pub Session);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for SignedIn {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let OptionalSession(session) = OptionalSession::from_request_parts(parts, state)
            .await
            .unwrap_or(OptionalSession(None));

        match session.filter(|s| !s.is_expired()) {
            Some(session) => Ok(Self(session)),
            None => Err(GuardRejection::new(
                LOGIN_PATH,
                Notification::destructive("Login Required", "Please log in to continue"),
            )),
        }
    }
}

/// A session whose profile carries the admin role, checked on every request.
pub struct AdminSession(pub Session);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let OptionalSession(session) = OptionalSession::from_request_parts(parts, state)
            .await
            .unwrap_or(OptionalSession(None));

        let remote = state.remote_for(session.as_ref());
        let mut guard = RoleGuard::admin();
        let outcome = guard.run(remote.as_ref(), session.as_ref()).await;

        match (outcome.state, session) {
            (GuardState::Authorized, Some(session)) => Ok(Self(session)),
            (_, _) => {
                let redirect = outcome.redirect.unwrap_or(LOGIN_PATH);
                let notification = outcome
                    .notification
                    .unwrap_or_else(|| Notification::destructive("Access denied", "You need to login first"));
                Err(GuardRejection::new(redirect, notification))
            }
        }
    }
}
