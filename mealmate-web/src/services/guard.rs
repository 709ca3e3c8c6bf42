use serde::Deserialize;

use mealmate_shared::clients::{select_as, RemoteData, TableQuery};
use mealmate_shared::types::auth::{Session, UserRole};
use mealmate_shared::types::Notification;
use mealmate_shared::DataAccessError;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Authorized,
    Unauthorized,
    Anonymous,
}

/// Result of one guard pass: where the visitor ends up and what they are told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub state: GuardState,
    pub redirect: Option<&'static str>,
    pub notification: Option<Notification>,
}

impl GuardOutcome {
    fn authorized() -> Self {
        Self { state: GuardState::Authorized, redirect: None, notification: None }
    }

    fn anonymous() -> Self {
        Self {
            state: GuardState::Anonymous,
            redirect: Some(LOGIN_PATH),
            notification: Some(Notification::destructive("Access denied", "You need to login first")),
        }
    }

    fn unauthorized(notification: Notification) -> Self {
        Self { state: GuardState::Unauthorized, redirect: Some(HOME_PATH), notification: Some(notification) }
    }
}

/// Gate for role-restricted pages.
///
/// Starts in `Checking` and settles after [`RoleGuard::run`]. Protected
/// content is only shown in `Authorized`; a fresh guard is built for every
/// request so a role change takes effect on the next one.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    required: UserRole,
    state: GuardState,
}

impl RoleGuard {
    pub fn new(required: UserRole) -> Self {
        Self { required, state: GuardState::Checking }
    }

    pub fn admin() -> Self {
        Self::new(UserRole::Admin)
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub async fn run(&mut self, remote: &dyn RemoteData, session: Option<&Session>) -> GuardOutcome {
        let outcome = self.check(remote, session).await;
        self.state = outcome.state;
        outcome
    }

    async fn check(&self, remote: &dyn RemoteData, session: Option<&Session>) -> GuardOutcome {
        let Some(session) = session.filter(|s| !s.is_expired()) else {
            return GuardOutcome::anonymous();
        };

        #[derive(Deserialize)]
        struct RoleColumn {
            role: UserRole,
        }

        let query = TableQuery::from("profiles")
            .columns(["role"])
            .eq("id", session.user_id.to_string())
            .single();

        match select_as::<RoleColumn>(remote, &query).await.map(|mut rows| rows.pop()) {
            Ok(Some(row)) if row.role == self.required => GuardOutcome::authorized(),
            // a signed-in user without a profile row has no role
            Ok(_) | Err(DataAccessError::NotFound { .. }) => {
                tracing::info!(user_id = %session.user_id, required = %self.required, "role check refused");
                GuardOutcome::unauthorized(Notification::destructive(
                    "Access denied",
                    format!("You do not have {} privileges", self.required),
                ))
            }
            Err(e) => {
                tracing::error!(user_id = %session.user_id, error = %e, "error checking role");
                GuardOutcome::unauthorized(Notification::destructive(
                    "Error",
                    "There was a problem checking your access permissions",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use chrono::Utc;

    fn session_for(user_id: uuid::Uuid, expires_in: i64) -> Session {
        Session {
            user_id,
            email: None,
            access_token: "token".into(),
            expires_at: Utc::now().timestamp() + expires_in,
        }
    }

    #[tokio::test]
    async fn starts_checking_and_admin_is_let_through() {
        let store = fixtures::demo_store().await;
        let mut guard = RoleGuard::admin();
        assert_eq!(guard.state(), GuardState::Checking);

        let outcome = guard.run(&store, Some(&session_for(fixtures::admin_id(), 600))).await;
        assert_eq!(outcome, GuardOutcome::authorized());
        assert_eq!(guard.state(), GuardState::Authorized);
    }

    #[tokio::test]
    async fn no_session_goes_to_login() {
        let store = fixtures::demo_store().await;
        let mut guard = RoleGuard::admin();

        let outcome = guard.run(&store, None).await;
        assert_eq!(outcome.state, GuardState::Anonymous);
        assert_eq!(outcome.redirect, Some(LOGIN_PATH));
        assert_eq!(outcome.notification.unwrap().description, "You need to login first");
    }

    #[tokio::test]
    async fn expired_session_counts_as_anonymous() {
        let store = fixtures::demo_store().await;
        let outcome = RoleGuard::admin()
            .run(&store, Some(&session_for(fixtures::admin_id(), -60)))
            .await;
        assert_eq!(outcome.state, GuardState::Anonymous);
    }

    #[tokio::test]
    async fn customer_is_sent_home() {
        let store = fixtures::demo_store().await;
        let mut guard = RoleGuard::admin();

        let outcome = guard.run(&store, Some(&session_for(fixtures::customer_id(1), 600))).await;
        assert_eq!(outcome.state, GuardState::Unauthorized);
        assert_eq!(outcome.redirect, Some(HOME_PATH));
        let note = outcome.notification.unwrap();
        assert_eq!(note.title, "Access denied");
        assert_eq!(note.description, "You do not have admin privileges");
    }

    #[tokio::test]
    async fn missing_profile_is_unauthorized() {
        let store = fixtures::demo_store().await;
        let outcome = RoleGuard::admin()
            .run(&store, Some(&session_for(uuid::Uuid::from_u128(9999), 600)))
            .await;
        assert_eq!(outcome.state, GuardState::Unauthorized);
        assert_eq!(outcome.redirect, Some(HOME_PATH));
    }

    #[tokio::test]
    async fn store_failure_is_unauthorized_with_error_notice() {
        let store = fixtures::demo_store().await;
        store.fail_on("profiles", DataAccessError::Transport("timeout".into())).await;

        let outcome = RoleGuard::admin()
            .run(&store, Some(&session_for(fixtures::admin_id(), 600)))
            .await;
        assert_eq!(outcome.state, GuardState::Unauthorized);
        assert_eq!(outcome.notification.unwrap().title, "Error");
    }

    #[tokio::test]
    async fn role_change_applies_on_the_next_check() {
        let store = fixtures::demo_store().await;
        let session = session_for(fixtures::admin_id(), 600);
        assert_eq!(RoleGuard::admin().run(&store, Some(&session)).await.state, GuardState::Authorized);

        store
            .upsert("profiles", serde_json::json!({"id": fixtures::admin_id(), "role": "customer"}))
            .await
            .unwrap();
        assert_eq!(RoleGuard::admin().run(&store, Some(&session)).await.state, GuardState::Unauthorized);
    }
}
