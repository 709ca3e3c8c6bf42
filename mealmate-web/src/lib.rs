pub mod config;
pub mod fixtures;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use mealmate_shared::clients::{IdentityProvider, RemoteData};
use mealmate_shared::middleware::{metrics_middleware, RevokedTokens, SessionKeys};
use mealmate_shared::types::auth::Session;
use mealmate_shared::QueryCache;

pub struct AppState {
    pub config: config::AppConfig,
    pub remote: Arc<dyn RemoteData>,
    pub identity: Arc<dyn IdentityProvider>,
    pub cache: QueryCache,
    pub revoked: RevokedTokens,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Data handle acting as the signed-in user, or anonymously.
    pub fn remote_for(&self, session: Option<&Session>) -> Arc<dyn RemoteData> {
        match session {
            Some(session) => self.remote.for_session(&session.access_token),
            None => Arc::clone(&self.remote),
        }
    }
}

impl SessionKeys for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }

    fn revoked_tokens(&self) -> Option<&RevokedTokens> {
        Some(&self.revoked)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    use routes::{admin, auth, cooks, health, meals, pages, profile};

    Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/contact", get(pages::contact).post(pages::send_message))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/forgot-password", get(auth::forgot_password_form).post(auth::forgot_password))
        .route("/logout", post(auth::logout))
        .route("/meals", get(meals::list_meals))
        .route("/meals/:id", get(meals::get_meal))
        .route("/meals/:id/order", post(meals::place_order))
        .route("/cooks", get(cooks::list_cooks))
        .route("/cooks/:cookId", get(cooks::get_cook))
        .route("/cooks/:cookId/hire", get(cooks::hire_form).post(cooks::hire))
        .route("/profile", get(profile::get_profile))
        .route("/profile/edit", get(profile::edit_form).post(profile::save_profile))
        .route("/admin", get(admin::dashboard))
        .route("/admin/analytics", get(admin::analytics))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route_layer(axum::middleware::from_fn(metrics_middleware))
        .fallback(pages::not_found)
        .with_state(state)
}
