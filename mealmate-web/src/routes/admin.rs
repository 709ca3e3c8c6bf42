use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use mealmate_shared::types::ApiResponse;

use crate::routes::extractors::AdminSession;
use crate::services::analytics::{self, AdminDashboard, AnalyticsDashboard, CACHE_PREFIX};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    /// Drop cached widgets and reload everything.
    #[serde(default)]
    pub refresh: bool,
}

async fn maybe_refresh(state: &AppState, params: &RefreshParams) {
    if params.refresh {
        tracing::debug!("admin widgets refresh requested");
        state.cache.invalidate_prefix(CACHE_PREFIX).await;
    }
}

// --- GET /admin ---

/// Widgets load independently; failures show up per widget, never as an
/// error response.
pub async fn dashboard(
    AdminSession(session): AdminSession,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Json<ApiResponse<AdminDashboard>> {
    maybe_refresh(&state, &params).await;
    let remote = state.remote_for(Some(&session));
    let view = analytics::admin_dashboard(remote, &state.cache, &state.config.dashboard(), Utc::now()).await;
    Json(ApiResponse::ok(view))
}

// --- GET /admin/analytics ---

pub async fn analytics(
    AdminSession(session): AdminSession,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Json<ApiResponse<AnalyticsDashboard>> {
    maybe_refresh(&state, &params).await;
    let remote = state.remote_for(Some(&session));
    let view = analytics::analytics_dashboard(remote, &state.cache, &state.config.dashboard(), Utc::now()).await;
    Json(ApiResponse::ok(view))
}
