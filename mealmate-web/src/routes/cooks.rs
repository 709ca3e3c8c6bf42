use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealmate_shared::errors::AppResult;
use mealmate_shared::types::{ApiResponse, Notification};

use crate::models::{CookCard, CookDetail};
use crate::routes::extractors::SignedIn;
use crate::services::bookings::{self, booking_total, parse_clock};
use crate::services::catalog;
use crate::AppState;

pub const AVAILABLE_COOKS_KEY: &str = "cooks:available";

pub fn cook_key(cook_id: Uuid) -> String {
    format!("cook:{cook_id}")
}

#[derive(Debug, Default, Deserialize)]
pub struct CookSearch {
    #[serde(default)]
    pub search: String,
}

// --- GET /cooks ---

pub async fn list_cooks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CookSearch>,
) -> AppResult<Json<ApiResponse<Vec<CookCard>>>> {
    let remote = Arc::clone(&state.remote);
    let cooks = state
        .cache
        .query(AVAILABLE_COOKS_KEY, move || async move {
            catalog::list_available_cooks(remote.as_ref()).await
        })
        .await?;
    Ok(Json(ApiResponse::ok(catalog::search_cooks(&cooks, &params.search))))
}

async fn cached_cook(state: &AppState, cook_id: Uuid) -> AppResult<Arc<CookDetail>> {
    let remote = Arc::clone(&state.remote);
    let detail = state
        .cache
        .query(&cook_key(cook_id), move || async move {
            catalog::get_cook_with_meals(remote.as_ref(), cook_id, "").await
        })
        .await?;
    Ok(detail)
}

// --- GET /cooks/:cookId ---

pub async fn get_cook(
    State(state): State<Arc<AppState>>,
    Path(cook_id): Path<Uuid>,
    Query(params): Query<CookSearch>,
) -> AppResult<Json<ApiResponse<CookDetail>>> {
    let detail = cached_cook(&state, cook_id).await?;
    Ok(Json(ApiResponse::ok(CookDetail {
        cook: detail.cook.clone(),
        meals: catalog::filter_cook_meals(detail.meals.clone(), &params.search),
    })))
}

// --- GET /cooks/:cookId/hire ---

#[derive(Debug, Serialize)]
pub struct HireForm {
    pub cook: CookCard,
    pub start_time: &'static str,
    pub end_time: &'static str,
    /// Monthly price for the default window.
    pub estimate: f64,
}

pub async fn hire_form(
    SignedIn(_session): SignedIn,
    State(state): State<Arc<AppState>>,
    Path(cook_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<HireForm>>> {
    let detail = cached_cook(&state, cook_id).await?;
    let (start_time, end_time) = ("09:00", "17:00");
    let estimate = match (parse_clock(start_time), parse_clock(end_time)) {
        (Some(start), Some(end)) => booking_total(detail.cook.hourly_rate, start, end),
        _ => 0.0,
    };

    Ok(Json(ApiResponse::ok(HireForm {
        cook: detail.cook.clone(),
        start_time,
        end_time,
        estimate,
    })))
}

// --- POST /cooks/:cookId/hire ---

pub async fn hire(
    SignedIn(session): SignedIn,
    State(state): State<Arc<AppState>>,
    Path(cook_id): Path<Uuid>,
    Json(request): Json<bookings::BookingRequest>,
) -> AppResult<Json<ApiResponse<bookings::BookingConfirmation>>> {
    let remote = state.remote_for(Some(&session));
    let confirmation = bookings::create_booking(remote.as_ref(), session.user_id, cook_id, &request).await?;

    let notification = Notification::info("Booking Successful", confirmation.summary());
    Ok(Json(ApiResponse::ok(confirmation).with_notification(notification)))
}
