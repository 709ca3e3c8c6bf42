use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use mealmate_shared::errors::AppResult;
use mealmate_shared::types::{ApiResponse, Notification, Paginated, PaginationParams};
use mealmate_shared::DataAccessError;

use crate::models::{MealCard, MealDetail};
use crate::routes::extractors::SignedIn;
use crate::services::analytics::CACHE_PREFIX;
use crate::services::{catalog, orders};
use crate::AppState;

pub const MEAL_CARDS_KEY: &str = "meals:cards";

/// Every meal card, shared across visitors until a write invalidates it.
pub async fn cached_meal_cards(state: &AppState) -> Result<Arc<Vec<MealCard>>, DataAccessError> {
    let remote = Arc::clone(&state.remote);
    state
        .cache
        .query(MEAL_CARDS_KEY, move || async move { catalog::list_meal_cards(remote.as_ref()).await })
        .await
}

// --- GET /meals ---

pub async fn list_meals(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<catalog::MealFilter>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<MealCard>>>> {
    let cards = cached_meal_cards(&state).await?;
    let matching = filter.apply(&cards);
    tracing::debug!(total = cards.len(), matching = matching.len(), "meal listing filtered");
    Ok(Json(ApiResponse::ok(Paginated::from_items(matching, &page))))
}

// --- GET /meals/:id ---

pub async fn get_meal(
    State(state): State<Arc<AppState>>,
    Path(meal_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MealDetail>>> {
    let remote = Arc::clone(&state.remote);
    let meal = state
        .cache
        .query(&format!("meal:{meal_id}"), move || async move {
            catalog::get_meal(remote.as_ref(), meal_id).await
        })
        .await?;
    Ok(Json(ApiResponse::ok(meal.as_ref().clone())))
}

// --- POST /meals/:id/order ---

pub async fn place_order(
    SignedIn(session): SignedIn,
    State(state): State<Arc<AppState>>,
    Path(meal_id): Path<Uuid>,
    Json(order): Json<orders::NewOrder>,
) -> AppResult<Json<ApiResponse<orders::PlacedOrder>>> {
    let remote = state.remote_for(Some(&session));
    let placed = orders::place_order(remote.as_ref(), session.user_id, meal_id, &order).await?;

    state.cache.invalidate_prefix(CACHE_PREFIX).await;

    let notification = Notification::info(
        "Order placed successfully!",
        format!("Your order for {} has been placed.", placed.meal_title),
    );
    Ok(Json(ApiResponse::ok(placed).with_notification(notification)))
}
