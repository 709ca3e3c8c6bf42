use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use mealmate_shared::errors::AppResult;
use mealmate_shared::types::{ApiResponse, Notification};

use crate::models::ProfileView;
use crate::routes::cooks::{cook_key, AVAILABLE_COOKS_KEY};
use crate::routes::extractors::SignedIn;
use crate::routes::meals::MEAL_CARDS_KEY;
use crate::services::analytics::CACHE_PREFIX;
use crate::services::profiles::{self, ProfileForm, ProfileUpdate};
use crate::AppState;

fn profile_key(user_id: Uuid) -> String {
    format!("profile:{user_id}")
}

// --- GET /profile ---

pub async fn get_profile(
    SignedIn(session): SignedIn,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<ProfileView>>> {
    let remote = state.remote_for(Some(&session));
    let user_id = session.user_id;
    let profile = state
        .cache
        .query(&profile_key(user_id), move || async move {
            profiles::get_profile(remote.as_ref(), user_id).await
        })
        .await?;
    Ok(Json(ApiResponse::ok(profile.as_ref().clone())))
}

// --- GET /profile/edit ---

pub async fn edit_form(
    SignedIn(session): SignedIn,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<ProfileForm>>> {
    let remote = state.remote_for(Some(&session));
    let form = profiles::load_profile_form(remote.as_ref(), session.user_id).await?;
    Ok(Json(ApiResponse::ok(form)))
}

// --- POST /profile/edit ---

pub async fn save_profile(
    SignedIn(session): SignedIn,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ApiResponse<()>>> {
    let remote = state.remote_for(Some(&session));
    let user_id = session.user_id;
    let result = profiles::save_profile(remote.as_ref(), user_id, &update).await;

    // a partial write still changed the profile row
    state.cache.invalidate(&profile_key(user_id)).await;
    // the user may have become a cook or stopped being one
    state.cache.invalidate(&cook_key(user_id)).await;
    state.cache.invalidate(AVAILABLE_COOKS_KEY).await;
    state.cache.invalidate(MEAL_CARDS_KEY).await;
    state.cache.invalidate_prefix(CACHE_PREFIX).await;

    result?;
    Ok(Json(ApiResponse::ok(()).with_notification(Notification::info(
        "Profile updated",
        "Your profile has been successfully updated",
    ))))
}
