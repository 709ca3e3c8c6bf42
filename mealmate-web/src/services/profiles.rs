use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use mealmate_shared::clients::{select_as, IdentityProvider, RemoteData, TableQuery};
use mealmate_shared::errors::{AppError, AppResult, ErrorCode};
use mealmate_shared::types::auth::{Identity, SignUpMetadata, UserRole};
use mealmate_shared::DataAccessError;

use crate::models::{Profile, ProfileView};

pub async fn get_profile(remote: &dyn RemoteData, user_id: Uuid) -> Result<ProfileView, DataAccessError> {
    let query = TableQuery::from("profiles").eq("id", user_id.to_string()).single();
    let mut rows: Vec<Profile> = select_as(remote, &query).await?;
    rows.pop()
        .map(ProfileView::from)
        .ok_or_else(|| DataAccessError::not_found(format!("profile {user_id}")))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookDetails {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub speciality: Option<String>,
    #[serde(default)]
    pub hourly_rate: f64,
    #[serde(default)]
    pub years_of_experience: i32,
}

/// Current values for the profile edit form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: UserRole,
    pub cook: Option<CookDetails>,
}

pub async fn load_profile_form(remote: &dyn RemoteData, user_id: Uuid) -> Result<ProfileForm, DataAccessError> {
    let profile = get_profile(remote, user_id).await?;

    let cook = if profile.role == UserRole::Cook {
        #[derive(Deserialize)]
        struct CookColumns {
            bio: Option<String>,
            speciality: Option<String>,
            hourly_rate: Option<f64>,
            years_of_experience: Option<i32>,
        }

        let query = TableQuery::from("cooks")
            .columns(["bio", "speciality", "hourly_rate", "years_of_experience"])
            .eq("id", user_id.to_string())
            .maybe_single();
        let row = select_as::<CookColumns>(remote, &query).await?.pop();
        Some(row.map_or_else(CookDetails::default, |c| CookDetails {
            bio: c.bio,
            speciality: c.speciality,
            hourly_rate: c.hourly_rate.unwrap_or(0.0),
            years_of_experience: c.years_of_experience.unwrap_or(0),
        }))
    } else {
        None
    };

    Ok(ProfileForm {
        first_name: profile.first_name.unwrap_or_default(),
        last_name: profile.last_name.unwrap_or_default(),
        phone: profile.phone.unwrap_or_default(),
        role: profile.role,
        cook,
    })
}

/// Roles a user can pick for themselves on the edit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditableRole {
    Customer,
    Cook,
}

impl From<EditableRole> for UserRole {
    fn from(role: EditableRole) -> Self {
        match role {
            EditableRole::Customer => UserRole::Customer,
            EditableRole::Cook => UserRole::Cook,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    pub role: EditableRole,
    #[serde(default)]
    pub cook: Option<CookDetails>,
}

async fn stored_role(remote: &dyn RemoteData, user_id: Uuid) -> Result<Option<UserRole>, DataAccessError> {
    #[derive(Deserialize)]
    struct RoleColumn {
        role: UserRole,
    }

    let query = TableQuery::from("profiles")
        .columns(["role"])
        .eq("id", user_id.to_string())
        .maybe_single();
    Ok(select_as::<RoleColumn>(remote, &query).await?.pop().map(|r| r.role))
}

/// Upsert the profile, then the cook row when the role is `cook`.
///
/// An admin keeps the admin role whatever the form says. The two writes are
/// independent: when the cook write fails the profile change stays and the
/// caller gets a `PartialWrite` error. Returns the role now stored.
pub async fn save_profile(remote: &dyn RemoteData, user_id: Uuid, update: &ProfileUpdate) -> AppResult<UserRole> {
    update.validate()?;

    let role = match stored_role(remote, user_id).await? {
        Some(UserRole::Admin) => UserRole::Admin,
        _ => UserRole::from(update.role),
    };

    let profile = json!({
        "id": user_id,
        "first_name": update.first_name,
        "last_name": update.last_name,
        "phone": update.phone,
        "role": role,
    });
    remote.upsert("profiles", profile).await?;

    if role == UserRole::Cook {
        let details = update.cook.clone().unwrap_or_default();
        let cook = json!({
            "id": user_id,
            "bio": details.bio,
            "speciality": details.speciality,
            "hourly_rate": details.hourly_rate.max(0.0),
            "years_of_experience": details.years_of_experience.max(0),
        });
        if let Err(e) = remote.upsert("cooks", cook).await {
            tracing::error!(%user_id, error = %e, "profile saved but cook details failed");
            return Err(AppError::new(
                ErrorCode::PartialWrite,
                format!("profile saved but cook details could not be updated: {e}"),
            ));
        }
    }

    tracing::info!(%user_id, %role, "profile updated");
    Ok(role)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterRole {
    Student,
    Cook,
}

impl From<RegisterRole> for UserRole {
    fn from(role: RegisterRole) -> Self {
        match role {
            RegisterRole::Student => UserRole::Customer,
            RegisterRole::Cook => UserRole::Cook,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: RegisterRole,
    #[validate(length(min = 2, message = "Location must be at least 2 characters"))]
    pub location: String,
}

/// First word is the first name, the remainder the last name.
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Create the identity and, for cooks, their cook row.
///
/// A failed cook insert is logged and does not undo the sign-up.
pub async fn register(
    identity: &dyn IdentityProvider,
    remote: &dyn RemoteData,
    request: &RegisterRequest,
) -> AppResult<Identity> {
    request.validate()?;

    let (first_name, last_name) = split_name(&request.name);
    let metadata = SignUpMetadata {
        first_name,
        last_name,
        role: request.role.into(),
        location: Some(request.location.clone()),
    };

    let created = identity.sign_up(&request.email, &request.password, &metadata).await?;

    if request.role == RegisterRole::Cook {
        let row = json!({
            "id": created.id,
            "location_address": request.location,
            "hourly_rate": 0,
        });
        if let Err(e) = remote.insert("cooks", row).await {
            tracing::error!(user_id = %created.id, error = %e, "error creating cook profile");
        }
    }

    tracing::info!(user_id = %created.id, role = %metadata.role, "user registered");
    Ok(created)
}
