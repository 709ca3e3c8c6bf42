use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealmate_shared::types::auth::UserRole;

pub const UNKNOWN_CUSTOMER: &str = "Unknown Customer";
pub const UNKNOWN_COOK: &str = "Unknown Cook";
pub const UNKNOWN_MEAL: &str = "Unknown Meal";
pub const ANONYMOUS_REVIEWER: &str = "Anonymous";

/// Join first and last name, skipping blanks. `None` when both are blank.
pub fn display_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

// --- Rows as returned by the data store ---

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Name columns of an embedded profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileName {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileName {
    pub fn display(&self) -> Option<String> {
        display_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookRow {
    pub id: Uuid,
    #[serde(default)]
    pub hourly_rate: f64,
    pub bio: Option<String>,
    pub speciality: Option<String>,
    pub location_address: Option<String>,
    pub average_rating: Option<f64>,
    pub years_of_experience: Option<i32>,
    #[serde(default)]
    pub is_available: Option<bool>,
    pub profiles: Option<ProfileName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MealCookJoin {
    pub location_address: Option<String>,
    pub profiles: Option<ProfileName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MealRow {
    pub id: Uuid,
    pub cook_id: Option<Uuid>,
    pub title: String,
    pub price: f64,
    pub description: Option<String>,
    pub ingredients: Option<String>,
    #[serde(default)]
    pub is_veg: Option<bool>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub image_url: Option<String>,
    /// Free text such as "30 mins".
    #[serde(default)]
    pub preparation_time: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cook: Option<MealCookJoin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRow {
    pub rating: f64,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub reviewer: Option<ProfileName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderMealJoin {
    pub title: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    pub id: Uuid,
    pub meal_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub quantity: i32,
    pub total_amount: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub meal: Option<OrderMealJoin>,
    pub customer: Option<ProfileName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderAmount {
    pub total_amount: Option<f64>,
}

// --- Stored procedure results ---

#[derive(Debug, Clone, Deserialize)]
pub struct PopularMealRow {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub order_count: i64,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveUserRow {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub order_count: Option<i64>,
    pub last_order_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendRow {
    pub order_date: NaiveDate,
    #[serde(default)]
    pub order_count: i64,
    pub total_revenue: Option<f64>,
}

// --- View models ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookCard {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
    pub hourly_rate: f64,
    pub bio: Option<String>,
    pub speciality: Option<String>,
    pub location: Option<String>,
    pub average_rating: Option<f64>,
    pub years_of_experience: Option<i32>,
    pub is_available: bool,
}

impl From<CookRow> for CookCard {
    fn from(row: CookRow) -> Self {
        Self {
            id: row.id,
            name: row
                .profiles
                .as_ref()
                .and_then(ProfileName::display)
                .unwrap_or_else(|| UNKNOWN_COOK.to_string()),
            avatar_url: row.profiles.and_then(|p| p.avatar_url),
            hourly_rate: row.hourly_rate,
            bio: row.bio,
            speciality: row.speciality,
            location: row.location_address,
            average_rating: row.average_rating,
            years_of_experience: row.years_of_experience,
            is_available: row.is_available.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealCard {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub cook_name: String,
    pub location: String,
    pub rating: Option<f64>,
    pub is_veg: bool,
}

impl From<&MealRow> for MealCard {
    fn from(row: &MealRow) -> Self {
        let cook = row.cook.as_ref();
        Self {
            id: row.id,
            title: row.title.clone(),
            price: row.price,
            image_url: row.image_url.clone(),
            cook_name: cook
                .and_then(|c| c.profiles.as_ref())
                .and_then(ProfileName::display)
                .unwrap_or_else(|| UNKNOWN_COOK.to_string()),
            location: cook
                .and_then(|c| c.location_address.clone())
                .unwrap_or_default(),
            rating: row.rating,
            is_veg: row.is_veg.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub reviewer: String,
    pub rating: f64,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealDetail {
    #[serde(flatten)]
    pub card: MealCard,
    pub cook_id: Option<Uuid>,
    pub description: Option<String>,
    pub ingredients: Option<String>,
    pub preparation_time: Option<String>,
    pub review_count: i64,
    pub reviews: Vec<ReviewView>,
}

/// A cook's own meal as listed on their page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookMeal {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub description: Option<String>,
    pub ingredients: Option<String>,
    pub is_veg: bool,
    pub rating: Option<f64>,
    pub image_url: Option<String>,
}

impl From<MealRow> for CookMeal {
    fn from(row: MealRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            price: row.price,
            description: row.description,
            ingredients: row.ingredients,
            is_veg: row.is_veg.unwrap_or(false),
            rating: row.rating,
            image_url: row.image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CookDetail {
    pub cook: CookCard,
    pub meals: Vec<CookMeal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub meal_title: String,
    pub quantity: i32,
    pub total_amount: f64,
    pub status: String,
    pub customer_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<OrderRow> for OrderSummary {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            meal_title: row
                .meal
                .map(|m| m.title)
                .unwrap_or_else(|| UNKNOWN_MEAL.to_string()),
            quantity: row.quantity,
            total_amount: row.total_amount.unwrap_or(0.0),
            status: row.status,
            customer_name: row
                .customer
                .as_ref()
                .and_then(ProfileName::display)
                .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string()),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminMeal {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub is_veg: bool,
    pub cook_name: String,
    pub rating: String,
    pub review_count: i64,
    pub order_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub member_since: Option<DateTime<Utc>>,
}

impl From<Profile> for ProfileView {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            name: display_name(p.first_name.as_deref(), p.last_name.as_deref()).unwrap_or_default(),
            first_name: p.first_name,
            last_name: p.last_name,
            role: p.role,
            phone: p.phone,
            avatar_url: p.avatar_url,
            member_since: p.created_at,
        }
    }
}
