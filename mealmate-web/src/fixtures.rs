//! Demo data set: a small marketplace of cooks, meals, customers and orders.
//!
//! Backs the offline `memory` data source and the test suite. Ids are
//! deterministic so tests can address rows directly; timestamps are relative
//! to the moment the store is built so recent-activity widgets have data.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use mealmate_shared::clients::memory::Tables;
use mealmate_shared::clients::{MemoryIdentity, MemoryStore};
use mealmate_shared::AuthError;

pub const DEMO_PASSWORD: &str = "mealmate-demo";
pub const ADMIN_EMAIL: &str = "admin@mealmate.demo";

const ORPHAN_CUSTOMER: u128 = 0x1ff;

pub fn admin_id() -> Uuid {
    Uuid::from_u128(0xa0)
}

pub fn customer_id(n: u128) -> Uuid {
    Uuid::from_u128(0x100 + n)
}

pub fn cook_id(n: u128) -> Uuid {
    Uuid::from_u128(0x200 + n)
}

pub fn meal_id(n: u128) -> Uuid {
    Uuid::from_u128(0x300 + n)
}

fn ago(days: i64, hours: i64) -> String {
    (Utc::now() - Duration::days(days) - Duration::hours(hours)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct DemoCook {
    first: &'static str,
    last: &'static str,
    location: &'static str,
    speciality: &'static str,
    bio: &'static str,
    hourly_rate: f64,
    rating: f64,
    years: i32,
    available: bool,
}

const COOKS: [DemoCook; 8] = [
    DemoCook { first: "Anita", last: "Sharma", location: "Hauz Khas, Delhi", speciality: "North Indian home food",
        bio: "Cooking dal and sabzi the way my mother did for thirty years.", hourly_rate: 250.0, rating: 4.8, years: 12, available: true },
    DemoCook { first: "Raj", last: "Kumar", location: "Koramangala, Bangalore", speciality: "Punjabi curries",
        bio: "Former dhaba cook, now feeding hungry engineers.", hourly_rate: 300.0, rating: 4.7, years: 8, available: true },
    DemoCook { first: "Sana", last: "Patel", location: "Bandra, Mumbai", speciality: "Hyderabadi biryani",
        bio: "Slow-cooked dum biryani every weekend.", hourly_rate: 350.0, rating: 4.9, years: 10, available: true },
    DemoCook { first: "Lakshmi", last: "Iyer", location: "Adyar, Chennai", speciality: "South Indian tiffin",
        bio: "Crisp dosas and fresh chutneys for breakfast and dinner.", hourly_rate: 220.0, rating: 4.6, years: 15, available: true },
    DemoCook { first: "Vikas", last: "Kapoor", location: "Connaught Place, Delhi", speciality: "Street food classics",
        bio: "Chole, kulche and everything fried and festive.", hourly_rate: 200.0, rating: 4.5, years: 6, available: true },
    DemoCook { first: "Farhan", last: "Ahmed", location: "Alipore, Kolkata", speciality: "Mughlai",
        bio: "Family recipes for kebabs and rich gravies.", hourly_rate: 400.0, rating: 4.9, years: 18, available: true },
    DemoCook { first: "Ramya", last: "Subramaniam", location: "Anna Nagar, Chennai", speciality: "Tamil home cooking",
        bio: "Soft idlis, sambar and rasam made fresh daily.", hourly_rate: 180.0, rating: 4.7, years: 9, available: true },
    DemoCook { first: "Harpreet", last: "Kaur", location: "Sector 17, Chandigarh", speciality: "Punjabi breakfast",
        bio: "Parathas with white butter and homemade pickle.", hourly_rate: 150.0, rating: 4.6, years: 20, available: false },
];

struct DemoMeal {
    title: &'static str,
    price: f64,
    description: &'static str,
    ingredients: &'static str,
    is_veg: bool,
    rating: f64,
    review_count: i64,
    prep_time: &'static str,
}

const MEALS: [DemoMeal; 8] = [
    DemoMeal { title: "Dal Chawal Tadka", price: 80.0,
        description: "Yellow lentils tempered with ghee, cumin and garlic, served with steamed basmati rice.",
        ingredients: "Toor dal, basmati rice, ghee, cumin, garlic, turmeric", is_veg: true, rating: 4.8, review_count: 2, prep_time: "30 mins" },
    DemoMeal { title: "Paneer Butter Masala", price: 120.0,
        description: "Cottage cheese cubes in a silky tomato and cashew gravy.",
        ingredients: "Paneer, tomato, cashew, butter, cream, kasuri methi", is_veg: true, rating: 4.7, review_count: 0, prep_time: "40 mins" },
    DemoMeal { title: "Chicken Biryani", price: 150.0,
        description: "Dum-cooked basmati layered with spiced chicken and fried onions.",
        ingredients: "Chicken, basmati rice, yoghurt, saffron, fried onion, whole spices", is_veg: false, rating: 4.9, review_count: 1, prep_time: "90 mins" },
    DemoMeal { title: "Masala Dosa", price: 75.0,
        description: "Fermented rice crepe filled with potato masala, with sambar and coconut chutney.",
        ingredients: "Rice, urad dal, potato, mustard seeds, curry leaves, coconut", is_veg: true, rating: 4.6, review_count: 0, prep_time: "25 mins" },
    DemoMeal { title: "Chole Bhature", price: 90.0,
        description: "Spicy chickpea curry with two puffed fried breads.",
        ingredients: "Chickpeas, maida, onion, tomato, chole masala", is_veg: true, rating: 4.5, review_count: 0, prep_time: "35 mins" },
    DemoMeal { title: "Mutton Rogan Josh", price: 180.0,
        description: "Tender mutton braised in a Kashmiri chilli and yoghurt gravy.",
        ingredients: "Mutton, yoghurt, Kashmiri chilli, fennel, dry ginger", is_veg: false, rating: 4.9, review_count: 0, prep_time: "120 mins" },
    DemoMeal { title: "Idli Sambar", price: 60.0,
        description: "Four steamed rice cakes with lentil sambar.",
        ingredients: "Rice, urad dal, toor dal, drumstick, tamarind", is_veg: true, rating: 4.7, review_count: 0, prep_time: "20 mins" },
    DemoMeal { title: "Aloo Paratha", price: 50.0,
        description: "Whole wheat flatbread stuffed with spiced potato, with curd and pickle.",
        ingredients: "Wheat flour, potato, green chilli, coriander, butter", is_veg: true, rating: 4.6, review_count: 0, prep_time: "25 mins" },
];

/// (meal, customer, quantity, status, days ago, hours ago)
const ORDERS: [(u128, u128, i32, &str, i64, i64); 9] = [
    (1, 1, 2, "completed", 1, 0),
    (3, 2, 1, "completed", 2, 0),
    (1, 2, 1, "pending", 0, 3),
    (6, 1, 1, "completed", 3, 0),
    (2, 1, 2, "completed", 5, 0),
    (4, ORPHAN_CUSTOMER, 2, "pending", 6, 0),
    (3, 1, 1, "cancelled", 8, 0),
    (7, 2, 3, "completed", 12, 0),
    (1, 1, 1, "completed", 20, 0),
];

fn profile(id: Uuid, first: &str, last: &str, role: &str, created_at: String) -> Value {
    json!({
        "id": id,
        "first_name": first,
        "last_name": last,
        "role": role,
        "phone": null,
        "avatar_url": null,
        "created_at": created_at,
        "updated_at": created_at,
    })
}

/// A store seeded with the demo marketplace and its reporting functions.
pub async fn demo_store() -> MemoryStore {
    let store = MemoryStore::new();

    let mut profiles = vec![
        profile(admin_id(), "Meera", "Joshi", "admin", ago(90, 0)),
        profile(customer_id(1), "Priya", "Nair", "customer", ago(60, 0)),
        profile(customer_id(2), "Arjun", "Mehta", "customer", ago(45, 0)),
    ];
    let mut cooks = Vec::new();
    for (n, cook) in (1..).zip(COOKS.iter()) {
        profiles.push(profile(cook_id(n), cook.first, cook.last, "cook", ago(120, 0)));
        cooks.push(json!({
            "id": cook_id(n),
            "bio": cook.bio,
            "speciality": cook.speciality,
            "hourly_rate": cook.hourly_rate,
            "location_address": cook.location,
            "average_rating": cook.rating,
            "years_of_experience": cook.years,
            "is_available": cook.available,
        }));
    }

    let meals = (1..)
        .zip(MEALS.iter())
        .map(|(n, meal)| {
            json!({
                "id": meal_id(n),
                "cook_id": cook_id(n),
                "title": meal.title,
                "price": meal.price,
                "description": meal.description,
                "ingredients": meal.ingredients,
                "is_veg": meal.is_veg,
                "rating": meal.rating,
                "review_count": meal.review_count,
                "image_url": null,
                "preparation_time": meal.prep_time,
                "created_at": ago(30 - n as i64, 0),
            })
        })
        .collect();

    let orders = (1..)
        .zip(ORDERS.iter())
        .map(|(n, &(meal, customer, quantity, status, days, hours))| {
            let customer = if customer == ORPHAN_CUSTOMER { Uuid::from_u128(customer) } else { customer_id(customer) };
            json!({
                "id": Uuid::from_u128(0x400 + n),
                "meal_id": meal_id(meal),
                "customer_id": customer,
                "quantity": quantity,
                "total_amount": MEALS[meal as usize - 1].price * f64::from(quantity),
                "status": status,
                "delivery_address": null,
                "created_at": ago(days, hours),
            })
        })
        .collect();

    let reviews = vec![
        json!({"id": Uuid::from_u128(0x501), "meal_id": meal_id(1), "reviewer_id": customer_id(1),
               "rating": 5.0, "comment": "Tastes exactly like home.", "created_at": ago(1, 0)}),
        json!({"id": Uuid::from_u128(0x502), "meal_id": meal_id(1), "reviewer_id": customer_id(2),
               "rating": 4.5, "comment": "Generous portion, could use more salt.", "created_at": ago(2, 0)}),
        json!({"id": Uuid::from_u128(0x503), "meal_id": meal_id(3), "reviewer_id": Uuid::from_u128(ORPHAN_CUSTOMER),
               "rating": 5.0, "comment": null, "created_at": ago(4, 0)}),
    ];

    store.seed("profiles", profiles).await;
    store.seed("cooks", cooks).await;
    store.seed("meals", meals).await;
    store.seed("orders", orders).await;
    store.seed("reviews", reviews).await;

    store.register_rpc("get_popular_meals", popular_meals).await;
    store.register_rpc("get_active_users", active_users).await;
    store.register_rpc("get_order_trends", order_trends).await;

    store
}

/// Demo sign-in accounts for the admin and both customers.
pub async fn demo_identity(jwt_secret: &str, store: MemoryStore) -> Result<MemoryIdentity, AuthError> {
    let identity = MemoryIdentity::new(jwt_secret).with_profile_store(store);
    identity.add_account(admin_id(), ADMIN_EMAIL, DEMO_PASSWORD).await?;
    identity.add_account(customer_id(1), "priya@mealmate.demo", DEMO_PASSWORD).await?;
    identity.add_account(customer_id(2), "arjun@mealmate.demo", DEMO_PASSWORD).await?;
    identity.add_account(cook_id(1), "anita@mealmate.demo", DEMO_PASSWORD).await?;
    Ok(identity)
}

// --- Reporting functions, computed over the seeded tables ---

fn table<'a>(tables: &'a Tables, name: &str) -> &'a [Value] {
    tables.get(name).map(Vec::as_slice).unwrap_or(&[])
}

fn created_at(row: &Value) -> Option<DateTime<Utc>> {
    let raw = row.get("created_at")?.as_str()?;
    DateTime::parse_from_rfc3339(raw).ok().map(|at| at.with_timezone(&Utc))
}

fn popular_meals(tables: &Tables, _args: &Value) -> Vec<Value> {
    let orders = table(tables, "orders");
    let mut ranked: Vec<(usize, &Value)> = table(tables, "meals")
        .iter()
        .map(|meal| {
            let count = orders.iter().filter(|o| o.get("meal_id") == meal.get("id")).count();
            (count, meal)
        })
        .collect();
    ranked.sort_by_key(|(count, _)| std::cmp::Reverse(*count));

    ranked
        .into_iter()
        .map(|(count, meal)| {
            json!({
                "id": meal["id"],
                "title": meal["title"],
                "price": meal["price"],
                "order_count": count,
                "rating": meal["rating"],
                "review_count": meal["review_count"],
            })
        })
        .collect()
}

fn active_users(tables: &Tables, _args: &Value) -> Vec<Value> {
    let orders = table(tables, "orders");
    let mut ranked: Vec<(usize, Value)> = table(tables, "profiles")
        .iter()
        .map(|profile| {
            let placed: Vec<&Value> = orders
                .iter()
                .filter(|o| o.get("customer_id") == profile.get("id"))
                .collect();
            let last_order = placed
                .iter()
                .filter_map(|o| created_at(o))
                .max()
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true));
            let row = json!({
                "id": profile["id"],
                "first_name": profile["first_name"],
                "last_name": profile["last_name"],
                "role": profile["role"],
                "created_at": profile["created_at"],
                "order_count": placed.len(),
                "last_order_date": last_order,
            });
            (placed.len(), row)
        })
        .collect();
    ranked.sort_by_key(|(count, _)| std::cmp::Reverse(*count));
    ranked.into_iter().map(|(_, row)| row).collect()
}

fn order_trends(tables: &Tables, args: &Value) -> Vec<Value> {
    let days = args.get("days").and_then(Value::as_i64).unwrap_or(14);
    let since = Utc::now().date_naive() - Duration::days(days);

    let mut by_day: HashMap<NaiveDate, (i64, f64)> = HashMap::new();
    for order in table(tables, "orders") {
        let Some(day) = created_at(order).map(|at| at.date_naive()) else {
            continue;
        };
        if day <= since {
            continue;
        }
        let entry = by_day.entry(day).or_default();
        entry.0 += 1;
        entry.1 += order.get("total_amount").and_then(Value::as_f64).unwrap_or(0.0);
    }

    let mut days: Vec<(NaiveDate, (i64, f64))> = by_day.into_iter().collect();
    days.sort_by(|a, b| b.0.cmp(&a.0));
    days.into_iter()
        .map(|(day, (count, revenue))| {
            json!({
                "order_date": day.format("%Y-%m-%d").to_string(),
                "order_count": count,
                "total_revenue": revenue,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealmate_shared::clients::RemoteData;

    #[tokio::test]
    async fn trend_function_is_newest_first_within_window() {
        let store = demo_store().await;
        let rows = store.rpc("get_order_trends", json!({"days": 14}), None).await.unwrap();

        assert!(!rows.is_empty());
        let dates: Vec<&str> = rows.iter().filter_map(|r| r["order_date"].as_str()).collect();
        let mut sorted = dates.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, sorted);

        // the 20-day-old order is outside the window
        let counted: i64 = rows.iter().filter_map(|r| r["order_count"].as_i64()).sum();
        assert_eq!(counted, ORDERS.len() as i64 - 1);
    }

    #[tokio::test]
    async fn demo_accounts_sign_in() {
        use mealmate_shared::clients::IdentityProvider;

        let store = demo_store().await;
        let identity = demo_identity("demo-secret", store).await.unwrap();
        let session = identity.sign_in(ADMIN_EMAIL, DEMO_PASSWORD).await.unwrap();
        assert_eq!(session.user_id, admin_id());
    }
}
