use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use mealmate_shared::clients::{select_as, Direction, Embed, RemoteData, TableQuery};
use mealmate_shared::DataAccessError;

use crate::models::{
    AdminMeal, CookCard, CookDetail, CookMeal, CookRow, MealCard, MealDetail, MealRow, ReviewRow,
    ReviewView, ANONYMOUS_REVIEWER,
};
use crate::services::analytics::rating_label;

pub const ALL_CITIES: &str = "All Cities";
pub const DEFAULT_MAX_PRICE: f64 = 200.0;

const COOK_COLUMNS: [&str; 8] = [
    "id",
    "hourly_rate",
    "bio",
    "speciality",
    "location_address",
    "average_rating",
    "years_of_experience",
    "is_available",
];

fn cook_query() -> TableQuery {
    TableQuery::from("cooks")
        .columns(COOK_COLUMNS)
        .embed(Embed::new("profiles", "id").columns(["first_name", "last_name", "avatar_url"]))
}

fn meal_query() -> TableQuery {
    TableQuery::from("meals").embed(
        Embed::new("cooks", "cook_id")
            .alias("cook")
            .hint("meals_cook_id_fkey")
            .columns(["location_address"])
            .embed(Embed::new("profiles", "id").columns(["first_name", "last_name"])),
    )
}

/// Case-insensitive substring match over any of `fields`. A blank term
/// matches everything.
pub fn matches_term(term: &str, fields: &[Option<&str>]) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

// --- Cooks ---

pub async fn list_available_cooks(remote: &dyn RemoteData) -> Result<Vec<CookCard>, DataAccessError> {
    let query = cook_query().eq("is_available", true);
    let rows: Vec<CookRow> = select_as(remote, &query).await?;
    Ok(rows.into_iter().map(CookCard::from).collect())
}

/// Narrow a cook listing by name, speciality or location.
pub fn search_cooks(cooks: &[CookCard], term: &str) -> Vec<CookCard> {
    cooks
        .iter()
        .filter(|c| {
            matches_term(
                term,
                &[Some(c.name.as_str()), c.speciality.as_deref(), c.location.as_deref()],
            )
        })
        .cloned()
        .collect()
}

pub async fn get_cook(remote: &dyn RemoteData, cook_id: Uuid) -> Result<CookCard, DataAccessError> {
    let query = cook_query().eq("id", cook_id.to_string()).single();
    let mut rows: Vec<CookRow> = select_as(remote, &query).await?;
    rows.pop()
        .map(CookCard::from)
        .ok_or_else(|| DataAccessError::not_found(format!("cook {cook_id}")))
}

pub fn filter_cook_meals(meals: Vec<CookMeal>, term: &str) -> Vec<CookMeal> {
    meals
        .into_iter()
        .filter(|m| {
            matches_term(
                term,
                &[Some(m.title.as_str()), m.description.as_deref(), m.ingredients.as_deref()],
            )
        })
        .collect()
}

/// One cook plus their meals, optionally narrowed by a free-text term over
/// title, description and ingredients.
pub async fn get_cook_with_meals(
    remote: &dyn RemoteData,
    cook_id: Uuid,
    term: &str,
) -> Result<CookDetail, DataAccessError> {
    let cook = get_cook(remote, cook_id).await?;

    let query = TableQuery::from("meals").eq("cook_id", cook_id.to_string());
    let rows: Vec<MealRow> = select_as(remote, &query).await?;
    let meals = filter_cook_meals(rows.into_iter().map(CookMeal::from).collect(), term);

    Ok(CookDetail { cook, meals })
}

// --- Meals ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealKind {
    #[default]
    All,
    Veg,
    Nonveg,
}

/// Browse filters, named as they appear in the meals page query string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: MealKind,
    #[serde(default)]
    pub min_price: f64,
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    #[serde(default)]
    pub min_rating: f64,
}

fn default_max_price() -> f64 {
    DEFAULT_MAX_PRICE
}

impl Default for MealFilter {
    fn default() -> Self {
        Self {
            search: None,
            location: None,
            kind: MealKind::All,
            min_price: 0.0,
            max_price: DEFAULT_MAX_PRICE,
            min_rating: 0.0,
        }
    }
}

impl MealFilter {
    pub fn matches(&self, meal: &MealCard) -> bool {
        let search = self.search.as_deref().unwrap_or("");
        let matches_search =
            matches_term(search, &[Some(meal.title.as_str()), Some(meal.cook_name.as_str())]);

        let matches_location = match self.location.as_deref().map(str::trim) {
            None | Some("") | Some(ALL_CITIES) => true,
            Some(city) => meal.location.contains(city),
        };

        let matches_kind = match self.kind {
            MealKind::All => true,
            MealKind::Veg => meal.is_veg,
            MealKind::Nonveg => !meal.is_veg,
        };

        let matches_price = meal.price >= self.min_price && meal.price <= self.max_price;
        let matches_rating = meal.rating.unwrap_or(0.0) >= self.min_rating;

        matches_search && matches_location && matches_kind && matches_price && matches_rating
    }

    pub fn apply(&self, meals: &[MealCard]) -> Vec<MealCard> {
        meals.iter().filter(|m| self.matches(m)).cloned().collect()
    }
}

/// Every meal with its cook's name and location, in store order.
pub async fn list_meal_cards(remote: &dyn RemoteData) -> Result<Vec<MealCard>, DataAccessError> {
    let rows: Vec<MealRow> = select_as(remote, &meal_query()).await?;
    Ok(rows.iter().map(MealCard::from).collect())
}

pub async fn list_meals(
    remote: &dyn RemoteData,
    filter: &MealFilter,
) -> Result<Vec<MealCard>, DataAccessError> {
    let cards = list_meal_cards(remote).await?;
    Ok(filter.apply(&cards))
}

pub async fn get_meal(remote: &dyn RemoteData, meal_id: Uuid) -> Result<MealDetail, DataAccessError> {
    let query = meal_query().eq("id", meal_id.to_string()).maybe_single();
    let row = select_as::<MealRow>(remote, &query)
        .await?
        .pop()
        .ok_or_else(|| DataAccessError::not_found(format!("meal {meal_id}")))?;

    let reviews_query = TableQuery::from("reviews")
        .columns(["rating", "comment", "created_at"])
        .embed(
            Embed::new("profiles", "reviewer_id")
                .alias("reviewer")
                .hint("reviews_reviewer_id_fkey")
                .columns(["first_name", "last_name"]),
        )
        .eq("meal_id", meal_id.to_string())
        .order_by("created_at", Direction::Desc);
    let reviews: Vec<ReviewRow> = select_as(remote, &reviews_query).await?;

    let reviews: Vec<ReviewView> = reviews
        .into_iter()
        .map(|r| ReviewView {
            reviewer: r
                .reviewer
                .as_ref()
                .and_then(|p| p.display())
                .unwrap_or_else(|| ANONYMOUS_REVIEWER.to_string()),
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
        })
        .collect();

    Ok(MealDetail {
        card: MealCard::from(&row),
        cook_id: row.cook_id,
        description: row.description,
        ingredients: row.ingredients,
        preparation_time: row.preparation_time,
        review_count: row.review_count.unwrap_or(reviews.len() as i64),
        reviews,
    })
}

/// Every meal, newest first, with the number of orders placed for it.
pub async fn list_meals_admin(remote: &dyn RemoteData) -> Result<Vec<AdminMeal>, DataAccessError> {
    let query = meal_query().order_by("created_at", Direction::Desc);
    let rows: Vec<MealRow> = select_as(remote, &query).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    #[derive(Deserialize)]
    struct OrderMealId {
        meal_id: Option<Uuid>,
    }

    let ids: Vec<String> = rows.iter().map(|m| m.id.to_string()).collect();
    let orders_query = TableQuery::from("orders").columns(["meal_id"]).in_list("meal_id", ids);
    let orders: Vec<OrderMealId> = select_as(remote, &orders_query).await?;

    let mut order_counts: HashMap<Uuid, u64> = HashMap::new();
    for meal_id in orders.into_iter().filter_map(|o| o.meal_id) {
        *order_counts.entry(meal_id).or_default() += 1;
    }

    Ok(rows
        .iter()
        .map(|row| {
            let card = MealCard::from(row);
            AdminMeal {
                id: row.id,
                title: card.title,
                price: row.price,
                is_veg: card.is_veg,
                cook_name: card.cook_name,
                rating: rating_label(row.rating),
                review_count: row.review_count.unwrap_or(0),
                order_count: order_counts.get(&row.id).copied().unwrap_or(0),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn term_matching_is_case_insensitive() {
        assert!(matches_term("DAL", &[Some("Dal Chawal Tadka")]));
        assert!(matches_term("", &[None]));
        assert!(matches_term("  ", &[Some("anything")]));
        assert!(!matches_term("biryani", &[Some("Masala Dosa"), None]));
    }

    #[tokio::test]
    async fn veg_meals_up_to_100_rupees() {
        let store = fixtures::demo_store().await;
        let filter = MealFilter {
            kind: MealKind::Veg,
            max_price: 100.0,
            ..MealFilter::default()
        };

        let meals = list_meals(&store, &filter).await.unwrap();
        let found: Vec<(&str, f64)> = meals.iter().map(|m| (m.title.as_str(), m.price)).collect();
        assert_eq!(
            found,
            vec![
                ("Dal Chawal Tadka", 80.0),
                ("Masala Dosa", 75.0),
                ("Chole Bhature", 90.0),
                ("Idli Sambar", 60.0),
                ("Aloo Paratha", 50.0),
            ]
        );
    }

    #[tokio::test]
    async fn city_search_and_rating_filters() {
        let store = fixtures::demo_store().await;

        let delhi = MealFilter { location: Some("Delhi".into()), ..MealFilter::default() };
        let titles: Vec<String> = list_meals(&store, &delhi).await.unwrap().into_iter().map(|m| m.title).collect();
        assert_eq!(titles, vec!["Dal Chawal Tadka", "Chole Bhature"]);

        let all_cities = MealFilter { location: Some(ALL_CITIES.into()), ..MealFilter::default() };
        assert_eq!(list_meals(&store, &all_cities).await.unwrap().len(), 8);

        let by_cook = MealFilter { search: Some("farhan".into()), ..MealFilter::default() };
        let titles: Vec<String> = list_meals(&store, &by_cook).await.unwrap().into_iter().map(|m| m.title).collect();
        assert_eq!(titles, vec!["Mutton Rogan Josh"]);

        let top_rated = MealFilter { min_rating: 4.9, kind: MealKind::Nonveg, ..MealFilter::default() };
        assert_eq!(list_meals(&store, &top_rated).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn text_filtered_lists_only_hold_matches() {
        let store = fixtures::demo_store().await;
        for term in ["a", "PANEER", "rice", "zzz"] {
            let filter = MealFilter { search: Some(term.into()), ..MealFilter::default() };
            let all = list_meal_cards(&store).await.unwrap();
            let found = list_meals(&store, &filter).await.unwrap();

            let needle = term.to_lowercase();
            for meal in &found {
                assert!(
                    meal.title.to_lowercase().contains(&needle)
                        || meal.cook_name.to_lowercase().contains(&needle)
                );
            }
            let expected = all
                .iter()
                .filter(|m| {
                    m.title.to_lowercase().contains(&needle) || m.cook_name.to_lowercase().contains(&needle)
                })
                .count();
            assert_eq!(found.len(), expected);
        }
    }

    #[tokio::test]
    async fn listing_twice_gives_the_same_order() {
        let store = fixtures::demo_store().await;
        let first = list_available_cooks(&store).await.unwrap();
        let second = list_available_cooks(&store).await.unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|c| c.is_available));
    }

    #[tokio::test]
    async fn cook_page_filters_meals_by_term() {
        let store = fixtures::demo_store().await;
        let cook_id = fixtures::cook_id(1);

        let detail = get_cook_with_meals(&store, cook_id, "").await.unwrap();
        assert_eq!(detail.cook.name, "Anita Sharma");
        assert_eq!(detail.meals.len(), 1);

        let detail = get_cook_with_meals(&store, cook_id, "LENTILS").await.unwrap();
        assert_eq!(detail.meals.len(), 1);

        let detail = get_cook_with_meals(&store, cook_id, "chicken").await.unwrap();
        assert!(detail.meals.is_empty());
    }

    #[tokio::test]
    async fn unknown_cook_and_meal_are_not_found() {
        let store = fixtures::demo_store().await;
        assert!(get_cook(&store, Uuid::from_u128(7777)).await.unwrap_err().is_not_found());
        assert!(get_meal(&store, Uuid::from_u128(7777)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn meal_detail_carries_reviews() {
        let store = fixtures::demo_store().await;
        let meal = get_meal(&store, fixtures::meal_id(1)).await.unwrap();
        assert_eq!(meal.card.cook_name, "Anita Sharma");
        assert_eq!(meal.card.location, "Hauz Khas, Delhi");
        assert!(!meal.reviews.is_empty());
    }

    #[tokio::test]
    async fn cook_search_covers_name_speciality_and_location() {
        let store = fixtures::demo_store().await;
        let cooks = list_available_cooks(&store).await.unwrap();

        assert_eq!(search_cooks(&cooks, "sharma").len(), 1);
        assert_eq!(search_cooks(&cooks, "chennai").len(), 2);
        assert_eq!(search_cooks(&cooks, "").len(), cooks.len());
    }

    #[tokio::test]
    async fn nullable_meal_columns_still_load() {
        let store = fixtures::demo_store().await;
        let id = Uuid::from_u128(0x3ff);
        store
            .seed(
                "meals",
                vec![serde_json::json!({
                    "id": id,
                    "cook_id": fixtures::cook_id(1),
                    "title": "Rajma Chawal",
                    "price": 85.0,
                    "description": null,
                    "ingredients": null,
                    "is_veg": null,
                    "rating": null,
                    "review_count": null,
                    "image_url": null,
                    "preparation_time": "20 mins",
                })],
            )
            .await;

        let cards = list_meal_cards(&store).await.unwrap();
        let rajma = cards.iter().find(|m| m.id == id).unwrap();
        assert!(!rajma.is_veg);

        let detail = get_meal(&store, id).await.unwrap();
        assert_eq!(detail.preparation_time.as_deref(), Some("20 mins"));
        assert_eq!(list_meals_admin(&store).await.unwrap().len(), 9);
    }

    #[tokio::test]
    async fn admin_meal_list_counts_orders() {
        let store = fixtures::demo_store().await;
        let meals = list_meals_admin(&store).await.unwrap();
        assert_eq!(meals.len(), 8);

        let dal = meals.iter().find(|m| m.title == "Dal Chawal Tadka").unwrap();
        assert!(dal.order_count >= 1);
    }
}
