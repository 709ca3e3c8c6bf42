use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use mealmate_shared::clients::{select_as, Direction, Embed, RemoteData, TableQuery};
use mealmate_shared::{AppResult, DataAccessError};

use crate::models::{OrderAmount, OrderRow, OrderSummary};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";

/// Most recent orders, newest first, with meal title and customer name.
///
/// The customer is embedded through the explicit `orders_customer_id_fkey`
/// constraint; a deleted customer comes back as a null embed and is shown
/// as "Unknown Customer".
pub async fn list_recent_orders(
    remote: &dyn RemoteData,
    limit: usize,
) -> Result<Vec<OrderSummary>, DataAccessError> {
    let query = TableQuery::from("orders")
        .columns(["id", "meal_id", "customer_id", "quantity", "total_amount", "status", "created_at"])
        .embed(Embed::new("meals", "meal_id").alias("meal").columns(["title", "price"]))
        .embed(
            Embed::new("profiles", "customer_id")
                .alias("customer")
                .hint("orders_customer_id_fkey")
                .columns(["first_name", "last_name"]),
        )
        .order_by("created_at", Direction::Desc)
        .limit(limit);

    let rows: Vec<OrderRow> = select_as(remote, &query).await?;
    Ok(rows.into_iter().map(OrderSummary::from).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderTotals {
    pub count: u64,
    pub revenue: f64,
}

/// Sum of order amounts; a null amount counts as zero.
pub fn sum_revenue<I>(amounts: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    amounts.into_iter().map(|a| a.unwrap_or(0.0)).sum()
}

pub async fn order_totals(remote: &dyn RemoteData) -> Result<OrderTotals, DataAccessError> {
    let query = TableQuery::from("orders").columns(["id", "total_amount"]);
    let rows: Vec<OrderAmount> = select_as(remote, &query).await?;
    Ok(OrderTotals {
        count: rows.len() as u64,
        revenue: sum_revenue(rows.into_iter().map(|r| r.total_amount)),
    })
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewOrder {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Delivery notes must be at most 500 characters"))]
    pub delivery_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub meal_id: Uuid,
    pub meal_title: String,
    pub quantity: i32,
    pub total_amount: f64,
    pub status: String,
}

/// Order `quantity` of a meal at its current price.
pub async fn place_order(
    remote: &dyn RemoteData,
    customer_id: Uuid,
    meal_id: Uuid,
    order: &NewOrder,
) -> AppResult<PlacedOrder> {
    order.validate()?;

    #[derive(Deserialize)]
    struct MealPrice {
        title: String,
        price: f64,
    }

    let query = TableQuery::from("meals")
        .columns(["title", "price"])
        .eq("id", meal_id.to_string())
        .maybe_single();
    let meal = select_as::<MealPrice>(remote, &query)
        .await?
        .pop()
        .ok_or_else(|| DataAccessError::not_found(format!("meal {meal_id}")))?;

    let total_amount = meal.price * f64::from(order.quantity);
    let row = json!({
        "meal_id": meal_id,
        "customer_id": customer_id,
        "quantity": order.quantity,
        "total_amount": total_amount,
        "status": STATUS_PENDING,
        "delivery_address": order.delivery_address,
        "delivery_notes": order.delivery_notes,
    });
    remote.insert("orders", row).await?;

    tracing::info!(%customer_id, %meal_id, quantity = order.quantity, total_amount, "order placed");

    Ok(PlacedOrder {
        meal_id,
        meal_title: meal.title,
        quantity: order.quantity,
        total_amount,
        status: STATUS_PENDING.to_string(),
    })
}

/// Share of orders from the last `days` days that reached `completed`.
pub async fn order_completion_rate(remote: &dyn RemoteData, days: i64) -> Result<f64, DataAccessError> {
    #[derive(Deserialize)]
    struct OrderStatus {
        status: String,
    }

    let since = (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let query = TableQuery::from("orders")
        .columns(["status"])
        .gte("created_at", since);
    let rows: Vec<OrderStatus> = select_as(remote, &query).await?;

    if rows.is_empty() {
        return Ok(0.0);
    }
    let completed = rows.iter().filter(|r| r.status == STATUS_COMPLETED).count();
    Ok(completed as f64 / rows.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::UNKNOWN_CUSTOMER;
    use mealmate_shared::clients::MemoryStore;
    use mealmate_shared::AppError;

    #[test]
    fn revenue_treats_null_as_zero() {
        assert_eq!(sum_revenue([Some(80.0), None, Some(150.0)]), 230.0);
        assert_eq!(sum_revenue(Vec::<Option<f64>>::new()), 0.0);
    }

    #[tokio::test]
    async fn totals_match_the_sum_of_amounts() {
        let store = MemoryStore::new();
        store
            .seed(
                "orders",
                vec![
                    json!({"id": Uuid::from_u128(1), "total_amount": 120.5}),
                    json!({"id": Uuid::from_u128(2), "total_amount": null}),
                    json!({"id": Uuid::from_u128(3), "total_amount": 79.5}),
                ],
            )
            .await;

        let totals = order_totals(&store).await.unwrap();
        assert_eq!(totals, OrderTotals { count: 3, revenue: 200.0 });
    }

    #[tokio::test]
    async fn no_orders_is_zero_not_an_error() {
        let store = MemoryStore::new();
        assert_eq!(order_totals(&store).await.unwrap(), OrderTotals { count: 0, revenue: 0.0 });
        assert_eq!(order_completion_rate(&store, 30).await.unwrap(), 0.0);
        assert!(list_recent_orders(&store, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_customer_profile_reads_unknown_customer() {
        let store = MemoryStore::new();
        store
            .seed(
                "profiles",
                vec![json!({"id": Uuid::from_u128(2), "first_name": "Priya", "last_name": "Nair", "role": "customer"})],
            )
            .await;
        store
            .seed(
                "orders",
                vec![
                    json!({"id": Uuid::from_u128(10), "customer_id": Uuid::from_u128(2), "quantity": 1,
                           "total_amount": 80, "status": "completed", "created_at": "2024-05-02T10:00:00Z"}),
                    json!({"id": Uuid::from_u128(11), "customer_id": Uuid::from_u128(99), "quantity": 2,
                           "total_amount": 150, "status": "pending", "created_at": "2024-05-03T10:00:00Z"}),
                ],
            )
            .await;

        let orders = list_recent_orders(&store, 50).await.unwrap();
        let names: Vec<&str> = orders.iter().map(|o| o.customer_name.as_str()).collect();
        assert_eq!(names, vec![UNKNOWN_CUSTOMER, "Priya Nair"]);
    }

    #[tokio::test]
    async fn recent_orders_are_newest_first_and_limited() {
        let store = fixtures::demo_store().await;
        let orders = list_recent_orders(&store, 3).await.unwrap();
        assert_eq!(orders.len(), 3);
        assert!(orders.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn placing_an_order_prices_it_and_stores_it_pending() {
        let store = fixtures::demo_store().await;
        let before = store.rows("orders").await.len();
        let customer = fixtures::customer_id(1);

        let order = NewOrder { quantity: 3, delivery_address: Some("Hostel 4, IIT Delhi".into()), delivery_notes: None };
        let placed = place_order(&store, customer, fixtures::meal_id(1), &order).await.unwrap();
        assert_eq!(placed.total_amount, 240.0);
        assert_eq!(placed.status, STATUS_PENDING);

        let rows = store.rows("orders").await;
        assert_eq!(rows.len(), before + 1);
        let stored = rows.last().unwrap();
        assert_eq!(stored["quantity"], 3);
        assert_eq!(stored["status"], "pending");
        assert_eq!(stored["customer_id"], customer.to_string());
    }

    #[tokio::test]
    async fn zero_quantity_never_reaches_the_store() {
        let store = fixtures::demo_store().await;
        store.fail_on("meals", DataAccessError::Transport("should not be called".into())).await;

        let order = NewOrder { quantity: 0, delivery_address: None, delivery_notes: None };
        let err = place_order(&store, fixtures::customer_id(1), fixtures::meal_id(1), &order)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn completion_rate_over_recent_orders() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let at = |days: i64| (now - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true);
        store
            .seed(
                "orders",
                vec![
                    json!({"status": "completed", "created_at": at(1)}),
                    json!({"status": "pending", "created_at": at(2)}),
                    json!({"status": "completed", "created_at": at(3)}),
                    json!({"status": "pending", "created_at": at(4)}),
                    json!({"status": "completed", "created_at": at(60)}),
                ],
            )
            .await;

        assert_eq!(order_completion_rate(&store, 30).await.unwrap(), 0.5);
    }
}
