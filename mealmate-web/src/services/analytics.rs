use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use mealmate_shared::clients::{rpc_as, select_as, RemoteData, TableQuery};
use mealmate_shared::{DataAccessError, QueryCache};

use crate::models::{display_name, ActiveUserRow, AdminMeal, OrderSummary, PopularMealRow, TrendRow};
use crate::services::catalog::list_meals_admin;
use crate::services::orders::{list_recent_orders, order_completion_rate, order_totals};

pub const FAILED_TO_LOAD: &str = "Failed to load data";
pub const NO_RATINGS: &str = "No ratings";
pub const NEVER: &str = "Never";
pub const COMPLETION_WINDOW_DAYS: i64 = 30;
const TOP_N: usize = 5;

/// Cache keys for admin widgets share this prefix so writes can invalidate
/// them together.
pub const CACHE_PREFIX: &str = "admin:";

/// One dashboard widget: loaded data or an isolated failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Widget<T> {
    Ready { data: T },
    Failed { message: String },
}

impl<T> Widget<T> {
    pub fn from_result(name: &str, result: Result<T, DataAccessError>) -> Self {
        match result {
            Ok(data) => Widget::Ready { data },
            Err(e) => {
                tracing::warn!(widget = name, error = %e, "widget failed to load");
                Widget::Failed { message: FAILED_TO_LOAD.to_string() }
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Widget::Ready { data } => Some(data),
            Widget::Failed { .. } => None,
        }
    }
}

// --- Formatting ---

/// Rupee amount with thousands separators and at most two decimals,
/// e.g. `₹1,234,567.5`.
pub fn format_inr(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let paise = (amount.abs() * 100.0).round() as u64;
    let (whole, fraction) = (paise / 100, paise % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = format!("{sign}₹{grouped}");
    if fraction > 0 {
        out.push('.');
        out.push_str(format!("{fraction:02}").trim_end_matches('0'));
    }
    out
}

/// Short month and day, e.g. `May 01`.
pub fn chart_label(date: NaiveDate) -> String {
    date.format("%b %d").to_string()
}

pub fn rating_label(rating: Option<f64>) -> String {
    match rating {
        Some(r) if r > 0.0 => r.to_string(),
        _ => NO_RATINGS.to_string(),
    }
}

/// Distance between two instants in words, e.g. `3 days ago`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    let minutes = (seconds.abs() as f64 / 60.0).round() as i64;
    let rounded = |unit: f64| (minutes as f64 / unit).round() as i64;

    const HOUR: i64 = 60;
    const DAY: i64 = 24 * HOUR;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let phrase = match minutes {
        0 => "less than a minute".to_string(),
        1 => "1 minute".to_string(),
        m if m < 45 => format!("{m} minutes"),
        m if m < 90 => "about 1 hour".to_string(),
        m if m < DAY => format!("about {} hours", rounded(HOUR as f64)),
        m if m < 42 * HOUR => "1 day".to_string(),
        m if m < MONTH => format!("{} days", rounded(DAY as f64)),
        m if m < 2 * MONTH => match rounded(MONTH as f64) {
            1 => "about 1 month".to_string(),
            n => format!("about {n} months"),
        },
        m if m < YEAR => format!("{} months", rounded(MONTH as f64)),
        m => {
            let years = m / YEAR;
            let months_over = (m % YEAR) / MONTH;
            match months_over {
                0..=2 => format!("about {years} year{}", if years == 1 { "" } else { "s" }),
                3..=8 => format!("over {years} year{}", if years == 1 { "" } else { "s" }),
                _ => format!("almost {} years", years + 1),
            }
        }
    };

    if seconds < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

// --- Widget loaders ---

pub async fn user_count(remote: &dyn RemoteData) -> Result<u64, DataAccessError> {
    remote.count("profiles").await
}

pub async fn meal_count(remote: &dyn RemoteData) -> Result<u64, DataAccessError> {
    remote.count("meals").await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStats {
    pub count: u64,
    pub revenue: f64,
    pub revenue_label: String,
    pub average_order_value: f64,
}

pub async fn order_stats(remote: &dyn RemoteData) -> Result<OrderStats, DataAccessError> {
    let totals = order_totals(remote).await?;
    let average_order_value = if totals.count == 0 {
        0.0
    } else {
        totals.revenue / totals.count as f64
    };
    Ok(OrderStats {
        count: totals.count,
        revenue: totals.revenue,
        revenue_label: format_inr(totals.revenue),
        average_order_value,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularMealView {
    pub id: Uuid,
    pub title: String,
    pub price: String,
    pub order_count: i64,
    pub rating: String,
    pub review_count: i64,
}

/// Meals ranked by order count, best first.
pub async fn popular_meals(remote: &dyn RemoteData, limit: usize) -> Result<Vec<PopularMealView>, DataAccessError> {
    let rows: Vec<PopularMealRow> = rpc_as(remote, "get_popular_meals", json!({}), Some(limit)).await?;
    Ok(rows
        .into_iter()
        .map(|row| PopularMealView {
            id: row.id,
            title: row.title,
            price: format_inr(row.price),
            order_count: row.order_count,
            rating: rating_label(row.rating),
            review_count: row.review_count.unwrap_or(0),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveUserView {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub order_count: i64,
    pub last_order: String,
    pub member_since: NaiveDate,
}

fn active_user_view(row: ActiveUserRow, now: DateTime<Utc>) -> ActiveUserView {
    ActiveUserView {
        id: row.id,
        name: display_name(row.first_name.as_deref(), row.last_name.as_deref()).unwrap_or_default(),
        role: row.role,
        order_count: row.order_count.unwrap_or(0),
        last_order: row
            .last_order_date
            .map(|at| relative_time(at, now))
            .unwrap_or_else(|| NEVER.to_string()),
        member_since: row.created_at.date_naive(),
    }
}

/// Users ranked by order count; `limit` of `None` returns everyone.
pub async fn ranked_users(
    remote: &dyn RemoteData,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<Vec<ActiveUserView>, DataAccessError> {
    let mut rows: Vec<ActiveUserRow> = rpc_as(remote, "get_active_users", json!({}), limit).await?;
    // stable, so ties keep the store's order
    rows.sort_by_key(|r| std::cmp::Reverse(r.order_count.unwrap_or(0)));
    Ok(rows.into_iter().map(|row| active_user_view(row, now)).collect())
}

pub async fn active_users(remote: &dyn RemoteData, now: DateTime<Utc>) -> Result<Vec<ActiveUserView>, DataAccessError> {
    ranked_users(remote, Some(TOP_N), now).await
}

/// Average review rating, `None` when nobody has reviewed yet.
pub async fn customer_satisfaction(remote: &dyn RemoteData) -> Result<Option<f64>, DataAccessError> {
    #[derive(Deserialize)]
    struct Rating {
        rating: Option<f64>,
    }

    let rows: Vec<Rating> = select_as(remote, &TableQuery::from("reviews").columns(["rating"])).await?;
    let ratings: Vec<f64> = rows.into_iter().filter_map(|r| r.rating).collect();
    if ratings.is_empty() {
        return Ok(None);
    }
    Ok(Some(ratings.iter().sum::<f64>() / ratings.len() as f64))
}

// --- Order trend ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Report "no data" as such.
    #[default]
    Empty,
    /// Replace "no data" with an illustrative series marked as sample.
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesSource {
    Live,
    Sample,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub label: String,
    pub order_count: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub source: SeriesSource,
    pub points: Vec<TrendPoint>,
}

/// The trend query returned no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Empty;

pub type Trend = Result<Series, Empty>;

/// Daily order count and revenue for the last `days` days, oldest first.
pub async fn order_trend(remote: &dyn RemoteData, days: usize) -> Result<Trend, DataAccessError> {
    let mut rows: Vec<TrendRow> =
        rpc_as(remote, "get_order_trends", json!({ "days": days }), Some(days)).await?;
    if rows.is_empty() {
        return Ok(Err(Empty));
    }

    // the store hands back newest first
    rows.reverse();
    let points = rows
        .into_iter()
        .map(|row| TrendPoint {
            label: chart_label(row.order_date),
            date: row.order_date,
            order_count: row.order_count,
            total_revenue: row.total_revenue.unwrap_or(0.0),
        })
        .collect();

    Ok(Ok(Series { source: SeriesSource::Live, points }))
}

const SAMPLE_ORDERS: [i64; 7] = [12, 18, 15, 22, 19, 25, 21];
const SAMPLE_ORDER_VALUE: f64 = 235.0;

/// A fixed week of illustrative points ending on `today`.
pub fn sample_series(today: NaiveDate) -> Series {
    let start = today - Duration::days(SAMPLE_ORDERS.len() as i64 - 1);
    let points = SAMPLE_ORDERS
        .iter()
        .enumerate()
        .map(|(offset, &order_count)| {
            let date = start + Duration::days(offset as i64);
            TrendPoint {
                date,
                label: chart_label(date),
                order_count,
                total_revenue: order_count as f64 * SAMPLE_ORDER_VALUE,
            }
        })
        .collect();
    Series { source: SeriesSource::Sample, points }
}

pub fn apply_fallback(trend: Trend, policy: FallbackPolicy, today: NaiveDate) -> Trend {
    match (trend, policy) {
        (Err(Empty), FallbackPolicy::Sample) => Ok(sample_series(today)),
        (trend, _) => trend,
    }
}

/// Serialised form of a [`Trend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrendView {
    Series(Series),
    Empty,
}

impl From<Trend> for TrendView {
    fn from(trend: Trend) -> Self {
        match trend {
            Ok(series) => TrendView::Series(series),
            Err(Empty) => TrendView::Empty,
        }
    }
}

// --- Dashboards ---

#[derive(Debug, Clone, Copy)]
pub struct DashboardSettings {
    pub recent_orders_limit: usize,
    pub trend_days: usize,
    pub trend_fallback: FallbackPolicy,
}

/// Run `fetch` through the cache under `key`, handing back an owned copy.
async fn cached<T, Fut>(cache: &QueryCache, key: &str, fetch: Fut) -> Result<T, DataAccessError>
where
    T: Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, DataAccessError>> + Send + 'static,
{
    cache.query(key, move || fetch).await.map(|value| (*value).clone())
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsOverview {
    pub users: Widget<u64>,
    pub meals: Widget<u64>,
    pub orders: Widget<OrderStats>,
}

pub async fn stats_overview(remote: &Arc<dyn RemoteData>, cache: &QueryCache) -> StatsOverview {
    let (r1, r2, r3) = (remote.clone(), remote.clone(), remote.clone());
    let (users, meals, orders) = tokio::join!(
        cached(cache, "admin:user-count", async move { user_count(r1.as_ref()).await }),
        cached(cache, "admin:meal-count", async move { meal_count(r2.as_ref()).await }),
        cached(cache, "admin:order-stats", async move { order_stats(r3.as_ref()).await }),
    );
    StatsOverview {
        users: Widget::from_result("users", users),
        meals: Widget::from_result("meals", meals),
        orders: Widget::from_result("orders", orders),
    }
}

async fn trend_widget(
    remote: Arc<dyn RemoteData>,
    cache: &QueryCache,
    settings: &DashboardSettings,
    today: NaiveDate,
) -> Widget<TrendView> {
    let days = settings.trend_days;
    let key = format!("admin:order-trend:{days}");
    let trend = cached(cache, &key, async move { order_trend(remote.as_ref(), days).await }).await;
    let trend = trend.map(|t| TrendView::from(apply_fallback(t, settings.trend_fallback, today)));
    Widget::from_result("order_trend", trend)
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub stats: StatsOverview,
    pub order_trend: Widget<TrendView>,
    pub popular_meals: Widget<Vec<PopularMealView>>,
    pub active_users: Widget<Vec<ActiveUserView>>,
    pub recent_orders: Widget<Vec<OrderSummary>>,
    pub meals: Widget<Vec<AdminMeal>>,
    pub users: Widget<Vec<ActiveUserView>>,
}

/// Every admin widget, loaded concurrently. A failing widget does not hold
/// up or fail the others.
pub async fn admin_dashboard(
    remote: Arc<dyn RemoteData>,
    cache: &QueryCache,
    settings: &DashboardSettings,
    now: DateTime<Utc>,
) -> AdminDashboard {
    let limit = settings.recent_orders_limit;
    let recent_key = format!("admin:recent-orders:{limit}");
    let (r1, r2, r3, r4, r5) = (
        remote.clone(),
        remote.clone(),
        remote.clone(),
        remote.clone(),
        remote.clone(),
    );

    let (stats, order_trend, popular, active, recent, meals, users) = tokio::join!(
        stats_overview(&remote, cache),
        trend_widget(remote.clone(), cache, settings, now.date_naive()),
        cached(cache, "admin:popular-meals", async move { popular_meals(r1.as_ref(), TOP_N).await }),
        cached(cache, "admin:active-users", async move { active_users(r2.as_ref(), now).await }),
        cached(cache, &recent_key, async move {
            list_recent_orders(r3.as_ref(), limit).await
        }),
        cached(cache, "admin:meals", async move { list_meals_admin(r4.as_ref()).await }),
        cached(cache, "admin:ranked-users", async move { ranked_users(r5.as_ref(), None, now).await }),
    );

    AdminDashboard {
        stats,
        order_trend,
        popular_meals: Widget::from_result("popular_meals", popular),
        active_users: Widget::from_result("active_users", active),
        recent_orders: Widget::from_result("recent_orders", recent),
        meals: Widget::from_result("meals", meals),
        users: Widget::from_result("users", users),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsDashboard {
    pub stats: StatsOverview,
    pub order_trend: Widget<TrendView>,
    pub popular_meals: Widget<Vec<PopularMealView>>,
    pub active_users: Widget<Vec<ActiveUserView>>,
    pub completion_rate: Widget<f64>,
    pub customer_satisfaction: Widget<Option<f64>>,
}

pub async fn analytics_dashboard(
    remote: Arc<dyn RemoteData>,
    cache: &QueryCache,
    settings: &DashboardSettings,
    now: DateTime<Utc>,
) -> AnalyticsDashboard {
    let (r1, r2, r3, r4) = (remote.clone(), remote.clone(), remote.clone(), remote.clone());

    let (stats, order_trend, popular, active, completion, satisfaction) = tokio::join!(
        stats_overview(&remote, cache),
        trend_widget(remote.clone(), cache, settings, now.date_naive()),
        cached(cache, "admin:popular-meals", async move { popular_meals(r1.as_ref(), TOP_N).await }),
        cached(cache, "admin:active-users", async move { active_users(r2.as_ref(), now).await }),
        cached(cache, "admin:completion-rate", async move {
            order_completion_rate(r3.as_ref(), COMPLETION_WINDOW_DAYS).await
        }),
        cached(cache, "admin:satisfaction", async move { customer_satisfaction(r4.as_ref()).await }),
    );

    AnalyticsDashboard {
        stats,
        order_trend,
        popular_meals: Widget::from_result("popular_meals", popular),
        active_users: Widget::from_result("active_users", active),
        completion_rate: Widget::from_result("completion_rate", completion),
        customer_satisfaction: Widget::from_result("customer_satisfaction", satisfaction),
    }
}
