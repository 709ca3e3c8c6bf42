use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use mealmate_shared::clients::RemoteData;
use mealmate_shared::AppResult;

use crate::services::catalog::get_cook;
use crate::services::orders::STATUS_PENDING;

/// A hire is billed as a month of full days.
const HOURS_PER_DAY: f64 = 8.0;
const DAYS_PER_MONTH: f64 = 20.0;

pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn validate_clock(value: &str) -> Result<(), ValidationError> {
    match parse_clock(value) {
        Some(_) => Ok(()),
        None => {
            let mut err = ValidationError::new("time");
            err.message = Some("Please enter a time as HH:MM".into());
            Err(err)
        }
    }
}

/// Monthly price for hiring a cook for the daily window `start..end`.
/// An empty or inverted window costs nothing.
pub fn booking_total(hourly_rate: f64, start: NaiveTime, end: NaiveTime) -> f64 {
    if end > start {
        hourly_rate * HOURS_PER_DAY * DAYS_PER_MONTH
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingRequest {
    pub booking_date: NaiveDate,
    #[serde(default = "default_start")]
    #[validate(custom = "validate_clock")]
    pub start_time: String,
    #[serde(default = "default_end")]
    #[validate(custom = "validate_clock")]
    pub end_time: String,
    #[serde(default)]
    pub location_address: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

fn default_start() -> String {
    "09:00".into()
}

fn default_end() -> String {
    "17:00".into()
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub cook_id: Uuid,
    pub cook_name: String,
    pub booking_date: NaiveDate,
    pub total_amount: f64,
    pub status: String,
}

impl BookingConfirmation {
    pub fn summary(&self) -> String {
        format!(
            "You have successfully booked {} for {}",
            self.cook_name,
            self.booking_date.format("%B %-d, %Y")
        )
    }
}

pub async fn create_booking(
    remote: &dyn RemoteData,
    customer_id: Uuid,
    cook_id: Uuid,
    request: &BookingRequest,
) -> AppResult<BookingConfirmation> {
    request.validate()?;

    let cook = get_cook(remote, cook_id).await?;
    let (start, end) = match (parse_clock(&request.start_time), parse_clock(&request.end_time)) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(mealmate_shared::AppError::bad_request("invalid booking window")),
    };
    let total_amount = booking_total(cook.hourly_rate, start, end);

    let row = json!({
        "cook_id": cook_id,
        "customer_id": customer_id,
        "booking_date": request.booking_date.format("%Y-%m-%d").to_string(),
        "start_time": request.start_time,
        "end_time": request.end_time,
        "location_address": request.location_address,
        "special_instructions": request.special_instructions,
        "total_amount": total_amount,
        "status": STATUS_PENDING,
    });
    remote.insert("bookings", row).await?;

    tracing::info!(%customer_id, %cook_id, total_amount, "booking created");

    Ok(BookingConfirmation {
        cook_id,
        cook_name: cook.name,
        booking_date: request.booking_date,
        total_amount,
        status: STATUS_PENDING.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use mealmate_shared::AppError;

    fn t(value: &str) -> NaiveTime {
        parse_clock(value).unwrap()
    }

    #[test]
    fn total_is_a_month_of_full_days() {
        assert_eq!(booking_total(250.0, t("09:00"), t("17:00")), 40_000.0);
        assert_eq!(booking_total(250.0, t("09:00"), t("10:30")), 40_000.0);
        assert_eq!(booking_total(250.0, t("17:00"), t("09:00")), 0.0);
        assert_eq!(booking_total(250.0, t("09:00"), t("09:00")), 0.0);
    }

    #[test]
    fn clock_accepts_minutes_and_seconds() {
        assert!(parse_clock("07:30").is_some());
        assert!(parse_clock("07:30:15").is_some());
        assert!(parse_clock("7.30pm").is_none());
    }

    #[tokio::test]
    async fn booking_is_stored_pending_with_total() {
        let store = fixtures::demo_store().await;
        let request = BookingRequest {
            booking_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            start_time: "10:00".into(),
            end_time: "14:00".into(),
            location_address: Some("Saket, Delhi".into()),
            special_instructions: None,
        };

        let confirmation = create_booking(&store, fixtures::customer_id(1), fixtures::cook_id(1), &request)
            .await
            .unwrap();
        assert_eq!(confirmation.cook_name, "Anita Sharma");
        assert_eq!(confirmation.summary(), "You have successfully booked Anita Sharma for July 1, 2024");

        let bookings = store.rows("bookings").await;
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0]["status"], "pending");
        assert_eq!(bookings[0]["booking_date"], "2024-07-01");
        assert_eq!(bookings[0]["total_amount"].as_f64(), Some(confirmation.total_amount));
    }

    #[tokio::test]
    async fn unknown_cook_cannot_be_booked() {
        let store = fixtures::demo_store().await;
        let request = BookingRequest {
            booking_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            start_time: default_start(),
            end_time: default_end(),
            location_address: None,
            special_instructions: None,
        };

        let err = create_booking(&store, fixtures::customer_id(1), Uuid::from_u128(4242), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DataAccess(ref e) if e.is_not_found()));
        assert!(store.rows("bookings").await.is_empty());
    }

    #[tokio::test]
    async fn malformed_times_are_validation_errors() {
        let store = fixtures::demo_store().await;
        let request = BookingRequest {
            booking_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            start_time: "nine".into(),
            end_time: default_end(),
            location_address: None,
            special_instructions: None,
        };

        let err = create_booking(&store, fixtures::customer_id(1), fixtures::cook_id(1), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
