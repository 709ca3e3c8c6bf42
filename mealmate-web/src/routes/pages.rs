use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use mealmate_shared::errors::{AppError, AppResult};
use mealmate_shared::types::{ApiResponse, Notification};

use crate::models::MealCard;
use crate::routes::meals::cached_meal_cards;
use crate::services::analytics::Widget;
use crate::AppState;

const FEATURED_MEALS: usize = 4;

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub headline: &'static str,
    pub tagline: &'static str,
    pub featured_meals: Widget<Vec<MealCard>>,
}

/// Landing page with the best-rated meals.
pub async fn home(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HomePage>> {
    let featured = cached_meal_cards(&state).await.map(|cards| {
        let mut cards = cards.as_ref().clone();
        cards.sort_by(|a, b| b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)));
        cards.truncate(FEATURED_MEALS);
        cards
    });

    Json(ApiResponse::ok(HomePage {
        headline: "Homemade Food Delivered to Your Doorstep",
        tagline: "Connecting students with local home cooks offering affordable, authentic homemade meals across India.",
        featured_meals: Widget::from_result("featured_meals", featured),
    }))
}

#[derive(Debug, Serialize)]
pub struct Section {
    pub heading: &'static str,
    pub body: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AboutPage {
    pub title: &'static str,
    pub summary: &'static str,
    pub sections: Vec<Section>,
}

pub async fn about() -> Json<ApiResponse<AboutPage>> {
    Json(ApiResponse::ok(AboutPage {
        title: "About MealMate",
        summary: "Connecting students with local home cooks for authentic, affordable meals.",
        sections: vec![
            Section {
                heading: "Our Mission",
                body: "To create a thriving community marketplace that celebrates India's diverse culinary traditions, supports local home cooks, and makes quality homemade food accessible to students across the country.",
            },
            Section {
                heading: "How It Works",
                body: "Browse meals from verified local home cooks, place an order for delivery or pickup, and enjoy authentic home cooking.",
            },
            Section {
                heading: "For Home Cooks",
                body: "Set your own prices, prepare meals in your own kitchen, and build a customer base of appreciative students.",
            },
        ],
    }))
}

#[derive(Debug, Serialize)]
pub struct Faq {
    pub question: &'static str,
    pub answer: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ContactPage {
    pub title: &'static str,
    pub email: &'static str,
    pub phone: &'static str,
    pub office: &'static str,
    pub faqs: Vec<Faq>,
}

pub async fn contact() -> Json<ApiResponse<ContactPage>> {
    Json(ApiResponse::ok(ContactPage {
        title: "Contact Us",
        email: "contact@mealmate.com",
        phone: "+91 987-654-3210",
        office: "Koramangala, Bangalore, India",
        faqs: vec![
            Faq {
                question: "How does MealMate work?",
                answer: "MealMate connects university students with local home cooks. Students can browse meals, place orders, and enjoy home-cooked food.",
            },
            Faq {
                question: "How do I become a cook on MealMate?",
                answer: "Register as a cook, complete your profile, list your meals and set your prices.",
            },
            Faq {
                question: "Is there a delivery option?",
                answer: "Yes, many of our cooks offer delivery within a certain radius. You can also opt for pickup.",
            },
        ],
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactMessage {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub message: String,
}

/// Acknowledge a contact form. Messages are logged, not stored.
pub async fn send_message(Json(message): Json<ContactMessage>) -> AppResult<Json<ApiResponse<()>>> {
    message.validate()?;
    tracing::info!(subject = %message.subject, "contact message received");

    Ok(Json(ApiResponse::ok(()).with_notification(Notification::info(
        "Message Sent",
        "We've received your message and will get back to you soon.",
    ))))
}

pub async fn not_found() -> AppError {
    AppError::not_found("Oops! We couldn't find the page you're looking for.")
}
