pub mod admin;
pub mod auth;
pub mod cooks;
pub mod extractors;
pub mod health;
pub mod meals;
pub mod pages;
pub mod profile;
