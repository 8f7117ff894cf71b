//! API handlers for the BI-ONE session gateway.
//!
//! Page routes are not served here; they pass through the route guard and
//! land on the fallback, which only carries the guard's cookie refreshes.

pub mod admin_services;
pub mod auth;
pub mod health;
pub mod me;

use axum::{http::StatusCode, response::IntoResponse};

/// Fallback for allowed page requests; pages are served elsewhere.
pub async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
