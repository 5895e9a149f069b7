pub mod auth;
pub mod bookings;
pub mod chat;
pub mod pages;
pub mod payment;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;
use std::sync::Arc;

// JSON API under /api
pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(bookings::routes())
        .merge(payment::routes())
        .merge(chat::routes())
}

// HTML pages at the root
pub fn page_routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(pages::routes())
        .merge(bookings::page_routes())
}

/* ---------- shared API error shape ---------- */

#[derive(Serialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn to_api_error(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            success: false,
            message: message.to_string(),
        }),
    )
}

/// First field-level message out of a `validator` failure, in
/// "field: message" form for the 400 response body.
pub fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| errs.iter().map(move |e| (field, e)))
        .next()
        .map(|(field, e)| match &e.message {
            Some(message) => format!("{field}: {message}"),
            None => format!("{field}: invalid value"),
        })
        .unwrap_or_else(|| "Invalid input".to_string())
}
