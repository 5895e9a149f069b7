use axum::{response::Html, routing::get, Router};
use std::sync::Arc;

use crate::AppState;

// Static pages, embedded at compile time.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(|| async { Html(include_str!("../../templates/login.html")) }))
        .route("/register", get(|| async { Html(include_str!("../../templates/register.html")) }))
        .route("/index", get(|| async { Html(include_str!("../../templates/index.html")) }))
        .route("/upcoming", get(|| async { Html(include_str!("../../templates/upcoming.html")) }))
        .route("/events", get(|| async { Html(include_str!("../../templates/events.html")) }))
        .route("/gettickets", get(|| async { Html(include_str!("../../templates/gettickets.html")) }))
        .route("/chat", get(|| async { Html(include_str!("../../templates/chatbot.html")) }))
}
