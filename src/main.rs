use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cine_booking::{config::Config, controllers, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cine Booking server");

    // Database, mail transport, gateway and AI clients
    let app_state = AppState::new(config.clone())
        .await
        .expect("Failed to initialize application state");
    info!("Database connected");

    // Create the main router
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        // HTML pages at the root, JSON API under /api
        .merge(controllers::page_routes())
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
