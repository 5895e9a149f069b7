use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::middleware::AuthUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/clear-chat", post(clear_chat))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

// This endpoint has its own wire format: {"success", "response",
// "user_message"} on success, {"success": false, "error"} otherwise.
fn chat_error(status: StatusCode, error: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({"success": false, "error": error})))
}

// POST /api/chat
async fn chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let Json(req) = payload
        .map_err(|_| chat_error(StatusCode::BAD_REQUEST, "Invalid JSON format"))?;

    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(chat_error(StatusCode::BAD_REQUEST, "Message cannot be empty"));
    }

    let response = state.chatbot.get_response(user.user_id, &message).await;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "response": response,
            "user_message": message,
        })),
    ))
}

// POST /api/clear-chat
async fn clear_chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> impl IntoResponse {
    state.chatbot.clear_history(user.user_id);

    (
        StatusCode::OK,
        Json(json!({"success": true, "message": "Chat history cleared"})),
    )
}
