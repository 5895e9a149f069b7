use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::{first_validation_message, to_api_error, ApiResult};
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/* ---------- REGISTRATION ---------- */

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username is required."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 10, max = 15, message = "Phone number must be at least 10 digits."))]
    pub phone: String,
    pub dob: Option<NaiveDate>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub password2: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    success: bool,
    id: i32,
}

async fn value_taken(
    pool: &sqlx::PgPool,
    column: &str,
    value: &str,
) -> Result<bool, sqlx::Error> {
    // column comes from a fixed set below, never from input
    let query = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {column} = $1)");
    sqlx::query_scalar::<_, bool>(&query)
        .bind(value)
        .fetch_one(pool)
        .await
}

// POST /api/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| to_api_error(StatusCode::BAD_REQUEST, &first_validation_message(&e)))?;

    let db_error = |e: sqlx::Error| {
        tracing::error!("register sql error: {:?}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    };

    // Uniqueness checks mirror the form-level validation: reject with a
    // field message before attempting the insert.
    if value_taken(&state.db.pool, "email", &req.email).await.map_err(db_error)? {
        return Err(to_api_error(
            StatusCode::BAD_REQUEST,
            "This email is already registered.",
        ));
    }
    if value_taken(&state.db.pool, "phone", &req.phone).await.map_err(db_error)? {
        return Err(to_api_error(
            StatusCode::BAD_REQUEST,
            "This phone number is already registered.",
        ));
    }
    if value_taken(&state.db.pool, "username", &req.username).await.map_err(db_error)? {
        return Err(to_api_error(
            StatusCode::BAD_REQUEST,
            "This username is already taken.",
        ));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!("password hashing failed: {:?}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to register user")
    })?;

    let user_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (username, email, phone, dob, password_hash)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING user_id",
    )
    .bind(&req.username)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(req.dob)
    .bind(&password_hash)
    .fetch_one(&state.db.pool)
    .await
    .map_err(db_error)?;

    tracing::info!("Registered user {} ({})", user_id, req.email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            id: user_id,
        }),
    ))
}

/* ---------- LOGIN ---------- */

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

// POST /api/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = User::find_by_email(&req.email, &state.db)
        .await
        .map_err(|e| {
            tracing::error!("login sql error: {:?}", e);
            to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        })?;

    let user = match user {
        Some(user) if user.verify_password(&req.password) => user,
        _ => {
            return Err(to_api_error(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password.",
            ))
        }
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "user": {
                "id": user.user_id,
                "username": user.username,
                "email": user.email,
            }
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            username: "moviefan".to_string(),
            email: "fan@example.com".to_string(),
            phone: "9876543210".to_string(),
            dob: NaiveDate::from_ymd_opt(1999, 1, 1),
            password: "hunter2hunter2".to_string(),
            password2: "hunter2hunter2".to_string(),
        }
    }

    #[test]
    fn accepts_a_well_formed_registration() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn rejects_short_phone_numbers() {
        let mut req = valid_request();
        req.phone = "12345".to_string();
        let errors = req.validate().unwrap_err();
        assert!(first_validation_message(&errors).contains("at least 10 digits"));
    }

    #[test]
    fn rejects_mismatched_passwords() {
        let mut req = valid_request();
        req.password2 = "different-pass".to_string();
        let errors = req.validate().unwrap_err();
        assert!(first_validation_message(&errors).contains("Passwords do not match"));
    }

    #[test]
    fn rejects_malformed_email() {
        let mut req = valid_request();
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());
    }
}
