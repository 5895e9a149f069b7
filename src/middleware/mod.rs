use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

/// The authenticated caller, resolved from HTTP Basic credentials
/// against the users table.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub email: String,
}

// Row shape for the credential lookup
#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i32,
    username: String,
    email: String,
    password_hash: String,
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

        // Split email:password
        let mut parts = credentials.splitn(2, ':');
        let email = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;
        let password = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;

        let row: Option<UserRow> = sqlx::query_as(
            "SELECT user_id, username, email, password_hash
             FROM users
             WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let user = row.ok_or(StatusCode::UNAUTHORIZED)?;

        if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AuthUser {
            user_id: user.user_id,
            username: user.username,
            email: user.email,
        })
    }
}
