use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub dob: Option<NaiveDate>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub registered_at: NaiveDateTime,
}

impl User {
    // Find a user by email
    pub async fn find_by_email(
        email: &str,
        db: &crate::database::Database,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&db.pool)
            .await
    }

    // Verify a candidate password against the stored bcrypt hash
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}
