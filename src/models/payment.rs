use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

// Payment lifecycle: created PENDING, flipped to SUCCESS once by the
// verified gateway callback.
pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// A payment attempt against the external gateway. `order_id` is the
/// gateway's transaction handle used to drive client-side checkout.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i32,
    pub order_id: String,
    pub amount: i64,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl Payment {
    pub async fn find_by_order_id(
        order_id: &str,
        db: &crate::database::Database,
    ) -> Result<Option<Payment>, sqlx::Error> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&db.pool)
            .await
    }
}
