use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::FromRow;

/// A confirmed reservation for a movie showing. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: i64,
    pub movie_name: String,
    pub date: NaiveDate,
    pub showtime: NaiveTime,
    pub seats: i32,
    pub price: i64,
    pub email: String,
    pub created_at: NaiveDateTime,
}

impl Booking {
    // Find a booking by its id
    pub async fn find_by_id(
        id: i64,
        db: &crate::database::Database,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&db.pool)
            .await
    }

    /// Total charged for the booking: unit price times seat count.
    pub fn total_price(&self) -> i64 {
        self.price * self.seats as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dune_booking() -> Booking {
        Booking {
            id: 1,
            movie_name: "Dune".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            showtime: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            seats: 2,
            price: 250,
            email: "user@example.com".to_string(),
            created_at: NaiveDateTime::default(),
        }
    }

    // Pins the corrected formula: price x seats, not price squared.
    #[test]
    fn total_is_unit_price_times_seat_count() {
        let booking = dune_booking();
        assert_eq!(booking.total_price(), 500);
    }

    #[test]
    fn total_for_single_seat_equals_unit_price() {
        let mut booking = dune_booking();
        booking.seats = 1;
        assert_eq!(booking.total_price(), 250);
    }
}
