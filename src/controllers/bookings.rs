use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::controllers::{first_validation_message, to_api_error, ApiResult};
use crate::middleware::AuthUser;
use crate::models::Booking;
use crate::services::ticket_code;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/bookings", post(create_booking))
}

pub fn page_routes() -> Router<Arc<AppState>> {
    Router::new().route("/booked_ticket/{id}", get(booked_ticket))
}

/* ---------- BOOKING SUBMISSION ---------- */

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, max = 100, message = "Movie name is required."))]
    pub movie_name: String,
    pub date: String,
    pub showtime: String,
    #[validate(range(min = 1, message = "Seat count must be positive."))]
    pub seats: i32,
    #[validate(range(min = 1, message = "Price must be positive."))]
    pub price: i64,
}

#[derive(Debug, Serialize)]
struct CreateBookingResponse {
    id: i64,
}

fn parse_show_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| "date: expected YYYY-MM-DD".to_string())
}

fn parse_show_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| "showtime: expected HH:MM".to_string())
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| to_api_error(StatusCode::BAD_REQUEST, &first_validation_message(&e)))?;

    let date = parse_show_date(&req.date)
        .map_err(|msg| to_api_error(StatusCode::BAD_REQUEST, &msg))?;
    let showtime = parse_show_time(&req.showtime)
        .map_err(|msg| to_api_error(StatusCode::BAD_REQUEST, &msg))?;

    // The booking is tied to the submitting user by email only.
    let booking = sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings (movie_name, date, showtime, seats, price, email)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(&req.movie_name)
    .bind(date)
    .bind(showtime)
    .bind(req.seats)
    .bind(req.price)
    .bind(&user.email)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_booking sql error: {:?}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create booking")
    })?;

    // Confirmation email is fire-and-forget: at-most-once, a failure is
    // logged and never rolls back the booking.
    let mailer = state.mailer.clone();
    let for_email = booking.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer.send_confirmation(&for_email).await {
            tracing::warn!(
                "confirmation email for booking {} failed: {}",
                for_email.id,
                e
            );
        } else {
            tracing::info!("Confirmation email sent for booking {}", for_email.id);
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse { id: booking.id }),
    ))
}

/* ---------- CONFIRMATION PAGE ---------- */

// GET /booked_ticket/{id}
async fn booked_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Html("<h1>Booking not found</h1>".to_string()),
        )
    };

    let booking = Booking::find_by_id(id, &state.db)
        .await
        .map_err(|e| {
            tracing::error!("booked_ticket sql error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h1>Something went wrong</h1>".to_string()),
            )
        })?
        .filter(|b| b.email == user.email)
        .ok_or_else(not_found)?;

    let qr_data = ticket_code::encode_ticket(&booking);
    let qr_base64 = ticket_code::qr_png_base64(&qr_data).map_err(|e| {
        tracing::error!("QR rendering failed for booking {}: {}", booking.id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>Something went wrong</h1>".to_string()),
        )
    })?;

    Ok(Html(render_confirmation_page(&booking, &qr_base64, &qr_data)))
}

fn render_confirmation_page(booking: &Booking, qr_base64: &str, qr_data: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>Booking Confirmed - Cine Booking</title></head>
  <body style="font-family: Arial, sans-serif; max-width: 600px; margin: 40px auto;">
    <h1>Ticket Booked!</h1>
    <table>
      <tr><td><strong>Ticket ID:</strong></td><td>#{id}</td></tr>
      <tr><td><strong>Movie:</strong></td><td>{movie}</td></tr>
      <tr><td><strong>Date:</strong></td><td>{date}</td></tr>
      <tr><td><strong>Show Time:</strong></td><td>{time}</td></tr>
      <tr><td><strong>Seats:</strong></td><td>{seats}</td></tr>
      <tr><td><strong>Price per Ticket:</strong></td><td>&#8377;{price}</td></tr>
      <tr><td><strong>Total:</strong></td><td>&#8377;{total}</td></tr>
    </table>
    <h2>Your QR Code</h2>
    <p>Present this code at the cinema entrance. A copy has been emailed to {email}.</p>
    <img src="data:image/png;base64,{qr_base64}" alt="Ticket QR Code" width="250">
    <p style="font-size: 12px; color: #666;">{qr_data}</p>
  </body>
</html>"#,
        id = booking.id,
        movie = booking.movie_name,
        date = booking.date.format("%d %B %Y"),
        time = booking.showtime.format("%I:%M %p"),
        seats = booking.seats,
        price = booking.price,
        total = booking.total_price(),
        email = booking.email,
        qr_base64 = qr_base64,
        qr_data = qr_data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, Timelike};

    fn valid_request() -> CreateBookingRequest {
        CreateBookingRequest {
            movie_name: "Dune".to_string(),
            date: "2025-05-01".to_string(),
            showtime: "18:00".to_string(),
            seats: 2,
            price: 250,
        }
    }

    #[test]
    fn accepts_a_well_formed_booking() {
        let req = valid_request();
        assert!(req.validate().is_ok());
        assert!(parse_show_date(&req.date).is_ok());
        assert!(parse_show_time(&req.showtime).is_ok());
    }

    #[test]
    fn rejects_non_positive_seat_counts() {
        let mut req = valid_request();
        req.seats = 0;
        let errors = req.validate().unwrap_err();
        assert!(first_validation_message(&errors).contains("Seat count"));

        req.seats = -3;
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_prices() {
        let mut req = valid_request();
        req.price = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_malformed_dates_before_persistence() {
        assert!(parse_show_date("01-05-2025").is_err());
        assert!(parse_show_date("2025-13-40").is_err());
        assert!(parse_show_date("tomorrow").is_err());
    }

    #[test]
    fn accepts_showtime_with_or_without_seconds() {
        assert_eq!(parse_show_time("18:00").unwrap().hour(), 18);
        assert_eq!(parse_show_time("18:00:00").unwrap().minute(), 0);
        assert!(parse_show_time("6 pm").is_err());
    }

    #[test]
    fn confirmation_page_shows_the_computed_total() {
        let booking = Booking {
            id: 3,
            movie_name: "Dune".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            showtime: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            seats: 2,
            price: 250,
            email: "user@example.com".to_string(),
            created_at: NaiveDateTime::default(),
        };

        let page = render_confirmation_page(&booking, "QR64", "encoded-data");
        assert!(page.contains("&#8377;500"));
        assert!(page.contains("data:image/png;base64,QR64"));
        assert!(page.contains("encoded-data"));
    }
}
