use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::controllers::{to_api_error, ApiResult};
use crate::middleware::AuthUser;
use crate::models::payment::{STATUS_PENDING, STATUS_SUCCESS};
use crate::models::{Booking, Payment};
use crate::services::payment::GatewayError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/initiate", post(initiate_payment))
        .route("/payments/callback", post(payment_callback))
}

/* ---------- PAYMENT INITIATION ---------- */

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub booking_id: i64,
}

// POST /api/payments/initiate
async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<InitiatePaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.booking_id <= 0 {
        return Err(to_api_error(
            StatusCode::BAD_REQUEST,
            "booking_id must be > 0",
        ));
    }

    let booking = Booking::find_by_id(req.booking_id, &state.db)
        .await
        .map_err(|e| {
            tracing::error!("initiate_payment sql error: {:?}", e);
            to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        })?
        .filter(|b| b.email == user.email)
        .ok_or_else(|| to_api_error(StatusCode::NOT_FOUND, "Booking not found"))?;

    // Charge unit price x seat count, in currency subunits.
    let amount = booking.total_price() * 100;
    let receipt = format!("booking-{}-{}", booking.id, Utc::now().timestamp());
    let description = format!("{} - {} ticket(s)", booking.movie_name, booking.seats);

    let order = state
        .payments
        .create_order(amount, &receipt)
        .await
        .map_err(|e| match e {
            GatewayError::CircuitOpen => to_api_error(
                StatusCode::BAD_GATEWAY,
                "Payment gateway temporarily unavailable. Please try again later.",
            ),
            other => {
                tracing::error!("payment gateway error: {:?}", other);
                to_api_error(
                    StatusCode::BAD_GATEWAY,
                    "Payment gateway error. Please try again later.",
                )
            }
        })?;

    sqlx::query(
        "INSERT INTO payments (user_id, order_id, amount, status)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(user.user_id)
    .bind(&order.id)
    .bind(amount)
    .bind(STATUS_PENDING)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("failed to record payment: {:?}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record payment")
    })?;

    tracing::info!(
        "Created payment for booking {}: order_id={}, amount={}",
        booking.id,
        order.id,
        amount
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "order_id": order.id,
            "amount": amount,
            "currency": order.currency,
            "key_id": state.payments.key_id(),
            "description": description,
        })),
    ))
}

/* ---------- CHECKOUT CALLBACK ---------- */

#[derive(Debug, Deserialize)]
pub struct PaymentCallbackRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

// POST /api/payments/callback
//
// Invoked by the client after gateway-hosted checkout. The signature proves
// the (order, payment) pair came from the gateway; only then is the payment
// marked successful.
async fn payment_callback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaymentCallbackRequest>,
) -> ApiResult<impl IntoResponse> {
    if !state.payments.verify_callback_signature(
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    ) {
        tracing::warn!(
            "rejected payment callback with bad signature for order {}",
            req.razorpay_order_id
        );
        return Err(to_api_error(
            StatusCode::BAD_REQUEST,
            "Invalid payment signature",
        ));
    }

    let db_error = |e: sqlx::Error| {
        tracing::error!("payment_callback sql error: {:?}", e);
        to_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    };

    let payment = Payment::find_by_order_id(&req.razorpay_order_id, &state.db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| to_api_error(StatusCode::NOT_FOUND, "Payment not found"))?;

    if payment.status != STATUS_PENDING {
        return Err(to_api_error(
            StatusCode::BAD_REQUEST,
            "Payment already processed",
        ));
    }

    // Single status flip: PENDING -> SUCCESS, guarded against a concurrent
    // callback by the status predicate.
    sqlx::query("UPDATE payments SET status = $1 WHERE order_id = $2 AND status = $3")
        .bind(STATUS_SUCCESS)
        .bind(&req.razorpay_order_id)
        .bind(STATUS_PENDING)
        .execute(&state.db.pool)
        .await
        .map_err(db_error)?;

    tracing::info!("Payment {} marked SUCCESS", req.razorpay_order_id);

    Ok((
        StatusCode::OK,
        Json(json!({"success": true, "message": "Payment verified"})),
    ))
}
