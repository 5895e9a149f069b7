//! Service layer for the external payment gateway.
//!
//! `PaymentGatewayClient` opens orders against the gateway's REST API with
//! the configured key pair and verifies the HMAC signature the gateway
//! attaches to its checkout callback. All outbound calls run through a
//! circuit breaker so a gateway that keeps failing is shed instead of
//! hammered on every request.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

// Breaker tuning: open after this many consecutive failures, probe again
// after the timeout.
const FAILURE_THRESHOLD: u32 = 5;
const OPEN_TIMEOUT_SECS: u64 = 60;

/// Circuit breaker states.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation, requests allowed.
    Closed,
    /// Too many failures, requests blocked until the timeout elapses.
    Open,
    /// One probe request allowed to test whether the gateway recovered.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: std::sync::RwLock<CircuitState>,
    failure_count: AtomicU32,
    last_failure_time: AtomicU64,
    failure_threshold: u32,
    timeout_duration: Duration,
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            state: std::sync::RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure_time: AtomicU64::new(0),
            failure_threshold,
            timeout_duration: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn can_execute(&self) -> bool {
        let state = self.state.read().unwrap();

        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let last_failure = self.last_failure_time.load(Ordering::Relaxed);

                if epoch_secs().saturating_sub(last_failure) >= self.timeout_duration.as_secs() {
                    // Timeout elapsed, allow one probe request.
                    drop(state);
                    *self.state.write().unwrap() = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!("Circuit breaker recovered - transitioning to Closed state");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_time.store(epoch_secs(), Ordering::Relaxed);

        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::Closed => {
                if failure_count >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        failure_count, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn get_state(&self) -> CircuitState {
        self.state.read().unwrap().clone()
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway temporarily unavailable")]
    CircuitOpen,
    #[error("payment gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("payment gateway rejected the request: {status} {message}")]
    Gateway { status: u16, message: String },
}

// --- Gateway API models ---

/// Order-creation request body.
#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    /// Amount in currency subunits (e.g. paise).
    amount: i64,
    currency: String,
    receipt: String,
}

/// An order handle returned by the gateway, used for client-side checkout.
#[derive(Debug, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: Option<String>,
}

/// Client for the payment gateway's order API.
#[derive(Clone)]
pub struct PaymentGatewayClient {
    key_id: String,
    key_secret: String,
    base_url: String,
    currency: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl PaymentGatewayClient {
    pub fn from_config(config: &PaymentConfig) -> Self {
        Self {
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            base_url: config.gateway_url.clone(),
            currency: config.currency.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            circuit_breaker: Arc::new(CircuitBreaker::new(FAILURE_THRESHOLD, OPEN_TIMEOUT_SECS)),
        }
    }

    /// Public key id, handed to the client for gateway-hosted checkout.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Open a gateway order for `amount` currency subunits.
    pub async fn create_order(&self, amount: i64, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment gateway request");
            return Err(GatewayError::CircuitOpen);
        }

        let request = CreateOrderRequest {
            amount,
            currency: self.currency.clone(),
            receipt: receipt.to_string(),
        };

        info!(
            "Creating gateway order: amount={}, currency={}, receipt={}",
            amount, self.currency, receipt
        );

        match self.send_create_order(&request).await {
            Ok(order) => {
                self.circuit_breaker.record_success();
                Ok(order)
            }
            Err(e) => {
                error!("Payment gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn send_create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .http_client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<GatewayOrder>().await?)
    }

    /// Verify the signature the gateway sends with its checkout callback:
    /// hex(HMAC-SHA256(order_id|payment_id)) keyed with the secret.
    pub fn verify_callback_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool {
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());

        let expected = format!("{:x}", mac.finalize().into_bytes());
        expected == signature.to_lowercase()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> PaymentGatewayClient {
        PaymentGatewayClient::from_config(&PaymentConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: "rzp_test_secret".to_string(),
            gateway_url: base_url.to_string(),
            currency: "INR".to_string(),
        })
    }

    #[tokio::test]
    async fn creates_an_order_against_the_gateway() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(basic_auth("rzp_test_key", "rzp_test_secret"))
            .and(body_partial_json(serde_json::json!({
                "amount": 50_000,
                "currency": "INR",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_9A33XWu170gUtm",
                "amount": 50_000,
                "currency": "INR",
                "receipt": "booking-7",
                "status": "created"
            })))
            .mount(&server)
            .await;

        let order = client(&server.uri())
            .create_order(50_000, "booking-7")
            .await
            .unwrap();

        assert_eq!(order.id, "order_9A33XWu170gUtm");
        assert_eq!(order.amount, 50_000);
    }

    #[tokio::test]
    async fn maps_gateway_rejections_to_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .create_order(100, "booking-1")
            .await
            .unwrap_err();

        match err {
            GatewayError::Gateway { status, .. } => assert_eq!(status, 401),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn accepts_the_gateway_signature_and_rejects_tampering() {
        let client = client("http://gateway.invalid");

        let mut mac = HmacSha256::new_from_slice(b"rzp_test_secret").unwrap();
        mac.update(b"order_abc|pay_xyz");
        let signature = format!("{:x}", mac.finalize().into_bytes());

        assert!(client.verify_callback_signature("order_abc", "pay_xyz", &signature));
        assert!(!client.verify_callback_signature("order_abc", "pay_other", &signature));
        assert!(!client.verify_callback_signature("order_abc", "pay_xyz", "deadbeef"));
    }

    #[test]
    fn breaker_opens_after_threshold_and_probes_after_timeout() {
        let breaker = CircuitBreaker::new(2, 0);

        assert!(breaker.can_execute());
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);

        // Zero timeout: the next check moves straight to a HalfOpen probe.
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }
}
