use serde::Deserialize;
use std::env;

// Top-level configuration - container for all settings
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub payment: PaymentConfig,
    pub gemini: GeminiConfig,
}

// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Mail relay settings
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

// Payment gateway settings (key pair for gateway-hosted checkout)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub gateway_url: String,
    pub currency: String,
}

// Generative AI settings for the chatbot
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cine_booking=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .expect("SMTP_PORT must be a valid number"),
                username: env::var("SMTP_USERNAME").expect("SMTP_USERNAME must be set"),
                password: env::var("SMTP_PASSWORD").expect("SMTP_PASSWORD must be set"),
                from_address: env::var("EMAIL_FROM").unwrap_or_else(|_| {
                    env::var("SMTP_USERNAME").expect("SMTP_USERNAME must be set")
                }),
            },
            payment: PaymentConfig {
                key_id: env::var("RAZORPAY_KEY_ID").expect("RAZORPAY_KEY_ID must be set"),
                key_secret: env::var("RAZORPAY_KEY_SECRET").expect("RAZORPAY_KEY_SECRET must be set"),
                gateway_url: env::var("PAYMENT_GATEWAY_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
                currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            },
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set"),
                api_url: env::var("GEMINI_API_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            },
        }
    }
}
