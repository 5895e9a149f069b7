pub mod config;
pub mod controllers;
pub mod database;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use services::chat::Chatbot;
use services::email::Mailer;
use services::payment::PaymentGatewayClient;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub mailer: Mailer,
    pub payments: PaymentGatewayClient,
    pub chatbot: Chatbot,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let mailer = Mailer::from_config(&config.smtp)?;
        let payments = PaymentGatewayClient::from_config(&config.payment);
        let chatbot = Chatbot::from_config(&config.gemini);

        Ok(Arc::new(Self {
            db,
            config,
            mailer,
            payments,
            chatbot,
        }))
    }
}
