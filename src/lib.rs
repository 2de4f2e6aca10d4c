pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::services::TransactionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransactionOrchestrator>,
    /// `None` when running without a database; health then reports `not_configured`.
    pub db: Option<PgPool>,
    pub request_timeout: Duration,
    pub webhook_secret: Option<String>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/payments/:operation", post(handlers::payments::create_payment))
        .route("/api/v1/webhooks", post(handlers::webhook::receive_webhook))
        .layer(axum::middleware::from_fn(middleware::request_logger_middleware))
        .with_state(state)
}
