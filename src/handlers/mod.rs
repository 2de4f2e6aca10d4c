pub mod auth;
pub mod format;
pub mod payments;
pub mod webhook;

use crate::error::{AppError, ProcessingError};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Runs an orchestrator call on its own task and waits up to `budget` for it.
/// On expiry the caller gets `Timeout` while the task keeps running to completion,
/// so a half-finished create or reconcile still reaches its fallback.
pub(crate) async fn run_to_completion<T, F>(budget: Duration, operation: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, ProcessingError>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(operation);
    match tokio::time::timeout(budget, task).await {
        Ok(Ok(result)) => result.map_err(AppError::from),
        Ok(Err(e)) => Err(AppError::Internal(format!("request task failed: {}", e))),
        Err(_) => Err(AppError::Timeout),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    pub publish_breaker: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    // Check database connectivity with SELECT 1 query
    let db_status = match &state.db {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "Health check could not reach the database");
                "disconnected"
            }
        },
        None => "not_configured",
    };

    let healthy = db_status != "disconnected";
    let health_response = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
        publish_breaker: state.orchestrator.publisher().breaker_state().to_string(),
    };

    // An open breaker degrades webhooks but the service still accepts traffic.
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
