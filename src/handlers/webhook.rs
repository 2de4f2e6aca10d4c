use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::domain::WebhookEvent;
use crate::error::AppError;
use crate::handlers::auth::VerifiedWebhook;
use crate::handlers::format::DataFormat;
use crate::handlers::run_to_completion;
use crate::AppState;

/// `POST /api/v1/webhooks`. Gateways only look at the status code, so bodies stay empty.
pub async fn receive_webhook(State(state): State<AppState>, webhook: VerifiedWebhook) -> Response {
    let status = match process(&state, &webhook).await {
        Ok(()) => StatusCode::OK,
        Err(AppError::Timeout) => {
            tracing::error!(
                timeout = ?state.request_timeout,
                "Webhook processing timed out, reconciliation continues in the background"
            );
            AppError::Timeout.status_code()
        }
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                tracing::error!(error = %e, status = status.as_u16(), "Webhook processing failed");
            } else {
                tracing::warn!(error = %e, status = status.as_u16(), "Webhook rejected");
            }
            status
        }
    };

    status.into_response()
}

async fn process(state: &AppState, webhook: &VerifiedWebhook) -> Result<(), AppError> {
    let format = DataFormat::from_headers(&webhook.headers)?;
    let event: WebhookEvent = format.decode(&webhook.body)?;

    let orchestrator = state.orchestrator.clone();
    let tx = run_to_completion(state.request_timeout, async move { orchestrator.reconcile(&event).await }).await?;

    tracing::info!(
        transaction_id = tx.id,
        status = %tx.status,
        "Webhook status published"
    );
    Ok(())
}
