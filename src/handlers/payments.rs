use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};

use crate::domain::{TransactionRequest, TransactionType};
use crate::error::AppError;
use crate::handlers::format::{ApiResponse, DataFormat};
use crate::handlers::run_to_completion;
use crate::validation::{normalize_amount, validate_transaction_request};
use crate::AppState;

/// `POST /api/v1/payments/:operation` where operation is `deposit` or `withdrawal`.
pub async fn create_payment(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let format = match DataFormat::from_headers(&headers) {
        Ok(format) => format,
        Err(e) => return DataFormat::Json.respond_error(e),
    };

    let (transaction_type, request) = match parse(&operation, format, &body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(operation = %operation, error = %e, "Payment request rejected");
            return format.respond_error(e);
        }
    };

    let orchestrator = state.orchestrator.clone();
    let created = run_to_completion(state.request_timeout, async move {
        orchestrator.create_and_route(transaction_type, &request).await
    })
    .await;

    match created {
        Ok(tx) => format.respond(
            StatusCode::OK,
            &ApiResponse::ok(format!("{} created", tx.transaction_type), tx),
        ),
        Err(AppError::Timeout) => {
            tracing::error!(
                operation = %operation,
                timeout = ?state.request_timeout,
                "Payment request timed out, creation continues in the background"
            );
            format.respond_error(AppError::Timeout)
        }
        Err(e) => {
            tracing::warn!(operation = %operation, error = %e, "Payment request rejected");
            format.respond_error(e)
        }
    }
}

fn parse(
    operation: &str,
    format: DataFormat,
    body: &[u8],
) -> Result<(TransactionType, TransactionRequest), AppError> {
    let transaction_type = TransactionType::from_operation(operation)
        .ok_or_else(|| AppError::BadRequest(format!("unsupported operation '{}'", operation)))?;

    let mut request: TransactionRequest = format.decode(body)?;
    request.amount = normalize_amount(&request.amount);
    validate_transaction_request(&request).map_err(|e| AppError::Validation(e.to_string()))?;

    Ok((transaction_type, request))
}
