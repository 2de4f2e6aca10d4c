use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Raw webhook body, signature-checked against `WEBHOOK_SECRET` when one is configured.
pub struct VerifiedWebhook {
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> Result<(), AuthError> {
    let expected_signature = hex::decode(signature_header.trim())
        .map_err(|_| AuthError::InvalidSignatureFormat)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AuthError::InvalidSecret)?;
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected_signature)
        .map_err(|_| AuthError::SignatureMismatch)
}

/// Hex HMAC-SHA256 of `body`, as a gateway would send it.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AuthError::InvalidSecret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl FromRequest<AppState> for VerifiedWebhook {
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| AuthError::BodyReadError)?;

        if let Some(secret) = state.webhook_secret.as_deref() {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(AuthError::MissingSignature)?;
            verify_signature(secret, &body, signature)?;
        }

        Ok(VerifiedWebhook { headers, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingSignature,
    InvalidSignatureFormat,
    InvalidSecret,
    SignatureMismatch,
    BodyReadError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingSignature
            | AuthError::InvalidSignatureFormat
            | AuthError::SignatureMismatch => StatusCode::UNAUTHORIZED,
            AuthError::InvalidSecret => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::BodyReadError => StatusCode::BAD_REQUEST,
        };

        tracing::warn!(reason = ?self, "Webhook authentication failed");
        status.into_response()
    }
}
