//! Body codecs chosen from the request's `Content-Type`.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Xml,
}

impl DataFormat {
    /// JSON when the header is absent; `415` for anything that is not JSON or XML.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let Some(value) = headers.get(header::CONTENT_TYPE) else {
            return Ok(DataFormat::Json);
        };

        let raw = value
            .to_str()
            .map_err(|_| AppError::UnsupportedMediaType("unreadable content type".to_string()))?;
        Self::from_content_type(raw)
    }

    pub fn from_content_type(raw: &str) -> Result<Self, AppError> {
        let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            "" | "application/json" => Ok(DataFormat::Json),
            "application/xml" | "text/xml" => Ok(DataFormat::Xml),
            other => Err(AppError::UnsupportedMediaType(other.to_string())),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DataFormat::Json => "application/json",
            DataFormat::Xml => "application/xml",
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, AppError> {
        match self {
            DataFormat::Json => serde_json::from_slice(body)
                .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e))),
            DataFormat::Xml => {
                let text = std::str::from_utf8(body)
                    .map_err(|e| AppError::BadRequest(format!("invalid XML body: {}", e)))?;
                quick_xml::de::from_str(text)
                    .map_err(|e| AppError::BadRequest(format!("invalid XML body: {}", e)))
            }
        }
    }

    /// `root` names the XML document element; JSON ignores it.
    pub fn encode<T: Serialize>(&self, value: &T, root: &str) -> Result<Vec<u8>, AppError> {
        match self {
            DataFormat::Json => serde_json::to_vec(value)
                .map_err(|e| AppError::Internal(format!("response encoding failed: {}", e))),
            DataFormat::Xml => quick_xml::se::to_string_with_root(root, value)
                .map(String::into_bytes)
                .map_err(|e| AppError::Internal(format!("response encoding failed: {}", e))),
        }
    }

    pub fn respond<T: Serialize>(&self, status: StatusCode, body: &ApiResponse<T>) -> Response {
        match self.encode(body, "response") {
            Ok(bytes) => (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type()))],
                bytes,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode response");
                e.into_response()
            }
        }
    }

    /// Error response in this format, keeping the `{status_code, message, data}` envelope.
    pub fn respond_error(&self, err: AppError) -> Response {
        let status = err.status_code();
        self.respond::<()>(status, &ApiResponse::error(status, err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}
