//! API error boundary
//!
//! Maps domain errors onto HTTP responses. Internal failures are logged
//! here, once, and clients get a short message without internal detail.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::otp::OtpError;
use crate::webhooks::{DispatchError, RegistryError};

/// Web API errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}")]
    Internal { context: String, cause: anyhow::Error },
}

impl ApiError {
    pub fn internal(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            context: context.into(),
            cause: source.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(msg) => ApiError::Validation(msg),
            RegistryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RegistryError::Internal(_) => ApiError::internal("Webhook registry failure", err),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::internal("Failed to dispatch event", err)
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::Notify(_) => ApiError::internal("Failed to send code", err),
            _ => ApiError::Validation(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Internal { context, cause } = &self {
            error!(error = ?cause, "{}", context);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_registry_error_mapping() {
        let validation: ApiError = RegistryError::Validation("endpoint_url is required".into()).into();
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.to_string(), "endpoint_url is required");

        let not_found: ApiError = RegistryError::NotFound(Uuid::nil()).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let internal: ApiError = RegistryError::Internal("disk full".into()).into();
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // Detail stays in the log, not the response
        assert!(!internal.to_string().contains("disk full"));
    }

    #[test]
    fn test_otp_error_mapping() {
        let mismatch: ApiError = OtpError::Mismatch.into();
        assert_eq!(mismatch.status_code(), StatusCode::BAD_REQUEST);

        let notify: ApiError = OtpError::Notify("smtp".into()).into();
        assert_eq!(notify.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::NotFound("Webhook x not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
