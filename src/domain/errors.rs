use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::persistence::DatabaseError;

/// Errors raised by the upstream gateway boundary.
///
/// A non-2xx upstream response is NOT an error here: routes surface upstream
/// status and body verbatim, so those travel as ordinary responses. Only
/// failures to reach or authenticate with the gateway are errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Upstream request failed: {0}")]
    Network(String),

    #[error("Failed to parse upstream response: {0}")]
    MalformedResponse(String),
}

/// HTTP-facing error type for route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Gateway(GatewayError::Network("down".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
