use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
///
/// Startup failures such as configuration errors never reach a request, so they
/// are reported by `main` and do not appear here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<crate::domain::AddressParseError> for AppError {
    fn from(err: crate::domain::AddressParseError) -> Self {
        AppError::BadRequest(format!("Invalid address: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AddressParseError;

    #[test]
    fn test_bad_request_status() {
        let response = AppError::from(AddressParseError::MissingPrefix).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bad_request_body_carries_message() {
        let err = AppError::from(AddressParseError::MissingPrefix);
        assert!(err.to_string().starts_with("Bad request: Invalid address"));

        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid address"));
    }
}
