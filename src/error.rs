use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::mpesa::MpesaError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication with payment gateway failed: {0}")]
    Auth(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MpesaError> for AppError {
    fn from(err: MpesaError) -> Self {
        match err {
            MpesaError::Auth(msg) => AppError::Auth(msg),
            MpesaError::Rejected { description, .. } => AppError::GatewayRejected(description),
            // Transport failures and unparseable responses are both retryable.
            MpesaError::Transport(e) => AppError::GatewayUnavailable(e.to_string()),
            MpesaError::InvalidResponse(msg) => AppError::GatewayUnavailable(msg),
            MpesaError::CircuitOpen(msg) => AppError::GatewayUnavailable(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("invalid phone".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("transaction not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_gateway_unavailable_status_code() {
        let error = AppError::GatewayUnavailable("connection refused".to_string());
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_gateway_rejected_status_code() {
        let error = AppError::GatewayRejected("Invalid Amount".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_rejected_and_unavailable_map_to_distinct_variants() {
        let rejected: AppError = MpesaError::Rejected {
            code: "1".to_string(),
            description: "Invalid Amount".to_string(),
        }
        .into();
        let unavailable: AppError = MpesaError::InvalidResponse("not json".to_string()).into();

        assert!(matches!(rejected, AppError::GatewayRejected(_)));
        assert!(matches!(unavailable, AppError::GatewayUnavailable(_)));
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let error = AppError::Validation("amount out of range".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
