use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::EngineError;
use serde::Serialize;
use thiserror::Error;

/// Transport-facing error, converted from [`EngineError`] exactly at the
/// HTTP edge so nothing upstream of `api-router` needs to know about
/// status codes (§7 "`api-router` converts `EngineError` to an HTTP-facing
/// `ApiError` exactly as the teacher's `api-router/src/error.rs` converts
/// `AppError`").
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal server error")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => Self::Validation(msg),
            EngineError::NotFound(msg) => Self::NotFound(msg),
            EngineError::Acquisition(msg)
            | EngineError::Ingestion(msg)
            | EngineError::ProviderTransient(msg)
            | EngineError::Provider(msg)
            | EngineError::ProviderAuth(msg)
            | EngineError::TokenLimitExceeded(msg) => Self::Upstream(msg),
            EngineError::Cancelled => Self::Upstream("request cancelled".to_string()),
            other => {
                tracing::error!(error = %other, "internal engine error");
                Self::Internal("internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                status: "error".to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_status_code(response: ApiError, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn engine_validation_error_maps_to_validation() {
        let err = ApiError::from(EngineError::Validation("bad input".to_string()));
        assert!(matches!(err, ApiError::Validation(msg) if msg == "bad input"));
    }

    #[test]
    fn engine_acquisition_error_maps_to_upstream() {
        let err = ApiError::from(EngineError::Acquisition("clone failed".to_string()));
        assert!(matches!(err, ApiError::Upstream(msg) if msg == "clone failed"));
    }

    #[test]
    fn status_codes_match_variants() {
        assert_status_code(ApiError::Validation("x".to_string()), StatusCode::BAD_REQUEST);
        assert_status_code(ApiError::NotFound("x".to_string()), StatusCode::NOT_FOUND);
        assert_status_code(ApiError::Upstream("x".to_string()), StatusCode::BAD_GATEWAY);
        assert_status_code(ApiError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_error_body_never_echoes_raw_message() {
        let err = ApiError::from(EngineError::Internal("db password incorrect".to_string()));
        assert_eq!(err.to_string(), "internal server error");
    }
}
