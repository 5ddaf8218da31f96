//! Unified API error handling with structured responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::error::ChatError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "API error");
            }
            ApiError::ServiceUnavailable(msg) => {
                warn!(error_code = code, message = %msg, "Service unavailable");
            }
            _ => {
                tracing::debug!(error_code = code, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Validation(_) | ChatError::InvalidCursor(_) | ChatError::Crypto(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::NotMember => ApiError::NotFound(err.to_string()),
            ChatError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::Conflict(msg) => ApiError::Conflict(msg),
            ChatError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            // The chain may name tables or files; keep it in the log.
            ChatError::StoreUnavailable(e) => {
                warn!("Store failure: {:#}", e);
                ApiError::ServiceUnavailable("store unavailable, try again".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;

    fn status_of(err: ChatError) -> StatusCode {
        ApiError::from(err).status_code()
    }

    #[test]
    fn test_chat_error_status_codes() {
        assert_eq!(status_of(ChatError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ChatError::InvalidCursor("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CryptoError::InvalidKey("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ChatError::NotMember), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ChatError::not_found("user")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ChatError::conflict("x")), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ChatError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(anyhow::anyhow!("disk I/O error").into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_missing_group_and_non_member_look_alike() {
        let missing = ApiError::from(ChatError::NotMember);
        assert_eq!(missing.to_string(), "group not found");
        assert_eq!(missing.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_store_failure_hides_details() {
        let err = ApiError::from(ChatError::from(anyhow::anyhow!("no such table: users")));
        assert!(!err.to_string().contains("users"));
    }

    #[test]
    fn test_auth_error_maps_to_unauthorized() {
        let err = ApiError::from(AuthError::MissingSession);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
