//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session cookie on the request.
    #[error("not logged in")]
    MissingSession,

    /// The cookie names a session that is unknown or expired.
    #[error("session expired")]
    SessionExpired,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = match &self {
            AuthError::MissingSession => "NOT_LOGGED_IN",
            AuthError::SessionExpired => "SESSION_EXPIRED",
        };

        let body = Json(AuthErrorResponse {
            error: self.to_string(),
            code,
        });

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
