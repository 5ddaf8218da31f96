//! API request handlers, organized by domain:
//! - `user`: accounts, login and lookup
//! - `group`: groups, membership and history

mod group;
mod user;

use axum::Json;
use serde::Serialize;

use super::error::{ApiError, ApiResult};

pub use group::{
    add_user, change_group, create_group, find_new_user, get_available, get_group,
    get_last_messages, join, leave_group, read_group,
};
pub use user::{change_password, find_users, get_user, login, logout, register, remove_account};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Reject a missing or blank request field.
fn required<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("missing required field: {field}")));
    }
    Ok(value)
}
