//! HTTP API module.
//!
//! JSON endpoints under `/user` and `/group`, the `/ws` socket and an
//! optional static web client.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
