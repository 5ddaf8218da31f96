//! Authenticated sessions and the connections attached to them.

mod models;
mod registry;

pub use models::SessionInfo;
pub use registry::{DEFAULT_SESSION_LIFETIME_SECS, SessionRegistry};
