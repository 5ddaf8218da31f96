//! Session-cookie authentication.
//!
//! The `sid` cookie carries the session token issued at login. Protected
//! routes run behind [`require_session`]; open routes that still want to know
//! the caller run behind [`attach_session`] and use [`MaybeUser`].

mod error;
mod middleware;

pub use error::AuthError;
pub use middleware::{
    CurrentUser, MaybeUser, SESSION_COOKIE, attach_session, require_session,
    session_token_from_headers, token_from_cookie_header,
};
