//! Authentication middleware and extractors.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, State},
    http::{HeaderMap, header::COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use log::debug;

use super::AuthError;
use crate::session::{SessionInfo, SessionRegistry};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// Find a cookie value in a `Cookie` header.
pub fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Session token from the request's `sid` cookie, if any.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(|cookie_header| token_from_cookie_header(cookie_header, SESSION_COOKIE))
        .filter(|token| !token.is_empty())
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session: SessionInfo,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.session.user_id
    }

    pub fn login(&self) -> &str {
        &self.session.login
    }

    pub fn token(&self) -> &str {
        &self.session.token
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingSession)
    }
}

/// Caller of an open route; `None` when anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

fn resolve_session(registry: &SessionRegistry, headers: &HeaderMap) -> Result<CurrentUser, AuthError> {
    let token = session_token_from_headers(headers).ok_or(AuthError::MissingSession)?;
    let session = registry.find_by_token(token).ok_or_else(|| {
        debug!("Rejected unknown or expired session token");
        AuthError::SessionExpired
    })?;
    Ok(CurrentUser { session })
}

/// Reject requests without a live session; inject [`CurrentUser`] otherwise.
pub async fn require_session(
    State(registry): State<Arc<SessionRegistry>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let user = resolve_session(&registry, req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Inject [`CurrentUser`] when the request carries a live session.
pub async fn attach_session(
    State(registry): State<Arc<SessionRegistry>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Ok(user) = resolve_session(&registry, req.headers()) {
        req.extensions_mut().insert(user);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_cookie_header() {
        assert_eq!(token_from_cookie_header("sid=abc", "sid"), Some("abc"));
        assert_eq!(
            token_from_cookie_header("theme=dark; sid=abc ; lang=en", "sid"),
            Some("abc")
        );
        assert_eq!(token_from_cookie_header("sidx=abc", "sid"), None);
        assert_eq!(token_from_cookie_header("", "sid"), None);
    }

    #[test]
    fn test_session_token_ignores_empty_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sid="));
        assert_eq!(session_token_from_headers(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("sid=tok"));
        assert_eq!(session_token_from_headers(&headers), Some("tok"));
    }

    #[test]
    fn test_resolve_session() {
        let registry = SessionRegistry::default();
        let (token, _) = registry.create_session("usr_1", "alice");

        let headers = HeaderMap::new();
        assert!(matches!(
            resolve_session(&registry, &headers),
            Err(AuthError::MissingSession)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sid=nope"));
        assert!(matches!(
            resolve_session(&registry, &headers),
            Err(AuthError::SessionExpired)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("sid={token}")).unwrap());
        let user = resolve_session(&registry, &headers).unwrap();
        assert_eq!(user.id(), "usr_1");
        assert_eq!(user.login(), "alice");
        assert_eq!(user.token(), token);
    }
}
