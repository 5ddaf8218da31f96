//! API route definitions.

use std::path::Path;

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::{attach_session, require_session};
use crate::ws;

use super::handlers;
use super::state::AppState;

/// Create the application router.
///
/// `static_dir`, when set, is served for every path no route matches.
pub fn create_router(
    state: AppState,
    allowed_origins: &[String],
    static_dir: Option<&Path>,
) -> Router {
    let cors = build_cors_layer(allowed_origins);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    // Protected routes (require a live session)
    let protected_routes = Router::new()
        .route("/user/find", get(handlers::find_users))
        .route("/user/change", post(handlers::change_password))
        .route("/user/remove", post(handlers::remove_account))
        .route("/group/create", put(handlers::create_group))
        .route("/group/change", post(handlers::change_group))
        .route("/group/get-available", get(handlers::get_available))
        .route("/group/get-last-messages", get(handlers::get_last_messages))
        .route("/group/get", get(handlers::get_group))
        .route("/group/leave", post(handlers::leave_group))
        .route("/group/join", put(handlers::join))
        .route("/group/read", post(handlers::read_group))
        .route("/group/find-new-user", post(handlers::find_new_user))
        .route("/group/add-user", post(handlers::add_user))
        .layer(middleware::from_fn_with_state(
            state.registry.clone(),
            require_session,
        ))
        .with_state(state.clone());

    // Open routes; the caller is attached when a session cookie is present
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/user/get", get(handlers::get_user))
        .route("/user/login", post(handlers::login))
        .route("/user/logout", post(handlers::logout))
        .route("/user/register", put(handlers::register))
        .layer(middleware::from_fn_with_state(
            state.registry.clone(),
            attach_session,
        ))
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    let mut router = Router::new().merge(public_routes).merge(protected_routes);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(cors).layer(trace_layer)
}

/// Build the CORS layer.
///
/// With no configured origins the request origin is mirrored, which keeps
/// credentialed requests working during development.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let headers = [
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::COOKIE,
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        tracing::info!("CORS: Allowing {} origin(s)", origins.len());
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}
