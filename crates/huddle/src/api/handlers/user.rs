//! User handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::required;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::user::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, RemoveAccountRequest, UserInfo,
    UserProfile,
};

/// Registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub data: RegisteredFlag,
}

#[derive(Debug, Serialize)]
pub struct RegisteredFlag {
    pub registered: bool,
}

/// Query of `GET /user/find`.
#[derive(Debug, Default, Deserialize)]
pub struct FindUsersQuery {
    pub login: Option<String>,
}

/// Identity of the caller; all fields null when anonymous.
pub async fn get_user(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> ApiResult<Json<UserInfo>> {
    let info = state.users.info(user.as_ref().map(CurrentUser::id)).await?;
    Ok(Json(info))
}

/// Login; sets the session cookie.
#[instrument(skip(state, request), fields(login = %request.login))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.users.login(request).await?;
    let cookie = state.session_cookie(&outcome.token);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(UserInfo::from(outcome.user)),
    ))
}

/// Logout; ends the session and clears the cookie.
pub async fn logout(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> impl IntoResponse {
    if let Some(user) = user {
        state.users.logout(user.token());
        info!(user_id = %user.id(), "User logged out");
    }

    (
        AppendHeaders([(SET_COOKIE, state.cleared_session_cookie())]),
        StatusCode::NO_CONTENT,
    )
}

#[instrument(skip(state, request), fields(login = %request.login))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    required(&request.login, "login")?;
    required(&request.password, "password")?;
    required(&request.public_key, "public_key")?;

    state.users.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            data: RegisteredFlag { registered: true },
        }),
    ))
}

/// Active users other than the caller, optionally filtered by login.
pub async fn find_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<FindUsersQuery>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let users = state.users.find(user.id(), query.login.as_deref()).await?;
    Ok(Json(users))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<UserProfile>> {
    required(&request.old_password, "oldPassword")?;
    required(&request.password, "password")?;

    let profile = state.users.change_password(user.id(), request).await?;
    Ok(Json(profile))
}

/// Remove the caller's account; clears the cookie.
pub async fn remove_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<RemoveAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    required(&request.password, "password")?;

    state.users.remove(user.id(), &request.password).await?;

    Ok((
        AppendHeaders([(SET_COOKIE, state.cleared_session_cookie())]),
        Json(true),
    ))
}
