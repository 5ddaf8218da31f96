//! Group handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::required;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::auth::CurrentUser;
use crate::group::{GroupDetails, GroupListItem, GroupSummary};
use crate::message::MessageRecord;
use crate::user::UserProfile;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangeGroupRequest {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GroupIdRequest {
    pub group_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LastMessagesQuery {
    pub group_id: String,
    /// Exclusive upper bound on message dates.
    pub f_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReadRequest {
    pub group_id: String,
    pub date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FindNewUserRequest {
    pub group_id: String,
    pub login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddUserRequest {
    pub group_id: String,
    pub user_id: String,
}

pub async fn create_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<GroupSummary>)> {
    let name = required(&request.name, "name")?;
    let group = state.groups.create(user.id(), name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn change_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangeGroupRequest>,
) -> ApiResult<Json<GroupSummary>> {
    let group_id = required(&request.id, "id")?;
    let name = required(&request.name, "name")?;
    let group = state.groups.rename(user.id(), group_id, name).await?;
    Ok(Json(group))
}

/// Groups of the caller, most recently active first.
pub async fn get_available(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<GroupListItem>>> {
    Ok(Json(state.groups.list_for_user(user.id()).await?))
}

/// History page of a group, oldest first.
pub async fn get_last_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LastMessagesQuery>,
) -> ApiResult<Json<Vec<MessageRecord>>> {
    let group_id = required(&query.group_id, "group_id")?;
    let messages = state
        .relay
        .fetch_recent(user.id(), group_id, query.f_date.as_deref())
        .await?;
    Ok(Json(messages))
}

pub async fn get_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<GroupIdRequest>,
) -> ApiResult<Json<GroupDetails>> {
    let group_id = required(&query.group_id, "group_id")?;
    Ok(Json(state.groups.info(user.id(), group_id).await?))
}

pub async fn leave_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<GroupIdRequest>,
) -> ApiResult<Json<bool>> {
    let group_id = required(&request.group_id, "group_id")?;
    state.groups.leave(user.id(), group_id).await?;
    Ok(Json(true))
}

/// Open the private conversation with another user.
pub async fn join(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<JoinRequest>,
) -> ApiResult<Json<GroupSummary>> {
    let other_id = required(&request.user_id, "user_id")?;
    Ok(Json(state.groups.join(user.id(), other_id).await?))
}

pub async fn read_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ReadRequest>,
) -> ApiResult<Json<bool>> {
    let group_id = required(&request.group_id, "group_id")?;
    let date = required(&request.date, "date")?;
    state.relay.mark_read(user.id(), group_id, date).await?;
    Ok(Json(true))
}

pub async fn find_new_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<FindNewUserRequest>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let group_id = required(&request.group_id, "group_id")?;
    Ok(Json(
        state
            .groups
            .find_new_users(user.id(), group_id, request.login.trim())
            .await?,
    ))
}

pub async fn add_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<AddUserRequest>,
) -> ApiResult<Json<bool>> {
    let group_id = required(&request.group_id, "group_id")?;
    let user_id = required(&request.user_id, "user_id")?;
    state.groups.add_member(user.id(), group_id, user_id).await?;
    Ok(Json(true))
}
