//! API integration tests.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{public_pem, register_and_login, send, test_app};

/// Test that health endpoint works without authentication.
#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app().await;

    let response = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["status"], "ok");
    assert!(response.json["version"].is_string());
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let (app, state) = test_app().await;
    let (cookie, id) = register_and_login(&app, "alice", 0).await;

    assert!(cookie.starts_with("sid="));
    let token = cookie.trim_start_matches("sid=");
    assert_eq!(state.registry.find_by_token(token).unwrap().user_id, id);

    let me = send(&app, Method::GET, "/user/get", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json["login"], "alice");
    assert_eq!(me.json["id"], id.as_str());

    let anonymous = send(&app, Method::GET, "/user/get", None, None).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert!(anonymous.json["id"].is_null());
    assert!(anonymous.json["login"].is_null());
}

#[tokio::test]
async fn test_login_cookie_is_http_only() {
    let (app, _) = test_app().await;
    register_and_login(&app, "alice", 0).await;

    let response = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({
            "login": "alice",
            "password": "secret-password",
            "public_key": public_pem(0),
        })),
    )
    .await;
    let set_cookie = response
        .headers
        .get(axum::http::header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=10800"));
}

#[tokio::test]
async fn test_register_conflicts() {
    let (app, _) = test_app().await;
    register_and_login(&app, "alice", 0).await;

    let response = send(
        &app,
        Method::PUT,
        "/user/register",
        None,
        Some(json!({
            "login": "alice",
            "password": "another-password",
            "public_key": public_pem(1),
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json["code"], "CONFLICT");

    let missing = send(
        &app,
        Method::PUT,
        "/user/register",
        None,
        Some(json!({ "login": "bobby" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let (app, _) = test_app().await;
    register_and_login(&app, "alice", 0).await;

    let response = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({
            "login": "alice",
            "password": "wrong-password",
            "public_key": public_pem(0),
        })),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.session_cookie().is_none());
}

/// Test that protected endpoints require a session.
#[tokio::test]
async fn test_protected_routes_require_session() {
    let (app, _) = test_app().await;

    let response = send(&app, Method::GET, "/group/get-available", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json["code"], "NOT_LOGGED_IN");

    let response = send(
        &app,
        Method::GET,
        "/group/get-available",
        Some("sid=not-a-session"),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let (app, _) = test_app().await;
    let (cookie, _) = register_and_login(&app, "alice", 0).await;

    let response = send(&app, Method::POST, "/user/logout", Some(&cookie), None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.session_cookie().as_deref(), Some("sid="));

    let response = send(&app, Method::GET, "/group/get-available", Some(&cookie), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_group_create_and_list() {
    let (app, _) = test_app().await;
    let (cookie, _) = register_and_login(&app, "alice", 0).await;

    let created = send(
        &app,
        Method::PUT,
        "/group/create",
        Some(&cookie),
        Some(json!({ "name": "team" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json["name"], "team");
    assert_eq!(created.json["type"], "group");
    let group_id = created.json["id"].as_str().unwrap().to_string();

    let list = send(&app, Method::GET, "/group/get-available", Some(&cookie), None).await;
    assert_eq!(list.status, StatusCode::OK);
    let groups = list.json.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], group_id.as_str());
    assert_eq!(groups[0]["newMessages"], 1);

    let history = send(
        &app,
        Method::GET,
        &format!("/group/get-last-messages?group_id={group_id}"),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(history.status, StatusCode::OK);
    let messages = history.json.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "service");
    assert_eq!(messages[0]["group"]["name"], "team");

    let date = messages[0]["date"].as_str().unwrap().to_string();
    let read = send(
        &app,
        Method::POST,
        "/group/read",
        Some(&cookie),
        Some(json!({ "group_id": group_id, "date": date })),
    )
    .await;
    assert_eq!(read.status, StatusCode::OK);

    let list = send(&app, Method::GET, "/group/get-available", Some(&cookie), None).await;
    assert_eq!(list.json[0]["newMessages"], 0);
}

#[tokio::test]
async fn test_invalid_cursor_is_rejected() {
    let (app, _) = test_app().await;
    let (cookie, _) = register_and_login(&app, "alice", 0).await;

    let created = send(
        &app,
        Method::PUT,
        "/group/create",
        Some(&cookie),
        Some(json!({ "name": "team" })),
    )
    .await;
    let group_id = created.json["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        Method::GET,
        &format!("/group/get-last-messages?group_id={group_id}&f_date=yesterday"),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Method::GET,
        &format!("/group/get-last-messages?group_id={group_id}&f_date=2099-01-01T00:00:00.000Z"),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_foreign_and_missing_groups_look_alike() {
    let (app, _) = test_app().await;
    let (alice, _) = register_and_login(&app, "alice", 0).await;
    let (bob, _) = register_and_login(&app, "bobby", 1).await;

    let created = send(
        &app,
        Method::PUT,
        "/group/create",
        Some(&alice),
        Some(json!({ "name": "team" })),
    )
    .await;
    let group_id = created.json["id"].as_str().unwrap().to_string();

    let foreign = send(
        &app,
        Method::GET,
        &format!("/group/get?group_id={group_id}"),
        Some(&bob),
        None,
    )
    .await;
    let missing = send(
        &app,
        Method::GET,
        "/group/get?group_id=grp_missing",
        Some(&bob),
        None,
    )
    .await;

    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.json, missing.json);
}

#[tokio::test]
async fn test_private_group_is_reused() {
    let (app, _) = test_app().await;
    let (alice, _) = register_and_login(&app, "alice", 0).await;
    let (bob, bob_id) = register_and_login(&app, "bobby", 1).await;

    let first = send(
        &app,
        Method::PUT,
        "/group/join",
        Some(&alice),
        Some(json!({ "user_id": bob_id })),
    )
    .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json["name"], "bobby");
    assert_eq!(first.json["type"], "private");

    let second = send(
        &app,
        Method::PUT,
        "/group/join",
        Some(&alice),
        Some(json!({ "user_id": bob_id })),
    )
    .await;
    assert_eq!(second.json["id"], first.json["id"]);

    let bobs_groups = send(&app, Method::GET, "/group/get-available", Some(&bob), None).await;
    let groups = bobs_groups.json.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["name"], "alice");

    let leave = send(
        &app,
        Method::POST,
        "/group/leave",
        Some(&bob),
        Some(json!({ "group_id": first.json["id"] })),
    )
    .await;
    assert_eq!(leave.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_add_user_and_find_new_user() {
    let (app, _) = test_app().await;
    let (alice, _) = register_and_login(&app, "alice", 0).await;
    let (_, bob_id) = register_and_login(&app, "bobby", 1).await;

    let created = send(
        &app,
        Method::PUT,
        "/group/create",
        Some(&alice),
        Some(json!({ "name": "team" })),
    )
    .await;
    let group_id = created.json["id"].as_str().unwrap().to_string();

    let candidates = send(
        &app,
        Method::POST,
        "/group/find-new-user",
        Some(&alice),
        Some(json!({ "group_id": group_id, "login": "bob" })),
    )
    .await;
    assert_eq!(candidates.status, StatusCode::OK);
    assert_eq!(candidates.json[0]["id"], bob_id.as_str());

    let everyone = send(
        &app,
        Method::POST,
        "/group/find-new-user",
        Some(&alice),
        Some(json!({ "group_id": group_id, "login": "" })),
    )
    .await;
    assert_eq!(everyone.status, StatusCode::OK);
    let ids: Vec<_> = everyone
        .json
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(bob_id)]);

    let added = send(
        &app,
        Method::POST,
        "/group/add-user",
        Some(&alice),
        Some(json!({ "group_id": group_id, "user_id": bob_id })),
    )
    .await;
    assert_eq!(added.status, StatusCode::OK);

    let info = send(
        &app,
        Method::GET,
        &format!("/group/get?group_id={group_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(info.json["users"].as_array().unwrap().len(), 2);

    let candidates = send(
        &app,
        Method::POST,
        "/group/find-new-user",
        Some(&alice),
        Some(json!({ "group_id": group_id, "login": "bob" })),
    )
    .await;
    assert!(candidates.json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_account() {
    let (app, state) = test_app().await;
    let (cookie, id) = register_and_login(&app, "alice", 0).await;

    let wrong = send(
        &app,
        Method::POST,
        "/user/remove",
        Some(&cookie),
        Some(json!({ "password": "wrong-password" })),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let removed = send(
        &app,
        Method::POST,
        "/user/remove",
        Some(&cookie),
        Some(json!({ "password": "secret-password" })),
    )
    .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert!(state.registry.find_by_user_id(&id).is_none());

    let login = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({
            "login": "alice",
            "password": "secret-password",
            "public_key": public_pem(0),
        })),
    )
    .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
}
