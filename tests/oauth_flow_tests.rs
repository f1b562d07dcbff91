// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login and callback route tests.
//!
//! Code exchange needs Firestore, so these stop at the state checks; the
//! full flow lives in firestore_integration.rs.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use chrono::{Duration, Utc};
use theme_song::middleware::auth::{create_jwt, SESSION_COOKIE};
use theme_song::services::oauth_state::{sign_state, verify_state};
use tower::ServiceExt;

mod common;

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
    })
}

async fn get(app: axum::Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_strava_login_redirects_with_signed_state() {
    let (app, state) = common::create_test_app();

    let response = get(app, "/strava/login").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let url = location(&response);
    assert!(url.starts_with("http://127.0.0.1:9/oauth/authorize?"));
    assert_eq!(query_param(&url, "client_id").as_deref(), Some("1234567890"));
    assert_eq!(
        query_param(&url, "redirect_uri").as_deref(),
        Some("https://api.example.test/strava/authorization")
    );
    assert_eq!(
        query_param(&url, "scope").as_deref(),
        Some("activity:read_all,activity:write")
    );

    let oauth_state = query_param(&url, "state").unwrap();
    assert_eq!(
        verify_state(&oauth_state, &state.config.oauth_state_key, Utc::now()).as_deref(),
        Some("strava")
    );
}

#[tokio::test]
async fn test_strava_callback_rejects_forged_state() {
    let (app, _) = common::create_test_app();
    let forged = sign_state("strava", b"not_the_server_key", Utc::now()).unwrap();

    let response = get(
        app,
        &format!("/strava/authorization?code=abc&state={}", forged),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_strava_callback_rejects_expired_state() {
    let (app, state) = common::create_test_app();
    let issued = Utc::now() - Duration::minutes(30);
    let stale = sign_state("strava", &state.config.oauth_state_key, issued).unwrap();

    let response = get(app, &format!("/strava/authorization?code=abc&state={}", stale)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_strava_callback_rejects_spotify_state() {
    let (app, state) = common::create_test_app();
    let other = sign_state("spotify:12345", &state.config.oauth_state_key, Utc::now()).unwrap();

    let response = get(app, &format!("/strava/authorization?code=abc&state={}", other)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_strava_callback_user_denied() {
    let (app, state) = common::create_test_app();
    let oauth_state = sign_state("strava", &state.config.oauth_state_key, Utc::now()).unwrap();

    let response = get(
        app,
        &format!(
            "/strava/authorization?error=access_denied&state={}",
            oauth_state
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://localhost:5173?error=access_denied"
    );
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_spotify_login_carries_athlete_in_state() {
    let (app, state) = common::create_test_app();
    let jwt = create_jwt(12345, &state.config.jwt_signing_key).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/spotify/login")
                .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, jwt))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let url = location(&response);
    assert!(url.starts_with("http://127.0.0.1:9/authorize?response_type=code"));
    assert_eq!(query_param(&url, "client_id").as_deref(), Some("0987654321"));
    assert_eq!(
        query_param(&url, "scope").as_deref(),
        Some("user-read-private user-read-email user-read-recently-played")
    );

    let oauth_state = query_param(&url, "state").unwrap();
    assert_eq!(
        verify_state(&oauth_state, &state.config.oauth_state_key, Utc::now()).as_deref(),
        Some("spotify:12345")
    );
}

#[tokio::test]
async fn test_spotify_callback_rejects_strava_state() {
    let (app, state) = common::create_test_app();
    let oauth_state = sign_state("strava", &state.config.oauth_state_key, Utc::now()).unwrap();

    let response = get(
        app,
        &format!("/spotify/authorization?code=abc&state={}", oauth_state),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_spotify_callback_requires_code() {
    let (app, state) = common::create_test_app();
    let oauth_state =
        sign_state("spotify:12345", &state.config.oauth_state_key, Utc::now()).unwrap();

    let response = get(app, &format!("/spotify/authorization?state={}", oauth_state)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_clears_session_cookie() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/logout")
                .header(header::COOKIE, format!("{}=test", SESSION_COOKIE))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:5173");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("logout should clear the cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with(&format!("{}=;", SESSION_COOKIE)));
    assert!(cookie.contains("Max-Age=0"));
}
