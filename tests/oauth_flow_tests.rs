// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! OAuth front door tests.
//!
//! These tests verify that the authorization redirect carries a PKCE S256
//! challenge, that the callback only exchanges a code for the attempt that
//! issued the state, and that every attempt is single use.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;
use xp_tracker::config::{AuthStrategy, Config};

mod common;

use common::{create_test_app, create_test_app_with, TestApp};

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect")
        .to_str()
        .unwrap()
        .to_string()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(&format!("{}=", name)).map(str::to_string))
}

/// Start an attempt; returns (cookie pair, state).
async fn start(app: &TestApp) -> (String, String) {
    let response = app
        .router
        .clone()
        .oneshot(get("/auth/zwift", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("attempt cookie")
        .to_str()
        .unwrap()
        .to_string();
    let cookie = set_cookie.split(';').next().unwrap().trim().to_string();
    let state = query_param(&location(&response), "state").expect("state");
    (cookie, state)
}

#[tokio::test]
async fn test_start_redirects_with_pkce() {
    let app = create_test_app(AuthStrategy::ServerSession);

    let response = app
        .router
        .clone()
        .oneshot(get("/auth/zwift", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let url = location(&response);
    assert!(url.starts_with("https://www.zwift.com/oauth/authorize?"));
    assert_eq!(query_param(&url, "client_id").as_deref(), Some("test_client_id"));
    assert_eq!(query_param(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(
        query_param(&url, "code_challenge_method").as_deref(),
        Some("S256")
    );
    assert_eq!(query_param(&url, "code_challenge").unwrap().len(), 43);
    assert!(query_param(&url, "state").is_some());

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("xp_oauth_attempt="));
    assert!(set_cookie.contains("HttpOnly"));

    assert_eq!(app.state.oauth.as_ref().unwrap().pending().len(), 1);
}

#[tokio::test]
async fn test_callback_creates_session() {
    let app = create_test_app(AuthStrategy::Credentials);
    let (cookie, state) = start(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            &format!("/auth/zwift/callback?code=abc&state={}", state),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let url = location(&response);
    // Session id travels in the fragment, never the query
    assert!(url.starts_with("http://localhost:3000#sessionId="));
    assert!(!url.contains('?'));
    let session_id = url.split_once("#sessionId=").unwrap().1.to_string();

    // OAuth logins always get a server session, whatever the strategy
    let record = app.state.sessions.get(&session_id).expect("session");
    assert_eq!(record.athlete_id(), 42);
    assert_eq!(app.tokens.exchanges(), 1);
    assert!(app.state.oauth.as_ref().unwrap().pending().is_empty());
}

#[tokio::test]
async fn test_callback_without_cookie_is_state_mismatch() {
    let app = create_test_app(AuthStrategy::ServerSession);
    let (_cookie, state) = start(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            &format!("/auth/zwift/callback?code=abc&state={}", state),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        "http://localhost:3000?error=state_mismatch"
    );
    assert_eq!(app.tokens.exchanges(), 0);
    assert!(app.state.sessions.is_empty());
}

#[tokio::test]
async fn test_callback_wrong_state_never_exchanges() {
    let app = create_test_app(AuthStrategy::ServerSession);
    let (cookie, _state) = start(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/auth/zwift/callback?code=abc&state=forged",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        "http://localhost:3000?error=state_mismatch"
    );
    assert_eq!(app.tokens.exchanges(), 0);

    // The attempt is spent, so the genuine state no longer works either
    assert!(app.state.oauth.as_ref().unwrap().pending().is_empty());
}

#[tokio::test]
async fn test_callback_replay_is_rejected() {
    let app = create_test_app(AuthStrategy::ServerSession);
    let (cookie, state) = start(&app).await;
    let uri = format!("/auth/zwift/callback?code=abc&state={}", state);

    let first = app
        .router
        .clone()
        .oneshot(get(&uri, Some(&cookie)))
        .await
        .unwrap();
    assert!(location(&first).contains("#sessionId="));

    let second = app
        .router
        .clone()
        .oneshot(get(&uri, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(
        location(&second),
        "http://localhost:3000?error=state_mismatch"
    );
    assert_eq!(app.tokens.exchanges(), 1);
    assert_eq!(app.state.sessions.len(), 1);
}

#[tokio::test]
async fn test_callback_rejected_code() {
    let app = create_test_app(AuthStrategy::ServerSession);
    app.tokens
        .reject_codes
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (cookie, state) = start(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            &format!("/auth/zwift/callback?code=abc&state={}", state),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        "http://localhost:3000?error=exchange_rejected"
    );
    assert!(app.state.sessions.is_empty());
}

#[tokio::test]
async fn test_callback_error_param_consumes_attempt() {
    let app = create_test_app(AuthStrategy::ServerSession);
    let (cookie, _state) = start(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/auth/zwift/callback?error=access_denied",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        "http://localhost:3000?error=access_denied"
    );
    assert!(app.state.oauth.as_ref().unwrap().pending().is_empty());
    assert_eq!(app.tokens.exchanges(), 0);
}

#[tokio::test]
async fn test_callback_unknown_error_param_is_not_echoed() {
    let app = create_test_app(AuthStrategy::ServerSession);
    let (cookie, _state) = start(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/auth/zwift/callback?error=%3Cscript%3Ealert(1)%3C%2Fscript%3E",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        "http://localhost:3000?error=oauth_error"
    );
    assert!(app.state.oauth.as_ref().unwrap().pending().is_empty());
}

#[tokio::test]
async fn test_expired_attempt_is_state_mismatch() {
    let app = create_test_app(AuthStrategy::ServerSession);
    let (cookie, state) = start(&app).await;

    app.clock.advance(chrono::Duration::minutes(10));

    let response = app
        .router
        .clone()
        .oneshot(get(
            &format!("/auth/zwift/callback?code=abc&state={}", state),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        "http://localhost:3000?error=state_mismatch"
    );
    assert_eq!(app.tokens.exchanges(), 0);
}

#[tokio::test]
async fn test_oauth_routes_absent_when_unconfigured() {
    let mut config = Config::test_default();
    config.oauth = None;
    let app = create_test_app_with(config);

    let response = app
        .router
        .clone()
        .oneshot(get("/auth/zwift", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
