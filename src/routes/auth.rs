// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zwift OAuth (authorization code + PKCE) routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::services::oauth::PENDING_ATTEMPT_TTL_SECS;
use crate::services::{OAuthService, Retention};
use crate::AppState;

/// Cookie naming the pending attempt; scoped to the callback path.
pub const ATTEMPT_COOKIE: &str = "xp_oauth_attempt";
pub const CALLBACK_PATH: &str = "/auth/zwift/callback";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/zwift", get(auth_start))
        .route(CALLBACK_PATH, get(auth_callback))
}

fn attempt_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((ATTEMPT_COOKIE, value))
        .path(CALLBACK_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(PENDING_ATTEMPT_TTL_SECS))
        .build()
}

/// Start OAuth flow - redirect to the Zwift authorization endpoint.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::InvalidInput("OAuth login is not configured".to_string()))?;

    let start = oauth.start()?;
    let secure = state.config.frontend_url.starts_with("https://");
    let jar = jar.add(attempt_cookie(start.attempt_id, secure));

    Ok((jar, Redirect::temporary(&start.redirect_url)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session, redirect home.
///
/// Every outcome clears the attempt cookie and consumes the pending attempt.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::InvalidInput("OAuth login is not configured".to_string()))?;

    let attempt_id = jar.get(ATTEMPT_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(ATTEMPT_COOKIE).path(CALLBACK_PATH));
    let frontend_url = &state.config.frontend_url;

    if let Some(error) = &params.error {
        if let Some(id) = &attempt_id {
            oauth.pending().take(id);
        }
        let error = oauth_error_code(error);
        tracing::warn!(error, "OAuth error from Zwift");
        let redirect = format!("{}?error={}", frontend_url, error);
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let redirect = match complete_login(&state, oauth, attempt_id.as_deref(), &params).await {
        // Fragment, so the id never reaches server or proxy logs
        Ok(session_id) => format!(
            "{}#sessionId={}",
            frontend_url,
            urlencoding::encode(&session_id)
        ),
        Err(e) => {
            tracing::warn!(kind = e.kind(), "OAuth callback failed");
            format!("{}?error={}", frontend_url, e.kind())
        }
    };

    Ok((jar, Redirect::temporary(&redirect)))
}

/// Error codes an authorization server may return (RFC 6749 4.1.2.1).
const OAUTH_ERROR_CODES: &[&str] = &[
    "invalid_request",
    "unauthorized_client",
    "access_denied",
    "unsupported_response_type",
    "invalid_scope",
    "server_error",
    "temporarily_unavailable",
];

/// Map the callback's `error` parameter onto a known code.
fn oauth_error_code(raw: &str) -> &'static str {
    OAUTH_ERROR_CODES
        .iter()
        .copied()
        .find(|code| *code == raw)
        .unwrap_or("oauth_error")
}

/// Exchange the code, fetch the profile and open a session.
async fn complete_login(
    state: &AppState,
    oauth: &OAuthService,
    attempt_id: Option<&str>,
    params: &CallbackParams,
) -> Result<String> {
    let tokens = oauth
        .complete(
            attempt_id,
            params.code.as_deref().unwrap_or_default(),
            params.state.as_deref().unwrap_or_default(),
        )
        .await?;

    match state.orchestrator.login_with_tokens(tokens).await?.retention {
        Retention::Session(session_id) => Ok(session_id),
        Retention::Credentials(_) => Err(AppError::Internal(anyhow::anyhow!(
            "OAuth login did not produce a session"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_error_code_is_allow_listed() {
        assert_eq!(oauth_error_code("access_denied"), "access_denied");
        assert_eq!(oauth_error_code("server_error"), "server_error");
        assert_eq!(oauth_error_code("<script>alert(1)</script>"), "oauth_error");
        assert_eq!(oauth_error_code(&"x".repeat(10_000)), "oauth_error");
    }

    #[test]
    fn test_attempt_cookie_attributes() {
        let cookie = attempt_cookie("abc".to_string(), false).to_string();
        assert!(cookie.starts_with("xp_oauth_attempt=abc"));
        assert!(cookie.contains("Path=/auth/zwift/callback"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=600"));
        assert!(!cookie.contains("Secure"));

        let secure = attempt_cookie("abc".to_string(), true).to_string();
        assert!(secure.contains("Secure"));
    }
}
