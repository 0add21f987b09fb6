// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zwift login, XP sync and logout endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::{Credential, ProfileSummary};
use crate::services::{Retention, SyncTarget};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/zwift/login", post(login))
        .route("/api/zwift/sync", post(sync))
        .route("/api/zwift/logout", post(logout))
}

/// Unwrap a JSON body, reporting malformed input in the API's error shape.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|_| AppError::InvalidInput("Request body must be JSON".to_string()))
}

// ─── Login ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    pub profile: ProfileSummary,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub level: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Only in the credential strategy; the client stores and resends these.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credential>,
}

/// Authenticate with Zwift and return the profile and XP.
async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Credential>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let credential = body(payload)?;
    let outcome = state.orchestrator.login(credential).await?;

    let (session_id, credentials) = match outcome.retention {
        Retention::Session(id) => (Some(id), None),
        Retention::Credentials(c) => (None, Some(c)),
    };

    Ok(Json(LoginResponse {
        success: true,
        athlete_id: outcome.profile.athlete_id,
        profile: outcome.profile.summary(),
        xp: outcome.profile.xp,
        level: outcome.profile.level,
        session_id,
        credentials,
    }))
}

// ─── Sync ────────────────────────────────────────────────────

/// Either a session id or the stored credentials.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl SyncRequest {
    fn into_target(self) -> Result<SyncTarget> {
        if let Some(session_id) = self.session_id.filter(|s| !s.is_empty()) {
            return Ok(SyncTarget::Session(session_id));
        }
        if self.email.is_some() || self.password.is_some() {
            return Ok(SyncTarget::Credentials(Credential::new(
                self.email.unwrap_or_default(),
                self.password.unwrap_or_default(),
            )));
        }
        Err(AppError::InvalidInput(
            "Session id or credentials are required".to_string(),
        ))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub level: u64,
    pub profile: ProfileSummary,
}

/// Pull fresh XP for a session or for resent credentials.
async fn sync(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>> {
    let target = body(payload)?.into_target()?;
    let profile = state.orchestrator.sync(target).await?;

    Ok(Json(SyncResponse {
        success: true,
        xp: profile.xp,
        level: profile.level,
        profile: profile.brief(),
    }))
}

// ─── Logout ──────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// Drop the server-side session, if any. An empty body is fine.
async fn logout(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LogoutRequest>, JsonRejection>,
) -> Json<LogoutResponse> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    state.orchestrator.logout(request.session_id.as_deref());

    Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}
