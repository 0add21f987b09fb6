// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zwift API client.
//!
//! Handles:
//! - Password-grant login against the Zwift identity server
//! - Profile fetches with a bearer token, plus player stats for OAuth logins
//! - Proactive token refresh via the per-login [`TokenStore`]
//! - Mapping upstream failures to "wrong password" vs "try again later"

use async_trait::async_trait;
use chrono::Duration;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{overlay_progress, Credential, Profile, TokenPair, PROFILE_FIELDS};
use crate::services::oauth::OAuthTokenClient;
use crate::services::tokens::TokenStore;
use crate::time_utils::Clock;

/// The upstream fitness platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Log in with email and password; fails with `AuthenticationFailed` on
    /// bad credentials.
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<Box<dyn PlatformClient>, AppError>;

    /// Wrap tokens obtained through the OAuth front door in a client handle.
    fn client_from_tokens(&self, tokens: TokenStore) -> Box<dyn PlatformClient>;
}

/// An authenticated handle that can make calls on the user's behalf.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Raw profile document; see [`crate::models::Profile::from_upstream`].
    async fn fetch_profile(&self) -> Result<Value, AppError>;
}

/// Zwift over HTTPS.
pub struct ZwiftPlatform {
    http: reqwest::Client,
    identity: Arc<OAuthTokenClient>,
    api_base: String,
    oauth_endpoints: Option<OAuthEndpoints>,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
}

/// Where handles built from OAuth-issued tokens read from.
#[derive(Debug, Clone)]
struct OAuthEndpoints {
    profile_url: String,
    stats_url: String,
}

impl ZwiftPlatform {
    /// `identity` is the password-grant token endpoint; `api_base` the
    /// profile API host.
    pub fn new(
        http: reqwest::Client,
        identity: OAuthTokenClient,
        api_base: String,
        clock: Arc<dyn Clock>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            http,
            identity: Arc::new(identity),
            api_base: api_base.trim_end_matches('/').to_string(),
            oauth_endpoints: None,
            clock,
            refresh_margin,
        }
    }

    /// Profile and player stats endpoints for handles built from
    /// OAuth-issued tokens. `stats_url` carries an `{id}` placeholder.
    pub fn with_oauth_endpoints(mut self, profile_url: String, stats_url: String) -> Self {
        self.oauth_endpoints = Some(OAuthEndpoints {
            profile_url,
            stats_url,
        });
        self
    }

    fn profile_url(&self) -> String {
        format!("{}/api/profiles/me", self.api_base)
    }
}

#[async_trait]
impl Platform for ZwiftPlatform {
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<Box<dyn PlatformClient>, AppError> {
        let response = self.identity.password_grant(credential).await?;

        let tokens = TokenStore::with_margin(
            self.identity.clone(),
            self.clock.clone(),
            self.refresh_margin,
        );
        tokens.install(TokenPair::from_response(response, self.clock.now())?);

        Ok(Box::new(ZwiftSession {
            http: self.http.clone(),
            profile_url: self.profile_url(),
            stats_url: None,
            tokens,
        }))
    }

    fn client_from_tokens(&self, tokens: TokenStore) -> Box<dyn PlatformClient> {
        let (profile_url, stats_url) = match &self.oauth_endpoints {
            Some(endpoints) => (
                endpoints.profile_url.clone(),
                Some(endpoints.stats_url.clone()),
            ),
            None => (self.profile_url(), None),
        };
        Box::new(ZwiftSession {
            http: self.http.clone(),
            profile_url,
            stats_url,
            tokens,
        })
    }
}

/// Authenticated Zwift handle owning its token pair.
pub struct ZwiftSession {
    http: reqwest::Client,
    profile_url: String,
    /// Player stats template; XP and level there win over the profile's.
    stats_url: Option<String>,
    tokens: TokenStore,
}

impl ZwiftSession {
    /// Authenticated GET. A 401/403 clears the tokens.
    async fn get(&self, url: &str) -> Result<reqwest::Response, AppError> {
        let access_token = self.tokens.get_valid().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(transport_reason(&e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // Token revoked upstream; make the next call re-authenticate.
            self.tokens.clear();
            return Err(AppError::AuthenticationFailed);
        }
        Ok(response)
    }

    /// Overlay XP and level from the player stats. Missing stats keep the
    /// profile's own values.
    async fn overlay_stats(&self, template: &str, profile: &mut Value) -> Result<(), AppError> {
        let Some(athlete_id) = Profile::athlete_id_of(profile) else {
            return Ok(());
        };

        let url = template.replace("{id}", &athlete_id.to_string());
        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(athlete_id, "No player stats, using profile XP");
            return Ok(());
        }

        let stats = read_json(response, "stats").await?;
        overlay_progress(profile, &stats, &PROFILE_FIELDS);
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for ZwiftSession {
    async fn fetch_profile(&self) -> Result<Value, AppError> {
        let response = self.get(&self.profile_url).await?;
        let mut profile = read_json(response, "profile").await?;

        if let Some(template) = &self.stats_url {
            self.overlay_stats(template, &mut profile).await?;
        }
        Ok(profile)
    }
}

async fn read_json(response: reqwest::Response, what: &str) -> Result<Value, AppError> {
    let status = response.status();
    if !status.is_success() {
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Zwift rate limit hit (429)");
        }
        return Err(AppError::UpstreamUnavailable(format!("HTTP {}", status)));
    }

    response
        .json()
        .await
        .map_err(|_| AppError::UpstreamUnavailable(format!("unreadable {} response", what)))
}

/// Short reason for a transport failure, without the URL or any body.
pub(crate) fn transport_reason(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timeout".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        "request failed".to_string()
    }
}
