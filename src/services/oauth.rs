// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth 2.0 authorization code flow with PKCE.
//!
//! The token endpoint client here also serves the password grant used by
//! the email/password login, since Zwift's identity server speaks the same
//! protocol for both.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use reqwest::StatusCode;
use std::sync::Arc;

use crate::config::OAuthConfig;
use crate::error::AppError;
use crate::models::{Credential, TokenResponse};
use crate::services::pkce::{random_token, PkceChallenge, RandomSource};
use crate::services::tokens::{TokenEndpoint, TokenStore};
use crate::services::zwift::transport_reason;
use crate::time_utils::Clock;

/// Pending authorization attempts older than this are discarded (10 minutes).
pub const PENDING_ATTEMPT_TTL_SECS: i64 = 10 * 60;

const ATTEMPT_ID_BYTES: usize = 24;

/// Client for an OAuth token endpoint.
#[derive(Clone)]
pub struct OAuthTokenClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    redirect_uri: Option<String>,
}

/// What a 4xx from the token endpoint means for each grant.
#[derive(Clone, Copy)]
enum Grant {
    Password,
    AuthorizationCode,
    Refresh,
}

impl OAuthTokenClient {
    pub fn new(
        http: reqwest::Client,
        token_url: String,
        client_id: String,
        redirect_uri: Option<String>,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id,
            redirect_uri,
        }
    }

    /// `grant_type=password` (resource owner credentials).
    pub async fn password_grant(&self, credential: &Credential) -> Result<TokenResponse, AppError> {
        self.post_form(
            &[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "password"),
                ("username", credential.email.as_str()),
                ("password", credential.secret.as_str()),
            ],
            Grant::Password,
        )
        .await
    }

    async fn post_form(
        &self,
        params: &[(&str, &str)],
        grant: Grant,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(transport_reason(&e)))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|_| {
                AppError::UpstreamUnavailable("unreadable token response".to_string())
            });
        }

        // The body may echo request details, so only the status is kept.
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            tracing::info!(status = %status, "Token endpoint rejected grant");
            return Err(match grant {
                Grant::Password => AppError::AuthenticationFailed,
                Grant::AuthorizationCode => AppError::ExchangeRejected,
                Grant::Refresh => AppError::RefreshFailed,
            });
        }

        tracing::warn!(status = %status, "Token endpoint error");
        Err(AppError::UpstreamUnavailable(format!("HTTP {}", status)))
    }
}

#[async_trait]
impl TokenEndpoint for OAuthTokenClient {
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, AppError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", verifier),
        ];
        if let Some(redirect_uri) = &self.redirect_uri {
            params.push(("redirect_uri", redirect_uri.as_str()));
        }
        self.post_form(&params, Grant::AuthorizationCode).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.post_form(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
            ],
            Grant::Refresh,
        )
        .await
    }
}

/// Build the authorization endpoint redirect for one attempt.
pub fn authorization_url(config: &OAuthConfig, pkce: &PkceChallenge) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method={}",
        config.authorize_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scopes.join(" ")),
        urlencoding::encode(pkce.state()),
        urlencoding::encode(pkce.challenge()),
        pkce.method(),
    )
}

struct PendingAttempt {
    challenge: PkceChallenge,
    created_at: DateTime<Utc>,
}

/// In-flight authorization round-trips, keyed by an attempt id the browser
/// carries in a cookie.
pub struct PendingAuthorizations {
    attempts: DashMap<String, PendingAttempt>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PendingAuthorizations {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn insert(&self, attempt_id: String, challenge: PkceChallenge) {
        self.evict_expired();
        self.attempts.insert(
            attempt_id,
            PendingAttempt {
                challenge,
                created_at: self.clock.now(),
            },
        );
    }

    /// Remove and return the attempt. A second call for the same id, or a
    /// call after the TTL, yields `None`.
    pub fn take(&self, attempt_id: &str) -> Option<PkceChallenge> {
        let (_, attempt) = self.attempts.remove(attempt_id)?;
        if self.clock.now() - attempt.created_at >= self.ttl {
            return None;
        }
        Some(attempt.challenge)
    }

    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.attempts.len();
        self.attempts
            .retain(|_, attempt| now - attempt.created_at < self.ttl);
        before.saturating_sub(self.attempts.len())
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// The OAuth front door: starts attempts and completes them into a
/// [`TokenStore`] holding the issued pair.
pub struct OAuthService {
    config: OAuthConfig,
    endpoint: Arc<dyn TokenEndpoint>,
    pending: PendingAuthorizations,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
}

/// Where to send the browser to start an attempt.
#[derive(Debug)]
pub struct AuthorizationStart {
    pub attempt_id: String,
    pub redirect_url: String,
}

impl OAuthService {
    pub fn new(
        config: OAuthConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        rng: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            config,
            endpoint,
            pending: PendingAuthorizations::new(
                Duration::seconds(PENDING_ATTEMPT_TTL_SECS),
                clock.clone(),
            ),
            rng,
            clock,
            refresh_margin,
        }
    }

    pub fn start(&self) -> Result<AuthorizationStart, AppError> {
        let pkce = PkceChallenge::generate(self.rng.as_ref())?;
        let attempt_id = random_token(self.rng.as_ref(), ATTEMPT_ID_BYTES)?;
        let redirect_url = authorization_url(&self.config, &pkce);
        self.pending.insert(attempt_id.clone(), pkce);

        tracing::info!(
            client_id = %self.config.client_id,
            pending = self.pending.len(),
            "Starting OAuth flow"
        );
        Ok(AuthorizationStart {
            attempt_id,
            redirect_url,
        })
    }

    /// Finish an attempt. The pending challenge is consumed even on failure.
    pub async fn complete(
        &self,
        attempt_id: Option<&str>,
        code: &str,
        returned_state: &str,
    ) -> Result<TokenStore, AppError> {
        let challenge = attempt_id
            .and_then(|id| self.pending.take(id))
            .ok_or(AppError::StateMismatch)?;

        let tokens =
            TokenStore::with_margin(self.endpoint.clone(), self.clock.clone(), self.refresh_margin);
        tokens.acquire(code, challenge, returned_state).await?;
        Ok(tokens)
    }

    pub fn pending(&self) -> &PendingAuthorizations {
        &self.pending
    }
}
