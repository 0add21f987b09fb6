// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token store and refresh controller.
//!
//! Owns one account's [`TokenPair`] and hands out access tokens that are
//! guaranteed to outlive the refresh margin. Refreshes for the same store are
//! serialized, so a refresh token is never presented upstream twice.
//! Any refresh failure clears the store and the user has to log in again.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::{Arc, RwLock};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::{TokenPair, TokenResponse};
use crate::services::pkce::PkceChallenge;
use crate::time_utils::Clock;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Upstream OAuth token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `grant_type=authorization_code` with the PKCE verifier.
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, AppError>;

    /// `grant_type=refresh_token`.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError>;
}

/// Holds the token pair for one logical client session.
pub struct TokenStore {
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    margin: Duration,
    /// Never held across an await.
    pair: RwLock<Option<TokenPair>>,
    /// Serializes the refresh path.
    refresh_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>, clock: Arc<dyn Clock>) -> Self {
        Self::with_margin(endpoint, clock, Duration::seconds(TOKEN_REFRESH_MARGIN_SECS))
    }

    pub fn with_margin(
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
        margin: Duration,
    ) -> Self {
        Self {
            endpoint,
            clock,
            margin,
            pair: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// `returned_state` is the `state` echoed back on the redirect; if it does
    /// not match the one issued with `challenge` nothing is sent upstream.
    /// The challenge is consumed whatever the outcome.
    pub async fn acquire(
        &self,
        code: &str,
        challenge: PkceChallenge,
        returned_state: &str,
    ) -> Result<TokenPair, AppError> {
        let expected = challenge.state().as_bytes();
        if !bool::from(expected.ct_eq(returned_state.as_bytes())) {
            tracing::warn!("OAuth state mismatch, aborting code exchange");
            return Err(AppError::StateMismatch);
        }
        if code.is_empty() {
            return Err(AppError::InvalidInput(
                "Missing authorization code".to_string(),
            ));
        }

        let response = self
            .endpoint
            .exchange_code(code, challenge.verifier())
            .await?;
        drop(challenge);

        let pair = TokenPair::from_response(response, self.clock.now())?;
        self.replace(Some(pair.clone()));
        tracing::info!("Authorization code exchanged");
        Ok(pair)
    }

    /// Install a pair obtained out of band (e.g. a password grant).
    pub fn install(&self, pair: TokenPair) {
        self.replace(Some(pair));
    }

    /// Return an access token valid for at least the refresh margin,
    /// refreshing first if needed.
    pub async fn get_valid(&self) -> Result<String, AppError> {
        // Fast path - no lock
        match self.fresh_access_token() {
            Lookup::Fresh(token) => return Ok(token),
            Lookup::Empty => return Err(AppError::NotAuthenticated),
            Lookup::Stale => {}
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed (or cleared) while we waited.
        let current = match self.fresh_access_token() {
            Lookup::Fresh(token) => return Ok(token),
            Lookup::Empty => return Err(AppError::NotAuthenticated),
            Lookup::Stale => self.snapshot(),
        };

        let Some(refresh_token) = current.and_then(|p| p.refresh_token) else {
            tracing::info!("Access token expiring and no refresh token held");
            self.clear();
            return Err(AppError::RefreshFailed);
        };

        tracing::info!("Access token expiring, refreshing");

        let response = match self.endpoint.refresh(&refresh_token).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(kind = e.kind(), "Token refresh failed, clearing tokens");
                self.clear();
                return Err(AppError::RefreshFailed);
            }
        };

        let now = self.clock.now();
        let pair = match TokenPair::from_response(response, now) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(kind = e.kind(), "Unusable refresh response, clearing tokens");
                self.clear();
                return Err(AppError::RefreshFailed);
            }
        };
        if !pair.is_fresh(now, self.margin) {
            tracing::warn!("Refreshed token is already inside the refresh margin");
            self.clear();
            return Err(AppError::RefreshFailed);
        }

        let access_token = pair.access_token.clone();
        self.replace(Some(pair));
        tracing::info!("Token refreshed");
        Ok(access_token)
    }

    /// Discard all token material. Idempotent.
    pub fn clear(&self) {
        self.replace(None);
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_some()
    }

    fn fresh_access_token(&self) -> Lookup {
        let guard = self.pair.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            None => Lookup::Empty,
            Some(pair) if pair.is_fresh(self.clock.now(), self.margin) => {
                Lookup::Fresh(pair.access_token.clone())
            }
            Some(_) => Lookup::Stale,
        }
    }

    fn snapshot(&self) -> Option<TokenPair> {
        self.pair.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn replace(&self, pair: Option<TokenPair>) {
        *self.pair.write().unwrap_or_else(|e| e.into_inner()) = pair;
    }
}

enum Lookup {
    Fresh(String),
    Stale,
    Empty,
}
