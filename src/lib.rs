// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! XP Tracker: follow progress toward Zwift's XP-gated unlocks
//!
//! This crate provides the backend API that logs a rider into Zwift and
//! pulls their live XP and level, either statelessly (the client resends
//! its credentials) or through a short-lived server-side session.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use chrono::Duration;
use config::Config;
use services::{AuthOrchestrator, OAuthService, Platform, RandomSource, SessionStore, TokenEndpoint};
use std::sync::Arc;
use time_utils::Clock;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionStore>,
    pub orchestrator: AuthOrchestrator,
    /// Present when the OAuth front door is configured.
    pub oauth: Option<OAuthService>,
}

impl AppState {
    /// Wire the stores and services together.
    ///
    /// `oauth_endpoint` is ignored unless `config.oauth` is set.
    pub fn new(
        config: Config,
        platform: Arc<dyn Platform>,
        oauth_endpoint: Option<Arc<dyn TokenEndpoint>>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(
            Duration::seconds(config.session_ttl_secs),
            clock.clone(),
            rng.clone(),
        ));
        let orchestrator = AuthOrchestrator::new(config.auth_strategy, platform, sessions.clone());
        let refresh_margin = Duration::seconds(config.token_refresh_skew_secs);
        let oauth = match (&config.oauth, oauth_endpoint) {
            (Some(oauth_config), Some(endpoint)) => Some(OAuthService::new(
                oauth_config.clone(),
                endpoint,
                rng,
                clock,
                refresh_margin,
            )),
            _ => None,
        };

        Self {
            config,
            sessions,
            orchestrator,
            oauth,
        }
    }

    /// One eviction pass over sessions and pending OAuth attempts.
    pub fn sweep(&self) -> (usize, usize) {
        let sessions = self.sessions.evict_expired();
        let attempts = self
            .oauth
            .as_ref()
            .map(|o| o.pending().evict_expired())
            .unwrap_or(0);
        (sessions, attempts)
    }
}
