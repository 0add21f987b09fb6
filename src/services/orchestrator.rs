// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, sync and logout.
//!
//! Two strategies share this code path:
//! - [`AuthStrategy::Credentials`]: the client keeps the credentials and
//!   sends them with every sync; nothing is retained here.
//! - [`AuthStrategy::ServerSession`]: the authenticated client is parked in
//!   the [`SessionStore`] and the caller gets back an opaque session id.
//!
//! Stores are written only after the upstream call they depend on has
//! succeeded, so an abandoned request leaves no partial state behind.

use std::sync::Arc;

use crate::config::AuthStrategy;
use crate::error::AppError;
use crate::models::{Credential, Profile};
use crate::services::session::{SessionPayload, SessionStore};
use crate::services::tokens::TokenStore;
use crate::services::zwift::{Platform, PlatformClient};

/// How the caller proves itself on the next sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retention {
    Session(String),
    Credentials(Credential),
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub profile: Profile,
    pub retention: Retention,
}

/// Who is asking for a sync.
#[derive(Debug, Clone)]
pub enum SyncTarget {
    Session(String),
    Credentials(Credential),
}

/// Drives the login/sync/logout protocol against the upstream platform.
pub struct AuthOrchestrator {
    strategy: AuthStrategy,
    platform: Arc<dyn Platform>,
    sessions: Arc<SessionStore>,
}

impl AuthOrchestrator {
    pub fn new(
        strategy: AuthStrategy,
        platform: Arc<dyn Platform>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            strategy,
            platform,
            sessions,
        }
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn login(&self, credential: Credential) -> Result<LoginOutcome, AppError> {
        credential.ensure_present()?;

        let client = self.platform.authenticate(&credential).await?;
        let profile = Profile::from_upstream(&client.fetch_profile().await?)?;

        tracing::info!(
            athlete_id = profile.athlete_id,
            xp = profile.xp,
            level = profile.level,
            "Zwift login succeeded"
        );

        let retention = match self.strategy {
            AuthStrategy::ServerSession => Retention::Session(self.sessions.create(SessionPayload {
                client,
                profile: profile.clone(),
            })?),
            AuthStrategy::Credentials => Retention::Credentials(credential),
        };

        Ok(LoginOutcome { profile, retention })
    }

    /// Login via OAuth-issued tokens. Always produces a server session,
    /// since the tokens never go to the browser.
    pub async fn login_with_tokens(&self, tokens: TokenStore) -> Result<LoginOutcome, AppError> {
        let client = self.platform.client_from_tokens(tokens);
        let profile = Profile::from_upstream(&client.fetch_profile().await?)?;

        tracing::info!(athlete_id = profile.athlete_id, "Zwift OAuth login succeeded");

        let session_id = self.sessions.create(SessionPayload {
            client,
            profile: profile.clone(),
        })?;
        Ok(LoginOutcome {
            profile,
            retention: Retention::Session(session_id),
        })
    }

    /// Pull the current XP and level. Never touches anything but the
    /// session's cached profile.
    pub async fn sync(&self, target: SyncTarget) -> Result<Profile, AppError> {
        match target {
            SyncTarget::Session(session_id) => self.sync_session(&session_id).await,
            SyncTarget::Credentials(credential) => {
                credential.ensure_present()?;
                let client = self.platform.authenticate(&credential).await?;
                self.fetch(client.as_ref()).await
            }
        }
    }

    async fn sync_session(&self, session_id: &str) -> Result<Profile, AppError> {
        if session_id.is_empty() {
            return Err(AppError::InvalidInput("Session id is required".to_string()));
        }
        let record = self
            .sessions
            .get(session_id)
            .ok_or(AppError::SessionNotFound)?;

        match self.fetch(record.client()).await {
            Ok(profile) => {
                record.replace_profile(profile.clone());
                Ok(profile)
            }
            Err(e) if e.requires_login() => {
                tracing::info!(
                    athlete_id = record.athlete_id(),
                    kind = e.kind(),
                    "Session no longer authenticated, removing"
                );
                self.sessions.delete(session_id);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, client: &dyn PlatformClient) -> Result<Profile, AppError> {
        let profile = Profile::from_upstream(&client.fetch_profile().await?)?;
        tracing::info!(
            athlete_id = profile.athlete_id,
            xp = profile.xp,
            level = profile.level,
            "XP synced"
        );
        Ok(profile)
    }

    /// Forget a session. With the credential strategy there is nothing to
    /// forget server-side; the call is acknowledged all the same.
    pub fn logout(&self, session_id: Option<&str>) {
        match session_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                let removed = self.sessions.delete(id);
                tracing::info!(removed, "Logout");
            }
            None => tracing::debug!("Logout without session"),
        }
    }
}
