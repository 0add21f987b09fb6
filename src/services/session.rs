// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session store.
//!
//! Maps an opaque session id to the authenticated Zwift client for that
//! login. Only the id ever leaves the server. Records expire a fixed TTL
//! after creation; reading a session does not extend it.

use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{Arc, RwLock};

use crate::error::AppError;
use crate::models::Profile;
use crate::services::pkce::{generate_session_id, RandomSource};
use crate::services::zwift::PlatformClient;
use crate::time_utils::Clock;

/// Default session lifetime (1 hour).
pub const SESSION_TTL_SECS: i64 = 60 * 60;

/// What a successful login hands to the store.
pub struct SessionPayload {
    pub client: Box<dyn PlatformClient>,
    pub profile: Profile,
}

/// A live session.
///
/// The client handle is owned by the record and is never cloned or
/// serialized; requests borrow it through the shared record.
pub struct SessionRecord {
    session_id: String,
    client: Box<dyn PlatformClient>,
    athlete_id: u64,
    cached_profile: RwLock<Profile>,
    created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn client(&self) -> &dyn PlatformClient {
        self.client.as_ref()
    }

    pub fn athlete_id(&self) -> u64 {
        self.athlete_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn profile(&self) -> Profile {
        self.cached_profile
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the cached profile wholesale.
    pub fn replace_profile(&self, profile: Profile) {
        *self
            .cached_profile
            .write()
            .unwrap_or_else(|e| e.into_inner()) = profile;
    }
}

/// Concurrent session map with TTL-from-creation eviction.
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionRecord>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
}

impl SessionStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            clock,
            rng,
        }
    }

    /// Store a new session and return its id.
    ///
    /// Expired sessions are swept first.
    pub fn create(&self, payload: SessionPayload) -> Result<String, AppError> {
        let evicted = self.evict_expired();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired sessions on create");
        }

        let now = self.clock.now();
        let SessionPayload { client, profile } = payload;
        let athlete_id = profile.athlete_id;

        // Retry on the (astronomically unlikely) id collision.
        loop {
            let session_id = generate_session_id(self.rng.as_ref(), now.timestamp_millis())?;
            match self.sessions.entry(session_id.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!("Session id collision, regenerating");
                    continue;
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(SessionRecord {
                        session_id: session_id.clone(),
                        client,
                        athlete_id,
                        cached_profile: RwLock::new(profile),
                        created_at: now,
                    }));
                    tracing::info!(athlete_id, sessions = self.sessions.len(), "Session created");
                    return Ok(session_id);
                }
            }
        }
    }

    /// Look up a session. No side effects.
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionRecord>> {
        self.sessions.get(session_id).map(|r| r.value().clone())
    }

    /// Remove a session. Missing ids are not an error.
    pub fn delete(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Remove every session whose age has reached the TTL. Returns the count.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, record| now - record.created_at < self.ttl);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
