// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod oauth;
pub mod orchestrator;
pub mod pkce;
pub mod session;
pub mod tokens;
pub mod zwift;

pub use oauth::{OAuthService, OAuthTokenClient, PendingAuthorizations};
pub use orchestrator::{AuthOrchestrator, LoginOutcome, Retention, SyncTarget};
pub use pkce::{OsRandom, PkceChallenge, RandomSource};
pub use session::{SessionPayload, SessionRecord, SessionStore};
pub use tokens::{TokenEndpoint, TokenStore};
pub use zwift::{Platform, PlatformClient, ZwiftPlatform};
