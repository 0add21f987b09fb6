// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Nothing here is secret: users' Zwift credentials arrive per request and
//! the OAuth flow is a public PKCE client.

use std::env;
use std::str::FromStr;

use crate::routes::auth::CALLBACK_PATH;

/// Upper bound for every seconds-valued setting (one year).
const MAX_SECS: i64 = 365 * 24 * 60 * 60;

/// How a logged-in client proves itself on later sync calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Client keeps the credentials and resends them; the server keeps nothing.
    Credentials,
    /// Server keeps the authenticated client; the client keeps a session id.
    ServerSession,
}

impl FromStr for AuthStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credentials" | "stateless" => Ok(AuthStrategy::Credentials),
            "session" | "server-session" => Ok(AuthStrategy::ServerSession),
            _ => Err(ConfigError::Invalid("AUTH_STRATEGY")),
        }
    }
}

/// OAuth 2.0 authorization-code-with-PKCE settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Profile endpoint used with OAuth-issued tokens
    pub profile_url: String,
    /// Player stats endpoint holding XP and level; `{id}` is the athlete id.
    pub stats_url: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL for CORS and OAuth redirects
    pub frontend_url: String,
    /// Public base URL of this API; the OAuth callback lives under it.
    pub api_url: String,
    pub auth_strategy: AuthStrategy,
    /// Sessions are evicted this long after creation, regardless of use.
    pub session_ttl_secs: i64,
    /// Cadence of the background eviction sweep
    pub session_sweep_interval_secs: u64,
    /// Access tokens are refreshed once they are this close to expiry.
    pub token_refresh_skew_secs: i64,

    // --- Zwift upstream ---
    /// Password-grant token endpoint
    pub zwift_auth_url: String,
    pub zwift_auth_client_id: String,
    /// Base URL of the profile API
    pub zwift_api_base: String,
    /// Per-request timeout for upstream calls
    pub upstream_timeout_secs: u64,

    /// OAuth front door; `None` disables `/auth/zwift`.
    pub oauth: Option<OAuthConfig>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 3001,
            frontend_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:3001".to_string(),
            auth_strategy: AuthStrategy::ServerSession,
            session_ttl_secs: 3600,
            session_sweep_interval_secs: 300,
            token_refresh_skew_secs: 300,
            zwift_auth_url: "http://127.0.0.1:9/token".to_string(),
            zwift_auth_client_id: "Zwift_Mobile_Link".to_string(),
            zwift_api_base: "http://127.0.0.1:9".to_string(),
            upstream_timeout_secs: 2,
            oauth: Some(OAuthConfig {
                client_id: "test_client_id".to_string(),
                authorize_url: "https://www.zwift.com/oauth/authorize".to_string(),
                token_url: "https://www.zwift.com/oauth/token".to_string(),
                redirect_uri: format!("http://localhost:3001{}", CALLBACK_PATH),
                scopes: vec!["profile".to_string(), "email".to_string()],
                profile_url: "https://www.zwift.com/api/v3/profile".to_string(),
                stats_url: "https://www.zwift.com/api/v3/player/{id}".to_string(),
            }),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let frontend_url = env::var("FRONTEND_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let port = parse_var("PORT", 3001)?;
        let api_url = env::var("API_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let oauth = match env::var("ZWIFT_OAUTH_CLIENT_ID") {
            Ok(client_id) if !client_id.trim().is_empty() => Some(OAuthConfig {
                client_id: client_id.trim().to_string(),
                authorize_url: env::var("ZWIFT_OAUTH_AUTHORIZE_URL")
                    .unwrap_or_else(|_| "https://www.zwift.com/oauth/authorize".to_string()),
                token_url: env::var("ZWIFT_OAUTH_TOKEN_URL")
                    .unwrap_or_else(|_| "https://www.zwift.com/oauth/token".to_string()),
                redirect_uri: env::var("ZWIFT_OAUTH_REDIRECT_URI")
                    .unwrap_or_else(|_| format!("{}{}", api_url, CALLBACK_PATH)),
                scopes: env::var("ZWIFT_OAUTH_SCOPES")
                    .unwrap_or_else(|_| "profile email".to_string())
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
                profile_url: env::var("ZWIFT_OAUTH_PROFILE_URL")
                    .unwrap_or_else(|_| "https://www.zwift.com/api/v3/profile".to_string()),
                stats_url: env::var("ZWIFT_OAUTH_STATS_URL")
                    .unwrap_or_else(|_| "https://www.zwift.com/api/v3/player/{id}".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            port,
            auth_strategy: match env::var("AUTH_STRATEGY") {
                Ok(v) => v.parse()?,
                Err(_) => AuthStrategy::Credentials,
            },
            session_ttl_secs: parse_secs("SESSION_TTL_SECS", 3600)?,
            session_sweep_interval_secs: parse_var("SESSION_SWEEP_INTERVAL_SECS", 300)?,
            token_refresh_skew_secs: parse_secs("TOKEN_REFRESH_SKEW_SECS", 300)?,
            zwift_auth_url: env::var("ZWIFT_AUTH_URL").unwrap_or_else(|_| {
                "https://secure.zwift.com/auth/realms/zwift/protocol/openid-connect/token"
                    .to_string()
            }),
            zwift_auth_client_id: env::var("ZWIFT_AUTH_CLIENT_ID")
                .unwrap_or_else(|_| "Zwift_Mobile_Link".to_string()),
            zwift_api_base: env::var("ZWIFT_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://us-or-rly101.zwift.com".to_string()),
            upstream_timeout_secs: parse_var("UPSTREAM_TIMEOUT_SECS", 15)?,
            frontend_url,
            api_url,
            oauth,
        })
    }
}

/// Read and parse an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Read a seconds-valued variable that must be positive and at most a year.
fn parse_secs(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    check_secs(name, parse_var(name, default)?)
}

fn check_secs(name: &'static str, value: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_SECS).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(name))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
