// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use xp_tracker::config::{AuthStrategy, Config};
use xp_tracker::error::AppError;
use xp_tracker::models::{Credential, TokenResponse};
use xp_tracker::routes::create_router;
use xp_tracker::services::{OsRandom, Platform, PlatformClient, TokenEndpoint, TokenStore};
use xp_tracker::time_utils::ManualClock;
use xp_tracker::AppState;

/// The profile document the stub platform returns by default.
#[allow(dead_code)]
pub fn rider_profile() -> Value {
    json!({
        "id": 42,
        "firstName": "Ada",
        "lastName": "Rider",
        "emailAddress": "ada@example.com",
        "countryAlpha3": "gbr",
        "totalXp": 50000,
        "level": 15
    })
}

/// How profile fetches behave.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Ok,
    Unauthorized,
    Unavailable,
}

/// In-memory stand-in for Zwift.
pub struct StubPlatform {
    pub profile: Mutex<Value>,
    pub fetch_mode: Mutex<FetchMode>,
    pub reject_credentials: AtomicBool,
    pub auth_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self {
            profile: Mutex::new(rider_profile()),
            fetch_mode: Mutex::new(FetchMode::Ok),
            reject_credentials: AtomicBool::new(false),
            auth_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }
}

#[allow(dead_code)]
impl StubPlatform {
    pub fn set_profile(&self, profile: Value) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn set_fetch_mode(&self, mode: FetchMode) {
        *self.fetch_mode.lock().unwrap() = mode;
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

/// Handle returned by [`StubPlatform`]; reads the platform's current state.
pub struct StubClient {
    platform: Arc<StubPlatform>,
}

#[async_trait]
impl PlatformClient for StubClient {
    async fn fetch_profile(&self) -> Result<Value, AppError> {
        self.platform.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.platform.fetch_mode.lock().unwrap();
        match mode {
            FetchMode::Ok => Ok(self.platform.profile.lock().unwrap().clone()),
            FetchMode::Unauthorized => Err(AppError::AuthenticationFailed),
            FetchMode::Unavailable => Err(AppError::UpstreamUnavailable("HTTP 503".to_string())),
        }
    }
}

/// `Platform` is implemented on the shared handle so clients can hold a
/// reference back to it.
pub struct SharedStub(pub Arc<StubPlatform>);

#[async_trait]
impl Platform for SharedStub {
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<Box<dyn PlatformClient>, AppError> {
        self.0.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.reject_credentials.load(Ordering::SeqCst) || credential.secret == "wrong" {
            return Err(AppError::AuthenticationFailed);
        }
        Ok(Box::new(StubClient {
            platform: self.0.clone(),
        }))
    }

    fn client_from_tokens(&self, _tokens: TokenStore) -> Box<dyn PlatformClient> {
        Box::new(StubClient {
            platform: self.0.clone(),
        })
    }
}

/// Token endpoint that issues sequentially numbered tokens.
#[derive(Default)]
pub struct StubTokenEndpoint {
    pub reject_codes: AtomicBool,
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
}

#[allow(dead_code)]
impl StubTokenEndpoint {
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for StubTokenEndpoint {
    async fn exchange_code(&self, code: &str, _verifier: &str) -> Result<TokenResponse, AppError> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
        if self.reject_codes.load(Ordering::SeqCst) || code.is_empty() {
            return Err(AppError::ExchangeRejected);
        }
        Ok(TokenResponse {
            access_token: format!("access_{}", n),
            refresh_token: Some(format!("refresh_{}", n)),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, AppError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(TokenResponse {
            access_token: format!("refreshed_{}", n),
            refresh_token: Some(format!("refresh_r{}", n)),
            expires_in: 3600,
        })
    }
}

/// Everything a test needs to drive and inspect the app.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub platform: Arc<StubPlatform>,
    pub tokens: Arc<StubTokenEndpoint>,
    pub clock: Arc<ManualClock>,
}

/// Create a test app with stubbed upstream dependencies.
#[allow(dead_code)]
pub fn create_test_app(strategy: AuthStrategy) -> TestApp {
    let mut config = Config::test_default();
    config.auth_strategy = strategy;
    create_test_app_with(config)
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let platform = Arc::new(StubPlatform::default());
    let tokens = Arc::new(StubTokenEndpoint::default());
    let clock = Arc::new(ManualClock::default());

    let state = Arc::new(AppState::new(
        config,
        Arc::new(SharedStub(platform.clone())),
        Some(tokens.clone() as Arc<dyn TokenEndpoint>),
        clock.clone(),
        Arc::new(OsRandom::new()),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        platform,
        tokens,
        clock,
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
