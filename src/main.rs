// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP Tracker API Server
//!
//! Logs riders into Zwift and reports their current XP and level.

use chrono::Duration;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xp_tracker::{
    config::Config,
    services::{OAuthTokenClient, OsRandom, TokenEndpoint, ZwiftPlatform},
    time_utils::SystemClock,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        strategy = ?config.auth_strategy,
        oauth = config.oauth.is_some(),
        "Starting XP Tracker API"
    );

    let clock = Arc::new(SystemClock);
    let rng = Arc::new(OsRandom::new());
    let refresh_margin = Duration::seconds(config.token_refresh_skew_secs);

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.upstream_timeout_secs))
        .build()?;

    // Password-grant login against the Zwift identity server
    let identity = OAuthTokenClient::new(
        http.clone(),
        config.zwift_auth_url.clone(),
        config.zwift_auth_client_id.clone(),
        None,
    );
    let mut platform = ZwiftPlatform::new(
        http.clone(),
        identity,
        config.zwift_api_base.clone(),
        clock.clone(),
        refresh_margin,
    );

    // Optional OAuth front door
    let mut oauth_endpoint: Option<Arc<dyn TokenEndpoint>> = None;
    if let Some(oauth) = &config.oauth {
        oauth_endpoint = Some(Arc::new(OAuthTokenClient::new(
            http.clone(),
            oauth.token_url.clone(),
            oauth.client_id.clone(),
            Some(oauth.redirect_uri.clone()),
        )));
        platform = platform
            .with_oauth_endpoints(oauth.profile_url.clone(), oauth.stats_url.clone());
        tracing::info!(client_id = %oauth.client_id, "Zwift OAuth enabled");
    }

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(platform),
        oauth_endpoint,
        clock,
        rng,
    ));

    // Background eviction of expired sessions and abandoned OAuth attempts
    let sweeper = state.clone();
    let sweep_every = std::time::Duration::from_secs(config.session_sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let (sessions, attempts) = sweeper.sweep();
            if sessions > 0 || attempts > 0 {
                tracing::info!(sessions, attempts, "Evicted expired entries");
            }
        }
    });

    // Build router
    let app = xp_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xp_tracker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
