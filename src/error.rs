// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Messages are short and fixed. Upstream response bodies and credential
//! values never end up in an error message or a log line.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Invalid Zwift credentials")]
    AuthenticationFailed,

    #[error("Zwift is unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid or expired session")]
    SessionNotFound,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Token refresh failed, please log in again")]
    RefreshFailed,

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Authorization code rejected")]
    ExchangeRejected,

    #[error("Secure random source unavailable")]
    CryptoUnavailable,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::AuthenticationFailed => "authentication_failed",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::SessionNotFound => "session_not_found",
            AppError::NotAuthenticated => "not_authenticated",
            AppError::RefreshFailed => "refresh_failed",
            AppError::StateMismatch => "state_mismatch",
            AppError::ExchangeRejected => "exchange_rejected",
            AppError::CryptoUnavailable => "crypto_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::StateMismatch => StatusCode::BAD_REQUEST,
            AppError::AuthenticationFailed
            | AppError::SessionNotFound
            | AppError::NotAuthenticated
            | AppError::RefreshFailed
            | AppError::ExchangeRejected => StatusCode::UNAUTHORIZED,
            AppError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::CryptoUnavailable | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True when the caller has to log in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AppError::AuthenticationFailed
                | AppError::SessionNotFound
                | AppError::NotAuthenticated
                | AppError::RefreshFailed
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                "Server error".to_string()
            }
            AppError::CryptoUnavailable => {
                tracing::error!("Secure random source unavailable");
                self.to_string()
            }
            AppError::UpstreamUnavailable(reason) => {
                tracing::warn!(reason = %reason, "Upstream unavailable");
                "Zwift is unavailable, try again later".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: self.kind(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_password_and_outage_are_distinct() {
        let auth = AppError::AuthenticationFailed;
        let outage = AppError::UpstreamUnavailable("HTTP 503".to_string());

        assert_ne!(auth.kind(), outage.kind());
        assert_eq!(auth.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(outage.status(), StatusCode::BAD_GATEWAY);
        assert!(auth.requires_login());
        assert!(!outage.requires_login());
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err = AppError::Internal(anyhow::anyhow!("secret detail"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("secret detail"));
        assert!(text.contains("internal_error"));
    }
}
