// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zwift account credentials.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;

/// Email and password for a Zwift account.
///
/// Only ever forwarded to the upstream authenticator. `Debug` redacts both
/// fields so a credential can never leak through a log line.
#[derive(Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Credential {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub email: String,
    #[serde(default, rename = "password")]
    #[validate(length(min = 1))]
    pub secret: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
        }
    }

    /// Reject missing or blank fields before anything goes upstream.
    pub fn ensure_present(&self) -> Result<(), AppError> {
        if self.validate().is_err() || self.email.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}
