// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod profile;
pub mod token;

pub use credential::Credential;
pub use profile::{overlay_progress, Profile, ProfileFieldTable, ProfileSummary, PROFILE_FIELDS};
pub use token::{TokenPair, TokenResponse};
