// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PKCE verifiers, challenges, CSRF state values and opaque identifiers.
//!
//! All randomness comes from the operating system CSPRNG via `ring`. If it
//! fails the caller gets [`AppError::CryptoUnavailable`]; there is no
//! fallback generator.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::AppError;

/// Random bytes behind a verifier; base64url of 32 bytes is 43 characters.
const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 32;
const SESSION_SUFFIX_BYTES: usize = 16;

/// Source of cryptographically secure random bytes.
pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), AppError>;
}

/// The OS CSPRNG.
#[derive(Debug, Clone)]
pub struct OsRandom {
    rng: SystemRandom,
}

impl OsRandom {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for OsRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), AppError> {
        self.rng.fill(dest).map_err(|_| AppError::CryptoUnavailable)
    }
}

/// `len` random bytes, base64url encoded without padding.
pub fn random_token(rng: &dyn RandomSource, len: usize) -> Result<String, AppError> {
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)?;
    Ok(URL_SAFE_NO_PAD.encode(&buf))
}

/// Fresh CSRF `state` value, independent of any verifier.
pub fn generate_state(rng: &dyn RandomSource) -> Result<String, AppError> {
    random_token(rng, STATE_BYTES)
}

/// Opaque session identifier: creation time in milliseconds plus a random suffix.
pub fn generate_session_id(rng: &dyn RandomSource, now_millis: i64) -> Result<String, AppError> {
    let mut suffix = [0u8; SESSION_SUFFIX_BYTES];
    rng.fill(&mut suffix)?;
    Ok(format!("session_{}_{}", now_millis, hex::encode(suffix)))
}

/// `base64url(sha256(verifier))` without padding (the S256 method).
pub fn derive_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Per-attempt PKCE material.
///
/// Not `Clone`. Moved into the code exchange and dropped there; a verifier
/// backs at most one login attempt.
pub struct PkceChallenge {
    verifier: String,
    challenge: String,
    state: String,
}

impl PkceChallenge {
    pub fn generate(rng: &dyn RandomSource) -> Result<Self, AppError> {
        let verifier = random_token(rng, VERIFIER_BYTES)?;
        let challenge = derive_challenge(&verifier);
        let state = generate_state(rng)?;
        Ok(Self {
            verifier,
            challenge,
            state,
        })
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn method(&self) -> &'static str {
        "S256"
    }
}

impl fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}
