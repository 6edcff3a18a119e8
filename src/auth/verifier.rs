// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Verification order:
//!
//! 1. Parse the header (untrusted) and read `kid`
//! 2. Reject expired tokens from the unverified payload, before any key work
//! 3. Resolve `kid` through the [`KeySetCache`] (may force one refresh)
//! 4. Verify signature, `exp`, `nbf`, `aud` and `iss`

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, get_current_timestamp, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::AuthError;
use super::jwks::KeySetCache;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Expected issuer/audience and clock tolerance.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Expected issuer (identity provider URL)
    pub issuer: String,
    /// Expected audience (API identifier)
    pub audience: String,
    /// Leeway applied to `exp` and `nbf`
    pub leeway: u64,
}

impl VerifierConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: CLOCK_SKEW_LEEWAY,
        }
    }

    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }
}

/// The full claim set of a token whose signature and standard claims checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    #[cfg(test)]
    pub(crate) fn from_map(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Just enough of the payload to pre-check expiry.
#[derive(Deserialize)]
struct TemporalClaims {
    exp: Option<u64>,
}

/// Verifies bearer tokens against the provider's rotating key set.
pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    config: VerifierConfig,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeySetCache>, config: VerifierConfig) -> Self {
        Self { keys, config }
    }

    /// The key-set cache backing this verifier.
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify `token` and return its claims.
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let kid = header.kid.ok_or(AuthError::MalformedToken)?;

        let temporal = jsonwebtoken::dangerous::insecure_decode::<TemporalClaims>(token)
            .map_err(|_| AuthError::MalformedToken)?
            .claims;
        let exp = temporal.exp.ok_or(AuthError::MalformedToken)?;
        if exp.saturating_add(self.config.leeway) < get_current_timestamp() {
            tracing::debug!(kid = %kid, "Rejecting expired token");
            return Err(AuthError::Expired);
        }

        let key = self.keys.key_for(&kid).await?;

        if header.alg != key.algorithm {
            tracing::debug!(kid = %kid, alg = ?header.alg, "Token algorithm does not match key");
            return Err(AuthError::SignatureInvalid);
        }

        let mut validation = Validation::new(key.algorithm);
        validation.leeway = self.config.leeway;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let token_data = decode::<Map<String, Value>>(token, &key.decoding_key, &validation)
            .map_err(|e| {
                let error = AuthError::from(e);
                tracing::debug!(kid = %kid, error = %error, "Token rejected");
                error
            })?;

        Ok(VerifiedClaims(token_data.claims))
    }
}
