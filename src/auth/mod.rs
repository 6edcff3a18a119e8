// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token authentication against an external identity provider.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with the identity provider
//! 2. Frontend sends `Authorization: Bearer <JWT>`
//! 3. Server:
//!    - Resolves the token's `kid` in the cached JWKS snapshot, refreshing
//!      once (single-flight) on a miss
//!    - Verifies signature, expiry, not-before, issuer, audience
//!    - Projects the claims onto an [`Identity`]:
//!      - `sub` → subject id
//!      - `<namespace>roles` / `<namespace>permissions` → role and permission lists
//!      - `scope` → scope set
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Key-set refreshes that fail reject the request (fail closed)
//! - Clock skew tolerance is 60 seconds by default

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod roles;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::{ClaimExtractor, Identity, ProfileHints};
pub use error::AuthError;
pub use extractor::{Auth, DoctorUser, PatientUser};
pub use jwks::{HttpKeySource, KeySetCache, KeySource};
pub use roles::Role;
pub use verifier::{TokenVerifier, VerifiedClaims, VerifierConfig};
