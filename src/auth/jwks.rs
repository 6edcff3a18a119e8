// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - JWKS is fetched via HTTPS with a bounded timeout
//! - The snapshot is immutable once fetched and swapped as a whole
//! - A key-id miss forces exactly one refresh; if the provider cannot be
//!   reached the request fails closed
//! - Concurrent refreshes collapse into a single in-flight fetch
//!
//! ## Usage
//!
//! Build a [`KeySetCache`] over an [`HttpKeySource`] in `main.rs` and hand it
//! to the `TokenVerifier`. Tests plug in their own [`KeySource`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};

use super::error::AuthError;

/// Default JWKS cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default timeout for one JWKS request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay before retrying an unreachable provider.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Failure to obtain a key set from the provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeySourceError {
    #[error("JWKS request failed: {0}")]
    Request(String),

    #[error("HTTP {0} from JWKS endpoint")]
    Status(u16),

    #[error("invalid JWKS document: {0}")]
    Decode(String),
}

/// Where key sets come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the provider's current key set.
    async fn fetch(&self) -> Result<JwkSet, KeySourceError>;
}

/// Fetches the key set from the provider's discovery URL.
pub struct HttpKeySource {
    /// JWKS URL (e.g. `https://tenant.example.com/.well-known/jwks.json`)
    url: String,
    client: reqwest::Client,
}

impl HttpKeySource {
    /// Create a source with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KeySourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeySourceError::Request(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Get the JWKS URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeySourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeySourceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySourceError::Status(response.status().as_u16()));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySourceError::Decode(e.to_string()))
    }
}

/// A verification key together with the algorithm the provider declared for it.
#[derive(Clone, Debug)]
pub struct SigningKey {
    pub decoding_key: DecodingKey,
    pub algorithm: Algorithm,
}

/// Immutable snapshot of the provider's signing keys, indexed by key id.
#[derive(Debug)]
pub struct SigningKeySet {
    keys: HashMap<String, SigningKey>,
    refreshed_at: Instant,
}

impl SigningKeySet {
    /// Build a snapshot from a JWKS document.
    ///
    /// Keys without a `kid`, encryption keys and unsupported key types are skipped.
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(jwks.keys.len());

        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                tracing::debug!("Skipping JWK without kid");
                continue;
            };

            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                tracing::debug!(kid, "Skipping encryption key");
                continue;
            }

            match jwk_to_signing_key(jwk) {
                Ok(key) => {
                    keys.insert(kid.to_string(), key);
                }
                Err(e) => tracing::debug!(kid, error = %e, "Skipping unusable JWK"),
            }
        }

        Self {
            keys,
            refreshed_at: Instant::now(),
        }
    }

    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Time since this snapshot was fetched.
    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }
}

/// Bookkeeping for single-flight refreshes, guarded by `KeySetCache::refresh`.
struct RefreshState {
    /// Number of completed refresh attempts.
    generation: u64,
    /// Outcome of the most recent attempt, shared with everyone who waited on it.
    last_outcome: Option<Result<Arc<SigningKeySet>, String>>,
}

/// Process-wide key-set cache with rotation-aware lookup.
///
/// Lookups against a fresh snapshot only take a read lock. Refreshes are
/// serialised through an async mutex; a caller that queued behind an
/// in-flight refresh reuses its outcome instead of fetching again.
pub struct KeySetCache {
    source: Arc<dyn KeySource>,
    /// Snapshot age after which a lookup refreshes proactively
    cache_ttl: Duration,
    /// Delay before the single retry of a failed fetch
    retry_backoff: Duration,
    snapshot: RwLock<Option<Arc<SigningKeySet>>>,
    /// Mirror of `RefreshState::generation`, readable without the mutex
    generation: AtomicU64,
    refresh: Mutex<RefreshState>,
}

impl KeySetCache {
    /// Create an empty cache over the given source.
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self {
            source,
            cache_ttl: DEFAULT_CACHE_TTL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
            refresh: Mutex::new(RefreshState {
                generation: 0,
                last_outcome: None,
            }),
        }
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Create with custom retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Current snapshot, if any has been fetched.
    pub async fn snapshot(&self) -> Option<Arc<SigningKeySet>> {
        self.snapshot.read().await.clone()
    }

    /// Check if a snapshot is present and younger than the TTL.
    pub async fn is_cached(&self) -> bool {
        match &*self.snapshot.read().await {
            Some(set) => set.age() < self.cache_ttl,
            None => false,
        }
    }

    /// Resolve the verification key for `kid`.
    pub async fn key_for(&self, kid: &str) -> Result<SigningKey, AuthError> {
        let observed = self.generation.load(Ordering::Acquire);

        match self.snapshot().await {
            Some(current) if current.age() < self.cache_ttl => {
                if let Some(key) = current.get(kid) {
                    return Ok(key.clone());
                }

                tracing::warn!(kid, "Unknown signing key, forcing JWKS refresh");
                let refreshed = self.refresh_after(observed).await?;
                lookup(&refreshed, kid)
            }
            Some(stale) => match self.refresh_after(observed).await {
                Ok(refreshed) => lookup(&refreshed, kid),
                Err(e) => match stale.get(kid) {
                    Some(key) => {
                        tracing::warn!(kid, error = %e, "JWKS refresh failed, using stale snapshot");
                        Ok(key.clone())
                    }
                    None => Err(e),
                },
            },
            None => {
                let fetched = self.refresh_after(observed).await?;
                lookup(&fetched, kid)
            }
        }
    }

    /// Force a refresh of the key set.
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let observed = self.generation.load(Ordering::Acquire);
        self.refresh_after(observed).await
    }

    /// Refresh unless another caller completed one since `observed`.
    async fn refresh_after(&self, observed: u64) -> Result<Arc<SigningKeySet>, AuthError> {
        let mut state = self.refresh.lock().await;

        if state.generation != observed {
            if let Some(outcome) = &state.last_outcome {
                return outcome
                    .clone()
                    .map_err(AuthError::IdentityProviderUnreachable);
            }
        }

        let outcome = self
            .fetch_with_retry()
            .await
            .map(|jwks| Arc::new(SigningKeySet::from_jwks(&jwks)))
            .map_err(|e| e.to_string());

        match &outcome {
            Ok(set) => {
                *self.snapshot.write().await = Some(set.clone());
                tracing::info!(keys = set.len(), "JWKS refreshed");
            }
            Err(e) => tracing::warn!(error = %e, "JWKS refresh failed"),
        }

        state.generation += 1;
        state.last_outcome = Some(outcome.clone());
        self.generation.store(state.generation, Ordering::Release);

        outcome.map_err(AuthError::IdentityProviderUnreachable)
    }

    /// Fetch once, and once more after the backoff if the first attempt failed.
    async fn fetch_with_retry(&self) -> Result<JwkSet, KeySourceError> {
        match self.source.fetch().await {
            Ok(jwks) => Ok(jwks),
            Err(first) => {
                tracing::warn!(error = %first, "JWKS fetch failed, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.source.fetch().await
            }
        }
    }
}

fn lookup(set: &SigningKeySet, kid: &str) -> Result<SigningKey, AuthError> {
    set.get(kid).cloned().ok_or_else(|| {
        tracing::warn!(kid, "Signing key still unknown after refresh");
        AuthError::UnknownSigningKey
    })
}

/// Convert a JWK to a verification key.
fn jwk_to_signing_key(jwk: &Jwk) -> Result<SigningKey, KeySourceError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let decoding_key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| KeySourceError::Decode(format!("RSA key: {e}")))?;

            let algorithm = match jwk.common.key_algorithm {
                None | Some(KeyAlgorithm::RS256) => Algorithm::RS256,
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(other) => {
                    return Err(KeySourceError::Decode(format!(
                        "unsupported RSA algorithm {other:?}"
                    )))
                }
            };

            Ok(SigningKey {
                decoding_key,
                algorithm,
            })
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let decoding_key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| KeySourceError::Decode(format!("EC key: {e}")))?;

            let algorithm = match jwk.common.key_algorithm {
                None | Some(KeyAlgorithm::ES256) => Algorithm::ES256,
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                Some(other) => {
                    return Err(KeySourceError::Decode(format!(
                        "unsupported EC algorithm {other:?}"
                    )))
                }
            };

            Ok(SigningKey {
                decoding_key,
                algorithm,
            })
        }
        _ => Err(KeySourceError::Decode(
            "unsupported key type in JWKS".to_string(),
        )),
    }
}
