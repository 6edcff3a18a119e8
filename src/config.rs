// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | Required |
//! | `AUTH_AUDIENCE` | Expected JWT audience claim | Required |
//! | `AUTH_JWKS_URL` | Identity provider JWKS endpoint | `<issuer>/.well-known/jwks.json` |
//! | `AUTH_CLAIM_NAMESPACE` | Prefix of the custom `roles`/`permissions` claims | empty |
//! | `AUTH_LEEWAY_SECS` | Clock skew tolerance | `60` |
//! | `JWKS_CACHE_TTL_SECS` | Proactive key-set refresh period | `300` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Timeout of one key-set fetch | `10` |
//! | `JWKS_RETRY_BACKOFF_MS` | Delay before retrying an unreachable provider | `250` |
//! | `DATABASE_PATH` | redb file, or `:memory:` | `/data/patientlink.redb` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated allowed origins | `http://localhost:5173,http://localhost:3000` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | unset (plain HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::auth::verifier::CLOCK_SKEW_LEEWAY;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_CLAIM_NAMESPACE_ENV: &str = "AUTH_CLAIM_NAMESPACE";
pub const AUTH_LEEWAY_SECS_ENV: &str = "AUTH_LEEWAY_SECS";
pub const JWKS_CACHE_TTL_SECS_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_FETCH_TIMEOUT_SECS_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";
pub const JWKS_RETRY_BACKOFF_MS_ENV: &str = "JWKS_RETRY_BACKOFF_MS";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATABASE_PATH: &str = "/data/patientlink.redb";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Selects the in-process store instead of a redb file.
pub const MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Identity provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub issuer: String,
    pub audience: String,
    pub jwks_url: String,
    pub claim_namespace: String,
    pub leeway_secs: u64,
    pub jwks_cache_ttl: Duration,
    pub jwks_fetch_timeout: Duration,
    pub jwks_retry_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthSettings,
    pub database: DatabaseLocation,
    pub cors_origins: Vec<String>,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let issuer = get(AUTH_ISSUER_ENV).ok_or(ConfigError::Missing(AUTH_ISSUER_ENV))?;
        parse_url(AUTH_ISSUER_ENV, &issuer)?;
        let audience = get(AUTH_AUDIENCE_ENV).ok_or(ConfigError::Missing(AUTH_AUDIENCE_ENV))?;

        let jwks_url = get(AUTH_JWKS_URL_ENV).unwrap_or_else(|| {
            format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
        });
        let parsed = parse_url(AUTH_JWKS_URL_ENV, &jwks_url)?;
        if !is_secure_endpoint(&parsed) {
            return Err(ConfigError::Invalid {
                var: AUTH_JWKS_URL_ENV,
                value: jwks_url,
                reason: "key sets must be fetched over https".to_string(),
            });
        }

        let auth = AuthSettings {
            issuer,
            audience,
            jwks_url,
            claim_namespace: get(AUTH_CLAIM_NAMESPACE_ENV).unwrap_or_default(),
            leeway_secs: parse_or(&get, AUTH_LEEWAY_SECS_ENV, CLOCK_SKEW_LEEWAY)?,
            jwks_cache_ttl: Duration::from_secs(parse_or(&get, JWKS_CACHE_TTL_SECS_ENV, 300)?),
            jwks_fetch_timeout: Duration::from_secs(parse_or(
                &get,
                JWKS_FETCH_TIMEOUT_SECS_ENV,
                10,
            )?),
            jwks_retry_backoff: Duration::from_millis(parse_or(
                &get,
                JWKS_RETRY_BACKOFF_MS_ENV,
                250,
            )?),
        };

        let database = match get(DATABASE_PATH_ENV) {
            Some(p) if p == MEMORY_DATABASE => DatabaseLocation::Memory,
            Some(p) => DatabaseLocation::File(PathBuf::from(p)),
            None => DatabaseLocation::File(PathBuf::from(DEFAULT_DATABASE_PATH)),
        };

        let cors_origins = get(CORS_ALLOWED_ORIGINS_ENV)
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, PORT_ENV, 8080)?,
            auth,
            database,
            cors_origins,
            tls,
            log_format,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// https anywhere; plain http only for loopback development providers.
fn is_secure_endpoint(url: &Url) -> bool {
    match url.scheme() {
        "https" => true,
        "http" => matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")),
        _ => false,
    }
}
