// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{error::Error, net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing_subscriber::EnvFilter;

use patientlink_server::{
    api::router,
    auth::{ClaimExtractor, HttpKeySource, KeySetCache, TokenVerifier, VerifierConfig},
    config::{AppConfig, DatabaseLocation, LogFormat, DEFAULT_LOG_FILTER},
    state::AppState,
    storage::{ClinicalStore, MemoryStore, RedbStore},
};

/// Time in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn Error>> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let auth = &config.auth;
    let source = HttpKeySource::new(auth.jwks_url.clone(), auth.jwks_fetch_timeout)?;
    let keys = KeySetCache::new(Arc::new(source))
        .with_cache_ttl(auth.jwks_cache_ttl)
        .with_retry_backoff(auth.jwks_retry_backoff);
    let verifier = TokenVerifier::new(
        Arc::new(keys),
        VerifierConfig::new(auth.issuer.clone(), auth.audience.clone()).with_leeway(auth.leeway_secs),
    );
    let claims = ClaimExtractor::new(&auth.claim_namespace);

    let store: Arc<dyn ClinicalStore> = match &config.database {
        DatabaseLocation::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        DatabaseLocation::File(path) => {
            tracing::info!(path = %path.display(), "Opening database");
            Arc::new(RedbStore::open(path)?)
        }
    };

    let state = AppState::new(verifier, claims, store);

    // Warm the key cache; failure is not fatal, readiness reports it.
    if let Err(e) = state.verifier.key_cache().refresh().await {
        tracing::warn!(error = %e, "Initial JWKS fetch failed");
    }

    let app = router(state, &config.cors_origins);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            tracing::info!(%addr, issuer = %auth.issuer, "PatientLink listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::info!(%addr, issuer = %auth.issuer, "PatientLink listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
