// src/server/mod.rs

//! The HTTP front of the exporter.

use crate::config::Config;
use crate::core::credentials::CredentialStore;
use crate::core::scrape::{Exporter, ExporterOptions};
use anyhow::{Context, Result};
use axum::Router;
use axum::middleware;
use axum::routing::get;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

pub mod auth;
mod routes;

pub use auth::BasicAuth;

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub exporter: Exporter,
    pub basic_auth: Option<BasicAuth>,
    pub metrics_path: String,
}

impl AppState {
    /// Builds the state from a validated config. The credentials file, if
    /// any, is read once here; a broken file is logged and left for
    /// `/-/reload` to fix.
    pub fn from_config(config: &Config) -> Result<Self> {
        let options = ExporterOptions::from_config(config).context("Invalid exporter options")?;
        let credentials = Arc::new(CredentialStore::new(
            config.password_file.as_ref().map(PathBuf::from),
        ));
        if config.password_file.is_some() {
            if let Err(e) = credentials.reload() {
                warn!("Could not load credentials file: {}", e);
            }
        }

        Ok(Self {
            exporter: Exporter::new(options, credentials),
            basic_auth: BasicAuth::new(
                &config.basic_auth_username,
                &config.basic_auth_password,
                &config.basic_auth_realm,
            ),
            metrics_path: config.metrics_path.clone(),
        })
    }
}

/// Builds the router with every endpoint behind the Basic auth layer.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::landing_handler))
        .route(&state.metrics_path, get(routes::metrics_handler))
        .route("/scrape", get(routes::scrape_handler))
        .route("/discover-cluster-nodes", get(routes::discover_handler))
        .route("/-/reload", get(routes::reload_handler).post(routes::reload_handler))
        .route("/health", get(routes::health_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ))
        .with_state(state)
}

/// Serves the exporter until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    if state.basic_auth.is_some() {
        info!("Basic authentication enabled for realm '{}'", config.basic_auth_realm);
    }

    let app = router(state);
    let listener = TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_address))?;
    info!(
        "Redis exporter listening on http://{}{}",
        config.listen_address, config.metrics_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Exporter shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to register signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
    }
}
