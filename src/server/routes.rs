// src/server/routes.rs

//! The HTTP handlers.

use super::AppState;
use crate::core::discovery::TopologyError;
use crate::core::metrics::{RequestRegistry, gather_process_metrics};
use crate::core::scrape::ScrapeParams;
use crate::core::ExporterError;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use tracing::{error, info, warn};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

fn exposition(registry: &RequestRegistry, extra: Option<String>) -> Response {
    match registry.encode() {
        Ok(mut body) => {
            if let Some(extra) = extra {
                body.push_str(&extra);
            }
            (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response()
        }
        Err(e) => {
            error!("Failed to encode scrape result: {}", e);
            e.into_response()
        }
    }
}

/// Scrapes the statically configured target.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<Response, ExporterError> {
    let request = state.exporter.static_request()?;
    let registry = state.exporter.scrape(&request).await;
    Ok(exposition(&registry, Some(gather_process_metrics())))
}

/// Scrapes the target named by the `target` query parameter.
pub async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScrapeParams>,
) -> Result<Response, ExporterError> {
    let request = state.exporter.dynamic_request(&params).inspect_err(|e| {
        warn!("Rejected scrape request: {}", e);
    })?;
    let registry = state.exporter.scrape(&request).await;
    Ok(exposition(&registry, None))
}

/// Lists the cluster nodes, one address per line. When discovery fails the
/// body explains why; the status stays 200.
pub async fn discover_handler(State(state): State<Arc<AppState>>) -> String {
    match state.exporter.discover_cluster_nodes().await {
        Ok(nodes) => {
            let mut body = nodes.join("\n");
            body.push('\n');
            body
        }
        Err(e @ TopologyError::NotCluster) => e.to_string(),
        Err(e) => {
            warn!("Cluster discovery failed: {}", e);
            e.to_string()
        }
    }
}

/// Re-reads the credentials file.
pub async fn reload_handler(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    match state.exporter.credentials().reload() {
        Ok(count) => {
            info!("Reloaded credentials file ({} entries)", count);
            (StatusCode::OK, "ok".to_string())
        }
        Err(e) => {
            error!("Credentials reload failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Redis Exporter v{version}</title></head>\n<body>\n\
         <h1>Redis Exporter v{version}</h1>\n\
         <p><a href='{path}'>Metrics</a></p>\n\
         </body>\n</html>\n",
        version = env!("CARGO_PKG_VERSION"),
        path = state.metrics_path,
    ))
}
