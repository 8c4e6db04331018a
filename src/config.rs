// src/config.rs

//! Manages exporter configuration: loading, defaults and validation.

use crate::core::client::TargetAddress;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

/// Paths served by the exporter itself; `metrics_path` must not shadow them.
const RESERVED_PATHS: [&str; 5] = ["/", "/scrape", "/health", "/-/reload", "/discover-cluster-nodes"];

/// Represents the validated exporter configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Path of the static-target endpoint.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    /// Prefix of every exported metric name.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// The static target scraped by `metrics_path`. Empty disables that endpoint.
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// JSON file mapping target addresses to passwords, reloadable at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(with = "humantime_serde", default = "default_scrape_timeout")]
    pub scrape_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_connection_timeout")]
    pub connection_timeout: Duration,

    #[serde(default)]
    pub check_keys: String,
    #[serde(default)]
    pub check_single_keys: String,
    #[serde(default)]
    pub count_keys: String,
    #[serde(default)]
    pub check_streams: String,
    #[serde(default)]
    pub check_single_streams: String,
    /// `COUNT` hint passed to `SCAN` for the pattern based checks.
    #[serde(default = "default_check_keys_batch_size")]
    pub check_keys_batch_size: usize,

    #[serde(default)]
    pub is_cluster: bool,
    /// Extra seeds tried after `target` by cluster discovery.
    #[serde(default)]
    pub cluster_seed_nodes: Vec<String>,

    #[serde(default)]
    pub basic_auth_username: String,
    #[serde(default)]
    pub basic_auth_password: String,
    #[serde(default = "default_basic_auth_realm")]
    pub basic_auth_realm: String,

    /// Lua script files run on every scrape.
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default = "default_true")]
    pub slowlog_history: bool,
    #[serde(default = "default_slowlog_history_length")]
    pub slowlog_history_length: usize,
    #[serde(default)]
    pub skip_tls_verification: bool,
    /// Sends `CLIENT SETNAME redis_exporter` after connecting.
    #[serde(default = "default_true")]
    pub set_client_name: bool,
}

fn default_listen_address() -> String {
    "0.0.0.0:9121".to_string()
}
fn default_metrics_path() -> String {
    "/metrics".to_string()
}
fn default_namespace() -> String {
    "redis".to_string()
}
fn default_target() -> String {
    "redis://localhost:6379".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_scrape_timeout() -> Duration {
    Duration::from_secs(15)
}
fn default_connection_timeout() -> Duration {
    Duration::from_secs(15)
}
fn default_check_keys_batch_size() -> usize {
    1000
}
fn default_basic_auth_realm() -> String {
    "redis-exporter".to_string()
}
fn default_slowlog_history_length() -> usize {
    10
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            metrics_path: default_metrics_path(),
            namespace: default_namespace(),
            target: default_target(),
            user: None,
            password: None,
            password_file: None,
            log_level: default_log_level(),
            scrape_timeout: default_scrape_timeout(),
            connection_timeout: default_connection_timeout(),
            check_keys: String::new(),
            check_single_keys: String::new(),
            count_keys: String::new(),
            check_streams: String::new(),
            check_single_streams: String::new(),
            check_keys_batch_size: default_check_keys_batch_size(),
            is_cluster: false,
            cluster_seed_nodes: Vec::new(),
            basic_auth_username: String::new(),
            basic_auth_password: String::new(),
            basic_auth_realm: default_basic_auth_realm(),
            scripts: Vec::new(),
            slowlog_history: true,
            slowlog_history_length: default_slowlog_history_length(),
            skip_tls_verification: false,
            set_client_name: true,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// True when both Basic auth fields are set. Setting only one of them
    /// leaves the endpoints open.
    pub fn basic_auth_enabled(&self) -> bool {
        !self.basic_auth_username.is_empty() && !self.basic_auth_password.is_empty()
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        self.listen_address
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("invalid listen_address '{}': {e}", self.listen_address))?;

        if !self.metrics_path.starts_with('/') {
            return Err(anyhow!("metrics_path must start with '/'"));
        }
        if RESERVED_PATHS.contains(&self.metrics_path.as_str()) {
            return Err(anyhow!(
                "metrics_path '{}' collides with a built-in endpoint",
                self.metrics_path
            ));
        }
        if !self
            .namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(anyhow!(
                "namespace '{}' may only contain [a-zA-Z0-9_]",
                self.namespace
            ));
        }
        if self.scrape_timeout.is_zero() {
            return Err(anyhow!("scrape_timeout cannot be 0"));
        }
        if self.connection_timeout.is_zero() {
            return Err(anyhow!("connection_timeout cannot be 0"));
        }
        if self.check_keys_batch_size == 0 {
            return Err(anyhow!("check_keys_batch_size cannot be 0"));
        }
        if self.slowlog_history && self.slowlog_history_length == 0 {
            return Err(anyhow!(
                "slowlog_history_length cannot be 0 when slowlog_history is enabled"
            ));
        }

        if !self.target.is_empty() {
            TargetAddress::parse(&self.target).map_err(|e| anyhow!("target: {e}"))?;
        }
        for seed in &self.cluster_seed_nodes {
            TargetAddress::parse(seed).map_err(|e| anyhow!("cluster_seed_nodes: {e}"))?;
        }
        if self.is_cluster && self.target.is_empty() && self.cluster_seed_nodes.is_empty() {
            return Err(anyhow!(
                "is_cluster requires a target or at least one cluster seed node"
            ));
        }

        if self.basic_auth_username.is_empty() != self.basic_auth_password.is_empty() {
            warn!(
                "Only one of basic_auth_username and basic_auth_password is set; Basic auth is disabled."
            );
        }
        Ok(())
    }
}
