// src/core/scrape/mod.rs

//! The scrape dispatcher.
//!
//! [`Exporter`] turns an HTTP request into a [`ScrapeRequest`], opens one
//! connection for it, runs the extraction routines against a registry owned
//! by that request and always finishes with the `up` sample. The only state
//! shared between concurrent scrapes is the credential store and the
//! process-wide scrape counter.

pub mod request;

pub use request::{CheckLists, ScrapeParams, ScrapeRequest};

use crate::config::Config;
use crate::core::ExporterError;
use crate::core::client::{ConnectOptions, Connection, Credentials, RespClient, TargetAddress};
use crate::core::credentials::CredentialStore;
use crate::core::discovery::{self, TopologyError};
use crate::core::extract::{self, scripts::LuaScript};
use crate::core::metrics::{RequestRegistry, SCRAPES_TOTAL};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CLIENT_NAME: &str = "redis_exporter";

/// The exporter-wide settings every scrape starts from.
#[derive(Debug, Clone)]
pub struct ExporterOptions {
    pub namespace: String,
    /// Target of the static endpoint; `None` disables it.
    pub target: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub connect: ConnectOptions,
    pub scrape_timeout: Duration,
    pub checks: CheckLists,
    pub batch_size: usize,
    /// Number of slow log entries to export individually, if any.
    pub slowlog_history: Option<usize>,
    pub scripts: Vec<LuaScript>,
    pub is_cluster: bool,
    pub cluster_seed_nodes: Vec<String>,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            namespace: "redis".to_string(),
            target: None,
            user: None,
            password: None,
            connect: ConnectOptions::default(),
            scrape_timeout: Duration::from_secs(15),
            checks: CheckLists::default(),
            batch_size: 1000,
            slowlog_history: Some(10),
            scripts: Vec::new(),
            is_cluster: false,
            cluster_seed_nodes: Vec::new(),
        }
    }
}

impl ExporterOptions {
    /// Builds the options from a validated config, loading the Lua scripts.
    pub fn from_config(config: &Config) -> Result<Self, ExporterError> {
        let checks = CheckLists::parse(
            &config.check_keys,
            &config.check_single_keys,
            &config.count_keys,
            &config.check_streams,
            &config.check_single_streams,
        )?;
        let scripts = config
            .scripts
            .iter()
            .map(|path| LuaScript::load(Path::new(path)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            namespace: config.namespace.clone(),
            target: Some(config.target.clone()).filter(|t| !t.is_empty()),
            user: config.user.clone(),
            password: config.password.clone(),
            connect: ConnectOptions {
                connect_timeout: config.connection_timeout,
                read_timeout: config.connection_timeout,
                client_name: config.set_client_name.then(|| CLIENT_NAME.to_string()),
                skip_tls_verification: config.skip_tls_verification,
            },
            scrape_timeout: config.scrape_timeout,
            checks,
            batch_size: config.check_keys_batch_size,
            slowlog_history: config
                .slowlog_history
                .then_some(config.slowlog_history_length),
            scripts,
            is_cluster: config.is_cluster,
            cluster_seed_nodes: config.cluster_seed_nodes.clone(),
        })
    }
}

/// The scrape engine shared by all HTTP handlers.
#[derive(Debug)]
pub struct Exporter {
    options: ExporterOptions,
    credentials: Arc<CredentialStore>,
}

impl Exporter {
    pub fn new(options: ExporterOptions, credentials: Arc<CredentialStore>) -> Self {
        Self {
            options,
            credentials,
        }
    }

    pub fn options(&self) -> &ExporterOptions {
        &self.options
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// The request for the statically configured target.
    pub fn static_request(&self) -> Result<ScrapeRequest, ExporterError> {
        let target = self.options.target.as_deref().ok_or_else(|| {
            ExporterError::InvalidRequest("no static target configured, use /scrape".to_string())
        })?;
        self.build_request(target, self.options.checks.clone())
    }

    /// The request for the multi-target endpoint. Check lists given as
    /// parameters replace the configured ones.
    pub fn dynamic_request(&self, params: &ScrapeParams) -> Result<ScrapeRequest, ExporterError> {
        let target = params
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ExporterError::InvalidRequest("'target' parameter must be specified".to_string())
            })?;

        let defaults = &self.options.checks;
        let pick = |param: &Option<String>, default: &[extract::KeyPattern]| match param
            .as_deref()
            .filter(|p| !p.is_empty())
        {
            Some(p) => extract::KeyPattern::parse_list(p),
            None => Ok(default.to_vec()),
        };
        let checks = CheckLists {
            check_keys: pick(&params.check_keys, &defaults.check_keys)?,
            check_single_keys: pick(&params.check_single_keys, &defaults.check_single_keys)?,
            count_keys: pick(&params.count_keys, &defaults.count_keys)?,
            check_streams: pick(&params.check_streams, &defaults.check_streams)?,
            check_single_streams: pick(
                &params.check_single_streams,
                &defaults.check_single_streams,
            )?,
        };

        self.build_request(target, checks)
    }

    fn build_request(
        &self,
        target: &str,
        checks: CheckLists,
    ) -> Result<ScrapeRequest, ExporterError> {
        let target = TargetAddress::parse(target)?;
        Ok(ScrapeRequest {
            password: target.password.clone(),
            username: target.username.clone(),
            target,
            checks,
            batch_size: self.options.batch_size,
            timeout: self.options.scrape_timeout,
        })
    }

    /// Resolves the credentials for a target: the request's own password,
    /// then the credential store, then the configured password.
    pub fn credentials_for(&self, target: &TargetAddress, explicit: Option<&str>) -> Credentials {
        let password = explicit
            .map(str::to_string)
            .or_else(|| self.credentials.lookup(target))
            .or_else(|| self.options.password.clone());
        Credentials {
            username: target.username.clone().or_else(|| self.options.user.clone()),
            password,
        }
    }

    /// Runs one scrape to completion and returns its registry.
    ///
    /// This never fails: connection and timeout errors are reported through
    /// `up` and `exporter_last_scrape_error`.
    pub async fn scrape(&self, request: &ScrapeRequest) -> RequestRegistry {
        SCRAPES_TOTAL.inc();
        let started = Instant::now();
        let mut registry = RequestRegistry::new(&self.options.namespace);
        let mut connect_time = None;

        let outcome = tokio::time::timeout(
            request.timeout,
            self.run_scrape(request, &mut registry, &mut connect_time),
        )
        .await;
        let outcome = outcome.unwrap_or(Err(ExporterError::Timeout));

        let elapsed = started.elapsed();
        match &outcome {
            Ok(()) => debug!("Scraped {} in {:?}", request.target, elapsed),
            Err(e) => warn!("Scrape of {} failed after {:?}: {}", request.target, elapsed, e),
        }

        registry.gauge(
            "exporter_last_scrape_duration_seconds",
            "",
            &[],
            elapsed.as_secs_f64(),
        );
        if let Some(connect_time) = connect_time {
            registry.gauge(
                "exporter_last_scrape_connect_time_seconds",
                "",
                &[],
                connect_time.as_secs_f64(),
            );
        }
        let (err, failed) = match &outcome {
            Ok(()) => ("", 0.0),
            Err(e) => (e.category(), 1.0),
        };
        registry.gauge(
            "exporter_last_scrape_error",
            "The last scrape error status.",
            &[("err", err)],
            failed,
        );
        registry.counter(
            "exporter_scrapes_total",
            "Current total redis scrapes.",
            &[],
            SCRAPES_TOTAL.get() as f64,
        );
        registry.gauge(
            "up",
            "Information about the Redis instance",
            &[],
            if outcome.is_ok() { 1.0 } else { 0.0 },
        );
        registry
    }

    async fn run_scrape(
        &self,
        request: &ScrapeRequest,
        registry: &mut RequestRegistry,
        connect_time: &mut Option<Duration>,
    ) -> Result<(), ExporterError> {
        let credentials = self.credentials_for(&request.target, request.password.as_deref());
        let started = Instant::now();
        let mut client =
            RespClient::connect(&request.target, &credentials, &self.options.connect).await?;
        *connect_time = Some(started.elapsed());

        self.extract_all(&mut client, request, registry).await
    }

    /// Runs every routine against `conn`. A routine that fails on its own is
    /// logged and skipped; one that loses the connection fails the scrape.
    async fn extract_all(
        &self,
        conn: &mut dyn Connection,
        request: &ScrapeRequest,
        registry: &mut RequestRegistry,
    ) -> Result<(), ExporterError> {
        let target = &request.target;

        let mut scratch = registry.scratch();
        let result = extract::config::extract_config(conn, &mut scratch).await;
        let databases = commit(conn, registry, scratch, result, "config", target)?.flatten();

        match extract::info::fetch_info(conn).await {
            Ok(info) => {
                let db_count = if extract::info::cluster_enabled(&info) {
                    let mut scratch = registry.scratch();
                    let result = extract::cluster::extract_cluster_info(conn, &mut scratch).await;
                    commit(conn, registry, scratch, result, "cluster info", target)?;
                    // Cluster mode only has db0.
                    1
                } else {
                    databases.filter(|n| *n > 0).unwrap_or(16)
                };
                extract::info::extract_info_metrics(registry, &info, db_count);
            }
            Err(e) if is_fatal(conn, &e) => return Err(e),
            Err(e) => warn!("Routine 'info' failed for {}: {}", target, e),
        }

        let mut scratch = registry.scratch();
        let result = extract::latency::extract_latency(conn, &mut scratch).await;
        commit(conn, registry, scratch, result, "latency", target)?;

        let mut scratch = registry.scratch();
        let result = extract::slowlog::extract_slowlog(conn, &mut scratch).await;
        commit(conn, registry, scratch, result, "slowlog", target)?;

        if let Some(count) = self.options.slowlog_history {
            let mut scratch = registry.scratch();
            let result =
                extract::slowlog::extract_slowlog_history(conn, &mut scratch, count).await;
            commit(conn, registry, scratch, result, "slowlog history", target)?;
        }

        if !self.options.scripts.is_empty() {
            let mut scratch = registry.scratch();
            let result =
                extract::scripts::extract_scripts(conn, &mut scratch, &self.options.scripts).await;
            commit(conn, registry, scratch, result, "scripts", target)?;
        }

        let checks = &request.checks;
        if checks.has_key_checks() {
            let mut scratch = registry.scratch();
            let result = extract::keys::extract_check_keys(
                conn,
                &mut scratch,
                &checks.check_keys,
                &checks.check_single_keys,
                request.batch_size,
            )
            .await;
            commit(conn, registry, scratch, result, "check keys", target)?;
        }

        if !checks.count_keys.is_empty() {
            let mut scratch = registry.scratch();
            let result = extract::keys::extract_count_keys(
                conn,
                &mut scratch,
                &checks.count_keys,
                request.batch_size,
            )
            .await;
            commit(conn, registry, scratch, result, "count keys", target)?;
        }

        if checks.has_stream_checks() {
            let mut scratch = registry.scratch();
            let result = extract::streams::extract_streams(
                conn,
                &mut scratch,
                &checks.check_streams,
                &checks.check_single_streams,
                request.batch_size,
            )
            .await;
            commit(conn, registry, scratch, result, "streams", target)?;
        }

        if conn.is_broken() {
            return Err(std::io::Error::from(std::io::ErrorKind::ConnectionAborted).into());
        }
        Ok(())
    }

    /// Discovers the cluster nodes reachable from the configured target and
    /// seed nodes.
    pub async fn discover_cluster_nodes(&self) -> Result<Vec<String>, TopologyError> {
        if !self.options.is_cluster {
            return Err(TopologyError::NotCluster);
        }

        let mut seeds = Vec::new();
        for raw in self
            .options
            .target
            .iter()
            .chain(self.options.cluster_seed_nodes.iter())
        {
            match TargetAddress::parse(raw) {
                Ok(addr) => {
                    let credentials = self.credentials_for(&addr, addr.password.as_deref());
                    seeds.push((addr, credentials));
                }
                Err(e) => warn!("Skipping cluster seed '{}': {}", raw, e),
            }
        }

        let nodes = discovery::discover_cluster_nodes(&seeds, &self.options.connect).await?;
        info!("Discovered {} cluster nodes", nodes.len());
        Ok(nodes)
    }
}

/// Merges a routine's samples on success; logs and drops them on failure.
/// Errors that leave the connection unusable are returned instead.
fn commit<T>(
    conn: &dyn Connection,
    registry: &mut RequestRegistry,
    scratch: RequestRegistry,
    result: Result<T, ExporterError>,
    routine: &str,
    target: &TargetAddress,
) -> Result<Option<T>, ExporterError> {
    match result {
        Ok(value) => {
            registry.absorb(scratch);
            Ok(Some(value))
        }
        Err(e) if is_fatal(conn, &e) => Err(e),
        Err(e) => {
            warn!("Routine '{}' failed for {}: {}", routine, target, e);
            Ok(None)
        }
    }
}

fn is_fatal(conn: &dyn Connection, err: &ExporterError) -> bool {
    err.is_connection_error() || conn.is_broken()
}
