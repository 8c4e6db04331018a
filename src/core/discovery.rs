// src/core/discovery.rs

//! Cluster node discovery from a list of seed nodes.

use crate::core::ExporterError;
use crate::core::client::{ConnectOptions, Connection, Credentials, RespClient, TargetAddress};
use crate::core::protocol::ReplyValue;
use indexmap::IndexSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Why discovery did not produce a node list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A seed answered but is not running in cluster mode.
    #[error("The discovery endpoint is only available on a redis cluster")]
    NotCluster,

    /// No seed could be reached or queried.
    #[error("Couldn't connect to redis cluster: {0}")]
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Master,
    Replica,
}

/// One line of `CLUSTER NODES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    /// `scheme://host:port`
    pub address: String,
    pub role: NodeRole,
    /// Slot ranges as reported, e.g. `0-5460`.
    pub slots: Vec<String>,
}

/// Parses a `CLUSTER NODES` reply.
///
/// Nodes without an address (`noaddr`) or still in `handshake` are skipped.
/// The `myself` entry may report an empty host, which is replaced with the
/// host of the seed that was queried.
pub fn parse_cluster_nodes(text: &str, seed: &TargetAddress) -> Vec<ClusterNode> {
    let mut nodes = Vec::new();

    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            continue;
        }
        let flags: Vec<&str> = fields[2].split(',').collect();
        if flags.iter().any(|f| *f == "noaddr" || *f == "handshake") {
            continue;
        }

        // ip:port@cport[,hostname]
        let addr = fields[1].split([',', '@']).next().unwrap_or_default();
        let Some((host, port)) = addr.rsplit_once(':') else {
            continue;
        };
        if port.parse::<u16>().is_err() {
            continue;
        }
        let host = match host {
            "" => seed.host.clone(),
            h if h.contains(':') && !h.starts_with('[') => format!("[{h}]"),
            h => h.to_string(),
        };

        nodes.push(ClusterNode {
            address: format!("{}://{}:{}", seed.scheme.as_str(), host, port),
            role: if flags.contains(&"slave") {
                NodeRole::Replica
            } else {
                NodeRole::Master
            },
            slots: fields[8..].iter().map(|s| s.to_string()).collect(),
        });
    }

    nodes
}

async fn query_seed(
    seed: &TargetAddress,
    credentials: &Credentials,
    options: &ConnectOptions,
) -> Result<Result<Vec<ClusterNode>, TopologyError>, ExporterError> {
    let mut conn = RespClient::connect(seed, credentials, options).await?;
    match conn.execute(&["CLUSTER", "NODES"]).await? {
        ReplyValue::ProtocolError(msg) => {
            debug!("CLUSTER NODES on {} failed: {}", seed, msg);
            Ok(Err(TopologyError::NotCluster))
        }
        reply => Ok(Ok(parse_cluster_nodes(&reply.as_string()?, seed))),
    }
}

/// Asks each seed in turn for the cluster topology and returns the
/// deduplicated node addresses from the first one that answers.
///
/// A seed that answers with an error reply (cluster support disabled) counts
/// as "not a cluster"; a seed that cannot be reached is skipped. `NotCluster`
/// is reported only when no seed succeeded and at least one was reachable.
pub async fn discover_cluster_nodes(
    seeds: &[(TargetAddress, Credentials)],
    options: &ConnectOptions,
) -> Result<Vec<String>, TopologyError> {
    let mut failures = Vec::new();
    let mut reachable_non_cluster = false;

    for (seed, credentials) in seeds {
        match query_seed(seed, credentials, options).await {
            Ok(Ok(nodes)) if !nodes.is_empty() => {
                let addresses: IndexSet<String> = nodes.into_iter().map(|n| n.address).collect();
                return Ok(addresses.into_iter().collect());
            }
            Ok(Ok(_)) => failures.push(format!("{seed}: empty topology")),
            Ok(Err(_)) => reachable_non_cluster = true,
            Err(e) => {
                warn!("Cluster discovery via {} failed: {}", seed, e);
                failures.push(format!("{seed}: {e}"));
            }
        }
    }

    if reachable_non_cluster {
        Err(TopologyError::NotCluster)
    } else if failures.is_empty() {
        Err(TopologyError::Unreachable("no seed nodes configured".to_string()))
    } else {
        Err(TopologyError::Unreachable(format!(
            "cluster refresh failed: all nodes failed: {}",
            failures.join("; ")
        )))
    }
}
