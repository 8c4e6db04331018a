// src/core/extract/info.rs

//! `INFO ALL` extraction.
//!
//! INFO is a text reply of `# Section` headers and `field:value` lines. Known
//! fields are renamed through two fixed tables; a few sections (Server,
//! Replication, Commandstats, Keyspace) get dedicated handling.

use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::{MetricKind, RequestRegistry};
use crate::core::metrics::registry::sanitize_name;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

lazy_static! {
    static ref GAUGE_METRICS: HashMap<&'static str, &'static str> = HashMap::from([
        // # Server
        ("uptime_in_seconds", "uptime_in_seconds"),
        // # Clients
        ("connected_clients", "connected_clients"),
        ("blocked_clients", "blocked_clients"),
        ("tracking_clients", "tracking_clients"),
        ("client_longest_output_list", "client_longest_output_list"),
        ("client_biggest_input_buf", "client_biggest_input_buf"),
        ("client_recent_max_output_buffer", "client_recent_max_output_buffer_bytes"),
        ("client_recent_max_input_buffer", "client_recent_max_input_buffer_bytes"),
        // # Memory
        ("allocator_active", "allocator_active_bytes"),
        ("allocator_allocated", "allocator_allocated_bytes"),
        ("allocator_resident", "allocator_resident_bytes"),
        ("allocator_frag_ratio", "allocator_frag_ratio"),
        ("allocator_frag_bytes", "allocator_frag_bytes"),
        ("allocator_rss_ratio", "allocator_rss_ratio"),
        ("allocator_rss_bytes", "allocator_rss_bytes"),
        ("used_memory", "memory_used_bytes"),
        ("used_memory_rss", "memory_used_rss_bytes"),
        ("used_memory_peak", "memory_used_peak_bytes"),
        ("used_memory_lua", "memory_used_lua_bytes"),
        ("used_memory_overhead", "memory_used_overhead_bytes"),
        ("used_memory_startup", "memory_used_startup_bytes"),
        ("used_memory_dataset", "memory_used_dataset_bytes"),
        ("used_memory_scripts", "memory_used_scripts_bytes"),
        ("maxmemory", "memory_max_bytes"),
        ("mem_fragmentation_ratio", "mem_fragmentation_ratio"),
        ("mem_fragmentation_bytes", "mem_fragmentation_bytes"),
        ("mem_clients_slaves", "mem_clients_slaves"),
        ("mem_clients_normal", "mem_clients_normal"),
        ("mem_not_counted_for_evict", "mem_not_counted_for_eviction_bytes"),
        ("lazyfree_pending_objects", "lazyfree_pending_objects"),
        ("active_defrag_running", "active_defrag_running"),
        ("migrate_cached_sockets", "migrate_cached_sockets_total"),
        ("active_defrag_hits", "defrag_hits"),
        ("active_defrag_misses", "defrag_misses"),
        ("active_defrag_key_hits", "defrag_key_hits"),
        ("active_defrag_key_misses", "defrag_key_misses"),
        ("expired_time_cap_reached_count", "expired_time_cap_reached_total"),
        // # Persistence
        ("loading", "loading_dump_file"),
        ("rdb_changes_since_last_save", "rdb_changes_since_last_save"),
        ("rdb_bgsave_in_progress", "rdb_bgsave_in_progress"),
        ("rdb_last_save_time", "rdb_last_save_timestamp_seconds"),
        ("rdb_last_bgsave_status", "rdb_last_bgsave_status"),
        ("rdb_last_bgsave_time_sec", "rdb_last_bgsave_duration_sec"),
        ("rdb_current_bgsave_time_sec", "rdb_current_bgsave_duration_sec"),
        ("rdb_last_cow_size", "rdb_last_cow_size_bytes"),
        ("aof_enabled", "aof_enabled"),
        ("aof_rewrite_in_progress", "aof_rewrite_in_progress"),
        ("aof_rewrite_scheduled", "aof_rewrite_scheduled"),
        ("aof_last_rewrite_time_sec", "aof_last_rewrite_duration_sec"),
        ("aof_current_rewrite_time_sec", "aof_current_rewrite_duration_sec"),
        ("aof_last_cow_size", "aof_last_cow_size_bytes"),
        ("aof_current_size", "aof_current_size_bytes"),
        ("aof_base_size", "aof_base_size_bytes"),
        ("aof_pending_rewrite", "aof_pending_rewrite"),
        ("aof_buffer_length", "aof_buffer_length"),
        ("aof_rewrite_buffer_length", "aof_rewrite_buffer_length"),
        ("aof_pending_bio_fsync", "aof_pending_bio_fsync"),
        ("aof_delayed_fsync", "aof_delayed_fsync"),
        ("aof_last_bgrewrite_status", "aof_last_bgrewrite_status"),
        ("aof_last_write_status", "aof_last_write_status"),
        ("module_fork_in_progress", "module_fork_in_progress"),
        ("module_fork_last_cow_size", "module_fork_last_cow_size"),
        // # Stats
        ("pubsub_channels", "pubsub_channels"),
        ("pubsub_patterns", "pubsub_patterns"),
        ("instantaneous_ops_per_sec", "instantaneous_ops"),
        // # Replication
        ("connected_slaves", "connected_slaves"),
        ("repl_backlog_size", "replication_backlog_bytes"),
        ("repl_backlog_active", "repl_backlog_is_active"),
        ("repl_backlog_first_byte_offset", "repl_backlog_first_byte_offset"),
        ("repl_backlog_histlen", "repl_backlog_history_bytes"),
        ("master_repl_offset", "master_repl_offset"),
        ("second_repl_offset", "second_repl_offset"),
        ("slave_expires_tracked_keys", "slave_expires_tracked_keys"),
        ("slave_priority", "slave_priority"),
        ("sync_full", "replica_resyncs_full"),
        ("sync_partial_ok", "replica_partial_resync_accepted"),
        ("sync_partial_err", "replica_partial_resync_denied"),
        // KeyDB
        ("server_threads", "server_threads_total"),
        ("long_lock_waits", "long_lock_waits_total"),
        ("current_client_thread", "current_client_thread"),
    ]);

    static ref COUNTER_METRICS: HashMap<&'static str, &'static str> = HashMap::from([
        ("total_connections_received", "connections_received_total"),
        ("total_commands_processed", "commands_processed_total"),
        ("rejected_connections", "rejected_connections_total"),
        ("total_net_input_bytes", "net_input_bytes_total"),
        ("total_net_output_bytes", "net_output_bytes_total"),
        ("expired_keys", "expired_keys_total"),
        ("evicted_keys", "evicted_keys_total"),
        ("keyspace_hits", "keyspace_hits_total"),
        ("keyspace_misses", "keyspace_misses_total"),
        ("used_cpu_sys", "cpu_sys_seconds_total"),
        ("used_cpu_user", "cpu_user_seconds_total"),
        ("used_cpu_sys_children", "cpu_sys_children_seconds_total"),
        ("used_cpu_user_children", "cpu_user_children_seconds_total"),
        ("cluster_stats_messages_sent", "cluster_messages_sent_total"),
        ("cluster_stats_messages_received", "cluster_messages_received_total"),
        ("total_error_replies", "total_error_replies"),
    ]);
}

const INSTANCE_INFO_FIELDS: [&str; 9] = [
    "role",
    "redis_version",
    "redis_build_id",
    "redis_mode",
    "os",
    "maxmemory_policy",
    "tcp_port",
    "run_id",
    "process_id",
];

const SLAVE_INFO_FIELDS: [&str; 3] = ["master_host", "master_port", "slave_read_only"];

/// Fetches the `INFO ALL` text.
pub async fn fetch_info(conn: &mut dyn Connection) -> Result<String, ExporterError> {
    conn.query(&["INFO", "ALL"]).await?.as_string()
}

/// Returns true when the INFO text reports cluster mode.
pub fn cluster_enabled(info: &str) -> bool {
    info.lines().any(|line| line.trim() == "cluster_enabled:1")
}

/// Extracts all INFO metrics. `db_count` databases are zero-filled in
/// `db_keys` and `db_keys_expiring` when the Keyspace section omits them.
pub fn extract_info_metrics(registry: &mut RequestRegistry, info: &str, db_count: u32) {
    let mut section = String::new();
    let mut handled_dbs = HashSet::new();
    let mut instance_info: IndexMap<&str, String> =
        INSTANCE_INFO_FIELDS.iter().map(|f| (*f, String::new())).collect();
    let mut slave_info: IndexMap<&str, String> =
        SLAVE_INFO_FIELDS.iter().map(|f| (*f, String::new())).collect();

    for line in info.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix("# ") {
            section = name.to_string();
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        if let Some(slot) = instance_info.get_mut(key) {
            *slot = value.to_string();
            continue;
        }
        if let Some(slot) = slave_info.get_mut(key) {
            *slot = value.to_string();
            continue;
        }

        match section.as_str() {
            "Server" if key == "uptime_in_seconds" => {
                if let Ok(uptime) = value.parse::<f64>() {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_or(0.0, |d| d.as_secs_f64());
                    registry.gauge(
                        "start_time_seconds",
                        "Start time of the Redis instance since unix epoch in seconds.",
                        &[],
                        (now - uptime).floor(),
                    );
                }
            }
            "Replication" => {
                let master = (slave_info["master_host"].clone(), slave_info["master_port"].clone());
                if record_replication(registry, &master, key, value) {
                    continue;
                }
            }
            "Commandstats" => {
                record_command_stats(registry, key, value);
                continue;
            }
            "Keyspace" => {
                if record_keyspace(registry, key, value) {
                    handled_dbs.insert(key.to_string());
                    continue;
                }
            }
            _ => {}
        }

        record_field(registry, key, value);
    }

    for db in 0..db_count {
        let name = format!("db{db}");
        if !handled_dbs.contains(&name) {
            registry.gauge("db_keys", "Total number of keys by DB", &[("db", name.as_str())], 0.0);
            registry.gauge(
                "db_keys_expiring",
                "Total number of expiring keys by DB",
                &[("db", name.as_str())],
                0.0,
            );
        }
    }

    let labels: Vec<(&str, &str)> = instance_info
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    registry.gauge("instance_info", "Information about the Redis instance", &labels, 1.0);

    if instance_info["role"] == "slave" {
        let labels: Vec<(&str, &str)> =
            slave_info.iter().map(|(k, v)| (*k, v.as_str())).collect();
        registry.gauge("slave_info", "Information about the Redis slave", &labels, 1.0);
    }
}

/// Records one generic `field:value` pair if the field is known. Returns
/// false when the field was not exported.
pub(crate) fn record_field(registry: &mut RequestRegistry, key: &str, value: &str) -> bool {
    let (name, kind) = if let Some(name) = GAUGE_METRICS.get(key) {
        (name.to_string(), MetricKind::Gauge)
    } else if let Some(name) = COUNTER_METRICS.get(key) {
        (name.to_string(), MetricKind::Counter)
    } else if key == "latest_fork_usec" {
        match value.parse::<f64>() {
            Ok(us) => registry.gauge("latest_fork_seconds", "", &[], us / 1e6),
            Err(_) => return false,
        }
        return true;
    } else if key.starts_with("cluster_") || key.starts_with("db") {
        (sanitize_name(key), MetricKind::Gauge)
    } else {
        return false;
    };

    let Some(value) = parse_info_value(value) else {
        return false;
    };
    match kind {
        MetricKind::Gauge => registry.gauge(&name, "", &[], value),
        MetricKind::Counter => registry.counter(&name, "", &[], value),
    }
    true
}

fn parse_info_value(value: &str) -> Option<f64> {
    match value {
        "ok" | "true" | "up" => Some(1.0),
        "err" | "fail" | "false" | "down" => Some(0.0),
        _ => value.parse::<f64>().ok().filter(|v| !v.is_nan()),
    }
}

fn record_replication(
    registry: &mut RequestRegistry,
    (master_host, master_port): &(String, String),
    key: &str,
    value: &str,
) -> bool {
    let master_labels = [("master_host", master_host.as_str()), ("master_port", master_port.as_str())];

    match key {
        "master_link_status" => {
            let up = if value == "up" { 1.0 } else { 0.0 };
            registry.gauge("master_link_up", "", &master_labels, up);
            return true;
        }
        "master_last_io_seconds_ago" | "slave_repl_offset" | "master_sync_in_progress" => {
            if let Ok(v) = value.parse::<f64>() {
                registry.gauge(key, "", &master_labels, v);
            }
            return true;
        }
        _ => {}
    }

    let Some(slave) = parse_connected_slave(key, value) else {
        return false;
    };
    let labels = [
        ("slave_ip", slave.ip),
        ("slave_port", slave.port),
        ("slave_state", slave.state),
    ];
    registry.gauge(
        "connected_slave_offset_bytes",
        "Offset of connected slave",
        &labels,
        slave.offset,
    );
    if let Some(lag) = slave.lag {
        registry.gauge(
            "connected_slave_lag_seconds",
            "Lag of connected slave",
            &labels,
            lag,
        );
    }
    true
}

struct ConnectedSlave<'a> {
    ip: &'a str,
    port: &'a str,
    state: &'a str,
    offset: f64,
    lag: Option<f64>,
}

/// `slave0:ip=10.254.11.1,port=6379,state=online,offset=1751844676,lag=0`
fn parse_connected_slave<'a>(key: &str, value: &'a str) -> Option<ConnectedSlave<'a>> {
    let index = key.strip_prefix("slave")?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut fields = HashMap::new();
    for part in value.split(',') {
        let (k, v) = part.split_once('=')?;
        fields.insert(k, v);
    }

    Some(ConnectedSlave {
        ip: fields.get("ip").copied().unwrap_or_default(),
        port: fields.get("port").copied().unwrap_or_default(),
        state: fields.get("state").copied().unwrap_or_default(),
        offset: fields.get("offset")?.parse().ok()?,
        lag: fields.get("lag").and_then(|l| l.parse().ok()),
    })
}

/// `cmdstat_get:calls=21,usec=175,usec_per_call=8.33,rejected_calls=0,failed_calls=0`
fn record_command_stats(registry: &mut RequestRegistry, key: &str, value: &str) {
    let Some(cmd) = key.strip_prefix("cmdstat_") else {
        return;
    };
    let fields: HashMap<&str, f64> = value
        .split(',')
        .filter_map(|part| part.split_once('='))
        .filter_map(|(k, v)| v.parse::<f64>().ok().map(|v| (k, v)))
        .collect();
    let (Some(calls), Some(usec)) = (fields.get("calls"), fields.get("usec")) else {
        return;
    };

    let labels = [("cmd", cmd)];
    registry.counter(
        "commands_total",
        "Total number of calls per command",
        &labels,
        *calls,
    );
    registry.counter(
        "commands_duration_seconds_total",
        "Total amount of time in seconds spent per command",
        &labels,
        usec / 1e6,
    );
    if let Some(rejected) = fields.get("rejected_calls") {
        registry.counter(
            "commands_rejected_calls_total",
            "Total number of errors prior command execution per command",
            &labels,
            *rejected,
        );
    }
    if let Some(failed) = fields.get("failed_calls") {
        registry.counter(
            "commands_failed_calls_total",
            "Total number of errors within command execution per command",
            &labels,
            *failed,
        );
    }
}

/// `db0:keys=1,expires=0,avg_ttl=0`; `avg_ttl` is in milliseconds.
fn record_keyspace(registry: &mut RequestRegistry, key: &str, value: &str) -> bool {
    if !key.starts_with("db") {
        return false;
    }
    let fields: HashMap<&str, f64> = value
        .split(',')
        .filter_map(|part| part.split_once('='))
        .filter_map(|(k, v)| v.parse::<f64>().ok().map(|v| (k, v)))
        .collect();
    let (Some(keys), Some(expires)) = (fields.get("keys"), fields.get("expires")) else {
        return false;
    };

    let labels = [("db", key)];
    registry.gauge("db_keys", "Total number of keys by DB", &labels, *keys);
    registry.gauge(
        "db_keys_expiring",
        "Total number of expiring keys by DB",
        &labels,
        *expires,
    );
    if let Some(avg_ttl) = fields.get("avg_ttl").filter(|ttl| **ttl > -1.0) {
        registry.gauge("db_avg_ttl_seconds", "Avg TTL in seconds", &labels, avg_ttl / 1000.0);
    }
    true
}
