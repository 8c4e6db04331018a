// tests/integration/fake_store.rs

//! A small in-process RESP server answering the commands the exporter sends.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use spinel_exporter::core::protocol::{RespFrame, RespFrameCodec};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use wildmatch::WildMatch;

#[derive(Debug, Clone)]
pub enum FakeValue {
    String(String),
    List(Vec<String>),
}

#[derive(Debug, Default)]
struct StoreData {
    password: Option<String>,
    dbs: HashMap<u32, HashMap<String, FakeValue>>,
    connected_clients: i64,
    cluster_nodes: Option<String>,
}

/// A fake store listening on an ephemeral port.
#[derive(Clone)]
pub struct FakeStore {
    pub addr: String,
    data: Arc<Mutex<StoreData>>,
}

impl FakeStore {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let data = Arc::new(Mutex::new(StoreData::default()));

        let shared = data.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_connection(socket, shared.clone()));
            }
        });

        Self { addr, data }
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    pub fn require_password(&self, password: &str) {
        self.data.lock().password = Some(password.to_string());
    }

    pub fn set(&self, db: u32, key: &str, value: FakeValue) {
        self.data
            .lock()
            .dbs
            .entry(db)
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn set_connected_clients(&self, n: i64) {
        self.data.lock().connected_clients = n;
    }

    /// Enables cluster mode with the given `CLUSTER NODES` text.
    pub fn enable_cluster(&self, nodes: &str) {
        self.data.lock().cluster_nodes = Some(nodes.to_string());
    }
}

fn ok() -> RespFrame {
    RespFrame::SimpleString("OK".into())
}

fn bulk(s: impl Into<String>) -> RespFrame {
    RespFrame::BulkString(Bytes::from(s.into()))
}

fn err(msg: &str) -> RespFrame {
    RespFrame::Error(msg.to_string())
}

async fn serve_connection(socket: TcpStream, data: Arc<Mutex<StoreData>>) {
    let mut framed = Framed::new(socket, RespFrameCodec);
    let mut authenticated = data.lock().password.is_none();
    let mut db = 0u32;

    while let Some(Ok(RespFrame::Array(parts))) = framed.next().await {
        let args: Vec<String> = parts
            .into_iter()
            .filter_map(|p| match p {
                RespFrame::BulkString(b) => Some(String::from_utf8_lossy(&b).into_owned()),
                _ => None,
            })
            .collect();
        let Some(command) = args.first().map(|c| c.to_uppercase()) else {
            continue;
        };

        let reply = if command == "AUTH" {
            let expected = data.lock().password.clone();
            match (expected, args.last()) {
                (Some(expected), Some(given)) if *given == expected => {
                    authenticated = true;
                    ok()
                }
                _ => err("WRONGPASS invalid username-password pair or user is disabled."),
            }
        } else if !authenticated {
            err("NOAUTH Authentication required.")
        } else if command == "SELECT" {
            match args.get(1).and_then(|s| s.parse().ok()) {
                Some(n) => {
                    db = n;
                    ok()
                }
                None => err("ERR invalid DB index"),
            }
        } else {
            respond(&command, &args, db, &data.lock())
        };

        if framed.send(reply).await.is_err() {
            break;
        }
    }
}

fn respond(command: &str, args: &[String], db: u32, data: &StoreData) -> RespFrame {
    let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or_default();
    let keys = data.dbs.get(&db);
    let lookup = |key: &str| keys.and_then(|k| k.get(key));

    match (command, arg(1).to_uppercase().as_str()) {
        ("CLIENT", "SETNAME") => ok(),
        ("CONFIG", "GET") => RespFrame::Array(vec![
            bulk("databases"),
            bulk("16"),
            bulk("maxclients"),
            bulk("10000"),
            bulk("maxmemory"),
            bulk("0"),
        ]),
        ("INFO", _) => bulk(info_text(data)),
        ("CLUSTER", "INFO") if data.cluster_nodes.is_some() => {
            bulk("cluster_state:ok\r\ncluster_slots_assigned:16384\r\ncluster_known_nodes:3\r\n")
        }
        ("CLUSTER", "NODES") => match &data.cluster_nodes {
            Some(nodes) => bulk(nodes.clone()),
            None => err("ERR This instance has cluster support disabled"),
        },
        ("CLUSTER", _) => err("ERR This instance has cluster support disabled"),
        ("LATENCY", "LATEST") => RespFrame::Array(vec![]),
        ("SLOWLOG", "LEN") => RespFrame::Integer(0),
        ("SLOWLOG", "GET") => RespFrame::Array(vec![]),
        ("SCAN", _) => {
            let pattern = WildMatch::new(arg(3));
            let matched = keys
                .map(|k| {
                    let mut names: Vec<&String> =
                        k.keys().filter(|name| pattern.matches(name)).collect();
                    names.sort();
                    names.into_iter().map(|n| bulk(n.clone())).collect()
                })
                .unwrap_or_default();
            RespFrame::Array(vec![bulk("0"), RespFrame::Array(matched)])
        }
        ("TYPE", _) => RespFrame::SimpleString(
            match lookup(arg(1)) {
                Some(FakeValue::String(_)) => "string",
                Some(FakeValue::List(_)) => "list",
                None => "none",
            }
            .to_string(),
        ),
        ("STRLEN", _) => match lookup(arg(1)) {
            Some(FakeValue::String(s)) => RespFrame::Integer(s.len() as i64),
            _ => RespFrame::Integer(0),
        },
        ("LLEN", _) => match lookup(arg(1)) {
            Some(FakeValue::List(items)) => RespFrame::Integer(items.len() as i64),
            _ => RespFrame::Integer(0),
        },
        ("GET", _) => match lookup(arg(1)) {
            Some(FakeValue::String(s)) => bulk(s.clone()),
            _ => RespFrame::Null,
        },
        _ => err(&format!("ERR unknown command '{command}'")),
    }
}

fn info_text(data: &StoreData) -> String {
    let mut info = format!(
        "# Server\r\nredis_version:7.2.4\r\nredis_mode:{mode}\r\nos:Linux\r\nuptime_in_seconds:100\r\n\
         # Clients\r\nconnected_clients:{clients}\r\n\
         # Replication\r\nrole:master\r\nconnected_slaves:0\r\n\
         # Cluster\r\ncluster_enabled:{cluster}\r\n\
         # Keyspace\r\n",
        mode = if data.cluster_nodes.is_some() { "cluster" } else { "standalone" },
        clients = data.connected_clients,
        cluster = u8::from(data.cluster_nodes.is_some()),
    );
    let mut dbs: Vec<_> = data.dbs.iter().filter(|(_, k)| !k.is_empty()).collect();
    dbs.sort_by_key(|(db, _)| **db);
    for (db, keys) in dbs {
        info.push_str(&format!("db{db}:keys={},expires=0,avg_ttl=0\r\n", keys.len()));
    }
    info
}
