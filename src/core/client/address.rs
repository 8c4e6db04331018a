// src/core/client/address.rs

//! Parsing and normalization of target addresses.

use crate::core::ExporterError;
use std::fmt;
use url::Url;

const DEFAULT_PORT: u16 = 6379;

/// The transport a target is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Redis,
    Rediss,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Redis => "redis",
            Scheme::Rediss => "rediss",
        }
    }
}

/// A validated target address.
///
/// Accepted forms are `redis://[user:pass@]host[:port][/db]`, the same with
/// `rediss://` for TLS, and a scheme-less `host:port` which is treated as
/// `redis://host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddress {
    /// The string the address was parsed from, as supplied by the caller.
    pub raw: String,
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: Option<u32>,
}

impl TargetAddress {
    pub fn parse(input: &str) -> Result<Self, ExporterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ExporterError::InvalidTarget("target is empty".to_string()));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("redis://{trimmed}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| ExporterError::InvalidTarget(format!("'{trimmed}': {e}")))?;

        let scheme = match url.scheme() {
            "redis" | "valkey" => Scheme::Redis,
            "rediss" | "valkeys" => Scheme::Rediss,
            other => {
                return Err(ExporterError::InvalidTarget(format!(
                    "'{trimmed}': unsupported scheme '{other}'"
                )));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ExporterError::InvalidTarget(format!("'{trimmed}': missing host")))?
            .to_string();

        let db = match url.path().trim_start_matches('/') {
            "" => None,
            path => Some(path.parse::<u32>().map_err(|_| {
                ExporterError::InvalidTarget(format!("'{trimmed}': invalid database '{path}'"))
            })?),
        };

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(decode_component);
        let password = url.password().map(decode_component);

        Ok(Self {
            raw: trimmed.to_string(),
            scheme,
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            username,
            password,
            db,
        })
    }

    /// The `host:port` pair handed to the socket layer.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The host name used for TLS server name indication.
    pub fn server_name(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// The canonical `scheme://host:port` form, without credentials or db.
    pub fn canonical(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn decode_component(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
