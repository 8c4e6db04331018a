// src/core/extract/mod.rs

//! The extraction pipeline: one routine per information category.
//!
//! Every routine takes the scrape's connection and a registry to write into,
//! and returns `Err` only when the whole routine has to be given up. The
//! dispatcher hands each routine a scratch registry and merges it only on
//! success, so a failed routine contributes no samples at all.

pub mod cluster;
pub mod config;
pub mod info;
pub mod keys;
pub mod latency;
pub mod scripts;
pub mod slowlog;
pub mod streams;

use crate::core::ExporterError;
use crate::core::client::Connection;
use std::fmt;

/// A `db=key` pair from one of the key or stream check lists. `key` may be a
/// glob pattern for the pattern-based lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    pub db: u32,
    pub key: String,
}

impl KeyPattern {
    /// Parses a comma separated list such as `db3=user:*,session`.
    ///
    /// Each entry is `db=key` or a bare `key` (database 0). The database may be
    /// written `db3` or `3`. Keys are percent-decoded. An entry with more than
    /// one `=` is rejected.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, ExporterError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }

    fn parse(entry: &str) -> Result<Self, ExporterError> {
        let parts: Vec<&str> = entry.split('=').collect();
        let (db, key) = match parts.as_slice() {
            [key] => (0, *key),
            [db, key] => {
                let index = db.trim().trim_start_matches("db");
                let db = index.parse::<u32>().map_err(|_| {
                    ExporterError::InvalidRequest(format!(
                        "Invalid database index for db \"{db}\" in \"{entry}\""
                    ))
                })?;
                (db, *key)
            }
            _ => {
                return Err(ExporterError::InvalidRequest(format!(
                    "Couldn't parse db/key string: {entry}"
                )));
            }
        };

        if key.is_empty() {
            return Err(ExporterError::InvalidRequest(format!(
                "Empty key in \"{entry}\""
            )));
        }

        let key = urlencoding::decode(key)
            .map(|k| k.into_owned())
            .unwrap_or_else(|_| key.to_string());
        Ok(Self { db, key })
    }

    /// The value of the `db` label for this entry.
    pub fn db_label(&self) -> String {
        format!("db{}", self.db)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db{}={}", self.db, self.key)
    }
}

pub(crate) async fn select_db(conn: &mut dyn Connection, db: u32) -> Result<(), ExporterError> {
    conn.query(&["SELECT", &db.to_string()]).await?;
    Ok(())
}
