// src/core/credentials.rs

//! The process-wide address-to-password map, reloadable at runtime.
//!
//! The map is immutable once built. A reload parses a complete replacement
//! and swaps the `Arc` under a write lock, so a scrape sees either the old or
//! the new map, never a mix. Scrapes hold their own `Arc` clone for the
//! duration of the lookup only.

use crate::core::client::TargetAddress;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use wildmatch::WildMatch;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialReloadError {
    #[error("There is no pwd file specified")]
    NoFileSpecified,

    #[error("failed to read passwords file: {0}")]
    Read(String),

    #[error("failed to reload passwords file: {0}")]
    Parse(String),
}

/// A parsed credentials file. Exact addresses take precedence over wildcard
/// patterns; patterns are tried in file order.
#[derive(Debug, Default)]
pub struct CredentialMap {
    exact: HashMap<String, String>,
    patterns: Vec<(WildMatch, String)>,
}

impl CredentialMap {
    /// Parses a JSON object of `"address": "password"` pairs. Keys containing
    /// `*` or `?` are wildcard patterns.
    pub fn parse(content: &str) -> Result<Self, CredentialReloadError> {
        let entries: indexmap::IndexMap<String, String> = serde_json::from_str(content)
            .map_err(|e| CredentialReloadError::Parse(e.to_string()))?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut map = Self::default();
        for (address, password) in entries {
            if address.contains(['*', '?']) {
                map.patterns.push((WildMatch::new(&address), password));
            } else {
                map.exact.insert(address, password);
            }
        }
        map
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up the password for a target, trying the address as given, then
    /// its canonical `scheme://host:port` form and its `host:port` pair, then
    /// the wildcard patterns.
    pub fn password_for(&self, target: &TargetAddress) -> Option<String> {
        let canonical = target.canonical();
        let host_port = target.socket_addr();
        self.lookup(&[target.raw.as_str(), canonical.as_str(), host_port.as_str()])
    }

    fn lookup(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find_map(|c| self.exact.get(*c))
            .or_else(|| {
                self.patterns
                    .iter()
                    .find(|(pattern, _)| candidates.iter().any(|c| pattern.matches(c)))
                    .map(|(_, password)| password)
            })
            .cloned()
    }
}

/// The shared credential store.
#[derive(Debug, Default)]
pub struct CredentialStore {
    file: Option<PathBuf>,
    map: RwLock<Arc<CredentialMap>>,
}

impl CredentialStore {
    /// Creates a store backed by `file`. The file is not read until
    /// [`CredentialStore::reload`] is called.
    pub fn new(file: Option<PathBuf>) -> Self {
        Self {
            file,
            map: RwLock::new(Arc::new(CredentialMap::default())),
        }
    }

    /// Creates a store with fixed contents and no backing file.
    pub fn with_map(map: CredentialMap) -> Self {
        Self {
            file: None,
            map: RwLock::new(Arc::new(map)),
        }
    }

    /// A snapshot of the current map.
    pub fn snapshot(&self) -> Arc<CredentialMap> {
        self.map.read().clone()
    }

    /// Looks up the password for a target in the current map.
    pub fn lookup(&self, target: &TargetAddress) -> Option<String> {
        self.snapshot().password_for(target)
    }

    /// Replaces the whole map.
    pub fn replace(&self, map: CredentialMap) {
        *self.map.write() = Arc::new(map);
    }

    /// Re-reads and re-parses the backing file. On any failure the current
    /// map stays in place.
    pub fn reload(&self) -> Result<usize, CredentialReloadError> {
        let path = self
            .file
            .as_ref()
            .ok_or(CredentialReloadError::NoFileSpecified)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| CredentialReloadError::Read(format!("{}: {e}", path.display())))?;
        let map = CredentialMap::parse(&content)?;
        let count = map.len();
        self.replace(map);
        info!("Loaded {} credential entries from {}", count, path.display());
        Ok(count)
    }
}
