// src/core/scrape/request.rs

//! The immutable description of one scrape.

use crate::core::ExporterError;
use crate::core::client::TargetAddress;
use crate::core::extract::KeyPattern;
use serde::Deserialize;
use std::time::Duration;

/// Query parameters accepted by the multi-target endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeParams {
    pub target: Option<String>,
    #[serde(rename = "check-keys")]
    pub check_keys: Option<String>,
    #[serde(rename = "check-single-keys")]
    pub check_single_keys: Option<String>,
    #[serde(rename = "count-keys")]
    pub count_keys: Option<String>,
    #[serde(rename = "check-streams")]
    pub check_streams: Option<String>,
    #[serde(rename = "check-single-streams")]
    pub check_single_streams: Option<String>,
}

/// The check lists of a scrape, each a comma separated `db=key` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckLists {
    pub check_keys: Vec<KeyPattern>,
    pub check_single_keys: Vec<KeyPattern>,
    pub count_keys: Vec<KeyPattern>,
    pub check_streams: Vec<KeyPattern>,
    pub check_single_streams: Vec<KeyPattern>,
}

impl CheckLists {
    /// Parses all five lists, failing on the first malformed one.
    pub fn parse(
        check_keys: &str,
        check_single_keys: &str,
        count_keys: &str,
        check_streams: &str,
        check_single_streams: &str,
    ) -> Result<Self, ExporterError> {
        Ok(Self {
            check_keys: KeyPattern::parse_list(check_keys)?,
            check_single_keys: KeyPattern::parse_list(check_single_keys)?,
            count_keys: KeyPattern::parse_list(count_keys)?,
            check_streams: KeyPattern::parse_list(check_streams)?,
            check_single_streams: KeyPattern::parse_list(check_single_streams)?,
        })
    }

    pub fn has_key_checks(&self) -> bool {
        !self.check_keys.is_empty() || !self.check_single_keys.is_empty()
    }

    pub fn has_stream_checks(&self) -> bool {
        !self.check_streams.is_empty() || !self.check_single_streams.is_empty()
    }
}

/// Everything one scrape needs, resolved before a connection is opened.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub target: TargetAddress,
    /// A password given for this request only, from the target's userinfo.
    pub password: Option<String>,
    pub username: Option<String>,
    pub checks: CheckLists,
    pub batch_size: usize,
    pub timeout: Duration,
}
