// src/core/mod.rs

//! The scrape engine: the store client, the extraction routines and the
//! per-request metric registry.

pub mod client;
pub mod credentials;
pub mod discovery;
pub mod errors;
pub mod extract;
pub mod metrics;
pub mod protocol;
pub mod scrape;

pub use errors::ExporterError;
pub use protocol::ReplyValue;
pub use scrape::{Exporter, ExporterOptions};
