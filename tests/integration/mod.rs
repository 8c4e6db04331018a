// tests/integration/mod.rs

//! Integration tests for the exporter
//!
//! These tests run the HTTP surface in-process against fake stores that
//! speak RESP on ephemeral ports.

pub mod auth_test;
pub mod concurrency_test;
pub mod discovery_test;
pub mod fake_store;
pub mod http_test;
pub mod reload_test;
