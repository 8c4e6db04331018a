// src/core/errors.rs

//! Defines the primary error type for the scrape engine.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::num::{ParseFloatError, ParseIntError};
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all failures a scrape can run into.
///
/// The variants follow the exporter's propagation policy: request errors are
/// surfaced at the HTTP boundary before any connection is opened, target errors
/// turn into an `up=0` sample, and shape mismatches only cost the sample or the
/// extraction routine that hit them.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An error reply (`-ERR ...`) returned by the store.
    #[error("{0}")]
    Server(String),

    /// A decoded reply did not have the shape the caller asked for.
    #[error("unexpected reply shape: expected {expected}, got {actual}")]
    ShapeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("authentication with the target failed: {0}")]
    TargetAuth(String),

    #[error("scrape timeout")]
    Timeout,

    #[error("TLS Error: {0}")]
    Tls(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl ExporterError {
    /// The HTTP status an error maps to when it reaches the HTTP boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExporterError::InvalidRequest(_) | ExporterError::InvalidTarget(_) => {
                StatusCode::BAD_REQUEST
            }
            ExporterError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short, bounded category used as the `err` label of the
    /// `exporter_last_scrape_error` sample.
    pub fn category(&self) -> &'static str {
        match self {
            ExporterError::Timeout => "scrape timeout",
            ExporterError::TargetUnreachable(_) => "connection failed",
            ExporterError::TargetAuth(_) => "authentication failed",
            ExporterError::Tls(_) => "tls handshake failed",
            ExporterError::Io(_) | ExporterError::IncompleteData => "io error",
            ExporterError::Protocol(_) | ExporterError::ShapeMismatch { .. } => "protocol error",
            ExporterError::Server(_) => "server error",
            _ => "internal error",
        }
    }

    /// Returns true for errors that describe the connection itself rather than
    /// a single command, meaning the remaining routines cannot succeed either.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ExporterError::Io(_) | ExporterError::IncompleteData | ExporterError::Timeout
        )
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for ExporterError {
    fn clone(&self) -> Self {
        match self {
            ExporterError::Io(e) => ExporterError::Io(Arc::clone(e)),
            ExporterError::IncompleteData => ExporterError::IncompleteData,
            ExporterError::Protocol(s) => ExporterError::Protocol(s.clone()),
            ExporterError::Server(s) => ExporterError::Server(s.clone()),
            ExporterError::ShapeMismatch { expected, actual } => ExporterError::ShapeMismatch {
                expected,
                actual,
            },
            ExporterError::InvalidRequest(s) => ExporterError::InvalidRequest(s.clone()),
            ExporterError::InvalidTarget(s) => ExporterError::InvalidTarget(s.clone()),
            ExporterError::Unauthorized => ExporterError::Unauthorized,
            ExporterError::TargetUnreachable(s) => ExporterError::TargetUnreachable(s.clone()),
            ExporterError::TargetAuth(s) => ExporterError::TargetAuth(s.clone()),
            ExporterError::Timeout => ExporterError::Timeout,
            ExporterError::Tls(s) => ExporterError::Tls(s.clone()),
            ExporterError::Internal(s) => ExporterError::Internal(s.clone()),
        }
    }
}

impl PartialEq for ExporterError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExporterError::Io(e1), ExporterError::Io(e2)) => e1.kind() == e2.kind(),
            (ExporterError::Protocol(s1), ExporterError::Protocol(s2)) => s1 == s2,
            (ExporterError::Server(s1), ExporterError::Server(s2)) => s1 == s2,
            (
                ExporterError::ShapeMismatch {
                    expected: e1,
                    actual: a1,
                },
                ExporterError::ShapeMismatch {
                    expected: e2,
                    actual: a2,
                },
            ) => e1 == e2 && a1 == a2,
            (ExporterError::InvalidRequest(s1), ExporterError::InvalidRequest(s2)) => s1 == s2,
            (ExporterError::InvalidTarget(s1), ExporterError::InvalidTarget(s2)) => s1 == s2,
            (ExporterError::TargetUnreachable(s1), ExporterError::TargetUnreachable(s2)) => {
                s1 == s2
            }
            (ExporterError::TargetAuth(s1), ExporterError::TargetAuth(s2)) => s1 == s2,
            (ExporterError::Tls(s1), ExporterError::Tls(s2)) => s1 == s2,
            (ExporterError::Internal(s1), ExporterError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl IntoResponse for ExporterError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for ExporterError {
    fn from(e: std::io::Error) -> Self {
        ExporterError::Io(Arc::new(e))
    }
}

impl From<ParseIntError> for ExporterError {
    fn from(e: ParseIntError) -> Self {
        ExporterError::Protocol(format!("invalid integer: {e}"))
    }
}

impl From<ParseFloatError> for ExporterError {
    fn from(e: ParseFloatError) -> Self {
        ExporterError::Protocol(format!("invalid float: {e}"))
    }
}

impl From<tokio::time::error::Elapsed> for ExporterError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ExporterError::Timeout
    }
}
