// src/core/protocol/reply.rs

//! Defines the normalized value tree every reply is decoded into.

use super::RespFrame;
use crate::core::ExporterError;
use bytes::Bytes;

/// `ReplyValue` is the closed, recursive representation of one decoded reply.
///
/// Simple strings and bulk strings both become `Text`; the two RESP null forms
/// collapse into `Nil`. An error reply is kept as a `ProtocolError` value so that
/// an error nested inside an array does not abort decoding of its siblings;
/// callers check for it explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyValue {
    Integer(i64),
    Text(Bytes),
    Nil,
    Sequence(Vec<ReplyValue>),
    ProtocolError(String),
}

impl ReplyValue {
    /// The name of the variant, used in `ShapeMismatch` errors.
    pub fn tag(&self) -> &'static str {
        match self {
            ReplyValue::Integer(_) => "integer",
            ReplyValue::Text(_) => "text",
            ReplyValue::Nil => "nil",
            ReplyValue::Sequence(_) => "sequence",
            ReplyValue::ProtocolError(_) => "error",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ReplyValue::Nil)
    }

    /// Converts a top-level error reply into an `Err`, leaving every other
    /// variant (including nested errors) untouched.
    pub fn into_result(self) -> Result<ReplyValue, ExporterError> {
        match self {
            ReplyValue::ProtocolError(msg) => Err(ExporterError::Server(msg)),
            other => Ok(other),
        }
    }
}

impl From<RespFrame> for ReplyValue {
    fn from(frame: RespFrame) -> Self {
        match frame {
            RespFrame::SimpleString(s) => ReplyValue::Text(Bytes::from(s)),
            RespFrame::BulkString(b) => ReplyValue::Text(b),
            RespFrame::Integer(i) => ReplyValue::Integer(i),
            RespFrame::Null | RespFrame::NullArray => ReplyValue::Nil,
            RespFrame::Error(e) => ReplyValue::ProtocolError(e),
            RespFrame::Array(arr) => {
                ReplyValue::Sequence(arr.into_iter().map(ReplyValue::from).collect())
            }
        }
    }
}

impl From<&str> for ReplyValue {
    fn from(s: &str) -> Self {
        ReplyValue::Text(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<i64> for ReplyValue {
    fn from(i: i64) -> Self {
        ReplyValue::Integer(i)
    }
}

impl From<Vec<ReplyValue>> for ReplyValue {
    fn from(v: Vec<ReplyValue>) -> Self {
        ReplyValue::Sequence(v)
    }
}
