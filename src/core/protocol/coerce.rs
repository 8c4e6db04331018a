// src/core/protocol/coerce.rs

//! Narrowing helpers that turn a `ReplyValue` into a concrete Rust type.
//!
//! Every helper either returns the requested value or an
//! `ExporterError::ShapeMismatch` naming the expected and the actual variant.
//! None of them fall back to a default, so a zero in an emitted sample always
//! comes from an explicit "no data" branch in the extraction code.

use super::ReplyValue;
use crate::core::ExporterError;
use bytes::Bytes;
use indexmap::IndexMap;

fn mismatch(expected: &'static str, actual: &ReplyValue) -> ExporterError {
    ExporterError::ShapeMismatch {
        expected,
        actual: actual.tag(),
    }
}

impl ReplyValue {
    /// Narrows to an `i64`. Integer replies pass through; text replies are
    /// accepted when they hold a decimal integer.
    pub fn as_i64(&self) -> Result<i64, ExporterError> {
        match self {
            ReplyValue::Integer(i) => Ok(*i),
            ReplyValue::Text(b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| mismatch("integer", self)),
            other => Err(mismatch("integer", other)),
        }
    }

    /// Narrows to an `f64`. Integer replies widen; text replies are accepted
    /// when they hold a finite or infinite decimal number.
    pub fn as_f64(&self) -> Result<f64, ExporterError> {
        match self {
            ReplyValue::Integer(i) => Ok(*i as f64),
            ReplyValue::Text(b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|f| !f.is_nan())
                .ok_or_else(|| mismatch("float", self)),
            other => Err(mismatch("float", other)),
        }
    }

    /// Narrows to the raw bytes of a text reply.
    pub fn as_bytes(&self) -> Result<&Bytes, ExporterError> {
        match self {
            ReplyValue::Text(b) => Ok(b),
            other => Err(mismatch("text", other)),
        }
    }

    /// Narrows to a `String`, replacing invalid UTF-8 sequences.
    pub fn as_string(&self) -> Result<String, ExporterError> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Borrows the elements of a sequence reply.
    pub fn as_sequence(&self) -> Result<&[ReplyValue], ExporterError> {
        match self {
            ReplyValue::Sequence(items) => Ok(items),
            other => Err(mismatch("sequence", other)),
        }
    }

    /// Takes ownership of the elements of a sequence reply.
    pub fn into_sequence(self) -> Result<Vec<ReplyValue>, ExporterError> {
        match self {
            ReplyValue::Sequence(items) => Ok(items),
            other => Err(mismatch("sequence", &other)),
        }
    }

    /// Interprets a flat `[field, value, field, value, ...]` sequence (the shape
    /// of `CONFIG GET`, `XINFO STREAM` and friends) as an ordered map.
    pub fn into_field_map(self) -> Result<IndexMap<String, ReplyValue>, ExporterError> {
        let items = self.into_sequence()?;
        if items.len() % 2 != 0 {
            return Err(ExporterError::Protocol(format!(
                "field list has odd length {}",
                items.len()
            )));
        }

        let mut map = IndexMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            map.insert(field.as_string()?, value);
        }
        Ok(map)
    }
}

/// Looks up a field of a decoded field map and narrows it to an `f64`.
pub fn field_f64(
    map: &IndexMap<String, ReplyValue>,
    field: &str,
) -> Result<f64, ExporterError> {
    map.get(field)
        .ok_or_else(|| ExporterError::Protocol(format!("missing field '{field}'")))?
        .as_f64()
}

/// Looks up a field of a decoded field map and narrows it to a `String`.
pub fn field_string(
    map: &IndexMap<String, ReplyValue>,
    field: &str,
) -> Result<String, ExporterError> {
    map.get(field)
        .ok_or_else(|| ExporterError::Protocol(format!("missing field '{field}'")))?
        .as_string()
}
