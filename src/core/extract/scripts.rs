// src/core/extract/scripts.rs

//! Runs user supplied Lua scripts and exports what they return.

use crate::core::ExporterError;
use crate::core::client::Connection;
use crate::core::metrics::RequestRegistry;
use crate::core::protocol::ReplyValue;
use std::path::Path;
use tracing::warn;

/// A Lua script loaded from disk at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuaScript {
    pub filename: String,
    pub source: String,
}

impl LuaScript {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            filename: path.display().to_string(),
            source: std::fs::read_to_string(path)?,
        })
    }
}

/// `EVAL`s each script. A script is expected to return a flat
/// `[name, value, name, value, ...]` list, exported as
/// `script_values{filename,key}`. `script_result{filename}` is 1 when the
/// script ran and its reply could be read, 0 otherwise.
pub async fn extract_scripts(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
    scripts: &[LuaScript],
) -> Result<(), ExporterError> {
    for script in scripts {
        let result = run_script(conn, registry, script).await;
        let ok = match result {
            Ok(()) => 1.0,
            Err(e) if e.is_connection_error() => return Err(e),
            Err(e) => {
                warn!("Lua script '{}' failed: {}", script.filename, e);
                0.0
            }
        };
        registry.gauge(
            "script_result",
            "Result of the collect script evaluation",
            &[("filename", script.filename.as_str())],
            ok,
        );
    }
    Ok(())
}

async fn run_script(
    conn: &mut dyn Connection,
    registry: &mut RequestRegistry,
    script: &LuaScript,
) -> Result<(), ExporterError> {
    let reply = conn.query(&["EVAL", &script.source, "0"]).await?;
    let values = match reply {
        ReplyValue::Nil => return Ok(()),
        other => other.into_field_map()?,
    };

    let mut parsed = Vec::with_capacity(values.len());
    for (key, value) in &values {
        parsed.push((key.as_str(), value.as_f64()?));
    }
    for (key, value) in parsed {
        registry.gauge(
            "script_values",
            "Values returned by the collect script",
            &[("filename", script.filename.as_str()), ("key", key)],
            value,
        );
    }
    Ok(())
}
