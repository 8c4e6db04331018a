// src/core/client/mock.rs

//! An in-memory `Connection` with canned replies, for unit tests.

use super::Connection;
use crate::core::ExporterError;
use crate::core::protocol::ReplyValue;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Default)]
pub struct ScriptedConnection {
    replies: HashMap<String, ReplyValue>,
    hang_up_on: Option<String>,
    broken: bool,
    pub sent: Vec<String>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the reply for a command line, e.g. `"SLOWLOG LEN"`.
    /// Command names are matched case-insensitively.
    pub fn on(mut self, command: &str, reply: impl Into<ReplyValue>) -> Self {
        self.replies.insert(normalize(command), reply.into());
        self
    }

    /// Drops the connection when `command` is sent; every later command
    /// fails as well.
    pub fn hang_up_on(mut self, command: &str) -> Self {
        self.hang_up_on = Some(normalize(command));
        self
    }
}

fn normalize(command: &str) -> String {
    let mut parts = command.split(' ');
    let head = parts.next().unwrap_or_default().to_uppercase();
    std::iter::once(head).chain(parts.map(str::to_string)).collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn execute(&mut self, args: &[&str]) -> Result<ReplyValue, ExporterError> {
        let line = normalize(&args.join(" "));
        self.sent.push(line.clone());
        if self.broken {
            return Err(std::io::Error::from(std::io::ErrorKind::ConnectionAborted).into());
        }
        if self.hang_up_on.as_deref() == Some(line.as_str()) {
            self.broken = true;
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        Ok(self
            .replies
            .get(&line)
            .cloned()
            .unwrap_or_else(|| ReplyValue::ProtocolError(format!("ERR unknown command '{line}'"))))
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}
