// src/core/client/mod.rs

//! The wire client used to talk to scrape targets.
//!
//! Extraction code only sees the [`Connection`] trait; [`RespClient`] is the
//! TCP/TLS implementation opened once per scrape and dropped when the scrape
//! ends, on every exit path.

pub mod address;
#[cfg(test)]
pub mod mock;
pub mod stream;
mod tls;

pub use address::{Scheme, TargetAddress};

use crate::core::ExporterError;
use crate::core::protocol::{ReplyValue, RespFrame, RespFrameCodec};
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use stream::ClientStream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// A connection capable of executing one command at a time.
#[async_trait]
pub trait Connection: Send {
    /// Sends one command and returns the decoded reply. An error reply from the
    /// store is returned as `Ok(ReplyValue::ProtocolError)`.
    async fn execute(&mut self, args: &[&str]) -> Result<ReplyValue, ExporterError>;

    /// Like [`Connection::execute`], but a top-level error reply becomes `Err`.
    async fn query(&mut self, args: &[&str]) -> Result<ReplyValue, ExporterError> {
        self.execute(args).await?.into_result()
    }

    /// Whether an earlier failure left the reply stream unusable.
    fn is_broken(&self) -> bool {
        false
    }
}

/// Connection-level settings shared by every scrape of one exporter.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub client_name: Option<String>,
    pub skip_tls_verification: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(15),
            client_name: None,
            skip_tls_verification: false,
        }
    }
}

/// The credentials presented to the target with `AUTH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A RESP2 client over TCP or TLS.
pub struct RespClient {
    stream: ClientStream,
    codec: RespFrameCodec,
    read_buf: BytesMut,
    read_timeout: Duration,
    // Set after an IO error, a timeout or a framing error. The reply stream
    // can no longer be matched to requests, so every later call fails fast.
    broken: bool,
}

impl RespClient {
    /// Opens a connection to `addr`, negotiates TLS if required, authenticates
    /// and selects the database named in the address.
    pub async fn connect(
        addr: &TargetAddress,
        credentials: &Credentials,
        options: &ConnectOptions,
    ) -> Result<Self, ExporterError> {
        let tcp = tokio::time::timeout(
            options.connect_timeout,
            TcpStream::connect(addr.socket_addr()),
        )
        .await
        .map_err(|_| {
            ExporterError::TargetUnreachable(format!("{}: connect timeout", addr.socket_addr()))
        })?
        .map_err(|e| ExporterError::TargetUnreachable(format!("{}: {e}", addr.socket_addr())))?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY on {}: {}", addr, e);
        }

        let stream = match addr.scheme {
            Scheme::Redis => ClientStream::Tcp(tcp),
            Scheme::Rediss => {
                let tls = tokio::time::timeout(
                    options.connect_timeout,
                    tls::handshake(tcp, addr.server_name(), options.skip_tls_verification),
                )
                .await
                .map_err(|_| ExporterError::Tls("handshake timeout".to_string()))??;
                ClientStream::Tls(Box::new(tls))
            }
        };

        let mut client = Self {
            stream,
            codec: RespFrameCodec,
            read_buf: BytesMut::with_capacity(16 * 1024),
            read_timeout: options.read_timeout,
            broken: false,
        };

        if let Some(password) = credentials.password.as_deref().filter(|p| !p.is_empty()) {
            let reply = match credentials.username.as_deref().filter(|u| !u.is_empty()) {
                Some(user) => client.execute(&["AUTH", user, password]).await?,
                None => client.execute(&["AUTH", password]).await?,
            };
            if let ReplyValue::ProtocolError(msg) = reply {
                return Err(ExporterError::TargetAuth(msg));
            }
        }

        if let Some(db) = addr.db {
            client.query(&["SELECT", &db.to_string()]).await?;
        }

        if let Some(name) = options.client_name.as_deref() {
            // Not every Redis-compatible store implements CLIENT SETNAME, so an
            // error reply is tolerated. A broken stream is not.
            match client.query(&["CLIENT", "SETNAME", name]).await {
                Ok(_) => {}
                Err(ExporterError::Server(msg)) => {
                    debug!("CLIENT SETNAME on {} rejected: {}", addr, msg);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(client)
    }

    async fn send_and_receive(&mut self, frame: RespFrame) -> Result<RespFrame, ExporterError> {
        // 1. Encode the command into a byte buffer.
        let mut write_buf = BytesMut::new();
        self.codec.encode(frame, &mut write_buf)?;

        // 2. Send it, bounded by the read timeout as well.
        tokio::time::timeout(self.read_timeout, async {
            self.stream.write_all(&write_buf).await?;
            self.stream.flush().await
        })
        .await??;

        // 3. Read until one complete reply frame has been buffered.
        loop {
            if let Some(reply) = self.codec.decode(&mut self.read_buf)? {
                return Ok(reply);
            }
            let read_fut = self.stream.read_buf(&mut self.read_buf);
            match tokio::time::timeout(self.read_timeout, read_fut).await {
                Ok(Ok(0)) => {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ExporterError::Timeout),
            }
        }
    }
}

#[async_trait]
impl Connection for RespClient {
    async fn execute(&mut self, args: &[&str]) -> Result<ReplyValue, ExporterError> {
        if self.broken {
            return Err(std::io::Error::from(std::io::ErrorKind::ConnectionAborted).into());
        }

        match self.send_and_receive(RespFrame::command(args)).await {
            Ok(frame) => Ok(ReplyValue::from(frame)),
            Err(e) => {
                self.broken = true;
                Err(e)
            }
        }
    }

    fn is_broken(&self) -> bool {
        self.broken
    }
}
