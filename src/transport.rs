// src/transport.rs - Unix socket client for the firmware API server
use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{Instant, timeout, timeout_at};

use crate::config::{ConnectionConfig, ReadMode};
use crate::envelope::{Envelope, Reply};
use crate::error::TransportError;
use crate::framing::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Closed,
}

/// Connection statistics
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub commands_sent: u64,
    pub replies_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    /// Framed messages passed over while waiting for a specific reply.
    pub skipped_messages: u64,
}

/// Single request/response client for the firmware socket.
///
/// Every exchange writes one envelope and then waits at most the receive
/// timeout for something to come back. A reply means the firmware accepted
/// the request, not that the motion has executed.
#[derive(Debug)]
pub struct FirmwareClient {
    config: ConnectionConfig,
    stream: Option<UnixStream>,
    state: ConnectionState,
    frames: FrameBuffer,
    stats: ClientStats,
}

impl FirmwareClient {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: None,
            state: ConnectionState::Unconnected,
            frames: FrameBuffer::new(),
            stats: ClientStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect and consume the endpoint's greeting, if it sends one.
    ///
    /// On failure the client is left unconnected and the error is both
    /// logged and returned.
    pub async fn connect(&mut self) -> Result<Option<String>, TransportError> {
        self.stream = None;
        self.frames.clear();
        self.state = ConnectionState::Unconnected;

        let path = self.config.socket_path.clone();
        let stream = match timeout(self.config.receive_timeout(), UnixStream::connect(&path)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                tracing::error!("Error connecting to {}: {}", path.display(), source);
                return Err(TransportError::Connect { path, source });
            }
            Err(_) => {
                tracing::error!("Timed out connecting to {}", path.display());
                return Err(TransportError::ConnectTimeout { path });
            }
        };

        self.stream = Some(stream);
        self.state = ConnectionState::Connected;
        tracing::info!("Connected to {}", path.display());

        match self.receive().await {
            Ok(Some(greeting)) => {
                tracing::info!("Firmware greeting: {}", greeting.trim());
                Ok(Some(greeting))
            }
            Ok(None) => {
                tracing::debug!("No greeting within {:?}", self.config.receive_timeout());
                Ok(None)
            }
            Err(e) => {
                tracing::error!("Connection to {} failed during greeting: {}", path.display(), e);
                self.stream = None;
                self.state = ConnectionState::Unconnected;
                Err(e)
            }
        }
    }

    /// Run a line of G-code and return whatever the firmware sent back.
    ///
    /// Returns `Ok(None)` without touching the socket when not connected.
    pub async fn send(&mut self, gcode: &str) -> Result<Option<String>, TransportError> {
        self.request(&Envelope::script(gcode)).await
    }

    /// Like [`send`](Self::send) with a one-off receive timeout.
    pub async fn send_within(
        &mut self,
        gcode: &str,
        wait: Duration,
    ) -> Result<Option<String>, TransportError> {
        self.request_within(&Envelope::script(gcode), wait).await
    }

    pub async fn request(&mut self, envelope: &Envelope) -> Result<Option<String>, TransportError> {
        let wait = self.config.receive_timeout();
        self.request_within(envelope, wait).await
    }

    pub async fn request_within(
        &mut self,
        envelope: &Envelope,
        wait: Duration,
    ) -> Result<Option<String>, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            tracing::debug!("Not connected, skipping {} request", envelope.method);
            return Ok(None);
        };

        let bytes = envelope.encode().inspect_err(|_| self.stats.errors += 1)?;
        tracing::debug!("TX: {}", String::from_utf8_lossy(&bytes[..bytes.len() - 1]));

        // write_all loops until the whole envelope is on the socket
        let write_timeout = self.config.receive_timeout();
        match timeout(write_timeout, stream.write_all(&bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.stats.errors += 1;
                tracing::error!("Send error: {}", e);
                return Err(TransportError::Write(e));
            }
            Err(_) => {
                self.stats.errors += 1;
                tracing::error!("Send timed out after {:?}", write_timeout);
                return Err(TransportError::Write(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "write timed out",
                )));
            }
        }
        self.stats.commands_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;

        match self.config.read_mode {
            ReadMode::Single => self.receive_within(wait).await,
            ReadMode::Framed => self.receive_reply(envelope.id, wait).await,
        }
    }

    /// Read framed messages until the one answering `id` arrives.
    ///
    /// Status pushes and stale replies are dropped; they never stand in for
    /// the reply to this request.
    async fn receive_reply(&mut self, id: i64, wait: Duration) -> Result<Option<String>, TransportError> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(frame) = self.receive_within(remaining).await? else {
                return Ok(None);
            };
            if Reply::parse(&frame).and_then(|reply| reply.id) == Some(id) {
                return Ok(Some(frame));
            }
            self.stats.skipped_messages += 1;
            tracing::debug!("Skipping message while waiting for reply {}: {}", id, frame.trim_end());
        }
    }

    /// Wait up to the configured timeout for inbound data.
    pub async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        let wait = self.config.receive_timeout();
        self.receive_within(wait).await
    }

    /// `Ok(None)` when nothing arrived in time or there is no connection.
    pub async fn receive_within(&mut self, wait: Duration) -> Result<Option<String>, TransportError> {
        if self.stream.is_none() {
            return Ok(None);
        }
        let received = match self.config.read_mode {
            ReadMode::Single => self.read_once(wait).await,
            ReadMode::Framed => self.read_frame(wait).await,
        };
        match &received {
            Ok(Some(text)) => {
                self.stats.replies_received += 1;
                tracing::debug!("RX: {}", text.trim_end());
            }
            Ok(None) => {
                self.stats.timeouts += 1;
                tracing::trace!("No reply within {:?}", wait);
            }
            Err(TransportError::PeerClosed) => {
                self.stats.errors += 1;
                tracing::warn!("Firmware closed {}", self.config.socket_path.display());
                self.stream = None;
                self.frames.clear();
                self.state = ConnectionState::Closed;
            }
            Err(e) => {
                self.stats.errors += 1;
                tracing::error!("Receive error: {}", e);
            }
        }
        received
    }

    /// One read, no reassembly: the caller sees exactly what one recv returned.
    async fn read_once(&mut self, wait: Duration) -> Result<Option<String>, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let mut buf = vec![0u8; self.config.max_read];
        match timeout(wait, stream.read(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => Err(TransportError::PeerClosed),
            Ok(Ok(n)) => {
                self.stats.bytes_received += n as u64;
                Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned()))
            }
            Ok(Err(e)) => Err(TransportError::Read(e)),
        }
    }

    /// Next complete message; partial input stays buffered across calls.
    async fn read_frame(&mut self, wait: Duration) -> Result<Option<String>, TransportError> {
        if let Some(frame) = self.frames.next_frame() {
            return Ok(Some(frame));
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let deadline = Instant::now() + wait;
        let mut buf = vec![0u8; self.config.max_read];
        loop {
            match timeout_at(deadline, stream.read(&mut buf)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => return Err(TransportError::PeerClosed),
                Ok(Ok(n)) => {
                    self.stats.bytes_received += n as u64;
                    self.frames.extend(&buf[..n]);
                    if let Some(frame) = self.frames.next_frame() {
                        return Ok(Some(frame));
                    }
                    tracing::trace!("Holding {} bytes of a partial message", self.frames.pending_len());
                }
                Ok(Err(e)) => return Err(TransportError::Read(e)),
            }
        }
    }

    /// Release the socket. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Socket shutdown reported: {}", e);
            }
            tracing::info!("Closed connection to {}", self.config.socket_path.display());
            self.state = ConnectionState::Closed;
        }
        self.frames.clear();
    }
}
