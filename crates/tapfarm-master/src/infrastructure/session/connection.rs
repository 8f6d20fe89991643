//! The live minitouch socket connection.
//!
//! Connecting reads the three-line handshake (see
//! [`tapfarm_core::protocol::handshake`]) and keeps the parsed capabilities
//! for the session's lifetime. After that the connection is a plain
//! command pipe: [`TouchConnection::send`] writes a whole script in one
//! write, relying on TCP's ordered delivery for command ordering.
//!
//! The protocol has no acknowledgements. A configurable receive buffer is
//! supported for diagnostic builds of minitouch that echo responses; with
//! the default buffer of zero, `send` performs no read at all. Callers
//! must not pipeline sends with a non-zero buffer without consuming the
//! response in between.

use tapfarm_core::{Handshake, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Error type for connection setup and I/O.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Socket-level failure.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The handshake was malformed; the caller must reconnect or abandon
    /// the device.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The socket has already been disconnected.
    #[error("connection is closed")]
    Closed,
}

/// A connected minitouch client.
#[derive(Debug)]
pub struct TouchConnection {
    stream: Option<TcpStream>,
    handshake: Handshake,
    recv_buffer: usize,
}

impl TouchConnection {
    /// Opens a TCP stream to a forwarded minitouch port and performs the
    /// handshake.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Io`] if the connect or a line read fails;
    /// [`ConnectionError::Protocol`] if any handshake line is malformed.
    pub async fn connect(
        host: &str,
        port: u16,
        recv_buffer: usize,
    ) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect((host, port)).await?;

        let mut reader = BufReader::new(stream);
        let mut lines = [String::new(), String::new(), String::new()];
        for line in &mut lines {
            if reader.read_line(line).await? == 0 {
                return Err(ProtocolError::ProtocolViolation(
                    "connection closed during handshake".into(),
                )
                .into());
            }
        }

        let handshake = Handshake::parse(&lines[0], &lines[1], &lines[2])?;
        debug!(
            port,
            pid = handshake.pid,
            max_contacts = handshake.max_contacts,
            max_x = handshake.max_x,
            max_y = handshake.max_y,
            max_pressure = handshake.max_pressure,
            "minitouch connected"
        );

        // The server sends nothing after the handshake, so no buffered
        // bytes are lost unwrapping the reader.
        Ok(Self {
            stream: Some(reader.into_inner()),
            handshake,
            recv_buffer,
        })
    }

    /// Capabilities parsed from the handshake.
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Writes `text` in full and performs at most one read.
    ///
    /// With a zero receive buffer the read is skipped and an empty vec is
    /// returned — the standard minitouch build never responds to commands.
    pub async fn send(&mut self, text: &str) -> Result<Vec<u8>, ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::Closed)?;
        stream.write_all(text.as_bytes()).await?;

        if self.recv_buffer == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; self.recv_buffer];
        let n = stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Closes the socket. Safe to call more than once.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!(pid = self.handshake.pid, "minitouch disconnected");
        }
    }

    /// Whether the socket is still open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
