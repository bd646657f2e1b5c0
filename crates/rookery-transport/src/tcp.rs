//! Non-blocking TCP transport built on `std::net::TcpStream`.
//!
//! TCP already gives the ordered byte stream the engine needs. Writes are
//! staged in a bounded outbound queue and flushed on every `update()` and
//! `send()`. Once the queue is full, `send` accepts nothing and the
//! engine's send loop reports a stalled write.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use crate::{Transport, TransportError};

/// Default cap on bytes queued but not yet written to the socket.
pub const DEFAULT_MAX_PENDING: usize = 256 * 1024;

/// A [`Transport`] over a non-blocking TCP socket.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    pending: Vec<u8>,
    max_pending: usize,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    /// Creates a transport whose outbound queue holds at most `max_pending` bytes.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            stream: None,
            pending: Vec::new(),
            max_pending,
        }
    }

    /// Bytes accepted by `send` but not yet written to the socket.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let mut written = 0;
        while written < self.pending.len() {
            match stream.write(&self.pending[written..]) {
                Ok(0) => {
                    return Err(TransportError::ConnectionClosed(
                        "socket refused further writes".into(),
                    ));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::SendFailed(e)),
            }
        }
        self.pending.drain(..written);
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        let endpoint = format!("{host}:{port}");
        let connect_err = |source| TransportError::ConnectFailed {
            endpoint: endpoint.clone(),
            source,
        };
        let stream = TcpStream::connect((host, port)).map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        stream.set_nonblocking(true).map_err(connect_err)?;
        tracing::info!(%endpoint, "tcp transport connected");
        self.stream = Some(stream);
        self.pending.clear();
        Ok(())
    }

    fn update(&mut self) -> Result<(), TransportError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.flush()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if self.stream.is_none() {
            return Err(TransportError::NotConnected);
        }
        let room = self.max_pending.saturating_sub(self.pending.len());
        let n = room.min(data.len());
        self.pending.extend_from_slice(&data[..n]);
        self.flush()?;
        Ok(n)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        loop {
            return match stream.read(buf) {
                Ok(0) if !buf.is_empty() => Err(TransportError::ConnectionClosed(
                    "peer closed the stream".into(),
                )),
                Ok(n) => Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => Err(TransportError::ReceiveFailed(e)),
            };
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if !self.pending.is_empty() && self.stream.is_some() {
            // Best effort: a Closing frame may still be queued.
            if let Err(e) = self.flush() {
                tracing::debug!(error = %e, "flush on close failed");
            }
        }
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            tracing::debug!("tcp transport closed");
        }
        Ok(())
    }
}
