//! Transport session contract for Rookery.
//!
//! The engine never owns a socket directly. It talks to a [`Transport`]:
//! something that can connect to `host:port`, be "pumped" once per tick,
//! accept outbound bytes, and hand back whatever inbound bytes have
//! arrived so far. Every call is non-blocking.
//!
//! ```text
//!   Client::tick ──update()──→ Transport ──(socket / UDP session / test pipe)
//!                ──recv()────→   returns 0 when nothing has arrived yet
//!                ──send()────→   returns how many bytes it accepted
//! ```
//!
//! Reliability, ordering, retransmission and congestion control all live
//! on the far side of this trait. The engine only relies on the byte
//! stream being ordered.
//!
//! # Feature Flags
//!
//! - `tcp` (default): [`TcpTransport`] over a non-blocking `std::net::TcpStream`

mod error;
mod memory;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
pub use memory::MemoryTransport;
#[cfg(feature = "tcp")]
pub use tcp::TcpTransport;

/// A non-blocking, ordered byte-stream session to one remote endpoint.
///
/// Implementations must never block inside [`recv`](Transport::recv):
/// "nothing available yet" is `Ok(0)`, not an error and not a wait.
pub trait Transport {
    /// Opens the session to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Pumps the underlying session (flush queued writes, poll timers, ...).
    ///
    /// Called once at the top of every engine tick.
    fn update(&mut self) -> Result<(), TransportError>;

    /// Offers `data` to the transport and returns how many leading bytes it
    /// accepted. Accepting fewer than `data.len()` is allowed; accepting
    /// zero is treated by callers as a stalled, unrecoverable write.
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Copies up to `buf.len()` received bytes into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is currently available.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Releases the session. Further sends fail with
    /// [`TransportError::NotConnected`].
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        (**self).connect(host, port)
    }

    fn update(&mut self) -> Result<(), TransportError> {
        (**self).update()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).send(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).recv(buf)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}

/// Pushes all of `data` through `transport`.
///
/// Loops, advancing by however many bytes each attempt accepted, and fails
/// with [`TransportError::WriteStalled`] the first time an attempt accepts
/// nothing. This is the only place the engine can spin: there is no
/// cancellation once a write has started.
pub fn send_all<T: Transport + ?Sized>(
    transport: &mut T,
    data: &[u8],
) -> Result<(), TransportError> {
    let mut offset = 0;
    while offset < data.len() {
        let accepted = transport.send(&data[offset..])?;
        if accepted == 0 {
            return Err(TransportError::WriteStalled {
                remaining: data.len() - offset,
            });
        }
        offset += accepted;
    }
    tracing::trace!(bytes = data.len(), "write complete");
    Ok(())
}
