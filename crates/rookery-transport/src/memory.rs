//! An in-memory [`Transport`] for tests and offline tooling.
//!
//! `MemoryTransport` is a handle to a shared pipe: clone it, give one
//! clone to the engine, and keep the other to play the server. Inbound
//! bytes are queued with [`push_inbound`](MemoryTransport::push_inbound)
//! and everything the engine sent is collected by
//! [`take_outbound`](MemoryTransport::take_outbound).
//!
//! The `Rc<RefCell<..>>` sharing keeps it single-threaded, which matches
//! the engine: everything happens on the thread that calls `tick`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::{Transport, TransportError};

#[derive(Debug, Default)]
struct Pipe {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    endpoint: Option<(String, u16)>,
    /// Max bytes handed out per `recv` call (`None` = unlimited).
    read_limit: Option<usize>,
    /// Max bytes accepted per `send` call (`None` = unlimited).
    accept_limit: Option<usize>,
    send_attempts: usize,
    updates: usize,
    closed: bool,
    hung_up: bool,
}

/// Shared in-memory pipe implementing [`Transport`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    pipe: Rc<RefCell<Pipe>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes for the engine to receive.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.pipe.borrow_mut().inbound.extend(bytes);
    }

    /// Drains and returns every byte the engine has sent so far.
    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.pipe.borrow_mut().outbound)
    }

    /// Limits how many bytes a single `recv` call may return, to simulate
    /// frames arriving in fragments.
    pub fn set_read_limit(&self, limit: Option<usize>) {
        self.pipe.borrow_mut().read_limit = limit;
    }

    /// Limits how many bytes a single `send` call accepts.
    /// `Some(0)` simulates a stalled transport.
    pub fn set_accept_limit(&self, limit: Option<usize>) {
        self.pipe.borrow_mut().accept_limit = limit;
    }

    /// Simulates the peer dropping the connection.
    pub fn hang_up(&self) {
        self.pipe.borrow_mut().hung_up = true;
    }

    /// The `(host, port)` passed to the last `connect`.
    pub fn endpoint(&self) -> Option<(String, u16)> {
        self.pipe.borrow().endpoint.clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.pipe.borrow().send_attempts
    }

    pub fn update_count(&self) -> usize {
        self.pipe.borrow().updates
    }

    pub fn is_closed(&self) -> bool {
        self.pipe.borrow().closed
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        let mut pipe = self.pipe.borrow_mut();
        pipe.endpoint = Some((host.to_string(), port));
        pipe.closed = false;
        Ok(())
    }

    fn update(&mut self) -> Result<(), TransportError> {
        self.pipe.borrow_mut().updates += 1;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut pipe = self.pipe.borrow_mut();
        if pipe.closed {
            return Err(TransportError::NotConnected);
        }
        pipe.send_attempts += 1;
        let n = pipe.accept_limit.map_or(data.len(), |limit| limit.min(data.len()));
        pipe.outbound.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut pipe = self.pipe.borrow_mut();
        if pipe.inbound.is_empty() && pipe.hung_up {
            return Err(TransportError::ConnectionClosed("peer hung up".into()));
        }
        let mut n = buf.len().min(pipe.inbound.len());
        if let Some(limit) = pipe.read_limit {
            n = n.min(limit);
        }
        for (slot, byte) in buf.iter_mut().zip(pipe.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.pipe.borrow_mut().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recv_empty_pipe_returns_zero() {
        let mut t = MemoryTransport::new();
        let mut buf = [0u8; 8];
        assert_eq!(t.recv(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_recv_read_limit_fragments_input() {
        let mut t = MemoryTransport::new();
        t.push_inbound(&[1, 2, 3, 4, 5]);
        t.set_read_limit(Some(2));

        let mut buf = [0u8; 8];
        assert_eq!(t.recv(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        assert_eq!(t.recv(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(t.recv(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
    }

    #[test]
    fn test_recv_after_hang_up_drains_then_errors() {
        let mut t = MemoryTransport::new();
        t.push_inbound(&[9]);
        t.hang_up();

        let mut buf = [0u8; 4];
        assert_eq!(t.recv(&mut buf).unwrap(), 1);
        assert!(matches!(
            t.recv(&mut buf),
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_send_after_close_returns_not_connected() {
        let mut t = MemoryTransport::new();
        t.connect("localhost", 1).unwrap();
        t.close().unwrap();
        assert!(matches!(t.send(b"x"), Err(TransportError::NotConnected)));
        assert!(t.is_closed());
    }

    #[test]
    fn test_clones_share_the_same_pipe() {
        let server = MemoryTransport::new();
        let mut client = server.clone();
        client.connect("10.0.0.1", 7000).unwrap();
        client.send(b"hi").unwrap();

        assert_eq!(server.endpoint(), Some(("10.0.0.1".to_string(), 7000)));
        assert_eq!(server.take_outbound(), b"hi");
    }
}
