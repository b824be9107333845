//! Datagram transport seams.
//!
//! The receiver drains a [`DatagramSource`] without blocking; the sender
//! writes through an async [`DatagramSink`]. Both have in-memory
//! implementations so the pipelines can run without sockets.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::UdpSocket;

/// Largest datagram read from the socket; longer payloads are truncated.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Errors raised by datagram transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to send datagram to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Non-blocking source of inbound datagrams.
pub trait DatagramSource {
    /// Copies the next pending datagram into `buf`.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    ///
    /// # Errors
    ///
    /// - `io::Error` - If the underlying socket reports a failure other than would-block
    fn recv_pending(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

impl DatagramSource for UdpSocket {
    fn recv_pending(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.try_recv_from(buf) {
            Ok((len, _peer)) => Ok(Some(len)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Binds the receiver socket.
///
/// # Errors
///
/// - `TransportError::Bind` - If the address is unavailable
pub async fn bind_receiver(addr: SocketAddr) -> Result<UdpSocket, TransportError> {
    UdpSocket::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })
}

/// In-memory datagram queue.
#[derive(Debug, Default)]
pub struct MemoryDatagrams {
    pending: VecDeque<Vec<u8>>,
}

impl MemoryDatagrams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: impl Into<Vec<u8>>) {
        self.pending.push_back(payload.into());
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl DatagramSource for MemoryDatagrams {
    fn recv_pending(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let Some(payload) = self.pending.pop_front() else {
            return Ok(None);
        };
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok(Some(len))
    }
}

/// Destination for outbound datagrams.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Sends one datagram. Delivery is best effort.
    ///
    /// # Errors
    ///
    /// - `TransportError::Send` - If the socket rejects the datagram
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// UDP sink bound to an ephemeral local port with a fixed destination.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpSink {
    /// Binds an ephemeral socket of the destination's address family.
    ///
    /// # Errors
    ///
    /// - `TransportError::Bind` - If no local socket can be bound
    pub async fn open(dest: SocketAddr) -> Result<Self, TransportError> {
        let local: SocketAddr = if dest.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Bind {
                addr: local,
                source,
            })?;
        Ok(Self { socket, dest })
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }
}

#[async_trait]
impl DatagramSink for UdpSink {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send_to(payload, self.dest)
            .await
            .map(|_| ())
            .map_err(|source| TransportError::Send {
                addr: self.dest,
                source,
            })
    }
}

/// Sink that keeps every payload it is given.
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything sent so far.
    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl DatagramSink for MemorySink {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().push(payload.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_datagrams_fifo_and_truncation() {
        let mut queue = MemoryDatagrams::new();
        queue.push(b"first".to_vec());
        queue.push(b"second-longer".to_vec());

        let mut buf = [0u8; 6];
        assert_eq!(queue.recv_pending(&mut buf).unwrap(), Some(5));
        assert_eq!(&buf[..5], b"first");
        assert_eq!(queue.recv_pending(&mut buf).unwrap(), Some(6));
        assert_eq!(&buf, b"second");
        assert_eq!(queue.recv_pending(&mut buf).unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_sink_collects_payloads() {
        let sink = MemorySink::new();
        sink.send(b"a").await.unwrap();
        sink.send(b"b").await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.take(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_udp_round_trip_on_loopback() {
        let mut receiver = bind_receiver("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let dest = receiver.local_addr().unwrap();
        let sink = UdpSink::open(dest).await.unwrap();

        sink.send(br#"{"msg_type":"EntityState"}"#).await.unwrap();
        receiver.readable().await.unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let len = receiver.recv_pending(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], br#"{"msg_type":"EntityState"}"#);
        assert_eq!(receiver.recv_pending(&mut buf).unwrap(), None);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = bind_receiver("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let result = bind_receiver(taken).await;
        assert!(matches!(result, Err(TransportError::Bind { addr, .. }) if addr == taken));
    }
}
