//! Non-blocking datagram transport
//!
//! The server loop only needs bind/send/receive/close, so sockets sit behind
//! the `Transport` trait. `UdpTransport` is the real one; `MemoryNetwork`
//! connects endpoints in-process for tests and tooling.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("transport is closed")]
    Closed,
}

/// Unreliable, unordered datagram endpoint
pub trait Transport: Send {
    /// Best-effort send. A full send buffer drops the datagram and returns `Ok(0)`.
    fn send_to(&self, datagram: &[u8], target: SocketAddr) -> Result<usize, TransportError>;

    /// Receive one datagram if one is ready; `Ok(None)` when nothing is pending
    fn try_recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError>;

    fn local_addr(&self) -> Result<SocketAddr, TransportError>;

    /// Release the endpoint. Later calls fail with `Closed`.
    fn close(&mut self);
}

/// UDP socket driven without awaiting
pub struct UdpTransport {
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        info!(addr = %socket.local_addr()?, "UDP transport bound");
        Ok(Self {
            socket: Some(socket),
        })
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, datagram: &[u8], target: SocketAddr) -> Result<usize, TransportError> {
        match self.socket()?.try_send_to(datagram, target) {
            Ok(sent) => Ok(sent),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn try_recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        match self.socket()?.try_recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket()?.local_addr()?)
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("UDP transport closed");
        }
    }
}

type Inbox = VecDeque<(Vec<u8>, SocketAddr)>;

/// In-process datagram network. Datagrams to unbound addresses are dropped.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inboxes: Arc<Mutex<HashMap<SocketAddr, Inbox>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, addr: SocketAddr) -> MemoryTransport {
        self.inboxes.lock().entry(addr).or_default();
        MemoryTransport {
            network: self.clone(),
            addr,
            open: true,
        }
    }

    /// Datagrams waiting for `addr`
    pub fn pending(&self, addr: SocketAddr) -> usize {
        self.inboxes.lock().get(&addr).map_or(0, VecDeque::len)
    }
}

pub struct MemoryTransport {
    network: MemoryNetwork,
    addr: SocketAddr,
    open: bool,
}

impl MemoryTransport {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }
}

impl Transport for MemoryTransport {
    fn send_to(&self, datagram: &[u8], target: SocketAddr) -> Result<usize, TransportError> {
        self.ensure_open()?;
        let mut inboxes = self.network.inboxes.lock();
        match inboxes.get_mut(&target) {
            Some(inbox) => {
                inbox.push_back((datagram.to_vec(), self.addr));
                Ok(datagram.len())
            }
            None => {
                debug!(target = %target, "dropping datagram to unbound address");
                Ok(0)
            }
        }
    }

    fn try_recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        self.ensure_open()?;
        let mut inboxes = self.network.inboxes.lock();
        let Some((datagram, from)) = inboxes.get_mut(&self.addr).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        // Like UDP, bytes past the buffer are discarded
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some((len, from)))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.ensure_open()?;
        Ok(self.addr)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.network.inboxes.lock().remove(&self.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn memory_endpoints_exchange_datagrams() {
        let net = MemoryNetwork::new();
        let a = net.bind(addr(1));
        let b = net.bind(addr(2));

        assert_eq!(a.send_to(b"hello", addr(2)).unwrap(), 5);
        assert_eq!(a.send_to(b"lost", addr(3)).unwrap(), 0);

        let mut buf = [0u8; 16];
        let (len, from) = b.try_recv(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, addr(1));
        assert!(b.try_recv(&mut buf).unwrap().is_none());
    }

    #[test]
    fn closed_memory_transport_rejects_calls() {
        let net = MemoryNetwork::new();
        let mut a = net.bind(addr(1));
        a.close();
        assert!(matches!(a.local_addr(), Err(TransportError::Closed)));
        let mut buf = [0u8; 4];
        assert!(matches!(a.try_recv(&mut buf), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn udp_loopback_round_trip() {
        let server = UdpTransport::bind(addr(0)).await.unwrap();
        let client = UdpTransport::bind(addr(0)).await.unwrap();
        let server_addr = server.local_addr().unwrap();

        client.send_to(b"ping", server_addr).unwrap();

        let mut buf = [0u8; 16];
        let mut received = None;
        for _ in 0..100 {
            if let Some(got) = server.try_recv(&mut buf).unwrap() {
                received = Some(got);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let (len, from) = received.expect("datagram should arrive on loopback");
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn bind_conflict_reports_address() {
        let first = UdpTransport::bind(addr(0)).await.unwrap();
        let taken = first.local_addr().unwrap();
        let err = UdpTransport::bind(taken).await.err().unwrap();
        assert!(matches!(err, TransportError::Bind { addr, .. } if addr == taken));
    }
}
