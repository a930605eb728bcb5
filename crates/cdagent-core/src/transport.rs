//! Datagram delivery.
//!
//! Delivery is fire-and-forget: there is no acknowledgement, retry or
//! ordering, and send failures are not reported to the caller.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Mutex;

use tracing::debug;

/// Default collectd network port.
pub const DEFAULT_PORT: u16 = 25826;

/// Sends one datagram to a fixed destination.
pub trait Transport: Send + Sync {
    fn send(&self, datagram: &[u8]);
}

/// UDP transport to a single collectd server.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpTransport {
    /// Resolves `host:port` once and binds an ephemeral local socket of the
    /// matching address family.
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let destination = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}:{}", host, port),
            )
        })?;

        let bind_addr: SocketAddr = if destination.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;

        Ok(Self {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl Transport for UdpTransport {
    fn send(&self, datagram: &[u8]) {
        if let Err(e) = self.socket.send_to(datagram, self.destination) {
            debug!(destination = %self.destination, error = %e, "datagram not sent");
        }
    }
}

/// Keeps every datagram in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all datagrams sent so far.
    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Removes and returns all datagrams sent so far.
    pub fn take(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, datagram: &[u8]) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(datagram.to_vec());
        }
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, datagram: &[u8]) {
        (**self).send(datagram)
    }
}
