use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use super::protocol::MAX_DATAGRAM_SIZE;
use super::stats::{LinkCounters, NetworkStats};

pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Datagram socket bound to a single server. Every method takes `&self` so
/// the receive, resend and keepalive loops can share one endpoint.
#[derive(Debug)]
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    counters: LinkCounters,
}

impl NetworkEndpoint {
    pub fn connect<A: ToSocketAddrs>(remote: A, recv_timeout: Duration) -> io::Result<Self> {
        let remote_addr = remote.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "Endpoint resolved to no address",
            )
        })?;

        let bind_addr: SocketAddr = if remote_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(remote_addr)?;
        // A zero timeout is rejected by the OS.
        socket.set_read_timeout(Some(recv_timeout.max(Duration::from_millis(1))))?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            remote_addr,
            counters: LinkCounters::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn counters(&self) -> &LinkCounters {
        &self.counters
    }

    pub fn stats(&self) -> NetworkStats {
        self.counters.snapshot()
    }

    pub fn send_bytes(&self, data: &[u8]) -> io::Result<usize> {
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Packet exceeds datagram limit",
            ));
        }

        let bytes = self.socket.send(data)?;
        self.counters.record_sent(bytes);
        Ok(bytes)
    }

    /// Blocks up to the read timeout. `Ok(None)` means nothing arrived.
    pub fn receive(&self, buffer: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv(buffer) {
            Ok(size) => {
                self.counters.record_received(size);
                Ok(Some(size))
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
