use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::NetError;

/// A bound UDP socket with a receive that can give up after a timeout.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to `addr`. Port 0 lets the OS pick an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, NetError> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send `bytes` as one datagram.
    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), NetError> {
        self.socket.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Receive one datagram into `buf`. Returns `Ok(None)` when `wait`
    /// elapses first; `wait = None` blocks until something arrives.
    ///
    /// Datagrams longer than `buf` are truncated by the OS.
    pub async fn recv_timeout(
        &self,
        buf: &mut [u8],
        wait: Option<Duration>,
    ) -> Result<Option<(usize, SocketAddr)>, NetError> {
        let received = match wait {
            None => self.socket.recv_from(buf).await,
            Some(wait) => match tokio::time::timeout(wait, self.socket.recv_from(buf)).await {
                Ok(received) => received,
                Err(_elapsed) => return Ok(None),
            },
        };
        Ok(Some(received?))
    }
}
