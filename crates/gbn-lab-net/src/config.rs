use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Addresses and socket parameters of a networked transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Where the receiver listens and the sender sends.
    pub receiver_addr: SocketAddr,
    /// Local address of the sender's socket.
    pub sender_bind: SocketAddr,
    /// Receive buffer size in bytes; longer datagrams are truncated.
    pub recv_buffer: usize,
    /// Pause before the receiver flushes its acks, standing in for link RTT.
    pub reply_delay_ms: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            receiver_addr: SocketAddr::from(([127, 0, 0, 1], 50000)),
            sender_bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            recv_buffer: 2048,
            reply_delay_ms: 50,
        }
    }
}
