use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use gbn_lab_abstract::packet::SEQ_PREFIX_LEN;
use gbn_lab_abstract::{
    ArqConfig, Packet, PacketKind, SenderReport, SystemContext, TransportProtocol,
};
use gbn_lab_core::{ActionBuffer, GbnReceiver, GbnSender, ScopedContext};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::NetConfig;
use crate::error::NetError;
use crate::transport::UdpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// Kind of packet this role receives from its peer.
    fn inbound_kind(self) -> PacketKind {
        match self {
            Role::Sender => PacketKind::Ack,
            Role::Receiver => PacketKind::Data,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => f.write_str("Sender"),
            Role::Receiver => f.write_str("Receiver"),
        }
    }
}

enum Wake {
    Datagram { len: usize, from: SocketAddr },
    Timer(u32),
}

/// One task owning a protocol, its socket and its timers. Each wake-up
/// dispatches exactly one callback and applies its actions before waiting again.
pub struct Endpoint<P> {
    protocol: P,
    transport: UdpTransport,
    role: Role,
    peer: Option<SocketAddr>,
    timers: HashMap<u32, Instant>,
    started: Instant,
    reply_delay: Duration,
    recv_buffer: usize,
}

impl<P: TransportProtocol> Endpoint<P> {
    /// `peer` is where outgoing packets go. A receiver usually starts without
    /// one and replies to whoever sent the latest datagram.
    pub fn new(protocol: P, transport: UdpTransport, role: Role, peer: Option<SocketAddr>) -> Self {
        Self {
            protocol,
            transport,
            role,
            peer,
            timers: HashMap::new(),
            started: Instant::now(),
            reply_delay: Duration::ZERO,
            recv_buffer: 2048,
        }
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn with_recv_buffer(mut self, len: usize) -> Self {
        self.recv_buffer = len;
        self
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn into_protocol(self) -> P {
        self.protocol
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Drive the endpoint until it reports completion. An endpoint that never
    /// completes (a receiver) runs until an I/O error.
    pub async fn run(&mut self) -> Result<(), NetError> {
        self.started = Instant::now();
        self.dispatch(|p, ctx| p.init(ctx)).await?;

        let mut buf = vec![0u8; self.recv_buffer];
        while !self.protocol.is_complete() {
            match self.next_wake(&mut buf).await? {
                Some(Wake::Datagram { len, from }) => {
                    if self.role == Role::Receiver {
                        self.peer = Some(from);
                    }
                    let packet =
                        Packet::from_wire(self.role.inbound_kind(), Bytes::copy_from_slice(&buf[..len]));
                    self.dispatch(|p, ctx| p.on_packet(ctx, packet)).await?;
                }
                Some(Wake::Timer(id)) => {
                    self.dispatch(|p, ctx| p.on_timer(ctx, id)).await?;
                }
                None => {}
            }
        }
        self.timers.clear();
        Ok(())
    }

    /// Wait for the next datagram or timer expiry, whichever comes first.
    async fn next_wake(&mut self, buf: &mut [u8]) -> Result<Option<Wake>, NetError> {
        let earliest = self
            .timers
            .iter()
            .min_by_key(|(_, deadline)| **deadline)
            .map(|(id, deadline)| (*id, *deadline));

        let wait = match earliest {
            Some((id, deadline)) => {
                let now = Instant::now();
                if deadline <= now {
                    self.timers.remove(&id);
                    return Ok(Some(Wake::Timer(id)));
                }
                Some(deadline - now)
            }
            None => None,
        };

        let wake = match self.transport.recv_timeout(buf, wait).await? {
            Some((len, from)) => Some(Wake::Datagram { len, from }),
            None => earliest.map(|(id, _)| {
                self.timers.remove(&id);
                Wake::Timer(id)
            }),
        };
        Ok(wake)
    }

    async fn dispatch<F>(&mut self, f: F) -> Result<(), NetError>
    where
        F: FnOnce(&mut P, &mut dyn SystemContext),
    {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext::new(&mut buffer, self.now_ms());
            f(&mut self.protocol, &mut ctx);
        }
        self.apply(buffer).await
    }

    async fn apply(&mut self, buffer: ActionBuffer) -> Result<(), NetError> {
        for (name, value) in &buffer.metrics {
            debug!(role = %self.role, metric = %name, value, "metric");
        }
        for log in &buffer.logs {
            info!("[{}] {}", self.role, log);
        }
        for data in &buffer.delivered_data {
            debug!(role = %self.role, bytes = data.len(), "delivered to application");
        }

        for id in buffer.timers_cancel {
            self.timers.remove(&id);
        }
        let now = Instant::now();
        for (delay, id) in buffer.timers_start {
            self.timers.insert(id, now + Duration::from_millis(delay));
        }

        if buffer.outgoing_packets.is_empty() {
            return Ok(());
        }
        let dest = self.peer.ok_or(NetError::NoPeer)?;
        if self.role == Role::Receiver && !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }
        for packet in &buffer.outgoing_packets {
            self.transport.send_to(&packet.body, dest).await?;
        }
        Ok(())
    }
}

/// Run a Go-Back-N sender to completion (or abort) against `net.receiver_addr`.
pub async fn run_sender(arq: &ArqConfig, net: &NetConfig) -> Result<SenderReport, NetError> {
    arq.validate()?;
    let transport = UdpTransport::bind(net.sender_bind).await?;
    info!(
        local = %transport.local_addr(),
        peer = %net.receiver_addr,
        "sender socket bound"
    );
    let mut endpoint = Endpoint::new(
        GbnSender::from_config(arq),
        transport,
        Role::Sender,
        Some(net.receiver_addr),
    )
    .with_recv_buffer(net.recv_buffer);
    endpoint.run().await?;
    Ok(endpoint.protocol().sender_report())
}

/// Bind `net.receiver_addr` and answer data units until an I/O error occurs.
pub async fn run_receiver(arq: &ArqConfig, net: &NetConfig) -> Result<(), NetError> {
    arq.validate()?;
    let transport = UdpTransport::bind(net.receiver_addr).await?;
    info!(local = %transport.local_addr(), "receiver listening");
    receiver_endpoint(arq, net, transport).run().await
}

/// A receiver endpoint on an already bound socket.
pub fn receiver_endpoint(
    arq: &ArqConfig,
    net: &NetConfig,
    transport: UdpTransport,
) -> Endpoint<GbnReceiver> {
    Endpoint::new(GbnReceiver::from_config(arq), transport, Role::Receiver, None)
        .with_reply_delay(Duration::from_millis(net.reply_delay_ms))
        .with_recv_buffer(net.recv_buffer.max(arq.unit_size + SEQ_PREFIX_LEN))
}
