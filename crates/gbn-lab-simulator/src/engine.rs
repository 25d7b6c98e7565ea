use crate::trace::SimulationReport;
use gbn_lab_abstract::{Packet, SimConfig, SystemContext, TransportProtocol};
use gbn_lab_core::{ActionBuffer, ScopedContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival {
        to: NodeId,
        packet: Packet,
    },
    TimerExpiry {
        node: NodeId,
        timer_id: u32,
        generation: u64,
    },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Tie-breaker: insertion order among events at the same time
}

// Min-heap ordering: the earliest (time, id) pops first
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// One line of the link-layer timeline kept for traces.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

/// Discrete-event simulation of a sender/receiver pair over a lossy link.
///
/// Every callback runs to completion against a fresh [`ActionBuffer`] before
/// the next event is popped, so the endpoints see a strictly ordered stream
/// of packet arrivals and timer expiries.
pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,
    started: bool,

    config: SimConfig,
    rng: StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u64,

    /// Samples recorded through `SystemContext::record_metric`, keyed by
    /// metric name, as `(time_ms, value)`.
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    drop_sender_seq_once: Vec<u32>,
    drop_receiver_ack_once: Vec<u32>,

    pub link_events: Vec<LinkEventSummary>,

    /// Key: (node, timer_id). Cancelling bumps the generation so expiries
    /// scheduled under an older generation are skipped.
    timer_generations: HashMap<(NodeId, u32), u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            started: false,
            config,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            link_events: Vec::new(),
            timer_generations: HashMap::new(),
        }
    }

    /// Drop the first packet the sender emits for unit `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Drop the first ack the receiver emits with number `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u32) {
        self.drop_receiver_ack_once.push(ack);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    /// Run both endpoints' `init`. Later calls are no-ops.
    pub fn init(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.dispatch(NodeId::Sender, |node, ctx| node.init(ctx));
        self.dispatch(NodeId::Receiver, |node, ctx| node.init(ctx));
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns `false` once the queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                self.dispatch(to, |node, ctx| node.on_packet(ctx, packet));
            }
            EventType::TimerExpiry {
                node,
                timer_id,
                generation,
            } => {
                if !self.timer_is_current(node, timer_id, generation) {
                    debug!("Skipping cancelled timer event for timer_id={}", timer_id);
                    return true;
                }
                self.dispatch(node, |n, ctx| n.on_timer(ctx, timer_id));
            }
        }
        true
    }

    /// Run until the event queue drains.
    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    fn timer_is_current(&self, node: NodeId, timer_id: u32, generation: u64) -> bool {
        self.timer_generations.get(&(node, timer_id)).copied() == Some(generation)
    }

    /// Pop cancelled timer expiries sitting at the head of the queue.
    fn discard_stale_timers(&mut self) {
        while let Some(Event {
            event_type:
                EventType::TimerExpiry {
                    node,
                    timer_id,
                    generation,
                },
            ..
        }) = self.event_queue.peek()
        {
            if self.timer_is_current(*node, *timer_id, *generation) {
                break;
            }
            self.event_queue.pop();
        }
    }

    /// Run every event scheduled at or before `max_ms`. Returns `true` if the
    /// queue drained, `false` if live events remain past the bound. Cancelled
    /// timer expiries do not count as remaining work.
    pub fn run_for(&mut self, max_ms: u64) -> bool {
        self.init();
        loop {
            self.discard_stale_timers();
            let Some(next) = self.peek_next_event_time() else {
                break;
            };
            if next > max_ms {
                return false;
            }
            self.step();
        }
        true
    }

    /// `true` when the sender reports it has nothing left to do.
    pub fn sender_complete(&self) -> bool {
        self.sender.is_complete()
    }

    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ms: self.time,
            delivered_units: self.delivered_data.len(),
            delivered_bytes: self.delivered_data.iter().map(Vec::len).sum(),
            sender_packet_count: self.sender_packet_count,
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
            sender: self.sender.report(),
            receiver: self.receiver.report(),
        }
    }

    fn dispatch<F>(&mut self, node: NodeId, f: F)
    where
        F: FnOnce(&mut dyn TransportProtocol, &mut dyn SystemContext),
    {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext::new(&mut buffer, self.time);
            let endpoint = match node {
                NodeId::Sender => self.sender.as_mut(),
                NodeId::Receiver => self.receiver.as_mut(),
            };
            f(endpoint, &mut ctx);
        }
        self.process_actions(node, buffer);
    }

    fn link_event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            debug!("[{:?}] delivered {} bytes", source_node, data.len());
            self.link_event(format!(
                "[{:?}] DELIVERED {} bytes to application",
                source_node,
                data.len()
            ));
            self.delivered_data.push(data);
        }

        // Cancels before starts: a re-arm of the same id in one callback survives.
        for timer_id in buffer.timers_cancel {
            *self
                .timer_generations
                .entry((source_node, timer_id))
                .or_insert(0) += 1;
        }

        for (delay, id) in buffer.timers_start {
            let generation = *self.timer_generations.entry((source_node, id)).or_insert(0);
            self.push_event(
                self.time + delay,
                EventType::TimerExpiry {
                    node: source_node,
                    timer_id: id,
                    generation,
                },
            );
        }

        let target_node = source_node.peer();
        for packet in buffer.outgoing_packets {
            let label = packet
                .seq_num
                .map_or_else(|| "-".to_string(), |n| n.to_string());

            match source_node {
                NodeId::Sender => {
                    self.sender_packet_count += 1;
                    if let Some(seq) = packet.seq_num
                        && let Some(pos) = self.drop_sender_seq_once.iter().position(|s| *s == seq)
                    {
                        self.drop_sender_seq_once.remove(pos);
                        self.link_event(format!(
                            "[Sender->Receiver] DROP (deterministic seq) seq={seq}"
                        ));
                        debug!("Deterministically dropping sender packet with seq={}", seq);
                        continue;
                    }
                }
                NodeId::Receiver => {
                    if packet.is_ack()
                        && let Some(ack) = packet.seq_num
                        && let Some(pos) = self.drop_receiver_ack_once.iter().position(|a| *a == ack)
                    {
                        self.drop_receiver_ack_once.remove(pos);
                        self.link_event(format!(
                            "[Receiver->Sender] DROP (deterministic ack) ack={ack}"
                        ));
                        debug!("Deterministically dropping receiver ACK with ack={}", ack);
                        continue;
                    }
                }
            }

            if self.config.loss_rate > 0.0 && self.rng.random::<f64>() < self.config.loss_rate {
                self.link_event(format!(
                    "[{:?}->{:?}] DROP (random loss) {:?} {}",
                    source_node, target_node, packet.kind, label
                ));
                debug!("Packet lost in channel");
                continue;
            }

            let latency = self
                .rng
                .random_range(self.config.min_latency..=self.config.max_latency);

            self.link_event(format!(
                "[{:?}->{:?}] SEND {:?} {} (latency={}ms)",
                source_node, target_node, packet.kind, label, latency
            ));

            self.push_event(
                self.time + latency,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }
}
