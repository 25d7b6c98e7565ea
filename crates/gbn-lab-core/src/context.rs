use gbn_lab_abstract::{Packet, SystemContext};

/// Actions requested by an endpoint during one callback.
///
/// Drivers create a fresh buffer per event, hand the endpoint a
/// [`ScopedContext`] over it, and apply the contents once the callback
/// returns. This keeps every state transition of an endpoint atomic with
/// respect to the other event sources.
#[derive(Debug, Default)]
pub struct ActionBuffer {
    pub outgoing_packets: Vec<Packet>,
    pub timers_start: Vec<(u64, u32)>, // (delay, id)
    pub timers_cancel: Vec<u32>,
    pub logs: Vec<String>,
    pub delivered_data: Vec<Vec<u8>>,
    pub metrics: Vec<(String, f64)>,
}

impl ActionBuffer {
    pub fn is_empty(&self) -> bool {
        self.outgoing_packets.is_empty()
            && self.timers_start.is_empty()
            && self.timers_cancel.is_empty()
            && self.logs.is_empty()
            && self.delivered_data.is_empty()
            && self.metrics.is_empty()
    }
}

/// Context implementation handed to an endpoint for the duration of one callback.
pub struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> ScopedContext<'a> {
    pub fn new(buffer: &'a mut ActionBuffer, now: u64) -> Self {
        Self { buffer, now }
    }
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.buffer.timers_start.push((delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.buffer.timers_cancel.push(timer_id);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}
