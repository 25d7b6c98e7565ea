use crate::packet::Packet;
use crate::report::EndpointReport;

/// The capabilities a driver (simulator or network runtime) provides to an endpoint.
///
/// Calls are buffered by the driver and applied after the current callback
/// returns, so an endpoint never observes its own actions mid-callback.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel.
    fn send_packet(&mut self, packet: Packet);

    /// Arm a single-shot timer that calls `on_timer(timer_id)` after `delay_ms`.
    fn start_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Disarm a timer. A pending expiry for `timer_id` is never delivered afterwards.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Deliver in-order data to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Emit a status line.
    fn log(&mut self, message: &str);

    /// Milliseconds since the driver started.
    fn now(&self) -> u64;

    /// Record a numeric sample (e.g. window base) for traces.
    fn record_metric(&mut self, _name: &str, _value: f64) {}
}

/// An endpoint state machine driven entirely by events.
pub trait TransportProtocol {
    /// Called once before any other event.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a datagram arrives from the peer.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when a timer armed through [`SystemContext::start_timer`] expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32);

    /// `true` once the endpoint has nothing left to do.
    fn is_complete(&self) -> bool {
        false
    }

    /// Snapshot of the endpoint's counters.
    fn report(&self) -> Option<EndpointReport> {
        None
    }
}
