use bytes::Bytes;
use gbn_lab_abstract::packet::{decode_ack, encode_data};
use gbn_lab_abstract::{
    ArqConfig, EndpointReport, FrameMode, Packet, SenderReport, SystemContext, TransferStats,
    TransferSummary, TransportProtocol,
};
use tracing::{debug, warn};

use crate::channel::{BernoulliChannel, ChannelErrorModel, InjectionPoint};
use crate::timer::RetransmitTimer;
use crate::window::{AckOutcome, SenderState, SenderWindow};

/// Byte used to fill generated units.
pub const FILL_BYTE: u8 = b'X';

pub struct GbnSender {
    window: SenderWindow,
    timer: RetransmitTimer,
    channel: Box<dyn ChannelErrorModel>,
    units: Vec<Bytes>,
    frame_mode: FrameMode,
    unit_size: usize,
    loss_prob: f64,
    bit_error_prob: f64,
    max_retries: Option<u32>,
    stats: TransferStats,
    consecutive_timeouts: u32,
    aborted: bool,
    started_at: u64,
    finished_at: Option<u64>,
    last_event_at: u64,
}

impl GbnSender {
    /// A sender for `config.total_units` units of `config.unit_size` filler
    /// bytes, with the Bernoulli oracle seeded from `config.seed`.
    pub fn from_config(config: &ArqConfig) -> Self {
        Self::new(config, Box::new(BernoulliChannel::with_seed(config.seed)))
    }

    pub fn new(config: &ArqConfig, channel: Box<dyn ChannelErrorModel>) -> Self {
        let unit = Bytes::from(vec![FILL_BYTE; config.unit_size]);
        let units = vec![unit; config.total_units as usize];
        Self::with_units(config, units, channel)
    }

    /// A sender for explicit payloads. `config.total_units` is ignored in
    /// favour of `units.len()`. A `window_size` of zero runs as stop-and-wait;
    /// use [`ArqConfig::validate`] to reject it instead.
    pub fn with_units(
        config: &ArqConfig,
        units: Vec<Bytes>,
        channel: Box<dyn ChannelErrorModel>,
    ) -> Self {
        let total = u32::try_from(units.len()).unwrap_or(u32::MAX);
        Self {
            window: SenderWindow::new(config.window_size.max(1), total),
            timer: RetransmitTimer::new(config.timeout_ms),
            channel,
            units,
            frame_mode: config.frame_mode,
            unit_size: config.unit_size,
            loss_prob: config.packet_loss_prob,
            bit_error_prob: config.bit_error_prob,
            max_retries: config.max_retries,
            stats: TransferStats::default(),
            consecutive_timeouts: 0,
            aborted: false,
            started_at: 0,
            finished_at: None,
            last_event_at: 0,
        }
    }

    pub fn window(&self) -> &SenderWindow {
        &self.window
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn state(&self) -> SenderState {
        self.window.state()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn sender_report(&self) -> SenderReport {
        SenderReport {
            base: self.window.base(),
            next_seq: self.window.next_seq(),
            total_units: self.window.total_units(),
            complete: self.window.is_complete(),
            aborted: self.aborted,
            summary: self.summary(),
        }
    }

    pub fn summary(&self) -> TransferSummary {
        let end = self.finished_at.unwrap_or(self.last_event_at);
        self.stats
            .summary(self.unit_size, end.saturating_sub(self.started_at))
    }

    /// Transmit new units while the window has room, then make sure the
    /// timer covers whatever is outstanding.
    pub fn fill_window(&mut self, ctx: &mut dyn SystemContext) {
        if self.aborted {
            return;
        }
        let mut sent_any = false;
        while self.window.can_send() {
            let seq = self.window.mark_sent();
            self.stats.transmissions += 1;
            if self.transmit(ctx, seq) {
                ctx.log(&format!("Sent packet {seq}"));
            }
            sent_any = true;
        }
        if self.window.has_outstanding() && !self.timer.is_armed() {
            self.timer.arm(ctx);
        }
        if sent_any {
            self.record_window(ctx);
        }
    }

    /// Process one raw ack datagram. Returns `true` if the window slid.
    pub fn on_ack_received(&mut self, ctx: &mut dyn SystemContext, raw: &[u8]) -> bool {
        if self
            .channel
            .should_fail(InjectionPoint::AckCorruption, self.bit_error_prob)
        {
            self.stats.bit_errors += 1;
            ctx.log("Corrupted ACK received, ignoring");
            return false;
        }
        let ack = match decode_ack(raw) {
            Ok(ack) => ack,
            Err(e) => {
                self.stats.bit_errors += 1;
                ctx.log(&format!("Unreadable ACK discarded: {e}"));
                return false;
            }
        };
        ctx.log(&format!("Received ACK for packet {ack}"));

        match self.window.on_ack(ack) {
            AckOutcome::Advanced { to, drained, .. } => {
                self.stats.acks_accepted += 1;
                self.consecutive_timeouts = 0;
                if drained {
                    self.timer.cancel(ctx);
                } else {
                    self.timer.arm(ctx);
                }
                ctx.record_metric("base", to as f64);
                self.record_window(ctx);
                if self.window.is_complete() {
                    self.finished_at = Some(ctx.now());
                    ctx.log(&format!(
                        "All {} units acknowledged",
                        self.window.total_units()
                    ));
                }
                true
            }
            AckOutcome::Stale | AckOutcome::Redundant => {
                self.stats.stale_acks += 1;
                debug!(ack, base = self.window.base(), "ignoring stale ack");
                false
            }
        }
    }

    /// Timer expiry: resend every unit in `[base, next_seq)` and re-arm.
    pub fn on_timeout(&mut self, ctx: &mut dyn SystemContext) {
        self.stats.timeouts += 1;
        self.consecutive_timeouts += 1;

        if let Some(limit) = self.max_retries
            && self.consecutive_timeouts > limit
        {
            self.aborted = true;
            self.finished_at = Some(ctx.now());
            self.timer.cancel(ctx);
            warn!(
                base = self.window.base(),
                timeouts = self.consecutive_timeouts,
                "retry limit reached, giving up"
            );
            ctx.log(&format!(
                "Giving up after {} consecutive timeouts at base {}",
                self.consecutive_timeouts,
                self.window.base()
            ));
            return;
        }

        ctx.log("Timeout, retransmitting unacknowledged packets");
        for seq in self.window.outstanding() {
            self.stats.retransmissions += 1;
            if self.transmit(ctx, seq) {
                ctx.log(&format!("Retransmitting packet {seq}"));
            }
        }
        self.timer.arm(ctx);
    }

    fn transmit(&mut self, ctx: &mut dyn SystemContext, seq: u32) -> bool {
        if self
            .channel
            .should_fail(InjectionPoint::Transmit { seq }, self.loss_prob)
        {
            self.stats.packets_lost += 1;
            ctx.log(&format!("Packet {seq} lost"));
            return false;
        }
        let body = encode_data(seq, &self.units[seq as usize], self.frame_mode);
        ctx.send_packet(Packet::data(seq, body));
        self.stats.packets_sent += 1;
        true
    }

    fn record_window(&self, ctx: &mut dyn SystemContext) {
        ctx.record_metric("next_seq", self.window.next_seq() as f64);
        ctx.record_metric("in_flight", self.window.in_flight() as f64);
    }
}

impl TransportProtocol for GbnSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.started_at = ctx.now();
        self.last_event_at = self.started_at;
        ctx.log(&format!(
            "Go-Back-N sender: {} units, window {}",
            self.window.total_units(),
            self.window.window_size()
        ));
        if self.window.is_complete() {
            self.finished_at = Some(self.started_at);
            return;
        }
        self.fill_window(ctx);
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.last_event_at = ctx.now();
        if !packet.is_ack() {
            debug!("sender ignoring non-ack packet");
            return;
        }
        if self.is_complete() {
            return;
        }
        if self.on_ack_received(ctx, &packet.body) {
            self.fill_window(ctx);
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) {
        self.last_event_at = ctx.now();
        if !self.timer.fire(timer_id) {
            debug!(timer_id, "ignoring stale retransmission timer");
            return;
        }
        if self.is_complete() {
            return;
        }
        self.on_timeout(ctx);
    }

    fn is_complete(&self) -> bool {
        self.aborted || self.window.is_complete()
    }

    fn report(&self) -> Option<EndpointReport> {
        Some(EndpointReport::Sender(self.sender_report()))
    }
}
