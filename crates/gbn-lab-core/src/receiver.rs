use bytes::Bytes;
use gbn_lab_abstract::packet::decode_data;
use gbn_lab_abstract::{
    ArqConfig, EndpointReport, FrameMode, Packet, ReceiverReport, ReceiverStats, SystemContext,
    TransportProtocol, WireError,
};
use tracing::debug;

use crate::channel::{BernoulliChannel, ChannelErrorModel, InjectionPoint};

/// Salt mixed into the configured seed so both endpoints draw different streams.
const RECEIVER_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Dropped by the loss oracle; no ack.
    Lost,
    /// Dropped by the corruption oracle; no ack.
    Corrupted,
    /// The datagram could not be unframed; no ack.
    Malformed(WireError),
    /// Accepted as unit `ack`.
    Accepted {
        ack: u32,
        ack_lost: bool,
        payload: Bytes,
    },
    /// Out of order (sequenced framing only). `reack` repeats the last
    /// in-order ack, if there is one.
    Rejected {
        got: u32,
        expected: u32,
        reack: Option<u32>,
        ack_lost: bool,
    },
}

/// In [`FrameMode::Implicit`] every accepted unit is taken to be unit
/// `expected`; [`FrameMode::Sequenced`] rejects anything out of order.
#[derive(Debug, Clone)]
pub struct ReceiverState {
    expected: u32,
    frame_mode: FrameMode,
    loss_prob: f64,
    bit_error_prob: f64,
}

impl ReceiverState {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            expected: 0,
            frame_mode: config.frame_mode,
            loss_prob: config.packet_loss_prob,
            bit_error_prob: config.bit_error_prob,
        }
    }

    /// Sequence number the receiver will acknowledge next.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn on_unit_received(
        &mut self,
        channel: &mut dyn ChannelErrorModel,
        body: &Bytes,
    ) -> ReceiveOutcome {
        if channel.should_fail(InjectionPoint::ReceiveLoss, self.loss_prob) {
            return ReceiveOutcome::Lost;
        }
        if channel.should_fail(InjectionPoint::ReceiveCorruption, self.bit_error_prob) {
            return ReceiveOutcome::Corrupted;
        }
        let frame = match decode_data(body, self.frame_mode) {
            Ok(frame) => frame,
            Err(e) => return ReceiveOutcome::Malformed(e),
        };

        match frame.seq {
            Some(got) if got != self.expected => {
                let reack = self.expected.checked_sub(1);
                let ack_lost = match reack {
                    Some(ack) => channel.should_fail(InjectionPoint::AckLoss { ack }, self.loss_prob),
                    None => false,
                };
                ReceiveOutcome::Rejected {
                    got,
                    expected: self.expected,
                    reack,
                    ack_lost,
                }
            }
            _ => {
                let ack = self.expected;
                let ack_lost = channel.should_fail(InjectionPoint::AckLoss { ack }, self.loss_prob);
                self.expected = self.expected.wrapping_add(1);
                ReceiveOutcome::Accepted {
                    ack,
                    ack_lost,
                    payload: frame.payload,
                }
            }
        }
    }
}

pub struct GbnReceiver {
    state: ReceiverState,
    channel: Box<dyn ChannelErrorModel>,
    stats: ReceiverStats,
}

impl GbnReceiver {
    pub fn from_config(config: &ArqConfig) -> Self {
        let seed = config.seed.map(|s| s ^ RECEIVER_SEED_SALT);
        Self::new(config, Box::new(BernoulliChannel::with_seed(seed)))
    }

    pub fn new(config: &ArqConfig, channel: Box<dyn ChannelErrorModel>) -> Self {
        Self {
            state: ReceiverState::new(config),
            channel,
            stats: ReceiverStats::default(),
        }
    }

    pub fn state(&self) -> &ReceiverState {
        &self.state
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    fn send_ack(&mut self, ctx: &mut dyn SystemContext, ack: u32, lost: bool) {
        if lost {
            self.stats.acks_lost += 1;
            ctx.log("ACK lost");
        } else {
            ctx.send_packet(Packet::ack(ack));
            self.stats.acks_sent += 1;
            ctx.log(&format!("ACK {ack} sent"));
        }
    }
}

impl TransportProtocol for GbnReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log("Go-Back-N receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_ack() {
            debug!("receiver ignoring ack packet");
            return;
        }
        self.stats.received += 1;

        match self
            .state
            .on_unit_received(self.channel.as_mut(), &packet.body)
        {
            ReceiveOutcome::Lost => {
                self.stats.lost += 1;
                ctx.log("Packet loss simulated for data packet");
            }
            ReceiveOutcome::Corrupted => {
                self.stats.corrupted += 1;
                ctx.log("Data packet received but marked as corrupted");
            }
            ReceiveOutcome::Malformed(e) => {
                self.stats.malformed += 1;
                ctx.log(&format!("Discarding malformed data packet: {e}"));
            }
            ReceiveOutcome::Accepted {
                ack,
                ack_lost,
                payload,
            } => {
                self.stats.accepted += 1;
                ctx.log(&format!("Received packet {ack}"));
                ctx.deliver_data(&payload);
                self.send_ack(ctx, ack, ack_lost);
            }
            ReceiveOutcome::Rejected {
                got,
                expected,
                reack,
                ack_lost,
            } => {
                self.stats.rejected += 1;
                ctx.log(&format!(
                    "Out-of-order packet {got} discarded, expecting {expected}"
                ));
                if let Some(ack) = reack {
                    self.send_ack(ctx, ack, ack_lost);
                }
            }
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext, _timer_id: u32) {
        // Receiver has no timers
    }

    fn report(&self) -> Option<EndpointReport> {
        Some(EndpointReport::Receiver(ReceiverReport {
            expected: self.state.expected(),
            stats: self.stats,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{FaultPlan, PerfectChannel};
    use crate::context::{ActionBuffer, ScopedContext};
    use gbn_lab_abstract::packet::encode_data;

    fn lossless(mode: FrameMode) -> ArqConfig {
        ArqConfig {
            frame_mode: mode,
            ..ArqConfig::lossless()
        }
    }

    fn deliver(receiver: &mut GbnReceiver, packet: Packet) -> ActionBuffer {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext::new(&mut buffer, 0);
            receiver.on_packet(&mut ctx, packet);
        }
        buffer
    }

    fn acks(buffer: &ActionBuffer) -> Vec<u32> {
        buffer
            .outgoing_packets
            .iter()
            .map(|p| gbn_lab_abstract::packet::decode_ack(&p.body).unwrap())
            .collect()
    }

    fn unit(seq: u32, mode: FrameMode) -> Packet {
        Packet::data(seq, encode_data(seq, b"XXXX", mode))
    }

    #[test]
    fn acks_expected_counter_and_advances() {
        let mut r = GbnReceiver::new(&lossless(FrameMode::Implicit), Box::new(PerfectChannel));
        for seq in 0..3 {
            let out = deliver(&mut r, unit(seq, FrameMode::Implicit));
            assert_eq!(acks(&out), vec![seq]);
            assert_eq!(out.delivered_data, vec![b"XXXX".to_vec()]);
        }
        assert_eq!(r.state().expected(), 3);
    }

    #[test]
    fn implicit_mode_trusts_arrival_order() {
        let mut r = GbnReceiver::new(&lossless(FrameMode::Implicit), Box::new(PerfectChannel));
        deliver(&mut r, unit(0, FrameMode::Implicit));
        // Unit 1 never arrives; unit 2 is counted as 1.
        let out = deliver(&mut r, unit(2, FrameMode::Implicit));
        assert_eq!(acks(&out), vec![1]);
        assert_eq!(r.state().expected(), 2);
    }

    #[test]
    fn lost_and_corrupted_units_get_no_ack() {
        let plan = FaultPlan::new()
            .fail_once(InjectionPoint::ReceiveLoss)
            .fail_once(InjectionPoint::ReceiveCorruption);
        let mut r = GbnReceiver::new(&lossless(FrameMode::Implicit), Box::new(plan));

        let out = deliver(&mut r, unit(0, FrameMode::Implicit));
        assert!(out.outgoing_packets.is_empty());
        let out = deliver(&mut r, unit(0, FrameMode::Implicit));
        assert!(out.outgoing_packets.is_empty());
        assert!(out.delivered_data.is_empty());
        assert_eq!(r.state().expected(), 0);

        let out = deliver(&mut r, unit(0, FrameMode::Implicit));
        assert_eq!(acks(&out), vec![0]);
        assert_eq!(r.stats().lost, 1);
        assert_eq!(r.stats().corrupted, 1);
        assert_eq!(r.stats().received, 3);
    }

    #[test]
    fn lost_ack_still_advances_counter() {
        let plan = FaultPlan::new().fail_once(InjectionPoint::AckLoss { ack: 0 });
        let mut r = GbnReceiver::new(&lossless(FrameMode::Implicit), Box::new(plan));
        let out = deliver(&mut r, unit(0, FrameMode::Implicit));
        assert!(out.outgoing_packets.is_empty());
        assert_eq!(out.delivered_data.len(), 1);
        assert_eq!(r.state().expected(), 1);
        assert_eq!(r.stats().acks_lost, 1);
    }

    #[test]
    fn sequenced_mode_rejects_out_of_order() {
        let mut r = GbnReceiver::new(&lossless(FrameMode::Sequenced), Box::new(PerfectChannel));

        // Nothing accepted yet: no ack to repeat.
        let out = deliver(&mut r, unit(1, FrameMode::Sequenced));
        assert!(out.outgoing_packets.is_empty());
        assert_eq!(r.state().expected(), 0);

        deliver(&mut r, unit(0, FrameMode::Sequenced));
        let out = deliver(&mut r, unit(2, FrameMode::Sequenced));
        assert_eq!(acks(&out), vec![0]);
        assert!(out.delivered_data.is_empty());

        let out = deliver(&mut r, unit(1, FrameMode::Sequenced));
        assert_eq!(acks(&out), vec![1]);
        assert_eq!(r.stats().rejected, 2);
        assert_eq!(r.state().expected(), 2);
    }

    #[test]
    fn sequenced_mode_strips_prefix_before_delivery() {
        let mut r = GbnReceiver::new(&lossless(FrameMode::Sequenced), Box::new(PerfectChannel));
        let out = deliver(&mut r, unit(0, FrameMode::Sequenced));
        assert_eq!(out.delivered_data, vec![b"XXXX".to_vec()]);
    }

    #[test]
    fn truncated_sequenced_frame_is_malformed() {
        let mut r = GbnReceiver::new(&lossless(FrameMode::Sequenced), Box::new(PerfectChannel));
        let out = deliver(&mut r, Packet::data(0, Bytes::from_static(&[0, 0])));
        assert!(out.outgoing_packets.is_empty());
        assert_eq!(r.stats().malformed, 1);
    }

    #[test]
    fn receiver_state_consults_oracle_once_per_point() {
        let mut state = ReceiverState::new(&lossless(FrameMode::Implicit));
        let mut plan = FaultPlan::new();
        let outcome = state.on_unit_received(&mut plan, &Bytes::from_static(b"X"));
        assert!(matches!(
            outcome,
            ReceiveOutcome::Accepted { ack: 0, ack_lost: false, .. }
        ));
        assert!(plan.fired().is_empty());
    }
}
