use std::fmt;

use serde::Serialize;

/// Sender-side tallies. Every channel error is counted here rather than
/// surfaced as an error: all of them are recovered by retransmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    /// New units attempted (lost or not).
    pub transmissions: u64,
    /// Units re-attempted after a timeout.
    pub retransmissions: u64,
    /// Datagrams actually handed to the transport.
    pub packets_sent: u64,
    /// Attempts swallowed by the loss oracle.
    pub packets_lost: u64,
    /// Acks discarded as corrupted or unparseable.
    pub bit_errors: u64,
    /// Acks below the window base.
    pub stale_acks: u64,
    /// Acks that slid the window.
    pub acks_accepted: u64,
    pub timeouts: u64,
}

impl TransferStats {
    pub fn summary(&self, unit_size: usize, elapsed_ms: u64) -> TransferSummary {
        let bytes_sent = self.packets_sent * unit_size as u64;
        let elapsed_secs = elapsed_ms as f64 / 1000.0;
        let utilization = if bytes_sent == 0 {
            0.0
        } else {
            elapsed_secs / bytes_sent as f64
        };
        TransferSummary {
            stats: *self,
            bytes_sent,
            elapsed_ms,
            utilization,
        }
    }
}

/// End-of-run report printed by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferSummary {
    pub stats: TransferStats,
    pub bytes_sent: u64,
    pub elapsed_ms: u64,
    /// Elapsed seconds per byte sent.
    pub utilization: f64,
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total transfer time: {:.3} seconds",
            self.elapsed_ms as f64 / 1000.0
        )?;
        writeln!(
            f,
            "{} bit errors, {} packet losses, {} timeouts, {} total packets sent (including retransmissions), {} total bytes of data sent",
            self.stats.bit_errors,
            self.stats.packets_lost,
            self.stats.timeouts,
            self.stats.packets_sent,
            self.bytes_sent
        )?;
        write!(f, "Utilization rate: {}", self.utilization)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    pub received: u64,
    pub lost: u64,
    pub corrupted: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub acks_sent: u64,
    pub acks_lost: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SenderReport {
    pub base: u32,
    pub next_seq: u32,
    pub total_units: u32,
    pub complete: bool,
    pub aborted: bool,
    pub summary: TransferSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverReport {
    pub expected: u32,
    pub stats: ReceiverStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum EndpointReport {
    Sender(SenderReport),
    Receiver(ReceiverReport),
}

impl EndpointReport {
    pub fn as_sender(&self) -> Option<&SenderReport> {
        match self {
            EndpointReport::Sender(r) => Some(r),
            EndpointReport::Receiver(_) => None,
        }
    }

    pub fn as_receiver(&self) -> Option<&ReceiverReport> {
        match self {
            EndpointReport::Receiver(r) => Some(r),
            EndpointReport::Sender(_) => None,
        }
    }
}
