use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Nothing sent yet.
    Idle,
    /// Room in the window and units left to send.
    Filling,
    /// Window full with units still waiting to be sent.
    AwaitingAck,
    /// Every unit sent, some still unacknowledged.
    Draining,
    /// `base == total_units`.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// `base` moved from `from` to `to`. `drained` means nothing is outstanding.
    Advanced { from: u32, to: u32, drained: bool },
    /// The ack is below `base`.
    Stale,
    /// The ack is at or above `base` but nothing is outstanding to confirm.
    Redundant,
}

/// Invariant: `base <= next_seq <= min(base + window_size, total_units)`.
#[derive(Debug, Clone)]
pub struct SenderWindow {
    base: u32,
    next_seq: u32,
    window_size: u32,
    total_units: u32,
}

impl SenderWindow {
    /// # Panics
    ///
    /// If `window_size` is zero.
    pub fn new(window_size: u32, total_units: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            base: 0,
            next_seq: 0,
            window_size,
            total_units,
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn total_units(&self) -> u32 {
        self.total_units
    }

    /// Right edge of the window, clamped to the end of the stream.
    fn limit(&self) -> u32 {
        let edge = self.base as u64 + self.window_size as u64;
        edge.min(self.total_units as u64) as u32
    }

    /// `true` when a new unit may be transmitted.
    pub fn can_send(&self) -> bool {
        self.next_seq < self.limit()
    }

    /// Claim the next sequence number for transmission.
    pub fn mark_sent(&mut self) -> u32 {
        debug_assert!(self.can_send(), "mark_sent on a full window");
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Units sent but not yet acknowledged.
    pub fn outstanding(&self) -> Range<u32> {
        self.base..self.next_seq
    }

    pub fn in_flight(&self) -> u32 {
        self.next_seq - self.base
    }

    pub fn has_outstanding(&self) -> bool {
        self.base < self.next_seq
    }

    pub fn is_complete(&self) -> bool {
        self.base == self.total_units
    }

    /// Apply cumulative ack `ack`: every unit `<= ack` is confirmed.
    ///
    /// An ack beyond the last transmitted unit confirms everything in flight;
    /// `base` never passes `next_seq`.
    pub fn on_ack(&mut self, ack: u32) -> AckOutcome {
        if ack < self.base {
            return AckOutcome::Stale;
        }
        let to = ack.saturating_add(1).min(self.next_seq);
        if to == self.base {
            return AckOutcome::Redundant;
        }
        let from = self.base;
        self.base = to;
        debug_assert!(self.invariant_holds());
        AckOutcome::Advanced {
            from,
            to,
            drained: self.base == self.next_seq,
        }
    }

    pub fn state(&self) -> SenderState {
        if self.is_complete() {
            SenderState::Complete
        } else if self.next_seq == 0 {
            SenderState::Idle
        } else if self.can_send() {
            SenderState::Filling
        } else if self.next_seq == self.total_units {
            SenderState::Draining
        } else {
            SenderState::AwaitingAck
        }
    }

    pub fn invariant_holds(&self) -> bool {
        self.base <= self.next_seq && self.next_seq <= self.limit()
    }
}
