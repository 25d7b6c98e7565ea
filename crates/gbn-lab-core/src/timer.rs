use gbn_lab_abstract::SystemContext;

/// The single retransmission timer of a Go-Back-N sender.
///
/// Every arm uses a fresh timer id, so an expiry scheduled before a cancel or
/// re-arm can be recognised as stale by [`RetransmitTimer::fire`] even if the
/// driver still delivers it.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    interval_ms: u64,
    current: Option<u32>,
    next_id: u32,
}

impl RetransmitTimer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            current: None,
            next_id: 1,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_armed(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_id(&self) -> Option<u32> {
        self.current
    }

    /// Start a fresh interval, replacing any armed one. Returns the new id.
    pub fn arm(&mut self, ctx: &mut dyn SystemContext) -> u32 {
        self.cancel(ctx);
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        ctx.start_timer(self.interval_ms, id);
        self.current = Some(id);
        id
    }

    pub fn cancel(&mut self, ctx: &mut dyn SystemContext) {
        if let Some(id) = self.current.take() {
            ctx.cancel_timer(id);
        }
    }

    /// Consume an expiry. Returns `false` for ids that are no longer current.
    pub fn fire(&mut self, timer_id: u32) -> bool {
        if self.current == Some(timer_id) {
            self.current = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActionBuffer, ScopedContext};

    #[test]
    fn arm_issues_fresh_ids() {
        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext::new(&mut buffer, 0);
        let mut timer = RetransmitTimer::new(1000);

        let first = timer.arm(&mut ctx);
        let second = timer.arm(&mut ctx);
        assert_ne!(first, second);
        assert_eq!(timer.current_id(), Some(second));

        assert_eq!(buffer.timers_start, vec![(1000, first), (1000, second)]);
        assert_eq!(buffer.timers_cancel, vec![first]);
    }

    #[test]
    fn stale_fire_is_rejected() {
        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext::new(&mut buffer, 0);
        let mut timer = RetransmitTimer::new(500);

        let old = timer.arm(&mut ctx);
        let fresh = timer.arm(&mut ctx);
        assert!(!timer.fire(old));
        assert!(timer.is_armed());
        assert!(timer.fire(fresh));
        assert!(!timer.is_armed());
        assert!(!timer.fire(fresh));
    }

    #[test]
    fn fire_after_cancel_is_rejected() {
        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext::new(&mut buffer, 0);
        let mut timer = RetransmitTimer::new(500);

        let id = timer.arm(&mut ctx);
        timer.cancel(&mut ctx);
        timer.cancel(&mut ctx);
        assert!(!timer.fire(id));
        assert_eq!(buffer.timers_cancel, vec![id]);
    }
}
