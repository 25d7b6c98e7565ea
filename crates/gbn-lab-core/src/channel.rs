use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Where an endpoint consults the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionPoint {
    /// Sender, before (re)transmitting unit `seq`.
    Transmit { seq: u32 },
    /// Sender, on receipt of an ack.
    AckCorruption,
    /// Receiver, on receipt of a data unit.
    ReceiveLoss,
    /// Receiver, after the loss check passed.
    ReceiveCorruption,
    /// Receiver, before sending ack `ack`.
    AckLoss { ack: u32 },
}

pub trait ChannelErrorModel: Send {
    /// Returns `true` when the simulated adverse event fires for this call.
    fn should_fail(&mut self, point: InjectionPoint, probability: f64) -> bool;
}

impl<M: ChannelErrorModel + ?Sized> ChannelErrorModel for Box<M> {
    fn should_fail(&mut self, point: InjectionPoint, probability: f64) -> bool {
        (**self).should_fail(point, probability)
    }
}

/// Independent Bernoulli trials drawn from a seedable RNG.
#[derive(Debug, Clone)]
pub struct BernoulliChannel {
    rng: StdRng,
}

impl BernoulliChannel {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seeded when `seed` is given, OS-seeded otherwise.
    pub fn with_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_os_rng(),
        }
    }
}

impl ChannelErrorModel for BernoulliChannel {
    fn should_fail(&mut self, _point: InjectionPoint, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng.random::<f64>() < probability
    }
}

/// A channel that never misbehaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfectChannel;

impl ChannelErrorModel for PerfectChannel {
    fn should_fail(&mut self, _point: InjectionPoint, _probability: f64) -> bool {
        false
    }
}

/// Deterministic oracle: fires exactly for the scripted one-shot faults and
/// defers every other consultation to the fallback (never fires without one).
#[derive(Default)]
pub struct FaultPlan {
    pending: Vec<InjectionPoint>,
    fired: Vec<InjectionPoint>,
    fallback: Option<Box<dyn ChannelErrorModel>>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next consultation at `point` fire. Registering the same point
    /// twice makes the next two consultations fire.
    pub fn fail_once(mut self, point: InjectionPoint) -> Self {
        self.pending.push(point);
        self
    }

    pub fn with_fallback(mut self, fallback: impl ChannelErrorModel + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Scripted faults that have not fired yet.
    pub fn pending(&self) -> &[InjectionPoint] {
        &self.pending
    }

    pub fn fired(&self) -> &[InjectionPoint] {
        &self.fired
    }
}

impl ChannelErrorModel for FaultPlan {
    fn should_fail(&mut self, point: InjectionPoint, probability: f64) -> bool {
        if let Some(pos) = self.pending.iter().position(|p| *p == point) {
            self.pending.remove(pos);
            self.fired.push(point);
            return true;
        }
        match self.fallback.as_mut() {
            Some(model) => model.should_fail(point, probability),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bernoulli_extremes_are_exact() {
        let mut ch = BernoulliChannel::seeded(1);
        for _ in 0..1000 {
            assert!(!ch.should_fail(InjectionPoint::ReceiveLoss, 0.0));
            assert!(ch.should_fail(InjectionPoint::ReceiveLoss, 1.0));
        }
    }

    #[test]
    fn bernoulli_rate_is_close_to_probability() {
        let mut ch = BernoulliChannel::seeded(7);
        let trials = 20_000;
        let fired = (0..trials)
            .filter(|_| ch.should_fail(InjectionPoint::AckCorruption, 0.1))
            .count();
        let rate = fired as f64 / trials as f64;
        assert!((0.08..0.12).contains(&rate), "rate {rate}");
    }

    #[test]
    fn same_seed_same_decisions() {
        let mut a = BernoulliChannel::seeded(42);
        let mut b = BernoulliChannel::seeded(42);
        for seq in 0..200 {
            let point = InjectionPoint::Transmit { seq };
            assert_eq!(a.should_fail(point, 0.5), b.should_fail(point, 0.5));
        }
    }

    #[test]
    fn fault_plan_fires_once_per_registration() {
        let mut plan = FaultPlan::new()
            .fail_once(InjectionPoint::Transmit { seq: 2 })
            .fail_once(InjectionPoint::AckCorruption);

        assert!(!plan.should_fail(InjectionPoint::Transmit { seq: 1 }, 1.0));
        assert!(plan.should_fail(InjectionPoint::Transmit { seq: 2 }, 0.0));
        assert!(!plan.should_fail(InjectionPoint::Transmit { seq: 2 }, 0.0));
        assert_eq!(plan.pending(), &[InjectionPoint::AckCorruption]);

        assert!(plan.should_fail(InjectionPoint::AckCorruption, 0.0));
        assert!(!plan.should_fail(InjectionPoint::AckCorruption, 0.0));
        assert!(plan.pending().is_empty());
        assert_eq!(plan.fired().len(), 2);
    }

    #[test]
    fn fault_plan_defers_to_fallback() {
        struct Always;
        impl ChannelErrorModel for Always {
            fn should_fail(&mut self, _: InjectionPoint, _: f64) -> bool {
                true
            }
        }
        let mut plan = FaultPlan::new().with_fallback(Always);
        assert!(plan.should_fail(InjectionPoint::ReceiveCorruption, 0.0));
    }
}
