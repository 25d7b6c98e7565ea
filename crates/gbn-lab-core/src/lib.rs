pub mod channel;
pub mod context;
pub mod receiver;
pub mod sender;
pub mod timer;
pub mod window;

pub use channel::{BernoulliChannel, ChannelErrorModel, FaultPlan, InjectionPoint, PerfectChannel};
pub use context::{ActionBuffer, ScopedContext};
pub use receiver::{GbnReceiver, ReceiveOutcome, ReceiverState};
pub use sender::GbnSender;
pub use timer::RetransmitTimer;
pub use window::{AckOutcome, SenderState, SenderWindow};
