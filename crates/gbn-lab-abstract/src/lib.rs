pub mod config;
pub mod interface;
pub mod packet;
pub mod report;
pub mod scenario;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{DataFrame, FrameMode, Packet, PacketKind, WireError};

pub use config::{ArqConfig, ConfigError, SimConfig};
pub use report::{
    EndpointReport, ReceiverReport, ReceiverStats, SenderReport, TransferStats, TransferSummary,
};
pub use scenario::{
    ArqConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};
