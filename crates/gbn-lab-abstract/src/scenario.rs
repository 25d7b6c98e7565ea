use crate::config::{ArqConfig, SimConfig};
use crate::packet::FrameMode;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arq: ArqConfigOverride,
    #[serde(default)]
    pub channel: SimConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArqConfigOverride {
    pub window_size: Option<u32>,
    pub total_units: Option<u32>,
    pub unit_size: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub bit_error_prob: Option<f64>,
    pub packet_loss_prob: Option<f64>,
    pub frame_mode: Option<FrameMode>,
    pub max_retries: Option<u32>,
    pub seed: Option<u64>,
}

impl ArqConfigOverride {
    pub fn apply_to(&self, config: &mut ArqConfig) {
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.total_units {
            config.total_units = v;
        }
        if let Some(v) = self.unit_size {
            config.unit_size = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = self.bit_error_prob {
            config.bit_error_prob = v;
        }
        if let Some(v) = self.packet_loss_prob {
            config.packet_loss_prob = v;
        }
        if let Some(v) = self.frame_mode {
            config.frame_mode = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = Some(v);
        }
        if let Some(v) = self.seed {
            config.seed = Some(v);
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Drop the first packet the sender emits for unit `seq`.
    DropNextFromSenderSeq { seq: u32 },
    /// Drop the first ack the receiver emits with number `ack`.
    DropNextFromReceiverAck { ack: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Every unit was acknowledged.
    TransferComplete,
    /// Datagrams handed to the channel by the sender, retransmissions included.
    SenderPacketCount { min: u64, max: Option<u64> },
    /// Retransmission timer expiries seen by the sender.
    TimeoutCount { min: u64, max: Option<u64> },
    /// Units delivered to the receiving application.
    DeliveredUnits { min: usize },
    /// The simulation finishes within this many milliseconds.
    MaxDuration { ms: u64 },
}
