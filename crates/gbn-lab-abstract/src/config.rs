use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::packet::FrameMode;

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("window_size must be at least 1")]
    ZeroWindow,
    #[error("unit_size must be between 1 and {max} bytes, got {got}")]
    UnitSize { got: usize, max: usize },
    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,
    #[error("{name} must lie in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("min_latency ({min}) exceeds max_latency ({max})")]
    LatencyRange { min: u64, max: u64 },
}

/// Parameters of one Go-Back-N transfer, shared by both endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArqConfig {
    /// Maximum number of units outstanding at once (N).
    pub window_size: u32,
    /// Number of units in the stream; sequence numbers run `0..total_units`.
    pub total_units: u32,
    /// Payload size of every unit in bytes.
    pub unit_size: usize,
    /// Retransmission interval in milliseconds.
    pub timeout_ms: u64,
    /// Probability that an ack (sender side) or a data unit (receiver side) is corrupted.
    pub bit_error_prob: f64,
    /// Probability that a data unit or an ack is lost.
    pub packet_loss_prob: f64,
    pub frame_mode: FrameMode,
    /// Give up after this many consecutive timeouts without progress.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    /// Seed for the error oracle. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: 7,
            total_units: 100,
            unit_size: 1024,
            timeout_ms: 1000,
            bit_error_prob: 0.1,
            packet_loss_prob: 0.1,
            frame_mode: FrameMode::Implicit,
            max_retries: None,
            seed: None,
        }
    }
}

impl ArqConfig {
    /// Stop-and-wait is Go-Back-N with a window of one.
    pub fn stop_and_wait() -> Self {
        Self {
            window_size: 1,
            ..Default::default()
        }
    }

    /// An error-free configuration, handy for tests and demos.
    pub fn lossless() -> Self {
        Self {
            bit_error_prob: 0.0,
            packet_loss_prob: 0.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.unit_size == 0 || self.unit_size > MAX_DATAGRAM_PAYLOAD - 4 {
            return Err(ConfigError::UnitSize {
                got: self.unit_size,
                max: MAX_DATAGRAM_PAYLOAD - 4,
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        check_probability("bit_error_prob", self.bit_error_prob)?;
        check_probability("packet_loss_prob", self.packet_loss_prob)?;
        Ok(())
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

/// Channel model applied by the simulator between the two endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            min_latency: 10,
            max_latency: 100,
            seed: 0,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("loss_rate", self.loss_rate)?;
        if self.min_latency > self.max_latency {
            return Err(ConfigError::LatencyRange {
                min: self.min_latency,
                max: self.max_latency,
            });
        }
        Ok(())
    }
}
