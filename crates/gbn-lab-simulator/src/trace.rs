use gbn_lab_abstract::{EndpointReport, SimConfig};
use serde::Serialize;
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

/// Serializable snapshot of a finished (or paused) simulation, written by
/// `gbn-sim --trace-out`.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub delivered_units: usize,
    pub delivered_bytes: usize,
    pub sender_packet_count: u64,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
    pub sender: Option<EndpointReport>,
    pub receiver: Option<EndpointReport>,
}

impl SimulationReport {
    pub fn timeouts(&self) -> u64 {
        self.sender
            .as_ref()
            .and_then(EndpointReport::as_sender)
            .map_or(0, |r| r.summary.stats.timeouts)
    }

    pub fn transfer_complete(&self) -> bool {
        self.sender
            .as_ref()
            .and_then(EndpointReport::as_sender)
            .is_some_and(|r| r.complete)
    }
}
