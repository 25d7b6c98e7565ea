use anyhow::{Context, anyhow, bail};
use gbn_lab_abstract::{
    ArqConfig, SimConfig, TestAction, TestAssertion, TestScenario,
};
use gbn_lab_core::{GbnReceiver, GbnSender};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

/// Simulated-time bound used when a scenario has no `max_duration` assertion.
pub const DEFAULT_MAX_DURATION_MS: u64 = 600_000;

pub fn load_scenario(path: &Path) -> anyhow::Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse scenario")
}

/// Build a Go-Back-N sender/receiver pair in a simulator configured by the
/// scenario's overrides and deterministic faults.
pub fn build_simulator(scenario: &TestScenario) -> anyhow::Result<Simulator> {
    let mut arq = ArqConfig::default();
    scenario.arq.apply_to(&mut arq);
    arq.validate().context("Invalid [arq] section")?;

    let mut channel = SimConfig::default();
    scenario.channel.apply_to(&mut channel);
    channel.validate().context("Invalid [channel] section")?;

    let sender = GbnSender::from_config(&arq);
    let receiver = GbnReceiver::from_config(&arq);
    let mut sim = Simulator::new(channel, Box::new(sender), Box::new(receiver));

    for action in &scenario.actions {
        match action {
            TestAction::DropNextFromSenderSeq { seq } => sim.add_drop_sender_seq_once(*seq),
            TestAction::DropNextFromReceiverAck { ack } => sim.add_drop_receiver_ack_once(*ack),
        }
    }
    Ok(sim)
}

pub fn run_scenario(path: &Path) -> anyhow::Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_loaded(&scenario)
}

pub fn run_loaded(scenario: &TestScenario) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("Description: {}", scenario.description);
    }

    let mut sim = build_simulator(scenario)?;

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| match a {
            TestAssertion::MaxDuration { ms } => Some(*ms),
            _ => None,
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    if !sim.run_for(max_duration) && !sim.sender_complete() {
        bail!("Test timed out after {} ms", max_duration);
    }

    let report = sim.export_report();
    check_assertions(&scenario.assertions, &report)?;

    info!("Test Scenario Passed!");
    Ok(report)
}

pub fn check_assertions(
    assertions: &[TestAssertion],
    report: &SimulationReport,
) -> anyhow::Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::TransferComplete => {
                if !report.transfer_complete() {
                    return Err(anyhow!(
                        "Assertion Failed: transfer did not complete ({} units delivered)",
                        report.delivered_units
                    ));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                check_range("Sender sent", "packets", report.sender_packet_count, *min, *max)?;
            }
            TestAssertion::TimeoutCount { min, max } => {
                check_range("Sender saw", "timeouts", report.timeouts(), *min, *max)?;
            }
            TestAssertion::DeliveredUnits { min } => {
                if report.delivered_units < *min {
                    return Err(anyhow!(
                        "Assertion Failed: {} units delivered, expected min {}",
                        report.delivered_units,
                        min
                    ));
                }
            }
            TestAssertion::MaxDuration { .. } => {} // Enforced by the run loop
        }
    }
    Ok(())
}

fn check_range(
    subject: &str,
    unit: &str,
    actual: u64,
    min: u64,
    max: Option<u64>,
) -> anyhow::Result<()> {
    if actual < min {
        bail!("Assertion Failed: {subject} {actual} {unit}, expected min {min}");
    }
    if let Some(max) = max
        && actual > max
    {
        bail!("Assertion Failed: {subject} {actual} {unit}, expected max {max}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(body: &str) -> TestScenario {
        toml::from_str(body).unwrap()
    }

    #[test]
    fn failing_assertion_names_itself() {
        let s = scenario(
            r#"
            name = "too strict"
            [arq]
            total_units = 3
            window_size = 3
            packet_loss_prob = 0.0
            bit_error_prob = 0.0
            [[assertions]]
            type = "sender_packet_count"
            min = 0
            max = 2
            "#,
        );
        let err = run_loaded(&s).unwrap_err().to_string();
        assert!(err.contains("Sender sent 3 packets, expected max 2"), "{err}");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let s = scenario(
            r#"
            name = "bad window"
            [arq]
            window_size = 0
            "#,
        );
        assert!(build_simulator(&s).is_err());
    }

    #[test]
    fn unbounded_loss_hits_duration_limit() {
        let s = scenario(
            r#"
            name = "black hole"
            [arq]
            total_units = 2
            packet_loss_prob = 1.0
            bit_error_prob = 0.0
            seed = 1
            [[assertions]]
            type = "max_duration"
            ms = 5000
            "#,
        );
        let err = run_loaded(&s).unwrap_err().to_string();
        assert!(err.contains("timed out after 5000 ms"), "{err}");
    }

    #[test]
    fn completed_transfer_passes_duration_bound_shorter_than_timeout() {
        let s = scenario(
            r#"
            name = "quick finish, long timer"
            [arq]
            total_units = 5
            window_size = 3
            timeout_ms = 1000
            packet_loss_prob = 0.0
            bit_error_prob = 0.0
            [channel]
            min_latency = 10
            max_latency = 10
            [[assertions]]
            type = "transfer_complete"
            [[assertions]]
            type = "max_duration"
            ms = 500
            "#,
        );
        let report = run_loaded(&s).unwrap();
        assert!(report.transfer_complete());
        assert!(report.duration_ms <= 500, "{}", report.duration_ms);
    }
}
