use anyhow::{Context, Result, bail};
use clap::Parser;
use gbn_lab_abstract::EndpointReport;
use gbn_lab_cli::{ArqArgs, ChannelArgs, ConfigFile, init_logging};
use gbn_lab_core::{GbnReceiver, GbnSender};
use gbn_lab_simulator::scenario_runner::{self, DEFAULT_MAX_DURATION_MS};
use gbn_lab_simulator::{SimulationReport, Simulator};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Go-Back-N transfer in a discrete-event simulator")]
struct Args {
    /// Run a scenario file and check its assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Give up after this much simulated time.
    #[arg(long, default_value_t = DEFAULT_MAX_DURATION_MS)]
    max_duration_ms: u64,

    #[command(flatten)]
    arq: ArqArgs,

    #[command(flatten)]
    channel: ChannelArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    info!("gbn-sim starting…");

    let report = match &args.scenario {
        Some(path) => scenario_runner::run_scenario(path)?,
        None => run_default_sim(&args)?,
    };

    if let Some(EndpointReport::Sender(sender)) = &report.sender {
        println!("{}", sender.summary);
    }
    info!(
        "Simulation duration: {} ms | packets sent: {} | deliveries: {}",
        report.duration_ms, report.sender_packet_count, report.delivered_units
    );

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    if !report.transfer_complete() {
        bail!("transfer did not complete");
    }
    Ok(())
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let file = ConfigFile::load_or_default(args.arq.config.as_deref())?;
    let arq = args.arq.resolve(&file)?;
    let channel = args.channel.resolve(&file)?;

    let mut sim = Simulator::new(
        channel,
        Box::new(GbnSender::from_config(&arq)),
        Box::new(GbnReceiver::from_config(&arq)),
    );
    info!(
        "Simulating {} units, window {}, timeout {} ms",
        arq.total_units, arq.window_size, arq.timeout_ms
    );
    if !sim.run_for(args.max_duration_ms) {
        info!("Stopped at the {} ms limit", args.max_duration_ms);
    }
    Ok(sim.export_report())
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
