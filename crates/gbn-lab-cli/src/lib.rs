use anyhow::Context;
use clap::{Args, ValueEnum};
use gbn_lab_abstract::{ArqConfig, ArqConfigOverride, FrameMode, SimConfig};
use gbn_lab_net::NetConfig;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Layout of a `--config` file. Every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub arq: ArqConfig,
    pub net: NetConfig,
    pub channel: SimConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrameModeArg {
    /// Bare payload; the receiver trusts arrival order.
    Implicit,
    /// 4-byte sequence prefix checked by the receiver.
    Sequenced,
}

impl From<FrameModeArg> for FrameMode {
    fn from(arg: FrameModeArg) -> Self {
        match arg {
            FrameModeArg::Implicit => FrameMode::Implicit,
            FrameModeArg::Sequenced => FrameMode::Sequenced,
        }
    }
}

/// Transfer parameters. Flags override values from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct ArqArgs {
    /// TOML file with optional [arq], [net] and [channel] tables.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Units allowed in flight at once.
    #[arg(long)]
    pub window_size: Option<u32>,

    #[arg(long)]
    pub total_units: Option<u32>,

    /// Payload bytes per unit.
    #[arg(long)]
    pub unit_size: Option<usize>,

    /// Retransmission interval in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(long)]
    pub bit_error_prob: Option<f64>,

    #[arg(long)]
    pub packet_loss_prob: Option<f64>,

    #[arg(long, value_enum)]
    pub frame_mode: Option<FrameModeArg>,

    /// Abort after this many consecutive timeouts without progress.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Seed for the error oracle (OS entropy when omitted).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run with a window of one.
    #[arg(long, default_value_t = false, conflicts_with = "window_size")]
    pub stop_and_wait: bool,
}

impl ArqArgs {
    fn overrides(&self) -> ArqConfigOverride {
        ArqConfigOverride {
            window_size: if self.stop_and_wait {
                Some(1)
            } else {
                self.window_size
            },
            total_units: self.total_units,
            unit_size: self.unit_size,
            timeout_ms: self.timeout_ms,
            bit_error_prob: self.bit_error_prob,
            packet_loss_prob: self.packet_loss_prob,
            frame_mode: self.frame_mode.map(FrameMode::from),
            max_retries: self.max_retries,
            seed: self.seed,
        }
    }

    /// Apply the flags on top of `file` and validate the result.
    pub fn resolve(&self, file: &ConfigFile) -> anyhow::Result<ArqConfig> {
        let mut arq = file.arq.clone();
        self.overrides().apply_to(&mut arq);
        arq.validate().context("Invalid transfer configuration")?;
        Ok(arq)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct NetArgs {
    /// Receiver address (the sender's destination, the receiver's bind address).
    #[arg(long)]
    pub receiver_addr: Option<SocketAddr>,

    /// Local address of the sender's socket.
    #[arg(long)]
    pub sender_bind: Option<SocketAddr>,

    #[arg(long)]
    pub recv_buffer: Option<usize>,

    /// Receiver pause before each ack, in milliseconds.
    #[arg(long)]
    pub reply_delay_ms: Option<u64>,
}

impl NetArgs {
    pub fn resolve(&self, file: &ConfigFile) -> NetConfig {
        let mut net = file.net.clone();
        if let Some(v) = self.receiver_addr {
            net.receiver_addr = v;
        }
        if let Some(v) = self.sender_bind {
            net.sender_bind = v;
        }
        if let Some(v) = self.recv_buffer {
            net.recv_buffer = v;
        }
        if let Some(v) = self.reply_delay_ms {
            net.reply_delay_ms = v;
        }
        net
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChannelArgs {
    /// Probability that the simulated link drops a datagram.
    #[arg(long)]
    pub loss_rate: Option<f64>,

    #[arg(long)]
    pub min_latency: Option<u64>,

    #[arg(long)]
    pub max_latency: Option<u64>,

    /// Seed for the simulated link.
    #[arg(long)]
    pub link_seed: Option<u64>,
}

impl ChannelArgs {
    pub fn resolve(&self, file: &ConfigFile) -> anyhow::Result<SimConfig> {
        let mut channel = file.channel.clone();
        if let Some(v) = self.loss_rate {
            channel.loss_rate = v;
        }
        if let Some(v) = self.min_latency {
            channel.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            channel.max_latency = v;
        }
        if let Some(v) = self.link_seed {
            channel.seed = v;
        }
        channel.validate().context("Invalid channel configuration")?;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        arq: ArqArgs,
        #[command(flatten)]
        net: NetArgs,
        #[command(flatten)]
        channel: ChannelArgs,
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("test").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_reference_constants() {
        let cli = parse(&[]);
        let arq = cli.arq.resolve(&ConfigFile::default()).unwrap();
        assert_eq!(arq, ArqConfig::default());
        let net = cli.net.resolve(&ConfigFile::default());
        assert_eq!(net.receiver_addr, "127.0.0.1:50000".parse().unwrap());
    }

    #[test]
    fn flags_override_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [arq]
            window_size = 4
            total_units = 10

            [net]
            reply_delay_ms = 0
            "#,
        )
        .unwrap();
        let cli = parse(&["--window-size", "9", "--frame-mode", "sequenced"]);
        let arq = cli.arq.resolve(&file).unwrap();
        assert_eq!(arq.window_size, 9);
        assert_eq!(arq.total_units, 10);
        assert_eq!(arq.frame_mode, FrameMode::Sequenced);
        assert_eq!(cli.net.resolve(&file).reply_delay_ms, 0);
    }

    #[test]
    fn stop_and_wait_sets_window_of_one() {
        let cli = parse(&["--stop-and-wait"]);
        let arq = cli.arq.resolve(&ConfigFile::default()).unwrap();
        assert_eq!(arq.window_size, 1);
        assert!(
            Cli::try_parse_from(["test", "--stop-and-wait", "--window-size", "3"]).is_err()
        );
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let cli = parse(&["--packet-loss-prob", "1.5"]);
        assert!(cli.arq.resolve(&ConfigFile::default()).is_err());
    }

    #[test]
    fn inverted_latency_range_is_rejected() {
        let cli = parse(&["--min-latency", "50", "--max-latency", "10"]);
        assert!(cli.channel.resolve(&ConfigFile::default()).is_err());
    }
}
