use anyhow::{Result, bail};
use clap::Parser;
use gbn_lab_cli::{ArqArgs, ConfigFile, NetArgs, init_logging};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Go-Back-N sender over UDP")]
struct Args {
    #[command(flatten)]
    arq: ArqArgs,

    #[command(flatten)]
    net: NetArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let file = ConfigFile::load_or_default(args.arq.config.as_deref())?;
    let arq = args.arq.resolve(&file)?;
    let net = args.net.resolve(&file);
    info!(
        "Sending {} units of {} bytes to {} (window {}, timeout {} ms)",
        arq.total_units, arq.unit_size, net.receiver_addr, arq.window_size, arq.timeout_ms
    );

    let report = gbn_lab_net::run_sender(&arq, &net).await?;
    println!("{}", report.summary);

    if report.aborted {
        bail!(
            "transfer aborted with {} of {} units acknowledged",
            report.base,
            report.total_units
        );
    }
    Ok(())
}
