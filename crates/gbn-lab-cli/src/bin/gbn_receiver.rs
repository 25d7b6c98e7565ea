use anyhow::Result;
use clap::Parser;
use gbn_lab_cli::{ArqArgs, ConfigFile, NetArgs, init_logging};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Go-Back-N receiver over UDP; runs until killed")]
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
    info!("Receiver starting on {}", net.receiver_addr);

    gbn_lab_net::run_receiver(&arq, &net).await?;
    Ok(())
}
