//! flood-cli - run dam-break flood simulations and publish the flood maps.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flood-cli",
    version,
    about = "Dam-break flood inundation pipeline"
)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: flood_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    flood_cmd::run(cli.command, cli.config.as_deref()).await
}
