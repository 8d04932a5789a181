mod bootstrap_helpers;

use anyhow::Result;
use bootstrap_helpers::init_tracing;
use clap::Parser;
use ticket_cli::Cli;
use ticket_discord_runtime::run_discord_ticket_runtime;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.runtime_config()?;
    run_discord_ticket_runtime(config).await
}
