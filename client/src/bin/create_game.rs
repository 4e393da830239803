//! Open a new game and print the id the ledger assigned to it.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use veilrps_client::{telemetry::LogArgs, ConnectionArgs, Ledger, LedgerClient};

#[derive(Parser, Debug)]
#[command(author, version, about = "Create a veilrps game")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    log: LogArgs,

    /// Wager recorded with the game
    #[arg(long, default_value = "0")]
    wager: u128,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.connection.validate().context("invalid configuration")?;
    args.log.init().context("invalid log configuration")?;

    let ledger = LedgerClient::connect(
        &config.rpc_url,
        config.signer.clone(),
        config.contract,
        config.chain_id,
        config.confirmations,
    )
    .await
    .context("failed to connect to ledger")?;

    let game_id = ledger
        .create_game(args.wager)
        .await
        .context("createGame failed")?;
    info!(game_id, wager = args.wager, creator = %ledger.account(), "game created");
    println!("{game_id}");
    Ok(())
}
