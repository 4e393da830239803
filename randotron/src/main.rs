use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use tracing::info;
use veilrps_client::{
    shutdown, telemetry::LogArgs, ConnectionArgs, Ledger, LedgerClient, RelayerEncryptor,
};
use veilrps_randotron::{Agent, SEED_LENGTH};

#[derive(Parser, Debug)]
#[command(author, version, about = "Join open veilrps games and play random moves")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    log: LogArgs,

    /// Scan logs from this block (replays earlier events)
    #[arg(long)]
    from_block: Option<u64>,

    /// Hex seed for move selection (random when omitted)
    #[arg(long)]
    seed: Option<String>,
}

fn parse_seed(seed: Option<&str>) -> Result<[u8; SEED_LENGTH]> {
    let mut bytes = [0u8; SEED_LENGTH];
    match seed {
        Some(seed) => {
            let decoded = hex::decode(seed.trim_start_matches("0x")).context("seed must be hex")?;
            bytes = decoded
                .try_into()
                .map_err(|_| anyhow::anyhow!("seed must be exactly {SEED_LENGTH} bytes"))?;
        }
        None => rand::rngs::OsRng.fill_bytes(&mut bytes),
    }
    Ok(bytes)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.connection.validate().context("invalid configuration")?;
    let seed = parse_seed(args.seed.as_deref())?;
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
    info!(
        account = %ledger.account(),
        contract = %ledger.contract(),
        seed = hex::encode(seed),
        "Starting randotron"
    );

    let encryptor = RelayerEncryptor::new(&config.gateway_url, config.gateway_timeout)
        .context("failed to build relayer client")?;
    let events = ledger.game_created(config.scan(args.from_block));
    let agent = Agent::new(ledger, encryptor, seed);
    let aborted = agent
        .run(events, shutdown::signal(), config.drain_timeout)
        .await;
    info!(aborted, "randotron stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        let seed = parse_seed(Some(&format!("0x{}", "01".repeat(SEED_LENGTH)))).unwrap();
        assert_eq!(seed, [1u8; SEED_LENGTH]);
        assert!(parse_seed(Some("0102")).is_err());
        assert!(parse_seed(Some("zz")).is_err());
        assert_ne!(parse_seed(None).unwrap(), parse_seed(None).unwrap());
    }
}
