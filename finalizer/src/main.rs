use anyhow::{Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tracing::info;
use veilrps_client::{
    shutdown, telemetry::LogArgs, ConnectionArgs, GatewayClient, HttpGateway, Ledger,
    LedgerClient,
};
use veilrps_finalizer::{Metrics, Orchestrator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Finalize veilrps games from encrypted moves")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    log: LogArgs,

    /// Scan logs from this block (replays earlier events)
    #[arg(long)]
    from_block: Option<u64>,

    /// Serve Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate before touching the network
    let config = args.connection.validate().context("invalid configuration")?;
    args.log.init().context("invalid log configuration")?;
    info!(?config, from_block = ?args.from_block, "starting finalizer");

    let ledger = LedgerClient::connect(
        &config.rpc_url,
        config.signer.clone(),
        config.contract,
        config.chain_id,
        config.confirmations,
    )
    .await
    .context("failed to connect to ledger")?;

    let transport = HttpGateway::new(config.gateway_url.clone(), config.gateway_timeout)
        .context("failed to build gateway client")?;
    let gateway = GatewayClient::new(
        transport,
        ledger.signer().clone(),
        ledger.contract(),
        config.gateway(),
    );

    let metrics = Metrics::default();
    if let Some(port) = args.metrics_port {
        let mut registry = Registry::default();
        metrics.register(&mut registry);
        veilrps_finalizer::metrics::spawn_server(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            Arc::new(registry),
        );
    }

    let events = ledger.needs_finalization(config.scan(args.from_block));
    let orchestrator = Orchestrator::new(ledger, gateway, metrics);
    let aborted = orchestrator
        .run(events, shutdown::signal(), config.drain_timeout)
        .await;
    info!(aborted, "finalizer stopped");
    Ok(())
}
