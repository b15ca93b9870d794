use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use prober::{ProbeServer, Prober, RpcClient};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "prober")]
#[command(about = "Multi-protocol blockchain RPC health prober", long_about = None)]
struct Cli {
    /// REST server bind address
    #[arg(long, env = "PROBER_ADDR", default_value = "0.0.0.0:9000")]
    addr: String,

    /// RPC server bind address
    #[arg(long, env = "PROBER_RPC_ADDR", default_value = "0.0.0.0:9001")]
    rpc_addr: String,

    /// Seconds allowed to establish a connection to a target
    #[arg(long, env = "PROBER_CONNECT_TIMEOUT", default_value_t = 5)]
    connect_timeout: u64,

    /// Seconds allowed to read a reply from a target
    #[arg(long, env = "PROBER_READ_TIMEOUT", default_value_t = 15)]
    read_timeout: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;

    let rpc = RpcClient::new(
        Duration::from_secs(cli.connect_timeout),
        Duration::from_secs(cli.read_timeout),
    )?;
    let prober = Prober::new(rpc);

    tracing::info!(
        "Starting prober (connect timeout {}s, read timeout {}s)",
        cli.connect_timeout,
        cli.read_timeout
    );

    // Start RPC server in background
    let rpc_addr = cli.rpc_addr.parse()?;
    let (_rpc_handle, _rpc_local_addr) =
        prober::rpc::start_rpc_server(rpc_addr, prober.clone()).await?;

    ProbeServer::new(prober)
        .with_prometheus(prometheus_handle)
        .serve(&cli.addr)
        .await?;

    Ok(())
}
