use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use failover::{
    billing, config::parse_window, FailoverConfig, JsonCatalog, PhdGateway,
    PrometheusOracle, Selector, SystemClock, Timeouts,
};
use jsonrpsee::http_client::HttpClientBuilder;
use prober_api::ProberApiClient;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "failover")]
#[command(about = "Picks a healthy altruist per chain and publishes it to the gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON catalog of chains, altruists and the serving log
    #[arg(
        long,
        env = "FAILOVER_CATALOG",
        default_value = "./failover/catalog.json",
        global = true
    )]
    catalog: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Args)]
struct TimeoutArgs {
    /// Seconds allowed to establish a connection
    #[arg(long, env = "FAILOVER_CONNECT_TIMEOUT", default_value_t = 5)]
    connect_timeout: u64,

    /// Seconds allowed to read a reply
    #[arg(long, env = "FAILOVER_READ_TIMEOUT", default_value_t = 15)]
    read_timeout: u64,
}

impl TimeoutArgs {
    fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout),
            read: Duration::from_secs(self.read_timeout),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one selection cycle; exits 1 if any chain had an error
    Run {
        /// Only process these chains
        #[arg(long = "chain")]
        chains: Vec<String>,

        /// Prometheus-compatible query API serving the probe results
        #[arg(long, env = "VM_ADDRESS")]
        oracle_url: String,

        /// Gateway config API
        #[arg(long, env = "PHD_BASE_URL")]
        gateway_url: String,

        #[arg(long, env = "PHD_API_KEY", hide_env_values = true)]
        gateway_api_key: String,

        /// Altruists whose URL contains this domain are tried first
        #[arg(long, env = "CC_DOMAIN")]
        preferred_domain: Option<String>,

        /// Trailing window the altruist must have been healthy for
        #[arg(long, default_value = "30m", value_parser = parse_window)]
        health_window: String,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },
    /// Print served time per altruist as JSON
    Report {
        /// First day, YYYY-MM-DD (default: first day of the current month)
        #[arg(long)]
        start: Option<String>,

        /// Last instant, YYYY-MM-DD (default: now)
        #[arg(long)]
        finish: Option<String>,

        #[arg(long, env = "CC_DOMAIN")]
        preferred_domain: Option<String>,
    },
    /// Probe an altruist through a running prober and print the record
    Probe {
        /// Prober JSON-RPC address
        #[arg(long, default_value = "http://127.0.0.1:9001")]
        prober_rpc: String,

        #[arg(long)]
        chain: String,

        #[arg(long)]
        url: String,
    },
    /// Register a chain
    AddChain {
        chain_id: String,
        chain_name: String,
    },
    /// Register an altruist for a chain
    AddAltruist {
        chain_id: String,
        url: String,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Disable an altruist; it is kept for the serving history
    Disable { altruist_id: u64 },
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

    match cli.command {
        Commands::Run {
            chains,
            oracle_url,
            gateway_url,
            gateway_api_key,
            preferred_domain,
            health_window,
            timeouts,
        } => {
            let config = FailoverConfig {
                oracle_url,
                gateway_url,
                gateway_api_key,
                preferred_domain,
                health_window,
                timeouts: timeouts.timeouts(),
            };
            let degraded = run_command(&cli.catalog, config, &chains).await?;
            if degraded {
                std::process::exit(1);
            }
        }
        Commands::Report {
            start,
            finish,
            preferred_domain,
        } => report_command(&cli.catalog, start, finish, preferred_domain).await?,
        Commands::Probe {
            prober_rpc,
            chain,
            url,
        } => {
            let client = HttpClientBuilder::default().build(&prober_rpc)?;
            let record = client.probe(url, chain).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::AddChain {
            chain_id,
            chain_name,
        } => {
            let chain = JsonCatalog::open(&cli.catalog)?
                .add_chain(&chain_id, &chain_name)
                .await?;
            println!("{}", serde_json::to_string_pretty(&chain)?);
        }
        Commands::AddAltruist {
            chain_id,
            url,
            owner,
        } => {
            let altruist = JsonCatalog::open(&cli.catalog)?
                .add_altruist(&chain_id, &url, owner)
                .await?;
            println!("{}", serde_json::to_string_pretty(&altruist)?);
        }
        Commands::Disable { altruist_id } => {
            JsonCatalog::open(&cli.catalog)?
                .set_enabled(altruist_id, false)
                .await?;
        }
    }

    Ok(())
}

/// Returns whether the cycle is degraded
async fn run_command(
    catalog: &str,
    config: FailoverConfig,
    chains: &[String],
) -> eyre::Result<bool> {
    let catalog = Arc::new(JsonCatalog::open(catalog)?);
    let client = config.timeouts.http_client()?;
    let oracle = PrometheusOracle::new(client.clone(), config.oracle_url, config.health_window);
    let gateway = PhdGateway::new(client, config.gateway_url, config.gateway_api_key);

    let selector = Selector::new(
        catalog,
        Arc::new(oracle),
        Arc::new(gateway),
        Arc::new(SystemClock),
    )
    .with_preferred_domain(config.preferred_domain);

    let report = selector.run(chains).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_degraded() {
        tracing::error!("Selection cycle finished with {} error(s)", report.error_count());
    }
    Ok(report.is_degraded())
}

async fn report_command(
    catalog: &str,
    start: Option<String>,
    finish: Option<String>,
    preferred_domain: Option<String>,
) -> eyre::Result<()> {
    let catalog = JsonCatalog::open(catalog)?;
    let now = Utc::now();
    let start = match start {
        Some(day) => billing::parse_day(&day)?,
        None => billing::month_start(now),
    };
    let finish = match finish {
        Some(day) => billing::parse_day(&day)?,
        None => now,
    };

    let rows =
        billing::billing_report(&catalog, start, finish, preferred_domain.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&rows)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_timeouts_from_environment() {
        let cli = Cli::command();
        cli.clone().debug_assert();

        let run = cli.find_subcommand("run").unwrap();
        let env = |id: &str| {
            run.get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|name| name.to_string_lossy().into_owned())
        };
        assert_eq!(env("connect_timeout").as_deref(), Some("FAILOVER_CONNECT_TIMEOUT"));
        assert_eq!(env("read_timeout").as_deref(), Some("FAILOVER_READ_TIMEOUT"));
    }
}
