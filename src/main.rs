//! shardmedian CLI entry point

use anyhow::{Context, Result};
use shardmedian::config::cli::{Cli, ExecutionMode};
use shardmedian::config::{toml, validator, Config};
use shardmedian::coordinator::local::{run_local, LocalOptions};
use shardmedian::distributed::{DistributedCoordinator, NodeService};
use shardmedian::output;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    tracing::info!("shardmedian v{}", env!("CARGO_PKG_VERSION"));

    cli.validate()?;
    let config = toml::load_config(&cli)?;
    validator::validate_config(&config, cli.mode)
        .context("Configuration validation failed")?;
    tracing::debug!("{}", config);

    // Every mode drives async channels
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    match cli.mode {
        ExecutionMode::Local => runtime.block_on(run_local_mode(config)),
        ExecutionMode::Coordinator => runtime.block_on(run_coordinator(config)),
        ExecutionMode::Service => runtime.block_on(run_service(config, cli.listen_port)),
    }
}

/// Log to stderr so stdout carries only the report
fn init_logging(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run in local mode (coordinator and workers in this process)
async fn run_local_mode(config: Config) -> Result<()> {
    let options = LocalOptions {
        workers: config.cluster.workers,
        selection: config.selection.rank,
        seed: config.selection.seed,
    };

    let run = run_local(config.shards.source(), options).await?;
    output::emit(&config.output, "local", &run.outcome, &run.reports)
}

/// Run in coordinator mode (remote node services)
async fn run_coordinator(config: Config) -> Result<()> {
    let coordinator = DistributedCoordinator::new(config.cluster.nodes.clone())
        .context("Failed to create coordinator")?
        .with_selection(config.selection.rank)
        .with_seed(config.selection.seed);

    let outcome = coordinator.run().await?;
    output::emit(&config.output, "coordinator", &outcome, &[])
}

/// Run in service mode (host one worker)
async fn run_service(config: Config, listen_port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", listen_port);
    let service = NodeService::bind(addr.as_str(), config.shards.source())
        .await?
        .with_seed(config.selection.seed);

    tracing::info!(
        node = service.node_id(),
        port = listen_port,
        "node service started"
    );
    service.run().await?;
    Ok(())
}
