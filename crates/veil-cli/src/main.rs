use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use veil_cli::config::{Cli, Command, HostArgs, PublishArgs, RetrieveArgs};
use veil_cli::output;
use veil_crypto::AccessRegistry;
use veil_logging::VeilSubscriberBuilder;
use veil_node::{NodeConfig, Orchestrator, SessionFailure};
use veil_swarm::{DirectorySwarm, SwarmConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed
    let _log_guard = VeilSubscriberBuilder::new()
        .with_config(cli.log_config())
        .init()?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping session");
                interrupt.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
        }
    });

    let registry = Arc::new(AccessRegistry::new());

    match cli.command {
        Command::Publish(args) => publish(args, registry).await,
        Command::Host(args) => host(args, registry, token).await,
        Command::Retrieve(args) => retrieve(args, registry, token).await,
    }
}

fn orchestrator(
    config: NodeConfig,
    swarm: SwarmConfig,
    registry: Arc<AccessRegistry>,
) -> Orchestrator<DirectorySwarm> {
    Orchestrator::new(config, registry, Arc::new(DirectorySwarm::new(swarm)))
}

/// Session failures carry their kind so scripts can tell them apart
fn failed(failure: SessionFailure) -> anyhow::Error {
    anyhow!("{} [{}]", failure, failure.kind())
}

async fn publish(args: PublishArgs, registry: Arc<AccessRegistry>) -> anyhow::Result<()> {
    let orchestrator = orchestrator(args.node_config(), SwarmConfig::default(), registry);
    let receipt = orchestrator.publish(args.request()).await.map_err(failed)?;
    print!("{}", output::publish_summary(&receipt));
    Ok(())
}

async fn host(
    args: HostArgs,
    registry: Arc<AccessRegistry>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let orchestrator = orchestrator(NodeConfig::default(), args.swarm.swarm_config(), registry);
    let report = orchestrator
        .host(args.request(), token)
        .await
        .map_err(failed)?;
    print!("{}", output::host_summary(&report));
    Ok(())
}

async fn retrieve(
    args: RetrieveArgs,
    registry: Arc<AccessRegistry>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let orchestrator = orchestrator(args.node_config(), args.swarm.swarm_config(), registry);
    let report = orchestrator
        .retrieve(args.request(), token)
        .await
        .map_err(failed)?;
    print!("{}", output::retrieve_summary(&report));
    Ok(())
}
