//! AuxPow mining daemon
//!
//! Runs a development chain and serves the mining RPC interface on it.

use auxpow_miner::chain::PeerNetwork;
use auxpow_miner::node::DevNode;
use auxpow_miner::rpc::{self, RpcState};
use auxpow_miner::utils::init_logging;
use auxpow_miner::{Config, MiningSession, Result, APP_NAME, APP_VERSION};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().await?;

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    init_logging(config.log_level, config.log_format);
    info!("Starting {} v{}", APP_NAME, APP_VERSION);
    info!(
        network = %config.network,
        chain_id = config.aux_chain_id,
        mine_on_demand = config.mine_on_demand,
        "Mining configuration"
    );

    let node = Arc::new(DevNode::new(config.dev_node_config()?));
    let network: Option<Arc<dyn PeerNetwork>> = if config.disable_networking {
        info!("Peer-to-peer layer disabled, mining requests will be refused");
        None
    } else {
        Some(node.clone() as Arc<dyn PeerNetwork>)
    };

    let session = Arc::new(MiningSession::new(
        config.chain_params(),
        node.clone(),
        node.clone(),
        node.clone(),
        network,
    ));
    let state = RpcState::new(session, config.network.into(), config.payout_script()?);

    let cancellation = CancellationToken::new();
    let shutdown = cancellation.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });

    rpc::serve(state, config.rpc_socket_addr()?, cancellation).await?;
    info!(height = node.height(), "Stopped");
    Ok(())
}

/// Print current configuration
fn print_configuration(config: &Config) -> Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}
