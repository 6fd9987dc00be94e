//! Entrypoint for the vault contract deploy scripts

use clap::Parser;
use scripts::{
    artifacts::ArtifactRegistry,
    chain::EthersChain,
    cli::Cli,
    commands::DeployContext,
    config::NetworksConfig,
    errors::ScriptError,
    explorer::EtherscanExplorer,
};
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Load configuration, connect to the network, and dispatch the command
async fn run() -> Result<(), ScriptError> {
    let Cli {
        private_key,
        network,
        config,
        artifacts,
        deployments,
        etherscan_api_key,
        command,
    } = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    let networks = NetworksConfig::load(&config)?;
    let (network_name, profile) = networks.select(network.as_deref())?;
    let registry = ArtifactRegistry::load(&artifacts)?;
    info!(
        network = network_name,
        chain_id = profile.chain_id,
        "loaded configuration"
    );

    let chain = EthersChain::connect(profile, &private_key).await?;

    let explorer = profile
        .explorer_api_url
        .as_ref()
        .zip(etherscan_api_key)
        .map(|(api_url, api_key)| EtherscanExplorer::new(api_url.clone(), api_key));

    let ctx = DeployContext {
        profile,
        registry: &registry,
        policy: profile.confirmation_policy(),
        deployments_path: &deployments,
    };

    command.run(&ctx, &chain, explorer.as_ref()).await
}
