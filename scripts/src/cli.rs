//! Definitions of CLI arguments and commands for deploy scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ethers::abi::encode as abi_encode;

use crate::{
    chain::Chain,
    commands::{
        deploy_fresh, deploy_proxy, upgrade_proxy, verify_after_deploy, verify_contract,
        DeployContext,
    },
    constants::{DEFAULT_ARTIFACTS_DIR, DEFAULT_DEPLOYMENTS_PATH, DEFAULT_NETWORKS_PATH},
    errors::ScriptError,
    explorer::Explorer,
    types::{ProxyKind, VerificationRequest},
    utils::{constructor_tokens, parse_address},
};

/// Deploy, upgrade, and verify the vault contracts
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Private key of the deployer account, sourced from the environment
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// The network profile to target, defaulting to the configuration file's
    /// default
    #[arg(short, long)]
    pub network: Option<String>,

    /// Path to the network configuration file
    #[arg(long, default_value = DEFAULT_NETWORKS_PATH)]
    pub config: PathBuf,

    /// Directory containing the compiled contract artifacts
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts: PathBuf,

    /// Path to the deployments ledger
    #[arg(long, default_value = DEFAULT_DEPLOYMENTS_PATH)]
    pub deployments: PathBuf,

    /// API key for the block explorer's verification service
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// The lifecycle operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// The lifecycle operation to perform
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a contract directly, without a proxy
    Deploy(DeployArgs),
    /// Deploy a contract behind an upgradeable proxy
    DeployProxy(DeployProxyArgs),
    /// Upgrade an existing proxy to a new implementation
    UpgradeProxy(UpgradeProxyArgs),
    /// Verify a deployed contract on the block explorer
    Verify(VerifyArgs),
}

/// Arguments for a direct, non-proxy deployment
#[derive(Args)]
pub struct DeployArgs {
    /// Name of the contract to deploy
    pub contract: String,

    /// Constructor arguments, one per flag, in declaration order
    #[arg(long = "constructor-arg", value_name = "VALUE")]
    pub constructor_args: Vec<String>,

    /// Verify the deployed contract on the block explorer afterwards
    #[arg(long)]
    pub verify: bool,
}

/// Arguments for deploying a contract behind an upgradeable proxy
#[derive(Args)]
pub struct DeployProxyArgs {
    /// Name of the implementation contract to deploy
    pub contract: String,

    /// The kind of proxy to place in front of the implementation
    #[arg(long, value_enum, default_value_t = ProxyKind::Transparent)]
    pub kind: ProxyKind,

    /// Initializer arguments, one per flag, in declaration order
    #[arg(long = "init-arg", value_name = "VALUE")]
    pub init_args: Vec<String>,

    /// Owner of the proxy admin, defaulting to the deployer (transparent
    /// proxies only)
    #[arg(long)]
    pub owner: Option<String>,

    /// Verify the implementation contract on the block explorer afterwards
    #[arg(long)]
    pub verify: bool,
}

/// Arguments for upgrading an existing proxy
#[derive(Args)]
pub struct UpgradeProxyArgs {
    /// Address of the proxy to upgrade, in hex
    pub proxy: String,

    /// Name of the new implementation contract
    pub contract: String,
}

/// Arguments for verifying an already-deployed contract
#[derive(Args)]
pub struct VerifyArgs {
    /// Address of the deployed contract, in hex
    pub address: String,

    /// A source-mapping hint of the form `contracts/Vault.sol:Vault`
    #[arg(long)]
    pub contract: Option<String>,

    /// ABI-encoded constructor arguments, in hex
    #[arg(long)]
    pub constructor_args: Option<String>,
}

impl Command {
    /// Dispatch the parsed command against the configured network
    pub async fn run<C: Chain, E: Explorer>(
        self,
        ctx: &DeployContext<'_>,
        chain: &C,
        explorer: Option<&E>,
    ) -> Result<(), ScriptError> {
        match self {
            Command::Deploy(args) => {
                let record =
                    deploy_fresh(ctx, chain, &args.contract, &args.constructor_args).await?;

                if args.verify {
                    let artifact = ctx.registry.resolve(&args.contract)?;
                    let tokens = constructor_tokens(artifact, &args.constructor_args)?;
                    let constructor_args =
                        (!tokens.is_empty()).then(|| hex::encode(abi_encode(&tokens)));

                    let request = VerificationRequest {
                        address: record.address,
                        constructor_args,
                        contract: Some(artifact.fully_qualified_name()),
                    };
                    verify_after_deploy(explorer, request).await;
                }

                Ok(())
            }

            Command::DeployProxy(args) => {
                let owner = args.owner.as_deref().map(parse_address).transpose()?;
                let record = deploy_proxy(
                    ctx,
                    chain,
                    &args.contract,
                    args.kind,
                    &args.init_args,
                    owner,
                )
                .await?;

                if args.verify {
                    // The proxy bytecode is well-known to explorers; the
                    // implementation is what needs source matching
                    let artifact = ctx.registry.resolve(&args.contract)?;
                    let request = VerificationRequest {
                        // Can `unwrap` here since proxy records always carry
                        // an implementation address
                        address: record.implementation.unwrap(),
                        constructor_args: None,
                        contract: Some(artifact.fully_qualified_name()),
                    };
                    verify_after_deploy(explorer, request).await;
                }

                Ok(())
            }

            Command::UpgradeProxy(args) => {
                let proxy = parse_address(&args.proxy)?;
                upgrade_proxy(ctx, chain, proxy, &args.contract).await?;
                Ok(())
            }

            Command::Verify(args) => {
                let explorer = explorer.ok_or_else(|| {
                    ScriptError::ConfigLoading(
                        "no explorer API URL configured for this network".to_string(),
                    )
                })?;

                let request = VerificationRequest {
                    address: parse_address(&args.address)?,
                    constructor_args: args.constructor_args,
                    contract: args.contract,
                };
                verify_contract(explorer, &request).await
            }
        }
    }
}
