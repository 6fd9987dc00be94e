//! Type definitions used throughout the scripts

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use clap::ValueEnum;
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::constants::{ERC1967_PROXY_CONTRACT, TRANSPARENT_PROXY_CONTRACT};

/// The kind of proxy placed in front of an implementation contract
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// A transparent upgradeable proxy, administered by a `ProxyAdmin` contract
    Transparent,
    /// A UUPS proxy, upgraded through the implementation itself
    Uups,
}

impl ProxyKind {
    /// The registry name of the proxy contract deployed for this kind
    pub fn proxy_contract(&self) -> &'static str {
        match self {
            ProxyKind::Transparent => TRANSPARENT_PROXY_CONTRACT,
            ProxyKind::Uups => ERC1967_PROXY_CONTRACT,
        }
    }
}

impl Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Transparent => write!(f, "transparent"),
            ProxyKind::Uups => write!(f, "uups"),
        }
    }
}

/// The lifecycle operation that produced a deployment record
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// A direct, non-proxy deployment
    Fresh,
    /// An implementation deployed behind a new proxy
    Proxy,
    /// An existing proxy repointed to a new implementation
    Upgrade,
}

impl Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Fresh => write!(f, "fresh"),
            DeploymentMode::Proxy => write!(f, "proxy"),
            DeploymentMode::Upgrade => write!(f, "upgrade"),
        }
    }
}

/// The record of one successful lifecycle operation.
///
/// Immutable once created; the address is the proxy's address for proxy
/// deployments and upgrades, never the implementation's.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// The name of the deployed contract
    pub contract_name: String,
    /// The address callers should interact with
    pub address: Address,
    /// The hash of the lifecycle transaction
    pub transaction_hash: H256,
    /// The number of confirmations awaited before reporting success
    pub confirmations: usize,
    /// The lifecycle operation performed
    pub mode: DeploymentMode,
    /// The implementation address, when the mode places one behind a proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
    /// The proxy admin address, for transparent proxy deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_admin: Option<Address>,
}

/// The on-disk shape of the `deployments.json` ledger
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeploymentsFile {
    /// Deployment records, keyed by contract name
    pub deployments: BTreeMap<String, DeploymentRecord>,
}

/// A request to verify a deployed contract on the block explorer
#[derive(Clone, Debug)]
pub struct VerificationRequest {
    /// The address of the deployed contract
    pub address: Address,
    /// ABI-encoded constructor arguments, in hex
    pub constructor_args: Option<String>,
    /// A source-mapping hint of the form `contracts/Vault.sol:Vault`
    pub contract: Option<String>,
}

/// The explorer's disposition of a verification request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The explorer accepted and verified the source
    Verified,
    /// The explorer had already verified source at this address
    AlreadyVerified,
}

impl Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Verified => write!(f, "verified"),
            VerificationOutcome::AlreadyVerified => write!(f, "already verified"),
        }
    }
}
