//! Definitions of errors that can occur during the execution of the contract management scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during the execution of the contract management scripts
#[derive(Debug)]
pub enum ScriptError {
    /// Error loading or validating the network configuration file
    ConfigLoading(String),
    /// Error parsing a compilation artifact
    ArtifactParsing(String),
    /// Error resolving a contract name in the artifact registry
    Resolution(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error reaching the RPC endpoint or broadcasting a transaction
    Network(String),
    /// A transaction was not confirmed within the configured wait window
    ConfirmationTimeout(String),
    /// A proxy initializer call reverted during deployment
    Initialization(String),
    /// The given address does not reference a recognized proxy
    InvalidProxy(String),
    /// The new implementation does not preserve the proxy's storage contract
    StorageLayout(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// The block explorer rejected a verification request
    Verification(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error reading the `deployments.json` file
    ReadDeployments(String),
    /// Error writing the `deployments.json` file
    WriteDeployments(String),
    /// Error de/serializing a value
    Serde(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::ConfigLoading(s) => write!(f, "error loading configuration: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::Resolution(s) => write!(f, "error resolving contract: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::Network(s) => write!(f, "network error: {}", s),
            ScriptError::ConfirmationTimeout(s) => write!(f, "confirmation timeout: {}", s),
            ScriptError::Initialization(s) => write!(f, "error initializing proxy: {}", s),
            ScriptError::InvalidProxy(s) => write!(f, "invalid proxy: {}", s),
            ScriptError::StorageLayout(s) => write!(f, "incompatible storage layout: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::Verification(s) => write!(f, "error verifying contract: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ReadDeployments(s) => write!(f, "error reading deployments: {}", s),
            ScriptError::WriteDeployments(s) => write!(f, "error writing deployments: {}", s),
            ScriptError::Serde(s) => write!(f, "error de/serializing: {}", s),
        }
    }
}

impl Error for ScriptError {}
