//! The chain-access seam used by the deploy scripts.
//!
//! All network traffic flows through the [`Chain`] trait so that the
//! orchestration sequences can be exercised against a deterministic in-memory
//! fake; [`EthersChain`] is the production implementation over an HTTP
//! JSON-RPC endpoint.

use std::{str::FromStr, sync::Arc, time::Duration};

use ethers::{
    abi::Token,
    contract::{ContractError, ContractFactory},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, H256, U256,
    },
};
use tokio::time::timeout;

use crate::{
    artifacts::ContractArtifact,
    config::NetworkProfile,
    constants::{DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_DEPLOY_CONFIRMATIONS},
    errors::ScriptError,
};

/// How long to wait on a broadcast transaction, and for how many
/// confirmations, before reporting success.
///
/// Once a transaction is broadcast it cannot be retracted; on timeout the
/// scripts only stop waiting for it.
#[derive(Copy, Clone, Debug)]
pub struct ConfirmationPolicy {
    /// The number of confirmations to await
    pub confirmations: usize,
    /// The wall-clock bound on the wait
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_DEPLOY_CONFIRMATIONS,
            timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
        }
    }
}

/// The on-chain result of deploying one contract
#[derive(Copy, Clone, Debug)]
pub struct ChainDeployment {
    /// The deployed contract's address
    pub address: Address,
    /// The hash of the deployment transaction
    pub transaction_hash: H256,
}

/// The chain operations the orchestration sequences are written against
#[allow(async_fn_in_trait)]
pub trait Chain {
    /// The address transactions are signed with
    fn deployer_address(&self) -> Result<Address, ScriptError>;

    /// Deploy a contract from its artifact, awaiting the policy's
    /// confirmations
    async fn deploy_contract(
        &self,
        artifact: &ContractArtifact,
        constructor_args: Vec<Token>,
        policy: &ConfirmationPolicy,
    ) -> Result<ChainDeployment, ScriptError>;

    /// Send a transaction to the given address, awaiting the policy's
    /// confirmations
    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        policy: &ConfirmationPolicy,
    ) -> Result<H256, ScriptError>;

    /// Execute a read-only call against the given address
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ScriptError>;

    /// Read a raw storage slot of the given account
    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256, ScriptError>;
}

/// The signing RPC client type used against live networks
pub type HttpClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// A [`Chain`] over an HTTP JSON-RPC endpoint with a local signing key
pub struct EthersChain {
    /// The underlying signing client
    client: Arc<HttpClient>,
    /// The gas price to attach to transactions, when the profile fixes one
    gas_price: Option<U256>,
    /// The gas limit to attach to transactions, when the profile fixes one
    gas_limit: Option<U256>,
}

impl EthersChain {
    /// Connect to the profile's RPC endpoint and attach the signing key.
    ///
    /// The endpoint's reported chain id must match the profile's; a mismatch
    /// means the configuration points at the wrong network and nothing should
    /// be signed against it.
    pub async fn connect(profile: &NetworkProfile, priv_key: &str) -> Result<Self, ScriptError> {
        let provider = Provider::<Http>::try_from(profile.rpc_url.as_str())
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

        // The parse error is not propagated verbatim so the key material
        // cannot leak into logs or stderr
        let wallet = LocalWallet::from_str(priv_key).map_err(|_| {
            ScriptError::ClientInitialization("invalid deployer private key".to_string())
        })?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?
            .as_u64();

        if chain_id != profile.chain_id {
            return Err(ScriptError::ClientInitialization(format!(
                "endpoint reports chain id {}, profile expects {}",
                chain_id, profile.chain_id
            )));
        }

        let client = Arc::new(SignerMiddleware::new(
            provider,
            wallet.with_chain_id(chain_id),
        ));

        Ok(Self {
            client,
            gas_price: profile.gas_price.map(U256::from),
            gas_limit: profile.gas_limit.map(U256::from),
        })
    }

    /// Attach the profile's gas settings to a transaction
    fn apply_gas(&self, tx: &mut TypedTransaction) {
        if let Some(gas_price) = self.gas_price {
            tx.set_gas_price(gas_price);
        }
        if let Some(gas_limit) = self.gas_limit {
            tx.set_gas(gas_limit);
        }
    }
}

impl Chain for EthersChain {
    fn deployer_address(&self) -> Result<Address, ScriptError> {
        self.client
            .default_sender()
            .ok_or_else(|| {
                ScriptError::ClientInitialization(
                    "client does not have sender attached".to_string(),
                )
            })
    }

    async fn deploy_contract(
        &self,
        artifact: &ContractArtifact,
        constructor_args: Vec<Token>,
        policy: &ConfirmationPolicy,
    ) -> Result<ChainDeployment, ScriptError> {
        let factory = ContractFactory::new(
            artifact.abi.clone(),
            artifact.bytecode.clone(),
            self.client.clone(),
        );

        let mut deployment = factory
            .deploy_tokens(constructor_args)
            .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
        self.apply_gas(&mut deployment.tx);

        let pending = deployment
            .confirmations(policy.confirmations)
            .send_with_receipt();
        let (contract, receipt) = timeout(policy.timeout, pending)
            .await
            .map_err(|_| confirmation_timeout(policy))?
            .map_err(deployment_error)?;

        Ok(ChainDeployment {
            address: contract.address(),
            transaction_hash: receipt.transaction_hash,
        })
    }

    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        policy: &ConfirmationPolicy,
    ) -> Result<H256, ScriptError> {
        let mut tx: TypedTransaction = TransactionRequest::new().to(to).data(calldata).into();
        self.apply_gas(&mut tx);

        let pending = self
            .client
            .send_transaction(tx, None /* block */)
            .await
            .map_err(|e| ScriptError::Network(e.to_string()))?
            .confirmations(policy.confirmations);

        let receipt = timeout(policy.timeout, pending)
            .await
            .map_err(|_| confirmation_timeout(policy))?
            .map_err(|e| ScriptError::Network(e.to_string()))?
            .ok_or_else(|| {
                ScriptError::Network("transaction dropped from the mempool".to_string())
            })?;

        if receipt.status == Some(0.into()) {
            return Err(ScriptError::ContractInteraction(format!(
                "transaction {:#x} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(receipt.transaction_hash)
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ScriptError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(calldata).into();
        self.client
            .call(&tx, None /* block */)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256, ScriptError> {
        self.client
            .get_storage_at(address, slot, None /* block */)
            .await
            .map_err(|e| ScriptError::Network(e.to_string()))
    }
}

/// The error reported when a confirmation wait exceeds the policy's bound
fn confirmation_timeout(policy: &ConfirmationPolicy) -> ScriptError {
    ScriptError::ConfirmationTimeout(format!(
        "{} confirmations not observed within {}s",
        policy.confirmations,
        policy.timeout.as_secs()
    ))
}

/// Classify a factory deployment failure.
///
/// A transaction that was mined but did not leave a contract behind reverted;
/// everything else is an RPC-level failure (unreachable endpoint, underfunded
/// account, rejected broadcast).
fn deployment_error(err: ContractError<HttpClient>) -> ScriptError {
    match err {
        ContractError::ContractNotDeployed => {
            ScriptError::ContractInteraction("deployment transaction reverted".to_string())
        }
        other => ScriptError::Network(other.to_string()),
    }
}
