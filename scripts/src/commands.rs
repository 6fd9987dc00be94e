//! Implementations of the various deploy scripts.
//!
//! Each lifecycle operation follows the same sequence: resolve the contract
//! artifact (before any network traffic), broadcast the lifecycle
//! transaction(s), await the configured confirmations, then print the
//! resulting address and append a record to the deployments ledger.

use std::{path::Path, str::FromStr};

use ethers::{
    abi::Token,
    types::{Address, H256},
};
use tracing::{info, warn};

use crate::{
    artifacts::ArtifactRegistry,
    chain::{Chain, ConfirmationPolicy},
    config::NetworkProfile,
    constants::{
        NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT, PROXY_ADMIN_STORAGE_SLOT,
        PROXY_IMPLEMENTATION_STORAGE_SLOT,
    },
    errors::ScriptError,
    explorer::Explorer,
    solidity::{
        decode_proxiable_uuid, proxiable_uuid_calldata, upgrade_and_call_calldata,
        upgrade_to_and_call_calldata,
    },
    types::{DeploymentMode, DeploymentRecord, ProxyKind, VerificationRequest},
    utils::{constructor_tokens, initializer_calldata, write_deployment_record},
};

/// The configuration shared by every lifecycle operation, constructed once at
/// process start and passed by reference
pub struct DeployContext<'a> {
    /// The active network profile
    pub profile: &'a NetworkProfile,
    /// The artifact registry the contract names resolve against
    pub registry: &'a ArtifactRegistry,
    /// The confirmation policy applied to every lifecycle transaction
    pub policy: ConfirmationPolicy,
    /// The path of the deployments ledger
    pub deployments_path: &'a Path,
}

/// Deploy a contract directly, without a proxy
pub async fn deploy_fresh<C: Chain>(
    ctx: &DeployContext<'_>,
    chain: &C,
    contract_name: &str,
    constructor_args: &[String],
) -> Result<DeploymentRecord, ScriptError> {
    let artifact = ctx.registry.resolve(contract_name)?;
    let tokens = constructor_tokens(artifact, constructor_args)?;

    info!(contract = contract_name, "deploying contract");
    let deployment = chain
        .deploy_contract(artifact, tokens, &ctx.policy)
        .await?;

    println!("{} deployed to {:#x}", contract_name, deployment.address);

    let record = DeploymentRecord {
        contract_name: contract_name.to_string(),
        address: deployment.address,
        transaction_hash: deployment.transaction_hash,
        confirmations: ctx.policy.confirmations,
        mode: DeploymentMode::Fresh,
        implementation: None,
        proxy_admin: None,
    };
    write_deployment_record(ctx.deployments_path, &record)?;

    Ok(record)
}

/// Deploy a contract behind an upgradeable proxy.
///
/// Two transactions are broadcast: the implementation, then the proxy wired
/// to it. The returned record carries the proxy's address; callers interact
/// with the proxy, never the implementation.
pub async fn deploy_proxy<C: Chain>(
    ctx: &DeployContext<'_>,
    chain: &C,
    contract_name: &str,
    kind: ProxyKind,
    init_args: &[String],
    owner: Option<Address>,
) -> Result<DeploymentRecord, ScriptError> {
    let implementation = ctx.registry.resolve(contract_name)?;
    let proxy_artifact = ctx.registry.resolve(kind.proxy_contract())?;
    let init_data = initializer_calldata(implementation, init_args)?;

    info!(contract = contract_name, "deploying implementation");
    let impl_deployment = chain
        .deploy_contract(implementation, Vec::new(), &ctx.policy)
        .await?;

    let data = init_data.clone().unwrap_or_default().to_vec();
    let constructor_args = match kind {
        // TransparentUpgradeableProxy(implementation, initialOwner, data);
        // the proxy constructs its own ProxyAdmin owned by `initialOwner`
        ProxyKind::Transparent => {
            let owner = match owner {
                Some(owner) => owner,
                None => chain.deployer_address()?,
            };
            vec![
                Token::Address(impl_deployment.address),
                Token::Address(owner),
                Token::Bytes(data),
            ]
        }
        // ERC1967Proxy(implementation, data)
        ProxyKind::Uups => vec![
            Token::Address(impl_deployment.address),
            Token::Bytes(data),
        ],
    };

    info!(contract = contract_name, kind = %kind, "deploying proxy");
    let proxy_deployment = chain
        .deploy_contract(proxy_artifact, constructor_args, &ctx.policy)
        .await
        .map_err(|e| match e {
            // The proxy constructor delegatecalls the initializer; a revert
            // here is the initializer's, not the factory's
            ScriptError::ContractInteraction(msg) if init_data.is_some() => {
                ScriptError::Initialization(msg)
            }
            other => other,
        })?;

    println!(
        "{} proxy deployed to {:#x}",
        contract_name, proxy_deployment.address
    );

    // For transparent proxies, recover the admin contract address.
    // This is the recommended way to get the proxy admin address:
    // https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/ERC1967/ERC1967Utils.sol#L104-L106
    let proxy_admin = match kind {
        ProxyKind::Transparent => {
            let admin = address_in_slot(
                chain
                    .get_storage_at(proxy_deployment.address, admin_slot())
                    .await?,
            );
            println!("Proxy admin contract deployed at {:#x}", admin);
            Some(admin)
        }
        ProxyKind::Uups => None,
    };

    let record = DeploymentRecord {
        contract_name: contract_name.to_string(),
        address: proxy_deployment.address,
        transaction_hash: proxy_deployment.transaction_hash,
        confirmations: ctx.policy.confirmations,
        mode: DeploymentMode::Proxy,
        implementation: Some(impl_deployment.address),
        proxy_admin,
    };
    write_deployment_record(ctx.deployments_path, &record)?;

    Ok(record)
}

/// Upgrade an existing proxy to a new implementation.
///
/// The proxy keeps its storage and its address; the returned record's address
/// always equals `proxy`.
pub async fn upgrade_proxy<C: Chain>(
    ctx: &DeployContext<'_>,
    chain: &C,
    proxy: Address,
    new_contract_name: &str,
) -> Result<DeploymentRecord, ScriptError> {
    let new_artifact = ctx.registry.resolve(new_contract_name)?;

    // Recognize the proxy before spending gas: an ERC-1967 proxy always has
    // an implementation recorded in its well-known slot
    let implementation_slot = chain.get_storage_at(proxy, impl_slot()).await?;
    if implementation_slot.is_zero() {
        return Err(ScriptError::InvalidProxy(format!(
            "{:#x} does not reference an ERC-1967 proxy",
            proxy
        )));
    }
    let admin_word = chain.get_storage_at(proxy, admin_slot()).await?;

    info!(contract = new_contract_name, "deploying new implementation");
    let new_impl = chain
        .deploy_contract(new_artifact, Vec::new(), &ctx.policy)
        .await?;

    let transaction_hash = if !admin_word.is_zero() {
        // Transparent proxy: upgrades go through the admin contract. Storage
        // layout safety for this path is the external upgrade checker's
        // concern and is trusted here.
        let admin = address_in_slot(admin_word);
        info!(admin = ?admin, "upgrading transparent proxy");
        chain
            .send_transaction(
                admin,
                upgrade_and_call_calldata(proxy, new_impl.address, Vec::new()),
                &ctx.policy,
            )
            .await?
    } else {
        // UUPS proxy: the implementation must attest, via ERC-1822, that it
        // preserves the proxy's storage contract
        let uuid = chain
            .call(new_impl.address, proxiable_uuid_calldata())
            .await
            .map_err(|e| match e {
                ScriptError::ContractInteraction(msg) => ScriptError::StorageLayout(format!(
                    "`{}` does not implement proxiableUUID: {}",
                    new_contract_name, msg
                )),
                other => other,
            })
            .and_then(|ret| decode_proxiable_uuid(&ret))?;

        if uuid != impl_slot() {
            return Err(ScriptError::StorageLayout(format!(
                "`{}` reports proxiableUUID {:#x}, expected the ERC-1967 implementation slot",
                new_contract_name, uuid
            )));
        }

        info!("upgrading UUPS proxy");
        chain
            .send_transaction(
                proxy,
                upgrade_to_and_call_calldata(new_impl.address, Vec::new()),
                &ctx.policy,
            )
            .await?
    };

    println!(
        "{} upgraded; proxy remains at {:#x}",
        new_contract_name, proxy
    );

    let record = DeploymentRecord {
        contract_name: new_contract_name.to_string(),
        address: proxy,
        transaction_hash,
        confirmations: ctx.policy.confirmations,
        mode: DeploymentMode::Upgrade,
        implementation: Some(new_impl.address),
        proxy_admin: None,
    };
    write_deployment_record(ctx.deployments_path, &record)?;

    Ok(record)
}

/// Submit a verification request to the block explorer.
///
/// Verification is independent of the lifecycle operations: its failure is
/// reported but never invalidates a completed deployment.
pub async fn verify_contract<E: Explorer>(
    explorer: &E,
    request: &VerificationRequest,
) -> Result<(), ScriptError> {
    let outcome = explorer.verify(request).await?;
    info!(address = ?request.address, outcome = %outcome, "contract verification complete");

    println!("Contract address verified: {:#x}", request.address);
    Ok(())
}

/// Run the optional post-deploy verification step, isolating any failure from
/// the already-completed deployment
pub async fn verify_after_deploy<E: Explorer>(
    explorer: Option<&E>,
    request: VerificationRequest,
) {
    match explorer {
        Some(explorer) => {
            if let Err(e) = verify_contract(explorer, &request).await {
                warn!(error = %e, "verification failed; the deployment is unaffected");
            }
        }
        None => warn!("no explorer configured for this network; skipping verification"),
    }
}

/// The EIP-1967 admin slot as an `H256`
fn admin_slot() -> H256 {
    // Can `unwrap` here since we know the slot constant constitutes a valid H256
    H256::from_str(PROXY_ADMIN_STORAGE_SLOT).unwrap()
}

/// The EIP-1967 implementation slot as an `H256`
fn impl_slot() -> H256 {
    // Can `unwrap` here since we know the slot constant constitutes a valid H256
    H256::from_str(PROXY_IMPLEMENTATION_STORAGE_SLOT).unwrap()
}

/// Extract the address stored in the low 20 bytes of a storage word
fn address_in_slot(word: H256) -> Address {
    Address::from_slice(&word[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..NUM_BYTES_STORAGE_SLOT])
}
