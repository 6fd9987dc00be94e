//! Constants used in the deploy scripts

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The storage slot containing the implementation contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The default number of confirmations to wait for after a lifecycle transaction
pub const DEFAULT_DEPLOY_CONFIRMATIONS: usize = 5;

/// The default number of seconds to wait for a transaction's confirmations
/// before giving up on it
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 600;

/// The registry name of the transparent upgradeable proxy contract
pub const TRANSPARENT_PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";

/// The registry name of the ERC-1967 proxy contract used for UUPS deployments
pub const ERC1967_PROXY_CONTRACT: &str = "ERC1967Proxy";

/// The name of the initializer method looked up on implementation contracts
pub const INITIALIZER_METHOD: &str = "initialize";

/// The default path of the network configuration file
pub const DEFAULT_NETWORKS_PATH: &str = "networks.json";

/// The default directory containing compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The default path of the `deployments.json` ledger
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deployments.json";

/// The extension of a compilation artifact file
pub const ARTIFACT_EXTENSION: &str = "json";

/// The suffix of Hardhat debug artifacts, which are skipped when
/// loading the registry
pub const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";

/// The number of seconds between polls of the explorer's verification status
/// endpoint
pub const VERIFICATION_POLL_INTERVAL_SECS: u64 = 5;

/// The maximum number of verification status polls before giving up
pub const MAX_VERIFICATION_POLLS: usize = 10;
