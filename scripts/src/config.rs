//! Network profile configuration, loaded once at process start.
//!
//! The file mirrors the network table the vault contracts were originally
//! managed with: one profile per named network, one of which is the default.
//! Profiles never carry credentials; the signing key and explorer API key are
//! sourced from the environment.

use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{
    chain::ConfirmationPolicy,
    constants::{DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_DEPLOY_CONFIRMATIONS},
    errors::ScriptError,
};

/// The set of named network profiles available to the scripts
#[derive(Clone, Debug, Deserialize)]
pub struct NetworksConfig {
    /// The profile selected when the CLI does not name one
    pub default_network: String,
    /// The available profiles, keyed by network name
    pub networks: BTreeMap<String, NetworkProfile>,
}

/// A single network profile: where to send transactions and how to pay for them
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkProfile {
    /// The RPC endpoint URL
    pub rpc_url: String,
    /// The chain id the endpoint is expected to report
    pub chain_id: u64,
    /// The gas price to attach to transactions, in wei
    #[serde(default)]
    pub gas_price: Option<u64>,
    /// The gas limit to attach to transactions
    #[serde(default)]
    pub gas_limit: Option<u64>,
    /// The number of confirmations to await after each lifecycle transaction
    #[serde(default)]
    pub confirmations: Option<usize>,
    /// The number of seconds to wait for those confirmations
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,
    /// The block explorer's verification API endpoint, when one exists
    #[serde(default)]
    pub explorer_api_url: Option<String>,
}

impl NetworksConfig {
    /// Load and validate the configuration from the given file
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ScriptError::ConfigLoading(format!("{}: {}", path.display(), e))
        })?;

        let config: NetworksConfig =
            serde_json::from_str(&contents).map_err(|e| ScriptError::ConfigLoading(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Select a profile by name, falling back to the configured default
    pub fn select<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a NetworkProfile), ScriptError> {
        let name = name.unwrap_or(&self.default_network);
        let profile = self.networks.get(name).ok_or_else(|| {
            ScriptError::ConfigLoading(format!("no network profile named `{}`", name))
        })?;

        Ok((name, profile))
    }

    /// Validate the invariants the rest of the scripts rely on
    fn validate(&self) -> Result<(), ScriptError> {
        if !self.networks.contains_key(&self.default_network) {
            return Err(ScriptError::ConfigLoading(format!(
                "default_network `{}` has no profile",
                self.default_network
            )));
        }

        for (name, profile) in &self.networks {
            if profile.rpc_url.is_empty() {
                return Err(ScriptError::ConfigLoading(format!(
                    "network `{}` has an empty rpc_url",
                    name
                )));
            }
            if profile.chain_id == 0 {
                return Err(ScriptError::ConfigLoading(format!(
                    "network `{}` has chain_id 0",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl NetworkProfile {
    /// The confirmation policy for this profile, falling back to the defaults
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: self.confirmations.unwrap_or(DEFAULT_DEPLOY_CONFIRMATIONS),
            timeout: Duration::from_secs(
                self.confirmation_timeout_secs
                    .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            ),
        }
    }
}
