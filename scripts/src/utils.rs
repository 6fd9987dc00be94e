//! Utilities for the deploy scripts: the deployments ledger and
//! ABI argument handling

use std::{fs, path::Path, str::FromStr};

use ethers::{
    abi::{
        token::{LenientTokenizer, Tokenizer},
        Param, Token,
    },
    types::{Address, Bytes},
};

use crate::{
    artifacts::ContractArtifact,
    constants::INITIALIZER_METHOD,
    errors::ScriptError,
    types::{DeploymentRecord, DeploymentsFile},
};

// ----------
// | Ledger |
// ----------

/// Read the deployments ledger, treating a missing file as empty
pub fn read_deployments(path: &Path) -> Result<DeploymentsFile, ScriptError> {
    if !path.exists() {
        return Ok(DeploymentsFile::default());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;

    serde_json::from_str(&contents).map_err(|e| ScriptError::ReadDeployments(e.to_string()))
}

/// Upsert a record into the deployments ledger, keyed by contract name
pub fn write_deployment_record(path: &Path, record: &DeploymentRecord) -> Result<(), ScriptError> {
    let mut ledger = read_deployments(path)?;
    ledger
        .deployments
        .insert(record.contract_name.clone(), record.clone());

    let contents = serde_json::to_string_pretty(&ledger)
        .map_err(|e| ScriptError::Serde(e.to_string()))?;

    fs::write(path, contents).map_err(|e| ScriptError::WriteDeployments(e.to_string()))
}

// -----------------
// | ABI arguments |
// -----------------

/// Parse an address from its CLI string form
pub fn parse_address(s: &str) -> Result<Address, ScriptError> {
    Address::from_str(s)
        .map_err(|e| ScriptError::CalldataConstruction(format!("invalid address `{}`: {}", s, e)))
}

/// Tokenize CLI strings against the artifact's constructor signature.
///
/// A contract without an explicit constructor accepts no arguments.
pub fn constructor_tokens(
    artifact: &ContractArtifact,
    args: &[String],
) -> Result<Vec<Token>, ScriptError> {
    match artifact.abi.constructor() {
        Some(constructor) => tokenize_args(&constructor.inputs, args),
        None if args.is_empty() => Ok(Vec::new()),
        None => Err(ScriptError::CalldataConstruction(format!(
            "`{}` has no constructor but {} argument(s) were given",
            artifact.contract_name,
            args.len()
        ))),
    }
}

/// Build initializer calldata for a proxy deployment.
///
/// Returns `None` when the implementation exposes no initializer and no
/// arguments were given; the proxy is then deployed without an initial call.
pub fn initializer_calldata(
    artifact: &ContractArtifact,
    args: &[String],
) -> Result<Option<Bytes>, ScriptError> {
    let initializer = match artifact.abi.function(INITIALIZER_METHOD) {
        Ok(function) => function,
        Err(_) if args.is_empty() => return Ok(None),
        Err(_) => {
            return Err(ScriptError::CalldataConstruction(format!(
                "`{}` has no `{}` method but initializer argument(s) were given",
                artifact.contract_name, INITIALIZER_METHOD
            )))
        }
    };

    let tokens = tokenize_args(&initializer.inputs, args)?;
    let calldata = initializer
        .encode_input(&tokens)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;

    Ok(Some(Bytes::from(calldata)))
}

/// Tokenize CLI strings against the given parameter list
fn tokenize_args(params: &[Param], args: &[String]) -> Result<Vec<Token>, ScriptError> {
    if params.len() != args.len() {
        return Err(ScriptError::CalldataConstruction(format!(
            "expected {} argument(s), got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            LenientTokenizer::tokenize(&param.kind, arg).map_err(|e| {
                ScriptError::CalldataConstruction(format!(
                    "argument `{}` does not parse as {}: {}",
                    arg, param.kind, e
                ))
            })
        })
        .collect()
}
