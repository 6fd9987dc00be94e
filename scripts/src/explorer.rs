//! The block-explorer verification client.
//!
//! The explorer exposes an etherscan-style API: a verification request is
//! submitted and acknowledged with a GUID, then its status is polled until
//! the explorer reports a terminal disposition. Verification runs after a
//! deployment has already succeeded, so nothing here can affect a
//! deployment's outcome.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::info;

use crate::{
    constants::{MAX_VERIFICATION_POLLS, VERIFICATION_POLL_INTERVAL_SECS},
    errors::ScriptError,
    types::{VerificationOutcome, VerificationRequest},
};

/// The verification operations the scripts are written against
#[allow(async_fn_in_trait)]
pub trait Explorer {
    /// Submit a verification request and await its terminal disposition
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationOutcome, ScriptError>;
}

/// The explorer's response envelope: `status` is "1" on acceptance, and
/// `result` carries either the submission GUID or a human-readable status
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    /// "1" for acceptance, "0" for rejection
    status: String,
    /// A short disposition, e.g. "OK" / "NOTOK"
    message: String,
    /// The submission GUID or the verification status text
    result: String,
}

/// An [`Explorer`] over an etherscan-compatible HTTP API
pub struct EtherscanExplorer {
    /// The underlying HTTP client
    http: reqwest::Client,
    /// The explorer's API endpoint
    api_url: String,
    /// The API credential, supplied via the environment
    api_key: String,
}

impl EtherscanExplorer {
    /// Create a client for the given API endpoint and credential
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Submit the verification request, returning the polling GUID or the
    /// already-verified disposition
    async fn submit(
        &self,
        request: &VerificationRequest,
    ) -> Result<Result<String, VerificationOutcome>, ScriptError> {
        let mut form: Vec<(&str, String)> = vec![
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("apikey", self.api_key.clone()),
            ("contractaddress", format!("{:#x}", request.address)),
        ];
        if let Some(args) = &request.constructor_args {
            // The parameter name's misspelling is the API's, not ours
            form.push((
                "constructorArguements",
                args.trim_start_matches("0x").to_string(),
            ));
        }
        if let Some(contract) = &request.contract {
            form.push(("contractname", contract.clone()));
        }

        let response: ExplorerResponse = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ScriptError::Verification(e.to_string()))?
            .json()
            .await
            .map_err(|e| ScriptError::Verification(e.to_string()))?;

        if response.status != "1" {
            if is_already_verified(&response.result) {
                return Ok(Err(VerificationOutcome::AlreadyVerified));
            }
            return Err(ScriptError::Verification(format!(
                "{}: {}",
                response.message, response.result
            )));
        }

        Ok(Ok(response.result))
    }

    /// Poll the verification status for the given GUID until it is terminal
    async fn await_verification(&self, guid: &str) -> Result<VerificationOutcome, ScriptError> {
        for _ in 0..MAX_VERIFICATION_POLLS {
            sleep(Duration::from_secs(VERIFICATION_POLL_INTERVAL_SECS)).await;

            let response: ExplorerResponse = self
                .http
                .get(&self.api_url)
                .query(&[
                    ("module", "contract"),
                    ("action", "checkverifystatus"),
                    ("guid", guid),
                    ("apikey", self.api_key.as_str()),
                ])
                .send()
                .await
                .map_err(|e| ScriptError::Verification(e.to_string()))?
                .json()
                .await
                .map_err(|e| ScriptError::Verification(e.to_string()))?;

            if response.result.contains("Pending") {
                info!("verification pending");
                continue;
            }
            if is_already_verified(&response.result) {
                return Ok(VerificationOutcome::AlreadyVerified);
            }
            if response.status == "1" {
                return Ok(VerificationOutcome::Verified);
            }

            return Err(ScriptError::Verification(response.result));
        }

        Err(ScriptError::Verification(format!(
            "status still pending after {} polls",
            MAX_VERIFICATION_POLLS
        )))
    }
}

impl Explorer for EtherscanExplorer {
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationOutcome, ScriptError> {
        match self.submit(request).await? {
            Ok(guid) => self.await_verification(&guid).await,
            Err(outcome) => Ok(outcome),
        }
    }
}

/// Whether the explorer's status text reports the source as already verified
fn is_already_verified(result: &str) -> bool {
    result.to_ascii_lowercase().contains("already verified")
}
