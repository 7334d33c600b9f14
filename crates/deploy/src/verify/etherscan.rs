use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{SourceVerifier, VerificationRequest, VerifyError, VerifyStatus};
use crate::{config::VerificationSettings, rpc::create_client};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client of an Etherscan-compatible contract verification API (Etherscan, BscScan, ...).
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    poll_interval: Duration,
    max_polls: usize,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    message: String,
    result: Value,
}

impl ExplorerResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    fn result_text(&self) -> String {
        match &self.result {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

enum Submission {
    /// Accepted, identified by a GUID to poll.
    Queued(String),
    /// Nothing to do, e.g. the contract was verified before.
    Done(VerifyStatus),
}

/// Meaning of an explorer message.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Classified {
    Done(VerifyStatus),
    Pending,
    Transient(String),
    Rejected(String),
}

fn classify(message: &str) -> Classified {
    let lower = message.to_lowercase();
    if lower.contains("already verified") {
        Classified::Done(VerifyStatus::AlreadyVerified)
    } else if lower.starts_with("pass") {
        Classified::Done(VerifyStatus::Verified)
    } else if lower.contains("pending in queue") {
        Classified::Pending
    } else if lower.contains("unable to locate contractcode") || lower.contains("rate limit") {
        Classified::Transient(message.to_string())
    } else {
        Classified::Rejected(message.to_string())
    }
}

impl EtherscanVerifier {
    pub fn new(
        api_url: Url,
        api_key: impl Into<String>,
        settings: &VerificationSettings,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client(REQUEST_TIMEOUT)?,
            api_url,
            api_key: api_key.into(),
            poll_interval: settings.status_poll_interval(),
            max_polls: settings.status_max_polls,
        })
    }

    async fn submit(&self, request: &VerificationRequest<'_>) -> Result<Submission, VerifyError> {
        let build_info = request.artifact.build_info()?;
        let source_code =
            serde_json::to_string(&build_info.input).context("Failed to serialize compiler input")?;

        let form = [
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", source_code),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", request.artifact.qualified_name()),
            ("compilerversion", build_info.compiler_version()),
            // Misspelled on the explorer side.
            ("constructorArguements", hex::encode(&request.constructor_args)),
        ];

        let response: ExplorerResponse = self
            .client
            .post(self.api_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|err| VerifyError::Transient(format!("request failed: {err}")))?
            .json()
            .await
            .map_err(|err| VerifyError::Transient(format!("invalid response: {err}")))?;

        if response.is_ok() {
            return Ok(Submission::Queued(response.result_text()));
        }

        match classify(&response.result_text()) {
            Classified::Done(status) => Ok(Submission::Done(status)),
            Classified::Pending => Err(VerifyError::Transient(format!(
                "submission not accepted yet ({})",
                response.message
            ))),
            Classified::Transient(reason) => Err(VerifyError::Transient(reason)),
            Classified::Rejected(reason) => Err(VerifyError::Rejected(reason)),
        }
    }

    async fn check_status(&self, guid: &str) -> Result<Classified, VerifyError> {
        let response: ExplorerResponse = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .map_err(|err| VerifyError::Transient(format!("request failed: {err}")))?
            .json()
            .await
            .map_err(|err| VerifyError::Transient(format!("invalid response: {err}")))?;

        Ok(classify(&response.result_text()))
    }
}

impl SourceVerifier for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest<'_>) -> Result<VerifyStatus, VerifyError> {
        let guid = match self.submit(request).await? {
            Submission::Queued(guid) => guid,
            Submission::Done(status) => return Ok(status),
        };
        tracing::debug!(contract = %request.name, guid = %guid, "Verification submitted");

        for _ in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            match self.check_status(&guid).await? {
                Classified::Done(status) => return Ok(status),
                Classified::Pending => continue,
                Classified::Transient(reason) => return Err(VerifyError::Transient(reason)),
                Classified::Rejected(reason) => return Err(VerifyError::Rejected(reason)),
            }
        }

        Err(VerifyError::Transient(format!(
            "verification {guid} still pending after {} status checks",
            self.max_polls
        )))
    }
}
