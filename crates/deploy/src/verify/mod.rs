//! Best-effort source verification of the deployed contracts.
//!
//! Verification never fails a run: every problem ends up as a [`VerificationResult`] in the
//! report.

mod etherscan;

use std::{fmt, future::Future};

use alloy_core::primitives::{Address, Bytes};
use backon::{ConstantBuilder, Retryable};

pub use etherscan::EtherscanVerifier;

use crate::{
    AddressRegistry, ContractName, DeploymentPlan,
    artifact::{Artifact, Artifacts},
    config::VerificationSettings,
};

/// Everything a verification service needs to match a deployment against its source.
#[derive(Debug, Clone)]
pub struct VerificationRequest<'a> {
    pub name: &'a ContractName,
    pub address: Address,
    pub artifact: &'a Artifact,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
}

/// Successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Verified,
    AlreadyVerified,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The service may accept the same request later, e.g. before it indexed the bytecode.
    #[error("transient verification failure: {0}")]
    Transient(String),
    #[error("verification rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VerifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A source verification service.
pub trait SourceVerifier: Send + Sync {
    fn verify(
        &self,
        request: &VerificationRequest<'_>,
    ) -> impl Future<Output = Result<VerifyStatus, VerifyError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Verified,
    AlreadyVerified,
    Skipped(String),
    Failed(String),
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => f.write_str("verified"),
            Self::AlreadyVerified => f.write_str("already verified"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

impl From<VerifyStatus> for VerificationResult {
    fn from(status: VerifyStatus) -> Self {
        match status {
            VerifyStatus::Verified => Self::Verified,
            VerifyStatus::AlreadyVerified => Self::AlreadyVerified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub name: ContractName,
    pub address: Address,
    pub result: VerificationResult,
}

/// Submits every deployed contract to a [`SourceVerifier`], retrying transient failures.
pub struct VerificationRetrier<'a, V> {
    verifier: Result<&'a V, String>,
    settings: &'a VerificationSettings,
}

impl<'a, V: SourceVerifier> VerificationRetrier<'a, V> {
    pub fn new(verifier: &'a V, settings: &'a VerificationSettings) -> Self {
        Self {
            verifier: Ok(verifier),
            settings,
        }
    }

    /// A retrier that records every contract as skipped for `reason`.
    pub fn skipped(reason: impl Into<String>, settings: &'a VerificationSettings) -> Self {
        Self {
            verifier: Err(reason.into()),
            settings,
        }
    }

    /// Verify every registered contract, in registry order.
    ///
    /// Waits for the settle delay once before the first submission.
    pub async fn verify_all(
        &self,
        plan: &DeploymentPlan,
        registry: &AddressRegistry,
        artifacts: &Artifacts,
    ) -> Vec<VerificationOutcome> {
        let verifier = match (&self.verifier, self.settings.enabled) {
            (_, false) => Err("verification disabled".to_string()),
            (Ok(verifier), true) => Ok(*verifier),
            (Err(reason), true) => Err(reason.clone()),
        };

        let verifier = match verifier {
            Ok(verifier) => verifier,
            Err(reason) => {
                tracing::info!(reason = %reason, "Skipping source verification");
                return registry
                    .iter()
                    .map(|contract| VerificationOutcome {
                        name: contract.name.clone(),
                        address: contract.address,
                        result: VerificationResult::Skipped(reason.clone()),
                    })
                    .collect();
            }
        };

        let settle_delay = self.settings.settle_delay();
        tracing::info!(?settle_delay, "Waiting for the explorer to index the deployments");
        tokio::time::sleep(settle_delay).await;

        let mut outcomes = Vec::with_capacity(registry.len());
        for contract in registry.iter() {
            let result = match plan.get(&contract.name) {
                None => VerificationResult::Skipped("not part of the deployment plan".to_string()),
                Some(spec) => match artifacts.get(&spec.artifact) {
                    Err(err) => VerificationResult::Failed(format!("{err:#}")),
                    Ok(artifact) => {
                        tracing::info!(
                            contract = %contract.name,
                            address = %contract.address,
                            args = %spec
                                .constructor_args
                                .iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>()
                                .join(","),
                            "Verifying {}",
                            contract.name
                        );
                        let request = VerificationRequest {
                            name: &contract.name,
                            address: contract.address,
                            artifact,
                            constructor_args: spec.encoded_args(),
                        };
                        self.verify_one(verifier, &request).await
                    }
                },
            };

            match &result {
                VerificationResult::Failed(reason) => tracing::warn!(
                    contract = %contract.name,
                    address = %contract.address,
                    reason = %reason,
                    "Verification failed"
                ),
                result => tracing::info!(
                    contract = %contract.name,
                    address = %contract.address,
                    result = %result,
                    "Verification finished"
                ),
            }

            outcomes.push(VerificationOutcome {
                name: contract.name.clone(),
                address: contract.address,
                result,
            });
        }

        outcomes
    }

    async fn verify_one(&self, verifier: &V, request: &VerificationRequest<'_>) -> VerificationResult {
        let backoff = ConstantBuilder::default()
            .with_delay(self.settings.retry_delay())
            .with_max_times(self.settings.attempts.saturating_sub(1));

        let result = (|| verifier.verify(request))
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(VerifyError::is_transient)
            .notify(|err, retry_in| {
                tracing::debug!(
                    contract = %request.name,
                    error = %err,
                    ?retry_in,
                    "Verification not accepted yet, retrying"
                );
            })
            .await;

        match result {
            Ok(status) => status.into(),
            Err(err) => VerificationResult::Failed(err.to_string()),
        }
    }
}
