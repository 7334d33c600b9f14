//! Error taxonomy for a deployment run.

use std::time::Duration;

use alloy_core::primitives::Address;

use crate::{ContractName, WalletRole};

/// Errors raised by the [`AddressRegistry`](crate::AddressRegistry).
///
/// Both variants indicate an ordering bug in the caller, never a condition to recover from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("contract `{0}` is already registered")]
    Duplicate(ContractName),
    #[error("contract `{0}` has not been deployed yet")]
    Unregistered(ContractName),
}

/// A fatal error that halts the run.
///
/// Verification problems are deliberately absent: they are recorded as
/// [`VerificationResult::Failed`](crate::VerificationResult::Failed) in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("unknown network `{network}` (known networks: {known})")]
    UnknownNetwork { network: String, known: String },

    #[error("network `{network}` is missing required value `{field}`")]
    MissingProfileValue { network: String, field: &'static str },

    #[error("network `{network}` has an invalid `{field}`: {reason}")]
    InvalidProfileValue {
        network: String,
        field: &'static str,
        reason: String,
    },

    #[error("missing credential `{name}`")]
    MissingCredential { name: String },

    #[error("invalid credential `{name}`: {reason}")]
    InvalidCredential { name: String, reason: String },

    #[error("{role} key controls {actual} but the network profile expects {expected}")]
    WalletMismatch {
        role: WalletRole,
        expected: Address,
        actual: Address,
    },

    #[error("failed to connect to the RPC endpoint")]
    Connection(#[source] anyhow::Error),

    #[error("RPC endpoint reports chain id {actual}, expected {expected}")]
    ChainIdMismatch { expected: u64, actual: u64 },

    #[error("failed to load artifact `{artifact}`")]
    Artifact {
        artifact: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("gas price query failed after retries")]
    FeeQuery(#[source] anyhow::Error),

    #[error("gas price stayed above {threshold_gwei} gwei for {waited:?}")]
    GasPriceTimeout { threshold_gwei: String, waited: Duration },

    #[error("deployment of `{name}` failed")]
    Deployment {
        name: ContractName,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("wiring call `{action}` failed")]
    Wiring {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist deployment record")]
    Record(#[source] anyhow::Error),

    #[error(transparent)]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for DeployError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl DeployError {
    /// Whether the error is a configuration problem detected before any transaction was sent.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownNetwork { .. }
                | Self::MissingProfileValue { .. }
                | Self::InvalidProfileValue { .. }
                | Self::MissingCredential { .. }
                | Self::InvalidCredential { .. }
                | Self::WalletMismatch { .. }
                | Self::ChainIdMismatch { .. }
                | Self::Artifact { .. }
                | Self::Config(_)
        )
    }
}
