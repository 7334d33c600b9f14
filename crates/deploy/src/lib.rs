//! zars-deploy - Deployment and initialization of the Zars contracts.
//!
//! This crate deploys the Zars token, airdrop, presale and staking contracts to an EVM
//! network, wires them together and submits their sources for verification.

pub mod artifact;
pub mod chain;
pub mod config;
pub mod gas;
pub mod record;
pub mod verify;

mod contract;
mod error;
mod orchestrator;
mod plan;
mod profile;
mod registry;
mod report;
mod rpc;
mod sequencer;
mod wallet;
mod wiring;

pub use artifact::{Artifact, Artifacts, BuildInfo};
pub use chain::{ChainClient, FeeOracle, RpcChain, TxReceipt, TxRequest};
pub use config::{
    ConfirmationSettings, Credentials, DeployConfig, GasSettings, TokenMetadata,
    VerificationSettings,
};
pub use contract::{
    ConstructorArg, ContractName, ContractSpec, DeployedContract, encode_constructor_args,
};
pub use error::{DeployError, RegistryError};
pub use gas::{GasPriceGate, GasPriceSample};
pub use orchestrator::Orchestrator;
pub use plan::DeploymentPlan;
pub use profile::{FEE_COLLECTOR_COUNT, NetworkProfile, ProfileSettings, builtin_profiles};
pub use record::DeploymentRecord;
pub use registry::AddressRegistry;
pub use report::RunReport;
pub use sequencer::DeploymentSequencer;
pub use verify::{
    EtherscanVerifier, SourceVerifier, VerificationOutcome, VerificationRequest,
    VerificationResult, VerificationRetrier, VerifyError, VerifyStatus,
};
pub use wallet::{WalletRole, Wallets};
pub use wiring::{
    ApprovalGrant, ApprovalSpec, InitializationCoordinator, InitializeCall, WiringPlan,
    WiringReceipt, encode_call,
};
