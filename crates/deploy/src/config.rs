//! Run configuration and credentials.
//!
//! Configuration is layered with figment: built-in defaults, then `Zars.toml`, then
//! `ZARS_*` environment variables (nested keys separated by `__`, e.g.
//! `ZARS_GAS__POLL_INTERVAL_MS=500`). Credentials are only ever read from the environment,
//! per network, from `ZARS_<NETWORK>_*` variables.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use backon::ExponentialBuilder;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DeployError, NetworkProfile, ProfileSettings, WalletRole, profile::builtin_profiles};

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Zars.toml";

/// Prefix of every environment variable read by the tool.
pub const ENV_PREFIX: &str = "ZARS_";

/// Static constructor parameters of the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "Zars".to_string(),
            symbol: "ZRS".to_string(),
            decimals: 9,
        }
    }
}

/// Gas price gate tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSettings {
    /// Delay between two gas price samples.
    pub poll_interval_ms: u64,
    /// Give up waiting for a low gas price after this long. Waits forever when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_secs: Option<u64>,
    /// Consecutive failed gas price queries tolerated before the run aborts.
    pub fee_query_retries: usize,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_wait_secs: None,
            fee_query_retries: 5,
            retry_min_delay_ms: 500,
            retry_max_delay_ms: 30_000,
        }
    }
}

impl GasSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }

    /// Backoff applied to failed gas price queries.
    pub fn fee_query_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.retry_min_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
            .with_max_times(self.fee_query_retries)
    }
}

/// Transaction submission and confirmation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationSettings {
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
    /// Extra gas added on top of the node's estimate, in percent.
    pub gas_limit_margin_percent: u64,
    /// Timeout of a single JSON-RPC request.
    pub request_timeout_secs: u64,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            timeout_secs: 600,
            gas_limit_margin_percent: 20,
            request_timeout_secs: 10,
        }
    }
}

impl ConfirmationSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn apply_margin(&self, gas_estimate: u64) -> u64 {
        gas_estimate.saturating_add(gas_estimate.saturating_mul(self.gas_limit_margin_percent) / 100)
    }
}

/// Source verification tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSettings {
    pub enabled: bool,
    /// Wait before the first verification so the explorer can index the deployments.
    pub settle_delay_secs: u64,
    /// Attempts per contract when the explorer reports a transient failure.
    pub attempts: usize,
    pub retry_delay_secs: u64,
    pub status_poll_interval_ms: u64,
    pub status_max_polls: usize,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_delay_secs: 20,
            attempts: 3,
            retry_delay_secs: 10,
            status_poll_interval_ms: 5_000,
            status_max_polls: 30,
        }
    }
}

impl VerificationSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }
}

/// Complete configuration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Hardhat artifacts directory holding the compiled contracts.
    pub artifacts_dir: PathBuf,
    /// Directory where deployment records are written, one file per network.
    pub deployments_dir: PathBuf,
    pub token: TokenMetadata,
    pub gas: GasSettings,
    pub confirmation: ConfirmationSettings,
    pub verification: VerificationSettings,
    /// Network profiles keyed by network name.
    pub networks: BTreeMap<String, ProfileSettings>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_dir: PathBuf::from("deployments"),
            token: TokenMetadata::default(),
            gas: GasSettings::default(),
            confirmation: ConfirmationSettings::default(),
            verification: VerificationSettings::default(),
            networks: builtin_profiles(),
        }
    }
}

impl DeployConfig {
    /// The layered configuration sources.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration.
    ///
    /// An explicitly provided file must exist; the default `Zars.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, DeployError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(figment::Error::from(format!(
                    "configuration file not found: {}",
                    path.display()
                ))
                .into());
            }
        }

        let config: Self = Self::figment(path).extract()?;
        tracing::debug!(
            artifacts_dir = %config.artifacts_dir.display(),
            networks = ?config.networks.keys().collect::<Vec<_>>(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Resolve the profile of `network`.
    pub fn profile(&self, network: &str) -> Result<NetworkProfile, DeployError> {
        NetworkProfile::resolve(network, &self.networks)
    }

    /// Path of the deployment record of `network`.
    pub fn record_path(&self, network: &str) -> PathBuf {
        self.deployments_dir.join(format!("{network}.json"))
    }
}

/// Secrets for one network, read from `ZARS_<NETWORK>_*` environment variables.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(skip)]
    network: String,
    rpc_url: Option<Url>,
    deployer_key: Option<String>,
    sale_wallet_key: Option<String>,
    staking_reward_wallet_key: Option<String>,
    explorer_api_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url.as_ref().map(Url::as_str))
            .field("deployer_key", &redacted(&self.deployer_key))
            .field("sale_wallet_key", &redacted(&self.sale_wallet_key))
            .field(
                "staking_reward_wallet_key",
                &redacted(&self.staking_reward_wallet_key),
            )
            .field("explorer_api_key", &redacted(&self.explorer_api_key))
            .finish()
    }
}

impl Credentials {
    /// Environment variable prefix for `network`, e.g. `ZARS_GOERLI_`.
    pub fn env_prefix(network: &str) -> String {
        format!(
            "{ENV_PREFIX}{}_",
            network.to_uppercase().replace('-', "_")
        )
    }

    pub fn from_env(network: &str) -> Result<Self, DeployError> {
        Self::from_figment(
            network,
            Figment::from(Env::prefixed(&Self::env_prefix(network))),
        )
    }

    pub fn from_figment(network: &str, figment: Figment) -> Result<Self, DeployError> {
        let mut credentials: Self = figment.extract()?;
        credentials.network = network.to_string();
        Ok(credentials)
    }

    pub fn with_key(mut self, role: WalletRole, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match role {
            WalletRole::Deployer => self.deployer_key = key,
            WalletRole::SaleWallet => self.sale_wallet_key = key,
            WalletRole::StakingRewardWallet => self.staking_reward_wallet_key = key,
        }
        self
    }

    /// The RPC endpoint; required for any run.
    pub fn rpc_url(&self) -> Result<&Url, DeployError> {
        self.rpc_url
            .as_ref()
            .ok_or_else(|| DeployError::MissingCredential {
                name: format!("{}RPC_URL", Self::env_prefix(&self.network)),
            })
    }

    pub fn key(&self, role: WalletRole) -> Option<&str> {
        match role {
            WalletRole::Deployer => self.deployer_key.as_deref(),
            WalletRole::SaleWallet => self.sale_wallet_key.as_deref(),
            WalletRole::StakingRewardWallet => self.staking_reward_wallet_key.as_deref(),
        }
    }

    pub fn explorer_api_key(&self) -> Option<&str> {
        self.explorer_api_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Name of the environment variable holding the key of `role`.
    pub fn env_name(&self, role: WalletRole) -> String {
        format!(
            "{}{}",
            Self::env_prefix(&self.network),
            role.credential_key()
        )
    }
}
