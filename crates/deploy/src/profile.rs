//! Static per-network parameters.
//!
//! Every network the tool can target is described by a [`ProfileSettings`] entry. The
//! built-in entries are shipped as configuration defaults (see [`builtin_profiles`]) and can
//! be overridden or extended from `Zars.toml`. A run resolves exactly one entry into an
//! immutable [`NetworkProfile`].

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, address};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    ApprovalSpec, ContractName, DeployError, InitializeCall, WalletRole, WiringPlan,
    gas::gwei_to_wei,
};

/// Number of fee collector addresses the token constructor expects.
pub const FEE_COLLECTOR_COUNT: usize = 4;

/// Raw, possibly incomplete network parameters as found in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Chain id the RPC endpoint must report.
    pub chain_id: u64,
    /// Submission is held back until the gas price is at or below this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_threshold_gwei: Option<f64>,
    #[serde(default)]
    pub fee_collectors: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_wallet: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staking_reward_wallet: Option<Address>,
    /// Etherscan-compatible API endpoint used for source verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_api_url: Option<Url>,
    #[serde(default = "WiringPlan::standard")]
    pub wiring: WiringPlan,
}

/// Resolved parameters for the network targeted by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkProfile {
    pub network: String,
    pub chain_id: u64,
    pub gas_price_threshold_gwei: Option<f64>,
    pub fee_collectors: [Address; FEE_COLLECTOR_COUNT],
    pub sale_wallet: Address,
    pub staking_reward_wallet: Address,
    pub explorer_api_url: Option<Url>,
    pub wiring: WiringPlan,
}

impl NetworkProfile {
    /// Resolve `network` against the configured profiles.
    ///
    /// Unknown networks and missing or malformed values are configuration errors.
    pub fn resolve(
        network: &str,
        profiles: &BTreeMap<String, ProfileSettings>,
    ) -> Result<Self, DeployError> {
        let settings = profiles
            .get(network)
            .ok_or_else(|| DeployError::UnknownNetwork {
                network: network.to_string(),
                known: profiles.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;

        let missing = |field| DeployError::MissingProfileValue {
            network: network.to_string(),
            field,
        };
        let invalid = |field, reason: String| DeployError::InvalidProfileValue {
            network: network.to_string(),
            field,
            reason,
        };

        if let Some(threshold) = settings.gas_price_threshold_gwei {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(invalid(
                    "gas_price_threshold_gwei",
                    format!("{threshold} is not a non-negative number"),
                ));
            }
        }

        if settings.fee_collectors.is_empty() {
            return Err(missing("fee_collectors"));
        }
        let fee_collectors: [Address; FEE_COLLECTOR_COUNT] = settings
            .fee_collectors
            .clone()
            .try_into()
            .map_err(|collectors: Vec<Address>| {
                invalid(
                    "fee_collectors",
                    format!(
                        "expected {FEE_COLLECTOR_COUNT} addresses, got {}",
                        collectors.len()
                    ),
                )
            })?;

        let sale_wallet = settings.sale_wallet.ok_or_else(|| missing("sale_wallet"))?;
        let staking_reward_wallet = settings
            .staking_reward_wallet
            .ok_or_else(|| missing("staking_reward_wallet"))?;

        Ok(Self {
            network: network.to_string(),
            chain_id: settings.chain_id,
            gas_price_threshold_gwei: settings.gas_price_threshold_gwei,
            fee_collectors,
            sale_wallet,
            staking_reward_wallet,
            explorer_api_url: settings.explorer_api_url.clone(),
            wiring: settings.wiring.clone(),
        })
    }

    /// The gas price threshold in wei, if the network gates submission.
    pub fn gas_price_threshold_wei(&self) -> Option<u128> {
        self.gas_price_threshold_gwei.map(gwei_to_wei)
    }

    /// Address the profile assigns to a wallet role.
    ///
    /// The deployer is whoever holds the deployer key, so it has no fixed address.
    pub fn role_address(&self, role: WalletRole) -> Option<Address> {
        match role {
            WalletRole::Deployer => None,
            WalletRole::SaleWallet => Some(self.sale_wallet),
            WalletRole::StakingRewardWallet => Some(self.staking_reward_wallet),
        }
    }
}

/// Profiles shipped with the tool.
///
/// `goerli` is the staging network: it also wires token allowances from the sale and
/// staking reward wallets. `bsc` is production and must get its addresses from `Zars.toml`.
pub fn builtin_profiles() -> BTreeMap<String, ProfileSettings> {
    let goerli = ProfileSettings {
        chain_id: 5,
        gas_price_threshold_gwei: Some(1.0),
        fee_collectors: vec![
            Address::with_last_byte(1),
            Address::with_last_byte(2),
            Address::with_last_byte(3),
            Address::with_last_byte(4),
        ],
        sale_wallet: Some(address!("0x49A61ba8E25FBd58cE9B30E1276c4Eb41dD80a80")),
        staking_reward_wallet: Some(address!("0x3edCe801a3f1851675e68589844B1b412EAc6B07")),
        explorer_api_url: Url::parse("https://api-goerli.etherscan.io/api").ok(),
        wiring: WiringPlan::standard().with_approvals(staging_approvals()),
    };

    let bsc = ProfileSettings {
        chain_id: 56,
        gas_price_threshold_gwei: Some(3.0),
        fee_collectors: Vec::new(),
        sale_wallet: None,
        staking_reward_wallet: None,
        explorer_api_url: Url::parse("https://api.bscscan.com/api").ok(),
        wiring: WiringPlan::standard(),
    };

    BTreeMap::from([("goerli".to_string(), goerli), ("bsc".to_string(), bsc)])
}

/// Allowances granted to the distribution contracts on staging networks.
fn staging_approvals() -> Vec<ApprovalSpec> {
    vec![
        ApprovalSpec::new(
            WalletRole::SaleWallet,
            ContractName::TOKEN,
            ContractName::AIRDROP,
        ),
        ApprovalSpec::new(
            WalletRole::SaleWallet,
            ContractName::TOKEN,
            ContractName::PRESALE,
        ),
        ApprovalSpec::new(
            WalletRole::StakingRewardWallet,
            ContractName::TOKEN,
            ContractName::STAKING,
        ),
    ]
}

impl WiringPlan {
    /// Initialize calls every network performs.
    pub fn standard() -> Self {
        Self {
            initializations: vec![
                InitializeCall::new(
                    ContractName::AIRDROP,
                    vec![ContractName::TOKEN, ContractName::STAKING],
                ),
                InitializeCall::new(
                    ContractName::PRESALE,
                    vec![ContractName::TOKEN, ContractName::STAKING],
                ),
                InitializeCall::new(
                    ContractName::STAKING,
                    vec![
                        ContractName::TOKEN,
                        ContractName::AIRDROP,
                        ContractName::PRESALE,
                    ],
                ),
            ],
            approvals: Vec::new(),
        }
    }
}
