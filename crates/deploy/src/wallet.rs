//! Signing keys for the wallet roles involved in a run.

use std::str::FromStr;

use alloy_core::primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::{Credentials, DeployError, NetworkProfile};

/// The accounts that sign transactions during a run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WalletRole {
    /// Sends every creation and initialize transaction.
    Deployer,
    /// Holds the sale allocation; grants allowances to the airdrop and presale.
    SaleWallet,
    /// Holds staking rewards; grants an allowance to the staking contract.
    StakingRewardWallet,
}

impl WalletRole {
    /// Suffix of the environment variable holding this role's private key.
    pub fn credential_key(&self) -> &'static str {
        match self {
            Self::Deployer => "DEPLOYER_KEY",
            Self::SaleWallet => "SALE_WALLET_KEY",
            Self::StakingRewardWallet => "STAKING_REWARD_WALLET_KEY",
        }
    }
}

/// Signers for each configured role.
#[derive(Debug, Clone)]
pub struct Wallets {
    deployer: PrivateKeySigner,
    sale_wallet: Option<PrivateKeySigner>,
    staking_reward_wallet: Option<PrivateKeySigner>,
}

impl Wallets {
    pub fn new(deployer: PrivateKeySigner) -> Self {
        Self {
            deployer,
            sale_wallet: None,
            staking_reward_wallet: None,
        }
    }

    pub fn with_signer(mut self, role: WalletRole, signer: PrivateKeySigner) -> Self {
        match role {
            WalletRole::Deployer => self.deployer = signer,
            WalletRole::SaleWallet => self.sale_wallet = Some(signer),
            WalletRole::StakingRewardWallet => self.staking_reward_wallet = Some(signer),
        }
        self
    }

    /// Build the signers from credentials and check them against the network profile.
    ///
    /// The deployer key is always required. Keys for the other roles are required only when
    /// the profile's wiring plan makes them grant approvals, and must control the address the
    /// profile assigns to that role.
    pub fn from_credentials(
        credentials: &Credentials,
        profile: &NetworkProfile,
    ) -> Result<Self, DeployError> {
        let deployer = match credentials.key(WalletRole::Deployer) {
            Some(key) => parse_key(&credentials.env_name(WalletRole::Deployer), key)?,
            None => {
                return Err(DeployError::MissingCredential {
                    name: credentials.env_name(WalletRole::Deployer),
                });
            }
        };
        let mut wallets = Self::new(deployer);

        for role in [WalletRole::SaleWallet, WalletRole::StakingRewardWallet] {
            let env_name = credentials.env_name(role);
            let signer = match credentials.key(role) {
                Some(key) => parse_key(&env_name, key)?,
                None if profile.wiring.uses_role(role) => {
                    return Err(DeployError::MissingCredential { name: env_name });
                }
                None => continue,
            };

            match profile.role_address(role) {
                Some(expected) if expected != signer.address() => {
                    return Err(DeployError::WalletMismatch {
                        role,
                        expected,
                        actual: signer.address(),
                    });
                }
                _ => {}
            }
            wallets = wallets.with_signer(role, signer);
        }

        tracing::debug!(
            deployer = %wallets.deployer.address(),
            sale_wallet = ?wallets.address(WalletRole::SaleWallet),
            staking_reward_wallet = ?wallets.address(WalletRole::StakingRewardWallet),
            "Wallets loaded"
        );

        Ok(wallets)
    }

    pub fn signer(&self, role: WalletRole) -> Option<&PrivateKeySigner> {
        match role {
            WalletRole::Deployer => Some(&self.deployer),
            WalletRole::SaleWallet => self.sale_wallet.as_ref(),
            WalletRole::StakingRewardWallet => self.staking_reward_wallet.as_ref(),
        }
    }

    pub fn address(&self, role: WalletRole) -> Option<Address> {
        self.signer(role).map(PrivateKeySigner::address)
    }
}

fn parse_key(name: &str, key: &str) -> Result<PrivateKeySigner, DeployError> {
    // The key itself never ends up in the error.
    PrivateKeySigner::from_str(key.trim()).map_err(|_| DeployError::InvalidCredential {
        name: name.to_string(),
        reason: "not a valid secp256k1 private key".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApprovalSpec, ContractName, WiringPlan};

    // Well-known anvil development keys (accounts 0, 1 and 2).
    const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const KEY_2: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

    fn signer(key: &str) -> PrivateKeySigner {
        PrivateKeySigner::from_str(key).unwrap()
    }

    /// A profile whose sale wallet grants an allowance and whose role addresses match keys 1
    /// and 2.
    fn profile() -> NetworkProfile {
        NetworkProfile {
            network: "goerli".to_string(),
            chain_id: 5,
            gas_price_threshold_gwei: None,
            fee_collectors: [Address::ZERO; 4],
            sale_wallet: signer(KEY_1).address(),
            staking_reward_wallet: signer(KEY_2).address(),
            explorer_api_url: None,
            wiring: WiringPlan::standard().with_approvals(vec![ApprovalSpec::new(
                WalletRole::SaleWallet,
                ContractName::TOKEN,
                ContractName::PRESALE,
            )]),
        }
    }

    #[test]
    fn test_key_for_another_address_is_rejected() {
        let credentials = Credentials::default()
            .with_key(WalletRole::Deployer, KEY_0)
            .with_key(WalletRole::SaleWallet, KEY_2);

        let err = Wallets::from_credentials(&credentials, &profile()).unwrap_err();

        assert!(matches!(
            err,
            DeployError::WalletMismatch { role: WalletRole::SaleWallet, expected, actual }
                if expected == signer(KEY_1).address() && actual == signer(KEY_2).address()
        ));
    }

    #[test]
    fn test_key_required_by_the_wiring_plan_must_be_set() {
        let credentials = Credentials::default().with_key(WalletRole::Deployer, KEY_0);

        let err = Wallets::from_credentials(&credentials, &profile()).unwrap_err();

        assert!(matches!(
            err,
            DeployError::MissingCredential { ref name } if name.ends_with("SALE_WALLET_KEY")
        ));
    }

    #[test]
    fn test_unused_role_may_be_absent() {
        let credentials = Credentials::default()
            .with_key(WalletRole::Deployer, KEY_0)
            .with_key(WalletRole::SaleWallet, KEY_1);

        let wallets = Wallets::from_credentials(&credentials, &profile()).unwrap();

        assert_eq!(
            wallets.address(WalletRole::SaleWallet),
            Some(signer(KEY_1).address())
        );
        assert!(wallets.signer(WalletRole::StakingRewardWallet).is_none());
    }

    #[test]
    fn test_deployer_key_is_required() {
        let err = Wallets::from_credentials(&Credentials::default(), &profile()).unwrap_err();
        assert!(matches!(
            err,
            DeployError::MissingCredential { ref name } if name.ends_with("DEPLOYER_KEY")
        ));
    }

    #[test]
    fn test_role_display_is_kebab_case() {
        assert_eq!(WalletRole::StakingRewardWallet.to_string(), "staking-reward-wallet");
        assert_eq!(
            WalletRole::from_str("sale-wallet").unwrap(),
            WalletRole::SaleWallet
        );
    }

    #[test]
    fn test_deployer_is_always_available() {
        let wallets = Wallets::new(signer(KEY_0));
        assert_eq!(
            wallets.address(WalletRole::Deployer),
            Some(signer(KEY_0).address())
        );
        assert!(wallets.signer(WalletRole::SaleWallet).is_none());
    }

    #[test]
    fn test_with_signer_sets_role() {
        let wallets = Wallets::new(signer(KEY_0))
            .with_signer(WalletRole::SaleWallet, signer(KEY_1))
            .with_signer(WalletRole::StakingRewardWallet, signer(KEY_2));

        assert_eq!(
            wallets.address(WalletRole::SaleWallet),
            Some(signer(KEY_1).address())
        );
        assert_eq!(
            wallets.address(WalletRole::StakingRewardWallet),
            Some(signer(KEY_2).address())
        );
    }

    #[test]
    fn test_invalid_key_does_not_leak() {
        let err = parse_key("ZARS_GOERLI_DEPLOYER_KEY", "0xnot-a-key").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ZARS_GOERLI_DEPLOYER_KEY"));
        assert!(!message.contains("not-a-key"));
    }
}
