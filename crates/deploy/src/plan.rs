//! The ordered list of contracts a run deploys.

use std::collections::HashSet;

use alloy_core::primitives::U256;

use crate::{
    AddressRegistry, ConstructorArg, ContractName, ContractSpec, DeployedContract, NetworkProfile,
    TokenMetadata, error::RegistryError,
};

/// Contracts to deploy, in dependency order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    specs: Vec<ContractSpec>,
}

impl DeploymentPlan {
    /// Build a plan, rejecting duplicate contract names.
    pub fn new(specs: Vec<ContractSpec>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(&spec.name) {
                return Err(RegistryError::Duplicate(spec.name.clone()));
            }
        }
        Ok(Self { specs })
    }

    /// Token, airdrop, presale and staking with their constructor arguments.
    ///
    /// The token takes `(name, symbol, decimals, fee collectors, sale wallet, staking reward
    /// wallet)`, the airdrop and presale take the sale wallet, and staking takes the staking
    /// reward wallet.
    pub fn standard(profile: &NetworkProfile, token: &TokenMetadata) -> Self {
        let specs = vec![
            ContractSpec::new(
                ContractName::TOKEN,
                "Zars",
                vec![
                    ConstructorArg::String(token.name.clone()),
                    ConstructorArg::String(token.symbol.clone()),
                    ConstructorArg::Uint {
                        value: U256::from(token.decimals),
                        bits: 8,
                    },
                    ConstructorArg::FixedAddressArray(profile.fee_collectors.to_vec()),
                    ConstructorArg::Address(profile.sale_wallet),
                    ConstructorArg::Address(profile.staking_reward_wallet),
                ],
            ),
            ContractSpec::new(
                ContractName::AIRDROP,
                "Airdrop",
                vec![ConstructorArg::Address(profile.sale_wallet)],
            ),
            ContractSpec::new(
                ContractName::PRESALE,
                "Presale",
                vec![ConstructorArg::Address(profile.sale_wallet)],
            ),
            ContractSpec::new(
                ContractName::STAKING,
                "Staking",
                vec![ConstructorArg::Address(profile.staking_reward_wallet)],
            ),
        ];

        Self { specs }
    }

    /// The specs the registered contracts were actually deployed from, in registry order.
    pub fn from_registry(registry: &AddressRegistry) -> Self {
        Self {
            specs: registry.iter().map(DeployedContract::spec).collect(),
        }
    }

    pub fn specs(&self) -> &[ContractSpec] {
        &self.specs
    }

    pub fn get(&self, name: &ContractName) -> Option<&ContractSpec> {
        self.specs.iter().find(|spec| &spec.name == name)
    }

    /// Artifact names used by the plan.
    pub fn artifact_names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.artifact.as_str())
    }
}
