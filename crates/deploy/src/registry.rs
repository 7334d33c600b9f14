//! In-memory mapping from logical contract name to its deployed address.

use alloy_core::primitives::Address;

use crate::{ContractName, DeployedContract, error::RegistryError};

/// Registry of the contracts deployed during a run.
///
/// Iteration order is insertion order, which is the dependency order the
/// sequencer deployed the contracts in. The registry has a single writer
/// (the sequencer, or a loaded deployment record) and is only read once
/// fully populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressRegistry {
    entries: Vec<DeployedContract>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed deployment. A name can only be registered once.
    pub fn register(&mut self, contract: DeployedContract) -> Result<(), RegistryError> {
        if self.contains(&contract.name) {
            return Err(RegistryError::Duplicate(contract.name));
        }
        self.entries.push(contract);
        Ok(())
    }

    /// Address of a registered contract.
    pub fn resolve(&self, name: &ContractName) -> Result<Address, RegistryError> {
        self.get(name)
            .map(|contract| contract.address)
            .ok_or_else(|| RegistryError::Unregistered(name.clone()))
    }

    pub fn get(&self, name: &ContractName) -> Option<&DeployedContract> {
        self.entries.iter().find(|contract| &contract.name == name)
    }

    pub fn contains(&self, name: &ContractName) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeployedContract> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_contracts(self) -> Vec<DeployedContract> {
        self.entries
    }
}

impl TryFrom<Vec<DeployedContract>> for AddressRegistry {
    type Error = RegistryError;

    fn try_from(contracts: Vec<DeployedContract>) -> Result<Self, Self::Error> {
        let mut registry = Self::new();
        for contract in contracts {
            registry.register(contract)?;
        }
        Ok(registry)
    }
}
