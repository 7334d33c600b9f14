//! On-disk record of the contracts deployed to a network.
//!
//! The record is rewritten after every confirmed deployment, so an interrupted run leaves
//! behind the contracts it did deploy. The `init` and `verify` commands start from it.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AddressRegistry, DeployError, DeployedContract, NetworkProfile};

/// Format version written to new records.
pub const RECORD_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub version: u32,
    pub network: String,
    pub chain_id: u64,
    pub updated_at: DateTime<Utc>,
    /// In deployment order.
    pub contracts: Vec<DeployedContract>,
}

impl DeploymentRecord {
    pub fn new(profile: &NetworkProfile, registry: &AddressRegistry) -> Self {
        Self {
            version: RECORD_VERSION,
            network: profile.network.clone(),
            chain_id: profile.chain_id,
            updated_at: Utc::now(),
            contracts: registry.iter().cloned().collect(),
        }
    }

    /// Save the record as pretty-printed JSON, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write deployment record to {}", path.display()))?;
        tracing::debug!(path = %path.display(), contracts = self.contracts.len(), "Deployment record saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "No deployment record found at {}, deploy the contracts first",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment record from {}", path.display()))?;
        let record: Self =
            serde_json::from_str(&content).context("Failed to parse deployment record as JSON")?;
        if record.version != RECORD_VERSION {
            anyhow::bail!(
                "Unsupported deployment record version {} (expected {RECORD_VERSION})",
                record.version
            );
        }
        tracing::info!(path = %path.display(), contracts = record.contracts.len(), "Deployment record loaded");
        Ok(record)
    }

    /// Rebuild the registry, refusing records written for another network.
    pub fn into_registry(self, profile: &NetworkProfile) -> Result<AddressRegistry, DeployError> {
        if self.network != profile.network || self.chain_id != profile.chain_id {
            return Err(DeployError::Record(anyhow::anyhow!(
                "record belongs to {} (chain {}), not {} (chain {})",
                self.network,
                self.chain_id,
                profile.network,
                profile.chain_id
            )));
        }
        Ok(AddressRegistry::try_from(self.contracts)?)
    }
}
