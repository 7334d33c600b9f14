//! Summary of a run.

use std::fmt;

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};

use crate::{DeployedContract, VerificationOutcome, VerificationResult, WiringReceipt};

/// What a run did, stage by stage. Stages that did not run are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub network: String,
    pub deployments: Vec<DeployedContract>,
    pub wiring: Vec<WiringReceipt>,
    pub verification: Vec<VerificationOutcome>,
}

impl RunReport {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ..Default::default()
        }
    }

    /// Number of contracts whose verification failed.
    pub fn verification_failures(&self) -> usize {
        self.verification
            .iter()
            .filter(|outcome| matches!(outcome.result, VerificationResult::Failed(_)))
            .count()
    }

    pub fn deployments_table(&self) -> Table {
        let mut table = new_table(["Contract", "Address", "Transaction", "Block"]);
        for contract in &self.deployments {
            table.add_row([
                contract.name.to_string(),
                contract.address.to_string(),
                contract.deployment_tx_hash.to_string(),
                contract.confirmed_block_number.to_string(),
            ]);
        }
        table
    }

    pub fn wiring_table(&self) -> Table {
        let mut table = new_table(["Call", "Transaction", "Block"]);
        for receipt in &self.wiring {
            table.add_row([
                receipt.action.clone(),
                receipt.tx_hash.to_string(),
                receipt.block_number.to_string(),
            ]);
        }
        table
    }

    pub fn verification_table(&self) -> Table {
        let mut table = new_table(["Contract", "Address", "Verification"]);
        for outcome in &self.verification {
            table.add_row([
                outcome.name.to_string(),
                outcome.address.to_string(),
                outcome.result.to_string(),
            ]);
        }
        table
    }
}

fn new_table<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network: {}", self.network)?;
        if !self.deployments.is_empty() {
            writeln!(f, "\nDeployments\n{}", self.deployments_table())?;
        }
        if !self.wiring.is_empty() {
            writeln!(f, "\nInitialization\n{}", self.wiring_table())?;
        }
        if !self.verification.is_empty() {
            writeln!(f, "\nVerification\n{}", self.verification_table())?;
        }
        Ok(())
    }
}
