//! Contract creation in dependency order.

use alloy_core::primitives::{Address, Bytes};
use anyhow::Context;

use crate::{
    AddressRegistry, ContractSpec, DeployError, DeployedContract, DeploymentPlan, NetworkProfile,
    WalletRole,
    artifact::Artifacts,
    chain::{ChainClient, TxReceipt, TxRequest},
    config::GasSettings,
    gas::clear_gate,
};

/// Deploys the contracts of a [`DeploymentPlan`] one at a time, each after the previous one
/// is confirmed.
pub struct DeploymentSequencer<'a, C> {
    chain: &'a C,
    profile: &'a NetworkProfile,
    artifacts: &'a Artifacts,
    gas: &'a GasSettings,
}

impl<'a, C: ChainClient> DeploymentSequencer<'a, C> {
    pub fn new(
        chain: &'a C,
        profile: &'a NetworkProfile,
        artifacts: &'a Artifacts,
        gas: &'a GasSettings,
    ) -> Self {
        Self {
            chain,
            profile,
            artifacts,
            gas,
        }
    }

    /// Deploy a single contract and wait for its confirmation.
    ///
    /// Waits on the gas price gate first when the network defines a threshold. A failed
    /// submission, a reverted creation or a receipt without contract address is fatal and is
    /// never retried.
    pub async fn deploy(&self, spec: &ContractSpec) -> Result<DeployedContract, DeployError> {
        let artifact = self.artifacts.get(&spec.artifact)?;
        let gas_price =
            clear_gate(self.chain, self.gas, self.profile.gas_price_threshold_wei()).await?;

        let mut creation_code = artifact.bytecode.to_vec();
        creation_code.extend_from_slice(&spec.encoded_args());
        let request = TxRequest::create(WalletRole::Deployer, Bytes::from(creation_code))
            .with_gas_price(gas_price);

        let (receipt, address) =
            self.submit(request)
                .await
                .map_err(|source| DeployError::Deployment {
                    name: spec.name.clone(),
                    source,
                })?;

        tracing::info!(
            contract = %spec.name,
            address = %address,
            tx_hash = %receipt.tx_hash,
            block_number = receipt.block_number,
            "{} deployed to {address}",
            artifact.contract_name
        );

        Ok(DeployedContract {
            name: spec.name.clone(),
            address,
            deployment_tx_hash: receipt.tx_hash,
            confirmed_block_number: receipt.block_number,
            artifact: spec.artifact.clone(),
            constructor_args: spec.constructor_args.clone(),
        })
    }

    /// Deploy every contract of `plan` in order.
    ///
    /// Each contract is registered as soon as it is confirmed and `on_confirmed` is called with
    /// the registry so far, which lets callers persist progress. All artifacts are checked
    /// before the first transaction is sent.
    pub async fn deploy_all<F>(
        &self,
        plan: &DeploymentPlan,
        mut on_confirmed: F,
    ) -> Result<AddressRegistry, DeployError>
    where
        F: FnMut(&AddressRegistry) -> Result<(), DeployError>,
    {
        for spec in plan.specs() {
            self.artifacts.get(&spec.artifact)?;
        }

        tracing::info!(
            network = %self.profile.network,
            contracts = plan.specs().len(),
            "Deploying contracts"
        );

        let mut registry = AddressRegistry::new();
        for spec in plan.specs() {
            let deployed = self.deploy(spec).await?;
            registry.register(deployed)?;
            on_confirmed(&registry)?;
        }

        Ok(registry)
    }

    async fn submit(&self, request: TxRequest) -> anyhow::Result<(TxReceipt, Address)> {
        let tx_hash = self
            .chain
            .send(request)
            .await
            .context("failed to submit creation transaction")?;
        tracing::debug!(tx_hash = %tx_hash, "Creation transaction submitted");

        let receipt = self
            .chain
            .wait_for_receipt(tx_hash)
            .await
            .context("failed to confirm creation transaction")?;
        if !receipt.success {
            anyhow::bail!(
                "creation transaction {} reverted in block {}",
                receipt.tx_hash,
                receipt.block_number
            );
        }
        let address = receipt
            .contract_address
            .context("receipt has no contract address")?;

        Ok((receipt, address))
    }
}
