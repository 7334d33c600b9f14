//! Runs the stages of a deployment against one network.

use std::path::PathBuf;

use crate::{
    AddressRegistry, DeployConfig, DeployError, DeploymentPlan, InitializationCoordinator,
    NetworkProfile, RunReport, VerificationOutcome, WiringReceipt,
    artifact::Artifacts,
    chain::ChainClient,
    gas::clear_gate,
    record::DeploymentRecord,
    sequencer::DeploymentSequencer,
    verify::{SourceVerifier, VerificationRetrier},
};

/// Explicit context of a run: the resolved profile, the configuration and the collaborators.
///
/// Stages are strictly sequential: deployment, then wiring, then verification.
pub struct Orchestrator<'a, C, V> {
    chain: &'a C,
    profile: &'a NetworkProfile,
    config: &'a DeployConfig,
    artifacts: &'a Artifacts,
    verifier: Result<&'a V, String>,
    record_path: Option<PathBuf>,
}

impl<'a, C: ChainClient, V: SourceVerifier> Orchestrator<'a, C, V> {
    pub fn new(
        chain: &'a C,
        profile: &'a NetworkProfile,
        config: &'a DeployConfig,
        artifacts: &'a Artifacts,
    ) -> Self {
        Self {
            chain,
            profile,
            config,
            artifacts,
            verifier: Err("no verifier configured".to_string()),
            record_path: Some(config.record_path(&profile.network)),
        }
    }

    /// The verifier to use, or the reason verification is skipped.
    pub fn with_verifier(mut self, verifier: Result<&'a V, String>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Where to persist the deployment record. `None` disables persistence.
    pub fn with_record_path(mut self, record_path: Option<PathBuf>) -> Self {
        self.record_path = record_path;
        self
    }

    pub fn plan(&self) -> DeploymentPlan {
        DeploymentPlan::standard(self.profile, &self.config.token)
    }

    /// Deploy every contract, persisting the record after each confirmation.
    pub async fn deploy(&self) -> Result<AddressRegistry, DeployError> {
        let sequencer =
            DeploymentSequencer::new(self.chain, self.profile, self.artifacts, &self.config.gas);

        sequencer
            .deploy_all(&self.plan(), |registry| self.save_record(registry))
            .await
    }

    /// Issue the network's wiring plan against a fully populated registry.
    ///
    /// Waits on the gas price gate once before the first call.
    pub async fn wire(&self, registry: &AddressRegistry) -> Result<Vec<WiringReceipt>, DeployError> {
        let gas_price = clear_gate(
            self.chain,
            &self.config.gas,
            self.profile.gas_price_threshold_wei(),
        )
        .await?;

        InitializationCoordinator::new(self.chain, registry)
            .with_gas_price(gas_price)
            .wire(&self.profile.wiring)
            .await
    }

    /// Verify the registered contracts with the arguments they were deployed with.
    pub async fn verify(&self, registry: &AddressRegistry) -> Vec<VerificationOutcome> {
        let retrier = match &self.verifier {
            Ok(verifier) => VerificationRetrier::new(*verifier, &self.config.verification),
            Err(reason) => VerificationRetrier::skipped(reason.clone(), &self.config.verification),
        };
        retrier
            .verify_all(&DeploymentPlan::from_registry(registry), registry, self.artifacts)
            .await
    }

    /// Deploy, wire and verify.
    ///
    /// Succeeds once deployment and wiring are done, whatever the verification outcomes.
    pub async fn run(&self) -> Result<RunReport, DeployError> {
        let registry = self.deploy().await?;
        let wiring = self.wire(&registry).await?;
        let verification = self.verify(&registry).await;

        Ok(RunReport {
            network: self.profile.network.clone(),
            deployments: registry.into_contracts(),
            wiring,
            verification,
        })
    }

    /// Load the registry from the persisted deployment record.
    pub fn load_registry(&self) -> Result<AddressRegistry, DeployError> {
        let path = self.record_path.as_ref().ok_or_else(|| {
            DeployError::Record(anyhow::anyhow!("deployment record persistence is disabled"))
        })?;
        DeploymentRecord::load_from_file(path)
            .map_err(DeployError::Record)?
            .into_registry(self.profile)
    }

    fn save_record(&self, registry: &AddressRegistry) -> Result<(), DeployError> {
        let Some(path) = &self.record_path else {
            return Ok(());
        };
        DeploymentRecord::new(self.profile, registry)
            .save_to_file(path)
            .map_err(DeployError::Record)
    }
}
