//! End-to-end tests of the orchestrator against a scripted chain and verifier.
//!
//! The scripted chain confirms every transaction immediately in its own block and assigns
//! predictable addresses to created contracts. No network access is needed.

use std::{
    collections::{HashMap, VecDeque},
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use tempdir::TempDir;
use zars_deploy::{
    AddressRegistry, Artifacts, ChainClient, ContractName, DeployConfig, DeployError,
    DeployedContract, DeploymentPlan, FeeOracle, InitializationCoordinator, NetworkProfile,
    Orchestrator, RegistryError, SourceVerifier, TxReceipt, TxRequest, VerificationRequest,
    VerificationResult, VerifyError, VerifyStatus, WalletRole, WiringPlan, builtin_profiles,
    gas::gwei_to_wei,
};

const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

#[derive(Default)]
struct ChainState {
    sent: Vec<TxRequest>,
    receipts: HashMap<B256, TxReceipt>,
    gas_prices: VecDeque<u128>,
}

/// Confirms every transaction immediately. Calls to `revert_target` revert.
struct ScriptedChain {
    state: Mutex<ChainState>,
    revert_target: Option<Address>,
    revert_creations: bool,
    /// Creation receipts come back without a contract address.
    omit_contract_address: bool,
    /// Role the chain has no signer for.
    unsigned_role: Option<WalletRole>,
}

impl ScriptedChain {
    fn new(gas_prices_gwei: &[f64]) -> Self {
        Self {
            state: Mutex::new(ChainState {
                gas_prices: gas_prices_gwei.iter().copied().map(gwei_to_wei).collect(),
                ..Default::default()
            }),
            revert_target: None,
            revert_creations: false,
            omit_contract_address: false,
            unsigned_role: None,
        }
    }

    fn sent(&self) -> Vec<TxRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Address the chain assigns to the `n`-th transaction when it creates a contract.
    fn created_address(n: usize) -> Address {
        Address::with_last_byte(0xa0 + n as u8)
    }
}

impl FeeOracle for ScriptedChain {
    async fn gas_price(&self) -> anyhow::Result<u128> {
        let mut state = self.state.lock().unwrap();
        let price = if state.gas_prices.len() > 1 {
            state.gas_prices.pop_front()
        } else {
            state.gas_prices.front().copied()
        };
        price.ok_or_else(|| anyhow::anyhow!("no gas price scripted"))
    }
}

impl ChainClient for ScriptedChain {
    async fn send(&self, request: TxRequest) -> anyhow::Result<B256> {
        let mut state = self.state.lock().unwrap();
        let n = state.sent.len();
        let tx_hash = B256::from(U256::from(n + 1));

        let success = match request.to {
            None => !self.revert_creations,
            Some(to) => Some(to) != self.revert_target,
        };
        let receipt = TxReceipt {
            tx_hash,
            block_number: 100 + n as u64,
            contract_address: (request.is_create() && !self.omit_contract_address)
                .then(|| Self::created_address(n)),
            success,
        };

        state.receipts.insert(tx_hash, receipt);
        state.sent.push(request);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> anyhow::Result<TxReceipt> {
        self.state
            .lock()
            .unwrap()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown transaction {tx_hash}"))
    }

    fn address_of(&self, role: WalletRole) -> Option<Address> {
        if self.unsigned_role == Some(role) {
            return None;
        }
        Some(match role {
            WalletRole::Deployer => Address::with_last_byte(0xde),
            WalletRole::SaleWallet => Address::with_last_byte(0x53),
            WalletRole::StakingRewardWallet => Address::with_last_byte(0x52),
        })
    }
}

/// Accepts or rejects everything, keeping the constructor arguments it was sent.
struct ScriptedVerifier {
    reject_all: bool,
    calls: AtomicUsize,
    constructor_args: Mutex<HashMap<ContractName, Bytes>>,
}

impl ScriptedVerifier {
    fn new(reject_all: bool) -> Self {
        Self {
            reject_all,
            calls: AtomicUsize::new(0),
            constructor_args: Mutex::new(HashMap::new()),
        }
    }

    fn constructor_args(&self, name: &ContractName) -> Option<Bytes> {
        self.constructor_args.lock().unwrap().get(name).cloned()
    }
}

impl SourceVerifier for ScriptedVerifier {
    async fn verify(&self, request: &VerificationRequest<'_>) -> Result<VerifyStatus, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.constructor_args
            .lock()
            .unwrap()
            .insert(request.name.clone(), request.constructor_args.clone());
        if self.reject_all {
            Err(VerifyError::Rejected("bytecode mismatch".to_string()))
        } else {
            Ok(VerifyStatus::Verified)
        }
    }
}

/// Write a minimal Hardhat artifact tree for the four contracts.
fn write_artifacts(root: &Path) {
    let build_info_dir = root.join("build-info");
    std::fs::create_dir_all(&build_info_dir).unwrap();
    std::fs::write(
        build_info_dir.join("f00.json"),
        serde_json::json!({
            "solcLongVersion": "0.8.20+commit.a1b79de6",
            "input": { "language": "Solidity", "sources": {} },
        })
        .to_string(),
    )
    .unwrap();

    for (i, name) in ["Zars", "Airdrop", "Presale", "Staking"].iter().enumerate() {
        let dir = root.join("contracts").join(format!("{name}.sol"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{name}.json")),
            serde_json::json!({
                "contractName": name,
                "sourceName": format!("contracts/{name}.sol"),
                "abi": [],
                "bytecode": format!("0x60806040{i:02x}"),
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.join(format!("{name}.dbg.json")),
            serde_json::json!({ "buildInfo": "../../build-info/f00.json" }).to_string(),
        )
        .unwrap();
    }
}

struct Fixture {
    dir: TempDir,
    profile: NetworkProfile,
    config: DeployConfig,
    artifacts: Artifacts,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new("zars-orchestration").unwrap();
        write_artifacts(dir.path());

        let mut config = DeployConfig::default();
        config.gas.poll_interval_ms = 10;
        config.verification.settle_delay_secs = 1;

        let mut profile = NetworkProfile::resolve("goerli", &builtin_profiles()).unwrap();
        profile.sale_wallet = Address::with_last_byte(0x53);
        profile.staking_reward_wallet = Address::with_last_byte(0x52);

        let plan = DeploymentPlan::standard(&profile, &config.token);
        let artifacts = Artifacts::load_hardhat(dir.path(), plan.artifact_names()).unwrap();

        Self {
            dir,
            profile,
            config,
            artifacts,
        }
    }

    fn orchestrator<'a>(
        &'a self,
        chain: &'a ScriptedChain,
        verifier: &'a ScriptedVerifier,
    ) -> Orchestrator<'a, ScriptedChain, ScriptedVerifier> {
        Orchestrator::new(chain, &self.profile, &self.config, &self.artifacts)
            .with_verifier(Ok(verifier))
            .with_record_path(Some(self.dir.path().join("deployments").join("goerli.json")))
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_deploys_in_order_then_wires() {
    let fixture = Fixture::new();
    let chain = ScriptedChain::new(&[0.5]);
    let verifier = ScriptedVerifier::new(false);

    let report = fixture.orchestrator(&chain, &verifier).run().await.unwrap();

    let names: Vec<&str> = report.deployments.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["token", "airdrop", "presale", "staking"]);

    let sent = chain.sent();
    assert_eq!(sent.len(), 4 + 3 + 3);
    assert!(sent[..4].iter().all(|tx| tx.is_create() && tx.from == WalletRole::Deployer));

    // Initialize calls target the deployed contracts, from the deployer.
    let token = ScriptedChain::created_address(0);
    let airdrop = ScriptedChain::created_address(1);
    let staking = ScriptedChain::created_address(3);
    assert_eq!(sent[4].to, Some(airdrop));
    assert_eq!(sent[4].from, WalletRole::Deployer);
    // airdrop.initialize(token, staking)
    assert_eq!(&sent[4].input[4 + 12..4 + 32], token.as_slice());
    assert_eq!(&sent[4].input[36 + 12..36 + 32], staking.as_slice());
    assert_eq!(sent[6].to, Some(staking));

    // Staging approvals are unlimited allowances on the token.
    let approvals = &sent[7..];
    assert_eq!(
        approvals.iter().map(|tx| tx.from).collect::<Vec<_>>(),
        [
            WalletRole::SaleWallet,
            WalletRole::SaleWallet,
            WalletRole::StakingRewardWallet
        ]
    );
    for approval in approvals {
        assert_eq!(approval.to, Some(token));
        assert_eq!(approval.input[..4], APPROVE_SELECTOR);
        assert_eq!(U256::from_be_slice(&approval.input[36..68]), U256::MAX);
    }

    assert_eq!(report.wiring.len(), 6);
    assert!(
        report
            .verification
            .iter()
            .all(|outcome| outcome.result == VerificationResult::Verified)
    );
}

#[tokio::test(start_paused = true)]
async fn test_creation_code_appends_constructor_args() {
    let fixture = Fixture::new();
    let chain = ScriptedChain::new(&[0.5]);
    let verifier = ScriptedVerifier::new(false);

    fixture.orchestrator(&chain, &verifier).deploy().await.unwrap();

    let plan = DeploymentPlan::standard(&fixture.profile, &fixture.config.token);
    let airdrop = plan.get(&ContractName::AIRDROP).unwrap();
    let sent = chain.sent();

    let mut expected = fixture.artifacts.get("Airdrop").unwrap().bytecode.to_vec();
    expected.extend_from_slice(&airdrop.encoded_args());
    assert_eq!(sent[1].input.to_vec(), expected);
    // The airdrop takes the sale wallet.
    assert_eq!(sent[1].input[sent[1].input.len() - 1], 0x53);
}

#[tokio::test(start_paused = true)]
async fn test_gas_gate_holds_submission() {
    let fixture = Fixture::new();
    let chain = ScriptedChain::new(&[5.0, 5.0, 2.0, 1.0, 0.5]);
    let verifier = ScriptedVerifier::new(false);

    fixture.orchestrator(&chain, &verifier).deploy().await.unwrap();

    let sent = chain.sent();
    // The first creation uses the first sample at or below 1 gwei.
    assert_eq!(sent[0].gas_price, Some(gwei_to_wei(1.0)));
    assert_eq!(sent[1].gas_price, Some(gwei_to_wei(0.5)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_verification_does_not_fail_the_run() {
    let fixture = Fixture::new();
    let chain = ScriptedChain::new(&[0.5]);
    let verifier = ScriptedVerifier::new(true);

    let report = fixture.orchestrator(&chain, &verifier).run().await.unwrap();

    assert_eq!(report.deployments.len(), 4);
    assert_eq!(report.wiring.len(), 6);
    assert_eq!(report.verification_failures(), 4);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_missing_explorer_skips_verification() {
    let fixture = Fixture::new();
    let chain = ScriptedChain::new(&[0.5]);

    let report = Orchestrator::<_, ScriptedVerifier>::new(
        &chain,
        &fixture.profile,
        &fixture.config,
        &fixture.artifacts,
    )
    .with_verifier(Err("ZARS_GOERLI_EXPLORER_API_KEY is not set".to_string()))
    .with_record_path(None)
    .run()
    .await
    .unwrap();

    assert!(
        report
            .verification
            .iter()
            .all(|outcome| matches!(outcome.result, VerificationResult::Skipped(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_reverted_creation_is_fatal() {
    let fixture = Fixture::new();
    let chain = ScriptedChain {
        revert_creations: true,
        ..ScriptedChain::new(&[0.5])
    };
    let verifier = ScriptedVerifier::new(false);

    let err = fixture.orchestrator(&chain, &verifier).run().await.unwrap_err();

    assert!(matches!(err, DeployError::Deployment { ref name, .. } if *name == ContractName::TOKEN));
    assert_eq!(chain.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_creation_without_contract_address_is_fatal() {
    let fixture = Fixture::new();
    let chain = ScriptedChain {
        omit_contract_address: true,
        ..ScriptedChain::new(&[0.5])
    };
    let verifier = ScriptedVerifier::new(false);

    let err = fixture.orchestrator(&chain, &verifier).deploy().await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::Deployment { ref name, ref source }
            if *name == ContractName::TOKEN && source.to_string().contains("no contract address")
    ));
    assert_eq!(chain.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reverted_initialize_is_fatal() {
    let fixture = Fixture::new();
    let chain = ScriptedChain {
        // The presale is the third contract created.
        revert_target: Some(ScriptedChain::created_address(2)),
        ..ScriptedChain::new(&[0.5])
    };
    let verifier = ScriptedVerifier::new(false);

    let err = fixture.orchestrator(&chain, &verifier).run().await.unwrap_err();

    assert!(matches!(err, DeployError::Wiring { ref action, .. } if action.starts_with("presale.initialize")));
    // Nothing is sent after the failed call and nothing is verified.
    assert_eq!(chain.sent().len(), 4 + 2);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wiring_before_staking_is_deployed_fails() {
    let chain = ScriptedChain::new(&[0.5]);
    let mut registry = AddressRegistry::new();
    for (i, name) in [ContractName::TOKEN, ContractName::AIRDROP, ContractName::PRESALE]
        .into_iter()
        .enumerate()
    {
        registry
            .register(DeployedContract {
                name,
                address: ScriptedChain::created_address(i),
                deployment_tx_hash: B256::ZERO,
                confirmed_block_number: 1,
                artifact: String::new(),
                constructor_args: Vec::new(),
            })
            .unwrap();
    }

    assert_eq!(
        registry.resolve(&ContractName::STAKING),
        Err(RegistryError::Unregistered(ContractName::STAKING))
    );

    let err = InitializationCoordinator::new(&chain, &registry)
        .wire(&WiringPlan::standard())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::Registry(RegistryError::Unregistered(ref name)) if *name == ContractName::STAKING
    ));
    assert!(chain.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_init_resumes_from_the_deployment_record() {
    let fixture = Fixture::new();
    let verifier = ScriptedVerifier::new(false);

    let deploy_chain = ScriptedChain::new(&[0.5]);
    let deployed = fixture
        .orchestrator(&deploy_chain, &verifier)
        .deploy()
        .await
        .unwrap();

    let init_chain = ScriptedChain::new(&[0.5]);
    let orchestrator = fixture.orchestrator(&init_chain, &verifier);
    let registry = orchestrator.load_registry().unwrap();
    assert_eq!(registry, deployed);

    let receipts = orchestrator.wire(&registry).await.unwrap();
    assert_eq!(receipts.len(), 6);
    assert!(init_chain.sent().iter().all(|tx| !tx.is_create()));
}

#[tokio::test(start_paused = true)]
async fn test_verify_uses_the_recorded_constructor_args() {
    let fixture = Fixture::new();
    let deploy_chain = ScriptedChain::new(&[0.5]);
    let verifier = ScriptedVerifier::new(false);
    fixture
        .orchestrator(&deploy_chain, &verifier)
        .deploy()
        .await
        .unwrap();

    // The configuration drifts between `deploy` and `verify`.
    let mut config = fixture.config.clone();
    config.token.name = "Other".to_string();
    let mut profile = fixture.profile.clone();
    profile.sale_wallet = Address::with_last_byte(0x99);

    let verify_chain = ScriptedChain::new(&[0.5]);
    let orchestrator = Orchestrator::new(&verify_chain, &profile, &config, &fixture.artifacts)
        .with_verifier(Ok(&verifier))
        .with_record_path(Some(
            fixture.dir.path().join("deployments").join("goerli.json"),
        ));
    let registry = orchestrator.load_registry().unwrap();
    let outcomes = orchestrator.verify(&registry).await;
    assert_eq!(outcomes.len(), 4);

    let sent = deploy_chain.sent();
    for (i, (name, artifact)) in [
        (ContractName::TOKEN, "Zars"),
        (ContractName::AIRDROP, "Airdrop"),
        (ContractName::PRESALE, "Presale"),
        (ContractName::STAKING, "Staking"),
    ]
    .into_iter()
    .enumerate()
    {
        let bytecode_len = fixture.artifacts.get(artifact).unwrap().bytecode.len();
        let deployed_args = &sent[i].input[bytecode_len..];
        assert_eq!(
            verifier.constructor_args(&name).unwrap().as_ref(),
            deployed_args,
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_missing_granter_signer_fails_before_any_call() {
    let fixture = Fixture::new();
    let chain = ScriptedChain {
        unsigned_role: Some(WalletRole::StakingRewardWallet),
        ..ScriptedChain::new(&[0.5])
    };
    let mut registry = AddressRegistry::new();
    for (i, name) in [
        ContractName::TOKEN,
        ContractName::AIRDROP,
        ContractName::PRESALE,
        ContractName::STAKING,
    ]
    .into_iter()
    .enumerate()
    {
        registry
            .register(DeployedContract {
                name,
                address: ScriptedChain::created_address(i),
                deployment_tx_hash: B256::ZERO,
                confirmed_block_number: 1,
                artifact: String::new(),
                constructor_args: Vec::new(),
            })
            .unwrap();
    }

    let err = InitializationCoordinator::new(&chain, &registry)
        .wire(&fixture.profile.wiring)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::Wiring { ref action, .. } if action.starts_with("staking-reward-wallet approves")
    ));
    assert!(chain.sent().is_empty());
}
