//! Post-deployment wiring: initialize calls and token allowances.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, U256, keccak256},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    AddressRegistry, ContractName, DeployError, WalletRole,
    chain::{ChainClient, TxRequest},
};

/// Build calldata for `signature` (e.g. `approve(address,uint256)`) with ABI-encoded `args`.
pub fn encode_call(signature: &str, args: Vec<DynSolValue>) -> Bytes {
    let hash = keccak256(signature.as_bytes());
    let mut calldata = hash[..4].to_vec();
    if !args.is_empty() {
        calldata.extend(DynSolValue::Tuple(args).abi_encode_params());
    }
    calldata.into()
}

/// An `initialize(address,...)` call on `target`, taking the addresses of `references` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeCall {
    pub target: ContractName,
    pub references: Vec<ContractName>,
}

impl InitializeCall {
    pub fn new(target: ContractName, references: Vec<ContractName>) -> Self {
        Self { target, references }
    }

    pub fn signature(&self) -> String {
        format!("initialize({})", vec!["address"; self.references.len()].join(","))
    }

    pub fn calldata(&self, references: &[Address]) -> Bytes {
        encode_call(
            &self.signature(),
            references.iter().copied().map(DynSolValue::Address).collect(),
        )
    }

    fn describe(&self) -> String {
        let refs: Vec<&str> = self.references.iter().map(ContractName::as_str).collect();
        format!("{}.initialize({})", self.target, refs.join(", "))
    }
}

/// An unlimited allowance on `token` granted by `granter` to `spender`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSpec {
    pub granter: WalletRole,
    pub token: ContractName,
    pub spender: ContractName,
}

impl ApprovalSpec {
    pub fn new(granter: WalletRole, token: ContractName, spender: ContractName) -> Self {
        Self {
            granter,
            token,
            spender,
        }
    }

    fn describe(&self) -> String {
        format!("{} approves {} on {}", self.granter, self.spender, self.token)
    }
}

/// Everything the coordinator does for a network, expressed as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringPlan {
    #[serde(default)]
    pub initializations: Vec<InitializeCall>,
    #[serde(default)]
    pub approvals: Vec<ApprovalSpec>,
}

impl WiringPlan {
    pub fn with_approvals(mut self, approvals: Vec<ApprovalSpec>) -> Self {
        self.approvals = approvals;
        self
    }

    /// Whether any call in the plan must be signed by `role`.
    pub fn uses_role(&self, role: WalletRole) -> bool {
        (role == WalletRole::Deployer && !self.initializations.is_empty())
            || self.approvals.iter().any(|approval| approval.granter == role)
    }

    /// Every contract name the plan reads from the registry.
    pub fn referenced_contracts(&self) -> impl Iterator<Item = &ContractName> {
        self.initializations
            .iter()
            .flat_map(|call| std::iter::once(&call.target).chain(call.references.iter()))
            .chain(
                self.approvals
                    .iter()
                    .flat_map(|approval| [&approval.token, &approval.spender]),
            )
    }
}

/// A resolved allowance. The amount is always `U256::MAX` ("unlimited until revoked").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalGrant {
    pub granter: WalletRole,
    pub granter_address: Address,
    pub token: Address,
    pub spender: Address,
    amount: U256,
}

impl ApprovalGrant {
    pub const SIGNATURE: &'static str = "approve(address,uint256)";

    pub fn unlimited(
        granter: WalletRole,
        granter_address: Address,
        token: Address,
        spender: Address,
    ) -> Self {
        Self {
            granter,
            granter_address,
            token,
            spender,
            amount: U256::MAX,
        }
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn calldata(&self) -> Bytes {
        encode_call(
            Self::SIGNATURE,
            vec![
                DynSolValue::Address(self.spender),
                DynSolValue::Uint(self.amount, 256),
            ],
        )
    }
}

/// Confirmation of one wiring transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringReceipt {
    pub action: String,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Issues the initialize and approval calls of a [`WiringPlan`].
pub struct InitializationCoordinator<'a, C> {
    chain: &'a C,
    registry: &'a AddressRegistry,
    gas_price: Option<u128>,
}

impl<'a, C: ChainClient> InitializationCoordinator<'a, C> {
    pub fn new(chain: &'a C, registry: &'a AddressRegistry) -> Self {
        Self {
            chain,
            registry,
            gas_price: None,
        }
    }

    /// Gas price to submit with, typically the sample that cleared the gas gate.
    pub fn with_gas_price(mut self, gas_price: Option<u128>) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Run the plan: every initialize call in order, then every approval.
    ///
    /// All referenced contracts and approval signers are resolved before the first
    /// transaction is sent, so a missing deployment or key fails the run without leaving the
    /// system half wired. A reverted call (e.g. a contract that was already initialized) is
    /// fatal.
    pub async fn wire(&self, plan: &WiringPlan) -> Result<Vec<WiringReceipt>, DeployError> {
        for name in plan.referenced_contracts() {
            self.registry.resolve(name)?;
        }
        let grants = plan
            .approvals
            .iter()
            .map(|approval| self.grant(approval))
            .collect::<Result<Vec<_>, _>>()?;

        let mut receipts = Vec::with_capacity(plan.initializations.len() + plan.approvals.len());

        for call in &plan.initializations {
            let target = self.registry.resolve(&call.target)?;
            let references = call
                .references
                .iter()
                .map(|name| self.registry.resolve(name))
                .collect::<Result<Vec<_>, _>>()?;

            let request = TxRequest::call(WalletRole::Deployer, target, call.calldata(&references))
                .with_gas_price(self.gas_price);
            let receipt = self.submit(call.describe(), request).await?;

            tracing::info!(
                contract = %call.target,
                address = %target,
                tx_hash = %receipt.tx_hash,
                "{} initialized",
                call.target
            );
            receipts.push(receipt);
        }

        for (approval, grant) in plan.approvals.iter().zip(grants) {
            let request = TxRequest::call(approval.granter, grant.token, grant.calldata())
                .with_gas_price(self.gas_price);
            let receipt = self.submit(approval.describe(), request).await?;

            tracing::info!(
                granter = %approval.granter,
                granter_address = %grant.granter_address,
                spender = %approval.spender,
                spender_address = %grant.spender,
                tx_hash = %receipt.tx_hash,
                "{}'s allowance granted to {}",
                approval.granter,
                approval.spender
            );
            receipts.push(receipt);
        }

        Ok(receipts)
    }

    fn grant(&self, approval: &ApprovalSpec) -> Result<ApprovalGrant, DeployError> {
        let granter_address =
            self.chain
                .address_of(approval.granter)
                .ok_or_else(|| DeployError::Wiring {
                    action: approval.describe(),
                    source: anyhow::anyhow!("no signer configured for {}", approval.granter),
                })?;

        Ok(ApprovalGrant::unlimited(
            approval.granter,
            granter_address,
            self.registry.resolve(&approval.token)?,
            self.registry.resolve(&approval.spender)?,
        ))
    }

    async fn submit(&self, action: String, request: TxRequest) -> Result<WiringReceipt, DeployError> {
        let result = async {
            let tx_hash = self
                .chain
                .send(request)
                .await
                .context("failed to submit transaction")?;
            tracing::debug!(action = %action, tx_hash = %tx_hash, "Wiring transaction submitted");

            let receipt = self
                .chain
                .wait_for_receipt(tx_hash)
                .await
                .context("failed to confirm transaction")?;
            if !receipt.success {
                anyhow::bail!(
                    "transaction {} reverted in block {}",
                    receipt.tx_hash,
                    receipt.block_number
                );
            }
            Ok::<_, anyhow::Error>(receipt)
        }
        .await;

        match result {
            Ok(receipt) => Ok(WiringReceipt {
                action,
                tx_hash: receipt.tx_hash,
                block_number: receipt.block_number,
            }),
            Err(source) => Err(DeployError::Wiring { action, source }),
        }
    }
}
