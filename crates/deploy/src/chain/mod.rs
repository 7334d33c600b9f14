//! Interfaces to the target network consumed by the orchestrator.
//!
//! The orchestrator never talks to a node directly: it goes through [`FeeOracle`] for fee
//! estimates and [`ChainClient`] for signed transaction submission and confirmation.
//! [`RpcChain`] implements both over JSON-RPC.

mod rpc_chain;

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};

pub use rpc_chain::RpcChain;

use crate::WalletRole;

/// Source of the network's current gas price.
pub trait FeeOracle: Send + Sync {
    /// Fresh gas price estimate in wei. Implementations must not cache.
    fn gas_price(&self) -> impl Future<Output = anyhow::Result<u128>> + Send;
}

/// Signed transaction submission and confirmation tracking.
pub trait ChainClient: FeeOracle {
    /// Sign and submit a transaction, returning its hash.
    fn send(&self, request: TxRequest) -> impl Future<Output = anyhow::Result<B256>> + Send;

    /// Wait until the transaction is included and return its receipt.
    fn wait_for_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = anyhow::Result<TxReceipt>> + Send;

    /// Address controlled by the signer of a wallet role, if one is configured.
    fn address_of(&self, role: WalletRole) -> Option<Address>;
}

/// A transaction to sign and submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// The wallet role that signs the transaction.
    pub from: WalletRole,
    /// `None` creates a contract from `input`.
    pub to: Option<Address>,
    pub input: Bytes,
    /// Gas price in wei. When unset the client queries the current price.
    pub gas_price: Option<u128>,
}

impl TxRequest {
    pub fn create(from: WalletRole, creation_code: Bytes) -> Self {
        Self {
            from,
            to: None,
            input: creation_code,
            gas_price: None,
        }
    }

    pub fn call(from: WalletRole, to: Address, calldata: Bytes) -> Self {
        Self {
            from,
            to: Some(to),
            input: calldata,
            gas_price: None,
        }
    }

    pub fn with_gas_price(mut self, gas_price: Option<u128>) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

/// The parts of a transaction receipt the orchestrator relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// Set for contract-creation transactions.
    pub contract_address: Option<Address>,
    /// `false` when the transaction reverted.
    pub success: bool,
}
