use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, B256, Bytes, TxKind, U64, U128, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use anyhow::Context;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{ChainClient, FeeOracle, TxReceipt, TxRequest};
use crate::{
    DeployError, WalletRole,
    config::ConfirmationSettings,
    rpc::{create_client, json_rpc_call, poll_until},
    wallet::Wallets,
};

/// A JSON-RPC endpoint with locally held signing keys.
///
/// Transactions are legacy (type 0) transactions with an EIP-155 chain id, signed locally
/// and submitted with `eth_sendRawTransaction`. The nonce is read from the node's pending
/// state for every transaction.
pub struct RpcChain {
    client: reqwest::Client,
    url: Url,
    chain_id: u64,
    wallets: Wallets,
    confirmation: ConfirmationSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: Option<U64>,
    contract_address: Option<Address>,
    /// Absent on pre-Byzantium chains.
    status: Option<U64>,
}

impl RpcChain {
    /// Connect to `url` and check that it serves `expected_chain_id`.
    pub async fn connect(
        url: Url,
        expected_chain_id: u64,
        wallets: Wallets,
        confirmation: ConfirmationSettings,
    ) -> Result<Self, DeployError> {
        let client = create_client(confirmation.request_timeout()).map_err(DeployError::Connection)?;

        let chain_id: U64 = json_rpc_call(&client, &url, "eth_chainId", vec![])
            .await
            .map_err(DeployError::Connection)?;
        let chain_id = chain_id.to::<u64>();
        if chain_id != expected_chain_id {
            return Err(DeployError::ChainIdMismatch {
                expected: expected_chain_id,
                actual: chain_id,
            });
        }

        tracing::info!(
            url = %url.origin().ascii_serialization(),
            chain_id,
            "Connected to RPC endpoint"
        );

        Ok(Self {
            client,
            url,
            chain_id,
            wallets,
            confirmation,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        json_rpc_call(&self.client, &self.url, method, params).await
    }

    async fn estimate_gas(
        &self,
        from: Address,
        request: &TxRequest,
        gas_price: u128,
    ) -> anyhow::Result<u64> {
        let mut call = json!({
            "from": from,
            "data": request.input,
            "gasPrice": format!("{gas_price:#x}"),
        });
        if let Some(to) = request.to {
            call["to"] = json!(to);
        }

        let estimate: U64 = self
            .call("eth_estimateGas", vec![call])
            .await
            .context("Gas estimation failed, the transaction would likely revert")?;
        Ok(self.confirmation.apply_margin(estimate.to()))
    }
}

impl FeeOracle for RpcChain {
    async fn gas_price(&self) -> anyhow::Result<u128> {
        let price: U128 = self.call("eth_gasPrice", vec![]).await?;
        Ok(price.to())
    }
}

impl ChainClient for RpcChain {
    async fn send(&self, request: TxRequest) -> anyhow::Result<B256> {
        let signer = self
            .wallets
            .signer(request.from)
            .with_context(|| format!("No signer configured for {}", request.from))?;
        let from = signer.address();

        let nonce: U64 = self
            .call("eth_getTransactionCount", vec![json!(from), json!("pending")])
            .await?;
        let gas_price = match request.gas_price {
            Some(gas_price) => gas_price,
            None => self.gas_price().await?,
        };
        let gas_limit = self.estimate_gas(from, &request, gas_price).await?;

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: nonce.to(),
            gas_price,
            gas_limit,
            to: request.to.map_or(TxKind::Create, TxKind::Call),
            value: U256::ZERO,
            input: request.input,
        };
        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .context("Failed to sign transaction")?;
        let raw = TxEnvelope::from(tx.into_signed(signature)).encoded_2718();

        let tx_hash: B256 = self
            .call("eth_sendRawTransaction", vec![json!(Bytes::from(raw))])
            .await?;

        tracing::debug!(
            from = %from,
            role = %request.from,
            nonce = nonce.to::<u64>(),
            gas_limit,
            tx_hash = %tx_hash,
            "Transaction sent"
        );

        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> anyhow::Result<TxReceipt> {
        let receipt = poll_until(
            "transaction receipt",
            self.confirmation.timeout(),
            self.confirmation.poll_interval(),
            || async move {
                let receipt: Option<RpcReceipt> = self
                    .call("eth_getTransactionReceipt", vec![json!(tx_hash)])
                    .await?;
                // Some nodes return receipts of pending transactions without a block number.
                Ok(receipt.filter(|receipt| receipt.block_number.is_some()))
            },
        )
        .await
        .with_context(|| format!("Transaction {tx_hash} was not confirmed"))?;

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.to()).unwrap_or_default(),
            contract_address: receipt.contract_address,
            success: receipt.status.is_none_or(|status| status == U64::from(1)),
        })
    }

    fn address_of(&self, role: WalletRole) -> Option<Address> {
        self.wallets.address(role)
    }
}
