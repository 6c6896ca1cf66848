//! ERC-4337 bundler/paymaster JSON-RPC client
//!
//! Thin client over the account-abstraction provider: nonce lookup through
//! the entry point, gas estimation, paymaster sponsorship, submission and
//! receipt polling. The protocol internals (validation, bundling, paymaster
//! accounting) live on the provider side.

use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::models::operation::UserOperation;

sol! {
    function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
}

#[derive(Debug)]
pub enum BundlerError {
    Http(String),
    Rpc(String),
    Timeout(String),
}

impl std::fmt::Display for BundlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundlerError::Http(msg) => write!(f, "Bundler transport error: {}", msg),
            BundlerError::Rpc(msg) => write!(f, "Bundler RPC error: {}", msg),
            BundlerError::Timeout(msg) => write!(f, "Bundler timeout: {}", msg),
        }
    }
}

impl std::error::Error for BundlerError {}

/// Gas and paymaster fields filled in by the provider during sponsorship.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredFields {
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(default)]
    pub paymaster_and_data: Bytes,
}

/// Seam between the builder/submitter and the remote account-abstraction
/// provider.
#[async_trait]
pub trait AccountAbstractionApi: Send + Sync {
    async fn next_nonce(&self, sender: Address, entry_point: Address)
        -> Result<U256, BundlerError>;

    /// Fills gas and paymaster fields for an unsigned operation.
    async fn sponsor(
        &self,
        op: &UserOperation,
        entry_point: Address,
        policy_id: Option<&str>,
    ) -> Result<SponsoredFields, BundlerError>;

    /// Submits the signed operation, returning its user-operation hash.
    async fn send(&self, op: &UserOperation, entry_point: Address) -> Result<B256, BundlerError>;

    /// Waits until the operation is mined, returning the transaction hash.
    async fn wait_for_receipt(&self, op_hash: B256) -> Result<B256, BundlerError>;
}

pub struct BundlerClient {
    client: reqwest::Client,
    rpc_url: String,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserOperationReceipt {
    receipt: TransactionReceiptRef,
    #[serde(default)]
    success: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceiptRef {
    transaction_hash: B256,
}

impl BundlerClient {
    pub fn new(rpc_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url,
            poll_interval: Duration::from_secs(3),
            receipt_timeout: Duration::from_secs(90),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, BundlerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|err| BundlerError::Http(format!("{} failed: {}", method, err)))?;
        if !response.status().is_success() {
            return Err(BundlerError::Http(format!(
                "{} returned {}",
                method,
                response.status()
            )));
        }
        let rpc: RpcResponse<T> = response
            .json()
            .await
            .map_err(|err| BundlerError::Http(format!("{} decode failed: {}", method, err)))?;
        if let Some(error) = rpc.error {
            return Err(BundlerError::Rpc(format!(
                "{} error {}: {}",
                method, error.code, error.message
            )));
        }
        rpc.result
            .ok_or_else(|| BundlerError::Rpc(format!("{} returned empty result", method)))
    }
}

#[async_trait]
impl AccountAbstractionApi for BundlerClient {
    async fn next_nonce(
        &self,
        sender: Address,
        entry_point: Address,
    ) -> Result<U256, BundlerError> {
        let data = getNonceCall {
            sender,
            key: alloy::primitives::Uint::<192, 3>::ZERO,
        }
        .abi_encode();
        let result: String = self
            .request(
                "eth_call",
                json!([{ "to": entry_point, "data": Bytes::from(data) }, "latest"]),
            )
            .await?;
        let raw = hex::decode(result.trim_start_matches("0x"))
            .map_err(|err| BundlerError::Rpc(format!("bad nonce encoding: {}", err)))?;
        U256::abi_decode(&raw, true)
            .map_err(|err| BundlerError::Rpc(format!("bad nonce value: {}", err)))
    }

    async fn sponsor(
        &self,
        op: &UserOperation,
        entry_point: Address,
        policy_id: Option<&str>,
    ) -> Result<SponsoredFields, BundlerError> {
        let params = match policy_id {
            Some(policy) => json!([op, entry_point, { "policyId": policy }]),
            None => json!([op, entry_point]),
        };
        self.request("pm_sponsorUserOperation", params).await
    }

    async fn send(&self, op: &UserOperation, entry_point: Address) -> Result<B256, BundlerError> {
        self.request("eth_sendUserOperation", json!([op, entry_point]))
            .await
    }

    async fn wait_for_receipt(&self, op_hash: B256) -> Result<B256, BundlerError> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            let receipt: Option<UserOperationReceipt> = self
                .request("eth_getUserOperationReceipt", json!([op_hash]))
                .await
                .ok()
                .flatten();
            if let Some(receipt) = receipt {
                if !receipt.success {
                    return Err(BundlerError::Rpc(format!(
                        "user operation {} reverted",
                        op_hash
                    )));
                }
                return Ok(receipt.receipt.transaction_hash);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BundlerError::Timeout(format!(
                    "no receipt for user operation {} within {:?}",
                    op_hash, self.receipt_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
