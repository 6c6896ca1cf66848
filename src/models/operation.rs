//! User-operation request/response types
//!
//! Operation payloads are typed at the boundary (workflow + method + JSON
//! params + sender); the builder turns them into ERC-4337 user operations
//! grouped per sender, and the endpoints return partial-success envelopes.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// A single workflow call requested by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub id: String,
    pub workflow: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
    pub sender: Address,
}

/// ERC-4337 user operation (entry point v0.6 shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl UserOperation {
    /// User-operation hash as computed by the v0.6 entry point:
    /// keccak256(abi.encode(keccak256(pack(op)), entryPoint, chainId)).
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let packed = (
            self.sender,
            self.nonce,
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            self.call_gas_limit,
            self.verification_gas_limit,
            self.pre_verification_gas,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
            keccak256(&self.paymaster_and_data),
        )
            .abi_encode();
        let op_hash = keccak256(packed);
        keccak256((op_hash, entry_point, U256::from(chain_id)).abi_encode())
    }
}

/// Per-sender build/submit outcome. Terminal once returned to the caller;
/// nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationContext {
    pub sender: Address,
    pub entry_point: Address,
    /// Request ids folded into this operation.
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_op: Option<UserOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserOperationContext {
    pub fn failed(sender: Address, entry_point: Address, ids: Vec<String>, error: String) -> Self {
        Self {
            sender,
            entry_point,
            ids,
            user_op: None,
            hash: None,
            tx_hash: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOperationsRequest {
    pub api_key: String,
    pub operations: Vec<OperationRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOperationsRequest {
    pub api_key: String,
    pub operations: Vec<UserOperationContext>,
    /// Externally produced signature merged into every submitted operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
}

/// Envelope for both the build and submit endpoints. Partial success is the
/// contract: callers inspect the body, not only the status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationsResponse {
    pub message: String,
    pub successful_operations: Vec<UserOperationContext>,
    pub failed_operations: Vec<UserOperationContext>,
}

impl OperationsResponse {
    pub fn from_contexts(contexts: Vec<UserOperationContext>) -> Self {
        let (failed, succeeded): (Vec<_>, Vec<_>) =
            contexts.into_iter().partition(|ctx| ctx.error.is_some());
        let message = if failed.is_empty() {
            "OK".to_string()
        } else {
            format!("{} operation group(s) failed", failed.len())
        };
        Self {
            message,
            successful_operations: succeeded,
            failed_operations: failed,
        }
    }
}
