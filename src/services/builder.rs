//! User-operation builder
//!
//! Groups requested workflow calls by sender, encodes each call against the
//! workflow's stored ABI, folds a group into one executeBatch operation and
//! lets the account-abstraction provider fill gas/nonce/paymaster fields
//! before signing. A failing group is reported against all of its request
//! ids while the remaining groups continue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt};
use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::error::ApiError;
use crate::models::operation::{OperationRequest, UserOperation, UserOperationContext};
use crate::services::bundler::AccountAbstractionApi;
use crate::services::registry::{self, ResolvedWorkflow};

sol! {
    interface IAccount {
        function executeBatch(address[] calldata dest, bytes[] calldata func) external;
    }
}

/// Workflow resolution seam; the database-backed source is the production
/// implementation.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedWorkflow, ApiError>;
}

pub struct DbWorkflowSource {
    db: DatabaseConnection,
}

impl DbWorkflowSource {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkflowSource for DbWorkflowSource {
    async fn resolve(&self, url: &str) -> Result<ResolvedWorkflow, ApiError> {
        let workflow = registry::find_by_url(&self.db, url, None).await?;
        registry::resolve_evm(workflow)
    }
}

pub struct OperationBuilder {
    workflows: Arc<dyn WorkflowSource>,
    provider: Arc<dyn AccountAbstractionApi>,
    signer: PrivateKeySigner,
    entry_point: Address,
    chain_id: u64,
    policy_id: Option<String>,
    /// Pacing between sender groups; groups run sequentially so this delay
    /// throttles provider calls.
    group_delay: Duration,
}

impl OperationBuilder {
    pub fn new(
        workflows: Arc<dyn WorkflowSource>,
        provider: Arc<dyn AccountAbstractionApi>,
        signer: PrivateKeySigner,
        entry_point: Address,
        chain_id: u64,
        policy_id: Option<String>,
        group_delay: Duration,
    ) -> Self {
        Self {
            workflows,
            provider,
            signer,
            entry_point,
            chain_id,
            policy_id,
            group_delay,
        }
    }

    /// Builds one signed user operation per distinct sender. Always returns
    /// one context per group; failures carry the error instead of an op.
    pub async fn build_operations(
        &self,
        requests: Vec<OperationRequest>,
    ) -> Vec<UserOperationContext> {
        let groups = group_by_sender(requests);
        let mut contexts = Vec::with_capacity(groups.len());

        for (index, (sender, group)) in groups.into_iter().enumerate() {
            if index > 0 && !self.group_delay.is_zero() {
                tokio::time::sleep(self.group_delay).await;
            }
            let ids: Vec<String> = group.iter().map(|op| op.id.clone()).collect();
            match self.build_group(sender, &group).await {
                Ok(mut ctx) => {
                    ctx.ids = ids;
                    contexts.push(ctx);
                }
                Err(err) => {
                    tracing::warn!(sender = %sender, error = %err, "Operation group failed to build");
                    contexts.push(UserOperationContext::failed(
                        sender,
                        self.entry_point,
                        ids,
                        format!("Failed to build operation: {}", err),
                    ));
                }
            }
        }

        contexts
    }

    async fn build_group(
        &self,
        sender: Address,
        group: &[OperationRequest],
    ) -> Result<UserOperationContext, ApiError> {
        let mut dests = Vec::with_capacity(group.len());
        let mut calls = Vec::with_capacity(group.len());
        for request in group {
            let resolved = self.workflows.resolve(&request.workflow).await?;
            let call_data = encode_call(&resolved, &request.method, &request.params)?;
            dests.push(resolved.contract);
            calls.push(Bytes::from(call_data));
        }

        let call_data = IAccount::executeBatchCall {
            dest: dests,
            func: calls,
        }
        .abi_encode();

        let nonce = self
            .provider
            .next_nonce(sender, self.entry_point)
            .await
            .map_err(|err| ApiError::Upstream(err.to_string()))?;

        let mut op = UserOperation {
            sender,
            nonce,
            init_code: Bytes::new(),
            call_data: Bytes::from(call_data),
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        };

        let sponsored = self
            .provider
            .sponsor(&op, self.entry_point, self.policy_id.as_deref())
            .await
            .map_err(|err| ApiError::Upstream(err.to_string()))?;
        op.call_gas_limit = sponsored.call_gas_limit;
        op.verification_gas_limit = sponsored.verification_gas_limit;
        op.pre_verification_gas = sponsored.pre_verification_gas;
        op.max_fee_per_gas = sponsored.max_fee_per_gas;
        op.max_priority_fee_per_gas = sponsored.max_priority_fee_per_gas;
        op.paymaster_and_data = sponsored.paymaster_and_data;

        let hash = op.hash(self.entry_point, self.chain_id);
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|err| ApiError::Upstream(format!("signing failed: {}", err)))?;
        op.signature = Bytes::from(signature.as_bytes().to_vec());

        Ok(UserOperationContext {
            sender,
            entry_point: self.entry_point,
            ids: Vec::new(),
            user_op: Some(op),
            hash: Some(hash),
            tx_hash: None,
            error: None,
        })
    }
}

/// Stable first-seen grouping by sender address.
fn group_by_sender(
    requests: Vec<OperationRequest>,
) -> Vec<(Address, Vec<OperationRequest>)> {
    let mut order: Vec<Address> = Vec::new();
    let mut groups: HashMap<Address, Vec<OperationRequest>> = HashMap::new();
    for request in requests {
        if !groups.contains_key(&request.sender) {
            order.push(request.sender);
        }
        groups.entry(request.sender).or_default().push(request);
    }
    order
        .into_iter()
        .map(|sender| {
            let group = groups.remove(&sender).unwrap_or_default();
            (sender, group)
        })
        .collect()
}

/// ABI-encodes `method(params)` against the workflow's stored ABI.
fn encode_call(
    resolved: &ResolvedWorkflow,
    method: &str,
    params: &[serde_json::Value],
) -> Result<Vec<u8>, ApiError> {
    let function = resolved
        .abi
        .function(method)
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "workflow {} has no method {}",
                resolved.workflow.url, method
            ))
        })?;
    if function.inputs.len() != params.len() {
        return Err(ApiError::Validation(format!(
            "method {} expects {} parameter(s), got {}",
            method,
            function.inputs.len(),
            params.len()
        )));
    }

    let mut values = Vec::with_capacity(params.len());
    for (input, param) in function.inputs.iter().zip(params) {
        let ty: DynSolType = input
            .ty
            .parse()
            .map_err(|err| ApiError::Validation(format!("bad ABI type {}: {}", input.ty, err)))?;
        values.push(coerce_param(&ty, param)?);
    }

    function
        .abi_encode_input(&values)
        .map_err(|err| ApiError::Validation(format!("cannot encode call to {}: {}", method, err)))
}

fn coerce_param(ty: &DynSolType, value: &serde_json::Value) -> Result<DynSolValue, ApiError> {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s.clone()),
                    serde_json::Value::Number(n) => Ok(n.to_string()),
                    serde_json::Value::Bool(b) => Ok(b.to_string()),
                    other => Err(ApiError::Validation(format!(
                        "unsupported nested parameter: {}",
                        other
                    ))),
                })
                .collect::<Result<_, _>>()?;
            format!("[{}]", parts.join(","))
        }
        other => {
            return Err(ApiError::Validation(format!(
                "unsupported parameter value: {}",
                other
            )));
        }
    };
    ty.coerce_str(&text)
        .map_err(|err| ApiError::Validation(format!("parameter {:?} does not fit {}: {}", value, ty, err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::workflows;
    use crate::models::workflow::{Blockchain, BlockchainKind};
    use crate::services::bundler::{BundlerError, SponsoredFields};
    use alloy::primitives::B256;
    use chrono::Utc;
    use std::collections::HashSet;

    const PROCESS_ABI: &str = r#"[
        {"inputs":[{"internalType":"uint256","name":"id","type":"uint256"},
                   {"internalType":"string","name":"receipt","type":"string"}],
         "name":"process","outputs":[],
         "stateMutability":"nonpayable","type":"function"}
    ]"#;

    fn resolved(url: &str) -> ResolvedWorkflow {
        let workflow = workflows::Model {
            id: 1,
            url: url.into(),
            user_id: "auth0|user".into(),
            project: None,
            object: None,
            abi: PROCESS_ABI.into(),
            selected_chain: 2,
            selected_blockchain_kind: 0,
            testnet_address: Some("0x00000000000000000000000000000000000000aa".into()),
            mainnet_address: None,
            created_at: Utc::now().into(),
            modified_at: Utc::now().into(),
        };
        ResolvedWorkflow {
            chain: Blockchain::Polygon,
            kind: BlockchainKind::Testnet,
            contract: "0x00000000000000000000000000000000000000aa".parse().unwrap(),
            abi: serde_json::from_str(PROCESS_ABI).unwrap(),
            endpoint: "https://rpc-amoy.polygon.technology",
            workflow,
        }
    }

    struct FakeWorkflows;

    #[async_trait]
    impl WorkflowSource for FakeWorkflows {
        async fn resolve(&self, url: &str) -> Result<ResolvedWorkflow, ApiError> {
            if url == "missing" {
                return Err(ApiError::NotFound(format!(
                    "cannot find workflow with url {}",
                    url
                )));
            }
            Ok(resolved(url))
        }
    }

    struct FakeProvider;

    #[async_trait]
    impl AccountAbstractionApi for FakeProvider {
        async fn next_nonce(&self, _: Address, _: Address) -> Result<U256, BundlerError> {
            Ok(U256::from(3))
        }

        async fn sponsor(
            &self,
            _: &UserOperation,
            _: Address,
            _: Option<&str>,
        ) -> Result<SponsoredFields, BundlerError> {
            Ok(SponsoredFields {
                call_gas_limit: U256::from(200_000),
                verification_gas_limit: U256::from(120_000),
                pre_verification_gas: U256::from(21_000),
                max_fee_per_gas: U256::from(30_000_000_000u64),
                max_priority_fee_per_gas: U256::from(1_500_000_000u64),
                paymaster_and_data: Bytes::from(vec![0xaa]),
            })
        }

        async fn send(&self, _: &UserOperation, _: Address) -> Result<B256, BundlerError> {
            Ok(B256::repeat_byte(0x01))
        }

        async fn wait_for_receipt(&self, _: B256) -> Result<B256, BundlerError> {
            Ok(B256::repeat_byte(0x02))
        }
    }

    fn builder() -> OperationBuilder {
        OperationBuilder::new(
            Arc::new(FakeWorkflows),
            Arc::new(FakeProvider),
            PrivateKeySigner::random(),
            Address::repeat_byte(0x57),
            80002,
            Some("policy-1".into()),
            Duration::ZERO,
        )
    }

    fn request(id: &str, workflow: &str, sender: Address) -> OperationRequest {
        OperationRequest {
            id: id.into(),
            workflow: workflow.into(),
            method: "process".into(),
            params: vec![serde_json::json!(7), serde_json::json!("receipt-1")],
            sender,
        }
    }

    #[tokio::test]
    async fn groups_by_sender_and_preserves_ids_exactly_once() {
        let a = Address::repeat_byte(0x0a);
        let b = Address::repeat_byte(0x0b);
        let requests = vec![
            request("op-1", "silver", a),
            request("op-2", "silver", b),
            request("op-3", "silver", a),
        ];
        let contexts = builder().build_operations(requests).await;

        assert_eq!(contexts.len(), 2);
        let all_ids: Vec<&str> = contexts
            .iter()
            .flat_map(|ctx| ctx.ids.iter().map(String::as_str))
            .collect();
        let unique: HashSet<&str> = all_ids.iter().copied().collect();
        assert_eq!(all_ids.len(), 3);
        assert_eq!(
            unique,
            HashSet::from(["op-1", "op-2", "op-3"])
        );
        // first-seen order: a's group first and it holds both of a's ops
        assert_eq!(contexts[0].sender, a);
        assert_eq!(contexts[0].ids, vec!["op-1", "op-3"]);
        assert!(contexts.iter().all(|ctx| ctx.error.is_none()));
        assert!(contexts.iter().all(|ctx| ctx.user_op.is_some()));
    }

    #[tokio::test]
    async fn failing_group_does_not_abort_the_batch() {
        let a = Address::repeat_byte(0x0a);
        let b = Address::repeat_byte(0x0b);
        let requests = vec![
            request("op-1", "missing", a),
            request("op-2", "silver", b),
        ];
        let contexts = builder().build_operations(requests).await;

        assert_eq!(contexts.len(), 2);
        let failed = &contexts[0];
        assert_eq!(failed.ids, vec!["op-1"]);
        assert!(failed.user_op.is_none());
        assert!(failed
            .error
            .as_deref()
            .unwrap()
            .contains("cannot find workflow with url missing"));
        assert!(contexts[1].error.is_none());
    }

    #[tokio::test]
    async fn sponsored_fields_and_signature_land_on_the_op() {
        let requests = vec![request("op-1", "silver", Address::repeat_byte(0x0a))];
        let contexts = builder().build_operations(requests).await;
        let op = contexts[0].user_op.as_ref().unwrap();
        assert_eq!(op.nonce, U256::from(3));
        assert_eq!(op.call_gas_limit, U256::from(200_000));
        assert_eq!(op.paymaster_and_data, Bytes::from(vec![0xaa]));
        assert_eq!(op.signature.len(), 65);
        assert!(contexts[0].hash.is_some());
    }

    #[tokio::test]
    async fn parameter_arity_is_validated() {
        let mut bad = request("op-1", "silver", Address::repeat_byte(0x0a));
        bad.params.pop();
        let contexts = builder().build_operations(vec![bad]).await;
        assert!(contexts[0]
            .error
            .as_deref()
            .unwrap()
            .contains("expects 2 parameter(s)"));
    }
}
