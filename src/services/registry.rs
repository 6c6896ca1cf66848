//! Workflow registry lookups
//!
//! Resolves a workflow url slug to its stored ABI and the contract address
//! for the workflow's (chain, kind) pair.

use alloy::json_abi::JsonAbi;
use alloy::primitives::Address;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::{prelude::*, workflows};
use crate::error::ApiError;
use crate::models::workflow::{rpc_endpoint, Blockchain, BlockchainKind};

/// A workflow resolved to everything needed to call its contract.
#[derive(Debug, Clone)]
pub struct ResolvedWorkflow {
    pub workflow: workflows::Model,
    pub chain: Blockchain,
    pub kind: BlockchainKind,
    pub contract: Address,
    pub abi: JsonAbi,
    pub endpoint: &'static str,
}

/// First workflow matching the url; scoped to the user when one is given.
pub async fn find_by_url(
    db: &DatabaseConnection,
    url: &str,
    user_id: Option<&str>,
) -> Result<workflows::Model, ApiError> {
    let mut query = Workflows::find().filter(workflows::Column::Url.eq(url));
    if let Some(user_id) = user_id {
        query = query.filter(workflows::Column::UserId.eq(user_id));
    }
    query
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("cannot find workflow with url {}", url)))
}

/// Resolves chain/kind/address/ABI for an EVM call against the workflow's
/// contract. NEAR workflows are rejected explicitly.
pub fn resolve_evm(workflow: workflows::Model) -> Result<ResolvedWorkflow, ApiError> {
    let chain = workflow
        .chain()
        .ok_or_else(|| ApiError::Validation(format!("workflow {} has no selected chain", workflow.url)))?;
    let kind = workflow.kind().ok_or_else(|| {
        ApiError::Validation(format!("workflow {} has no blockchain kind", workflow.url))
    })?;
    if !chain.is_evm() {
        return Err(ApiError::Validation(format!(
            "workflow {} targets a non-EVM chain",
            workflow.url
        )));
    }
    let contract = workflow
        .contract_address(kind)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "workflow {} has no contract address for the selected kind",
                workflow.url
            ))
        })?
        .parse::<Address>()
        .map_err(|err| ApiError::Validation(format!("bad contract address: {}", err)))?;
    let abi: JsonAbi = serde_json::from_str(&workflow.abi)
        .map_err(|err| ApiError::Validation(format!("stored ABI is invalid: {}", err)))?;
    let endpoint = rpc_endpoint(chain, kind);
    Ok(ResolvedWorkflow {
        workflow,
        chain,
        kind,
        contract,
        abi,
        endpoint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const GET_NAME_ABI: &str = r#"[
        {"inputs":[{"internalType":"uint256","name":"id","type":"uint256"}],
         "name":"getName",
         "outputs":[{"internalType":"string","name":"","type":"string"}],
         "stateMutability":"view","type":"function"}
    ]"#;

    fn workflow(chain: i32, kind: i32) -> workflows::Model {
        workflows::Model {
            id: 1,
            url: "silver-demo".into(),
            user_id: "auth0|user".into(),
            project: None,
            object: None,
            abi: GET_NAME_ABI.into(),
            selected_chain: chain,
            selected_blockchain_kind: kind,
            testnet_address: Some("0x00000000000000000000000000000000000000aa".into()),
            mainnet_address: Some("0x00000000000000000000000000000000000000bb".into()),
            created_at: Utc::now().into(),
            modified_at: Utc::now().into(),
        }
    }

    #[test]
    fn resolves_testnet_address_for_kind_zero() {
        let resolved = resolve_evm(workflow(2, 0)).unwrap();
        assert_eq!(
            resolved.contract,
            "0x00000000000000000000000000000000000000aa".parse::<Address>().unwrap()
        );
        assert!(resolved.abi.function("getName").is_some());
        assert!(resolved.endpoint.starts_with("https://"));
    }

    #[test]
    fn resolves_mainnet_address_for_kind_one() {
        let resolved = resolve_evm(workflow(2, 1)).unwrap();
        assert_eq!(
            resolved.contract,
            "0x00000000000000000000000000000000000000bb".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn near_workflow_is_rejected_for_evm_calls() {
        let result = resolve_evm(workflow(1, 0));
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn unset_chain_is_rejected() {
        let result = resolve_evm(workflow(0, 0));
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
