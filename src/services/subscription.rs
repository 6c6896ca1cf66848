//! On-chain subscription refresh
//!
//! Subscription validity lives on a contract per chain; the rows here are a
//! cached mirror the HTTP layer reads. The refresh walks every row, asks
//! the contract for the wallet's expiry and stamps the result.

use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};

use crate::entities::{prelude::*, subscriptions};
use crate::error::ApiError;
use crate::models::workflow::{rpc_endpoint, Blockchain, BlockchainKind};

sol! {
    #[sol(rpc)]
    interface ISubscription {
        function validUntil(address subscriber) external view returns (uint256);
    }
}

pub struct SubscriptionService {
    db: DatabaseConnection,
    contract: Address,
    kind: BlockchainKind,
}

impl SubscriptionService {
    pub fn new(db: DatabaseConnection, contract: Address, kind: BlockchainKind) -> Self {
        Self { db, contract, kind }
    }

    /// Refreshes every cached row. Per-row failures are logged and skipped
    /// so one unreachable chain cannot stall the rest.
    pub async fn refresh_all(&self) -> Result<usize, ApiError> {
        let rows = Subscriptions::find().all(&self.db).await?;
        let mut refreshed = 0;
        for row in rows {
            match self.refresh_row(&row).await {
                Ok(()) => refreshed += 1,
                Err(err) => {
                    tracing::warn!(
                        user = %row.user_id,
                        chain = row.chain,
                        error = %err,
                        "Subscription refresh failed"
                    );
                }
            }
        }
        Ok(refreshed)
    }

    async fn refresh_row(&self, row: &subscriptions::Model) -> Result<(), ApiError> {
        let chain = Blockchain::from_selector(row.chain).ok_or_else(|| {
            ApiError::Validation(format!("subscription row has unknown chain {}", row.chain))
        })?;
        if !chain.is_evm() {
            return Err(ApiError::Validation(
                "subscription contract is EVM-only".into(),
            ));
        }
        let wallet: Address = row
            .wallet
            .parse()
            .map_err(|err| ApiError::Validation(format!("bad wallet address: {}", err)))?;

        let rpc_url = rpc_endpoint(chain, self.kind)
            .parse()
            .map_err(|err| ApiError::Validation(format!("bad rpc endpoint: {}", err)))?;
        let provider = ProviderBuilder::new().on_http(rpc_url);
        let contract = ISubscription::new(self.contract, &provider);
        let until: U256 = contract
            .validUntil(wallet)
            .call()
            .await
            .map_err(|err| ApiError::Upstream(format!("validUntil failed: {}", err)))?
            ._0;

        let valid_until = expiry_timestamp(until);
        let mut update = subscriptions::ActiveModel::from(row.clone());
        update.valid_until = Set(valid_until.map(Into::into));
        update.refreshed_at = Set(Utc::now().into());
        update.update(&self.db).await?;
        Ok(())
    }
}

/// Contract expiry as a timestamp; zero means no subscription.
fn expiry_timestamp(until: U256) -> Option<DateTime<Utc>> {
    if until.is_zero() {
        return None;
    }
    let seconds = i64::try_from(until).ok()?;
    DateTime::from_timestamp(seconds, 0)
}
