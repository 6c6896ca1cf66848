//! Periodic subscription refresh from the on-chain contract

use alloy::primitives::Address;
use sea_orm::DatabaseConnection;
use tokio::time::{interval, Duration};

use crate::models::workflow::BlockchainKind;
use crate::services::subscription::SubscriptionService;

const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

pub async fn start_subscription_sync_job(db: DatabaseConnection, contract: Address, kind: BlockchainKind) {
    tokio::spawn(async move {
        let service = SubscriptionService::new(db, contract, kind);
        let mut interval = interval(REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            tracing::info!("Starting subscription refresh");
            match service.refresh_all().await {
                Ok(count) => tracing::info!("Refreshed {} subscription rows", count),
                Err(e) => tracing::error!("Subscription refresh failed: {}", e),
            }
        }
    });
}
