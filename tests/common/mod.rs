use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use ada_backend::config::Settings;
use ada_backend::models::operation::UserOperation;
use ada_backend::models::workflow::BlockchainKind;
use ada_backend::services::auth::{AuthService, Jwk, JwkSource};
use ada_backend::services::automation::{AutomationService, ResendMailer};
use ada_backend::services::blobs::BlobService;
use ada_backend::services::bundler::{AccountAbstractionApi, BundlerError, SponsoredFields};
use ada_backend::services::ingest::DbInvoiceStore;
use ada_backend::services::nft::NftService;
use ada_backend::services::pdf::PdfService;
use ada_backend::services::prices::FxService;
use ada_backend::services::vault::VaultService;
use ada_backend::AppState;

/// Bundler stub with fixed, successful answers.
pub struct StubBundler;

#[async_trait]
impl AccountAbstractionApi for StubBundler {
    async fn next_nonce(&self, _: Address, _: Address) -> Result<U256, BundlerError> {
        Ok(U256::from(1))
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
            paymaster_and_data: Bytes::new(),
        })
    }

    async fn send(&self, _: &UserOperation, _: Address) -> Result<B256, BundlerError> {
        Ok(B256::repeat_byte(0x01))
    }

    async fn wait_for_receipt(&self, _: B256) -> Result<B256, BundlerError> {
        Ok(B256::repeat_byte(0x02))
    }
}

pub fn test_settings() -> Settings {
    Settings {
        port: 0,
        issuer: "https://issuer.example/".into(),
        audience: "https://api.example/".into(),
        bundler_url: "http://localhost:0".into(),
        entry_point: Address::repeat_byte(0x57),
        chain_id: 80002,
        signer: PrivateKeySigner::random(),
        coingecko_url: "http://localhost:0".into(),
        pdf_render_url: "http://localhost:0".into(),
        vault_url: "http://localhost:0".into(),
        vault_token: "test".into(),
        blob_store_url: "http://localhost:0".into(),
        blob_store_token: "test".into(),
        resend_api_key: "test".into(),
        email_from: "invoices@example.com".into(),
        subscription_contract: None,
        subscription_kind: BlockchainKind::Testnet,
        nft_networks: vec!["polygon-mainnet".into()],
    }
}

pub fn test_state(db: DatabaseConnection) -> AppState {
    let settings = Arc::new(test_settings());
    let auth = Arc::new(AuthService::with_source(
        settings.issuer.clone(),
        settings.audience.clone(),
        JwkSource::Static(vec![Jwk {
            kid: "test-key".into(),
            alg: Some("HS256".into()),
            kty: "oct".into(),
            n: None,
            e: None,
            k: Some("c2VjcmV0".into()),
        }]),
    ));
    let vault = VaultService::new(settings.vault_url.clone(), settings.vault_token.clone());
    let automation = Arc::new(AutomationService::new(
        db.clone(),
        FxService::new(settings.coingecko_url.clone()),
        PdfService::new(settings.pdf_render_url.clone()),
        vault.clone(),
        Arc::new(ResendMailer::new(
            &settings.resend_api_key,
            settings.email_from.clone(),
        )),
    ));
    AppState {
        db: db.clone(),
        auth,
        bundler: Arc::new(StubBundler),
        nft: Arc::new(NftService::new(settings.nft_networks.clone())),
        automation,
        store: Arc::new(DbInvoiceStore::new(db)),
        vault,
        blobs: BlobService::new(
            settings.blob_store_url.clone(),
            settings.blob_store_token.clone(),
        ),
        settings,
    }
}
