//! Process configuration
//!
//! Everything comes from the environment (plus .env in development).
//! Missing required variables abort startup.

use std::env;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::models::workflow::BlockchainKind;
use crate::services::nft::DEFAULT_NETWORKS;

#[derive(Clone)]
pub struct Settings {
    pub port: u16,
    pub issuer: String,
    pub audience: String,
    pub bundler_url: String,
    pub entry_point: Address,
    pub chain_id: u64,
    pub signer: PrivateKeySigner,
    pub coingecko_url: String,
    pub pdf_render_url: String,
    pub vault_url: String,
    pub vault_token: String,
    pub blob_store_url: String,
    pub blob_store_token: String,
    pub resend_api_key: String,
    pub email_from: String,
    pub subscription_contract: Option<Address>,
    pub subscription_kind: BlockchainKind,
    pub nft_networks: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        let nft_networks = env::var("NFT_NETWORKS")
            .map(|raw| {
                raw.split(',')
                    .map(|network| network.trim().to_string())
                    .filter(|network| !network.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| DEFAULT_NETWORKS.iter().map(|n| n.to_string()).collect());

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3000),
            issuer: env::var("AUTH_ISSUER").expect("AUTH_ISSUER must be set"),
            audience: env::var("AUTH_AUDIENCE").expect("AUTH_AUDIENCE must be set"),
            bundler_url: env::var("BUNDLER_URL").expect("BUNDLER_URL must be set"),
            entry_point: env::var("ENTRY_POINT")
                .expect("ENTRY_POINT must be set")
                .parse()
                .expect("ENTRY_POINT must be an address"),
            chain_id: env::var("CHAIN_ID")
                .expect("CHAIN_ID must be set")
                .parse()
                .expect("CHAIN_ID must be a number"),
            signer: env::var("SIGNER_KEY")
                .expect("SIGNER_KEY must be set")
                .parse()
                .expect("SIGNER_KEY must be a private key"),
            coingecko_url: env::var("COINGECKO_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            pdf_render_url: env::var("PDF_RENDER_URL").expect("PDF_RENDER_URL must be set"),
            vault_url: env::var("VAULT_URL").expect("VAULT_URL must be set"),
            vault_token: env::var("VAULT_TOKEN").expect("VAULT_TOKEN must be set"),
            blob_store_url: env::var("BLOB_STORE_URL").expect("BLOB_STORE_URL must be set"),
            blob_store_token: env::var("BLOB_STORE_TOKEN").expect("BLOB_STORE_TOKEN must be set"),
            resend_api_key: env::var("RESEND_API_KEY").expect("RESEND_API_KEY must be set"),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "invoices@toolblox.net".to_string()),
            subscription_contract: env::var("SUBSCRIPTION_CONTRACT")
                .ok()
                .map(|addr| addr.parse().expect("SUBSCRIPTION_CONTRACT must be an address")),
            subscription_kind: match env::var("SUBSCRIPTION_KIND").as_deref() {
                Ok("mainnet") => BlockchainKind::Mainnet,
                _ => BlockchainKind::Testnet,
            },
            nft_networks,
        }
    }
}
