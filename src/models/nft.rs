//! NFT query/response types and network display-name mapping

use serde::{Deserialize, Serialize};

/// One image-bearing NFT owned by the queried address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNft {
    pub blockchain: String,
    pub network: String,
    pub content_type: Option<String>,
    pub original_url: Option<String>,
    pub cached_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub name: Option<String>,
    pub contract_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftMetadataResponse {
    pub name: String,
    pub description: String,
    pub image: String,
}

/// Maps an NFT-provider network identifier to a human-readable chain name.
pub fn blockchain_display_name(network: &str) -> &'static str {
    match network {
        "eth-mainnet" | "eth-sepolia" => "Ethereum",
        "base-mainnet" | "base-sepolia" => "Base",
        "arb-mainnet" | "arb-sepolia" => "Arbitrum",
        "polygon-mainnet" | "polygon-amoy" => "Polygon",
        "opt-mainnet" | "opt-sepolia" => "Optimism",
        "zksync-mainnet" | "zksync-sepolia" => "ZKsync",
        _ => "Unknown",
    }
}
