//! NFT ownership and metadata queries
//!
//! Ownership queries fan out across the configured provider networks
//! sequentially with a pacing delay, so the whole sweep stays under the
//! provider's rate limit. Metadata comes straight from the workflow's
//! contract.

use std::time::Duration;

use alloy::primitives::U256;
use alloy::providers::ProviderBuilder;
use alloy::sol;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::nft::{blockchain_display_name, NftMetadataResponse, OwnedNft};
use crate::services::registry::ResolvedWorkflow;

sol! {
    #[sol(rpc)]
    interface IWorkflowItem {
        function getName(uint256 id) external view returns (string memory);
        function getImage(uint256 id) external view returns (string memory);
    }
}

/// Networks swept for owned NFTs.
pub const DEFAULT_NETWORKS: &[&str] = &[
    "eth-mainnet",
    "polygon-mainnet",
    "arb-mainnet",
    "opt-mainnet",
    "base-mainnet",
];

/// Pacing between per-network requests.
const NETWORK_DELAY: Duration = Duration::from_millis(1200);

pub struct NftService {
    client: reqwest::Client,
    networks: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedNftsResponse {
    #[serde(default)]
    owned_nfts: Vec<ProviderNft>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderNft {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: ProviderImage,
    #[serde(default)]
    contract: ProviderContract,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderImage {
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    original_url: Option<String>,
    #[serde(default)]
    cached_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderContract {
    #[serde(default)]
    name: Option<String>,
}

impl NftService {
    pub fn new(networks: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            networks,
        }
    }

    /// All image-bearing NFTs the address owns across the configured
    /// networks. A network that errors is logged and skipped rather than
    /// failing the sweep.
    pub async fn owned_nfts(&self, api_key: &str, owner: &str) -> Result<Vec<OwnedNft>, ApiError> {
        let mut all = Vec::new();
        for (index, network) in self.networks.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(NETWORK_DELAY).await;
            }
            match self.query_network(api_key, network, owner).await {
                Ok(mut nfts) => all.append(&mut nfts),
                Err(err) => {
                    tracing::warn!(network = %network, error = %err, "NFT query failed, skipping network");
                }
            }
        }
        Ok(all)
    }

    async fn query_network(
        &self,
        api_key: &str,
        network: &str,
        owner: &str,
    ) -> Result<Vec<OwnedNft>, ApiError> {
        let url = format!(
            "https://{}.g.alchemy.com/nft/v3/{}/getNFTsForOwner",
            network, api_key
        );
        let response = self
            .client
            .get(&url)
            .query(&[("owner", owner), ("withMetadata", "true")])
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("NFT query failed: {}", err)))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "NFT provider returned {}",
                response.status()
            )));
        }
        let body: OwnedNftsResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Upstream(format!("NFT decode failed: {}", err)))?;
        Ok(collect_image_nfts(network, body))
    }
}

/// Keeps only NFTs that carry an image and tags them with the network and
/// its display name.
fn collect_image_nfts(network: &str, body: OwnedNftsResponse) -> Vec<OwnedNft> {
    body.owned_nfts
        .into_iter()
        .filter(|nft| {
            nft.image.original_url.is_some() || nft.image.cached_url.is_some()
        })
        .map(|nft| OwnedNft {
            blockchain: blockchain_display_name(network).to_string(),
            network: network.to_string(),
            content_type: nft.image.content_type,
            original_url: nft.image.original_url,
            cached_url: nft.image.cached_url,
            thumbnail_url: nft.image.thumbnail_url,
            name: nft.name,
            contract_name: nft.contract.name,
        })
        .collect()
}

/// Reads name/description/image for one workflow item from its contract.
pub async fn item_metadata(
    resolved: &ResolvedWorkflow,
    id: u64,
) -> Result<NftMetadataResponse, ApiError> {
    let rpc_url = resolved
        .endpoint
        .parse()
        .map_err(|err| ApiError::Validation(format!("bad rpc endpoint: {}", err)))?;
    let provider = ProviderBuilder::new().on_http(rpc_url);
    let contract = IWorkflowItem::new(resolved.contract, &provider);
    let id = U256::from(id);

    let name = contract
        .getName(id)
        .call()
        .await
        .map_err(|err| ApiError::Upstream(format!("getName failed: {}", err)))?
        ._0;
    let image = contract
        .getImage(id)
        .call()
        .await
        .map_err(|err| ApiError::Upstream(format!("getImage failed: {}", err)))?
        ._0;

    let description = format!(
        "Item: {}; Workflow: {}",
        resolved.workflow.object.as_deref().unwrap_or_default(),
        resolved.workflow.project.as_deref().unwrap_or_default()
    );
    Ok(NftMetadataResponse {
        name,
        description,
        image: image_url(&image),
    })
}

/// The contract stores either a full URL or a bare IPFS CID.
fn image_url(image: &str) -> String {
    if image.is_empty() || image.starts_with("http") {
        image.to_string()
    } else {
        format!("https://{}.ipfs.w3s.link", image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nft(original: Option<&str>, cached: Option<&str>) -> ProviderNft {
        ProviderNft {
            name: Some("Item".into()),
            image: ProviderImage {
                content_type: Some("image/png".into()),
                original_url: original.map(Into::into),
                cached_url: cached.map(Into::into),
                thumbnail_url: None,
            },
            contract: ProviderContract {
                name: Some("Silver".into()),
            },
        }
    }

    #[test]
    fn imageless_nfts_are_filtered_out() {
        let body = OwnedNftsResponse {
            owned_nfts: vec![
                nft(Some("https://img/1.png"), None),
                nft(None, None),
                nft(None, Some("https://cache/2.png")),
            ],
        };
        let nfts = collect_image_nfts("polygon-mainnet", body);
        assert_eq!(nfts.len(), 2);
        assert!(nfts.iter().all(|n| n.blockchain == "Polygon"));
        assert!(nfts.iter().all(|n| n.network == "polygon-mainnet"));
    }

    #[test]
    fn bare_cid_becomes_gateway_url() {
        assert_eq!(
            image_url("bafybeigdyr"),
            "https://bafybeigdyr.ipfs.w3s.link"
        );
        assert_eq!(image_url("https://img/1.png"), "https://img/1.png");
        assert_eq!(image_url(""), "");
    }

    #[test]
    fn provider_response_shape_deserializes() {
        let body: OwnedNftsResponse = serde_json::from_str(
            r#"{"ownedNfts":[{"name":"Item #1",
                "image":{"contentType":"image/png","originalUrl":"https://img/1.png"},
                "contract":{"name":"Silver"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.owned_nfts.len(), 1);
        assert_eq!(body.owned_nfts[0].image.content_type.as_deref(), Some("image/png"));
    }
}
