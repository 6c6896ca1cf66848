//! Token FX rates for invoice valuation
//!
//! Spot prices come from the CoinGecko simple-price endpoint and are cached
//! for a few minutes so a burst of invoices in the same currency costs one
//! upstream call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use rust_decimal::Decimal;

use crate::error::ApiError;

#[derive(Clone)]
pub struct FxService {
    client: Client,
    base_url: String,
    cache: Arc<Cache<String, Decimal>>,
}

impl FxService {
    pub fn new(base_url: String) -> Self {
        let cache = Cache::builder()
            .max_capacity(100)
            .time_to_live(Duration::from_secs(600))
            .build();
        Self {
            client: Client::new(),
            base_url,
            cache: Arc::new(cache),
        }
    }

    /// Spot rate of one token unit in `vs_currency` (e.g. NEAR in EUR).
    pub async fn token_rate(&self, symbol: &str, vs_currency: &str) -> Result<Decimal, ApiError> {
        let coin_id = coin_id_for(symbol).ok_or_else(|| {
            ApiError::Validation(format!("no FX mapping for currency {}", symbol))
        })?;
        let vs = vs_currency.to_lowercase();
        let cache_key = format!("{}_{}", coin_id, vs);

        if let Some(rate) = self.cache.get(&cache_key).await {
            tracing::debug!("FX cache hit for {}", cache_key);
            return Ok(rate);
        }

        tracing::info!("Fetching {} rate in {} from CoinGecko", coin_id, vs);
        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&[("ids", coin_id), ("vs_currencies", vs.as_str())])
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("FX request failed: {}", err)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "FX provider returned {}",
                response.status()
            )));
        }

        let data: HashMap<String, HashMap<String, Decimal>> = response
            .json()
            .await
            .map_err(|err| ApiError::Upstream(format!("FX decode failed: {}", err)))?;
        let rate = data
            .get(coin_id)
            .and_then(|rates| rates.get(&vs))
            .copied()
            .ok_or_else(|| {
                ApiError::Upstream(format!("FX provider has no {} rate in {}", coin_id, vs))
            })?;

        self.cache.insert(cache_key, rate).await;
        Ok(rate)
    }
}

/// Token symbol to CoinGecko coin id.
fn coin_id_for(symbol: &str) -> Option<&'static str> {
    match symbol.to_uppercase().as_str() {
        "NEAR" => Some("near"),
        "ETH" => Some("ethereum"),
        "MATIC" | "POL" => Some("matic-network"),
        "AVAX" => Some("avalanche-2"),
        "BNB" => Some("binancecoin"),
        "EVMOS" => Some("evmos"),
        _ => None,
    }
}
