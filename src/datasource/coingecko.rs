//! CoinGecko token price client.

use super::{check_status, retry_policy, DataSourceError, PriceOracle};
use crate::domain::{Decimal, TokenId};
use async_trait::async_trait;
use backoff::future::retry;
use reqwest::Client;
use rust_decimal::Decimal as RustDecimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// Contract addresses per `simple/token_price` request.
const MAX_TOKENS_PER_REQUEST: usize = 50;

/// Price oracle using CoinGecko's `simple/token_price` endpoint.
#[derive(Debug, Clone)]
pub struct CoingeckoPriceOracle {
    client: Client,
    base_url: String,
    /// Asset platform id, e.g. "optimistic-ethereum".
    platform: String,
}

impl CoingeckoPriceOracle {
    pub fn new(base_url: String, platform: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            platform,
        }
    }

    fn token_price_url(&self, tokens: &[TokenId]) -> String {
        let addresses: Vec<&str> = tokens.iter().map(|t| t.as_str()).collect();
        format!(
            "{}/simple/token_price/{}?contract_addresses={}&vs_currencies=usd",
            self.base_url.trim_end_matches('/'),
            self.platform,
            addresses.join(",")
        )
    }

    /// GET a price URL, retrying network errors, 429 and 5xx.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, DataSourceError> {
        retry(retry_policy(), || async {
            let response = self.client.get(url).send().await.map_err(|e| {
                backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
            })?;

            check_status(response.status().as_u16())?;

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PriceOracle for CoingeckoPriceOracle {
    async fn price_of(&self, token: &TokenId) -> Result<Option<Decimal>, DataSourceError> {
        let prices = self.prices_of(std::slice::from_ref(token)).await?;
        Ok(prices.get(token).copied())
    }

    async fn prices_of(
        &self,
        tokens: &[TokenId],
    ) -> Result<HashMap<TokenId, Decimal>, DataSourceError> {
        let mut prices = HashMap::new();

        for chunk in tokens.chunks(MAX_TOKENS_PER_REQUEST) {
            debug!("Fetching USD prices for {} tokens", chunk.len());
            let body = self.get_json(&self.token_price_url(chunk)).await?;

            for token in chunk {
                match parse_token_price(&body, token) {
                    Ok(Some(price)) => {
                        prices.insert(token.clone(), price);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Skipping price for token {}: {}", token, e),
                }
            }
        }

        Ok(prices)
    }
}

/// Extract `{"<token>": {"usd": <price>}}` from a CoinGecko response.
fn parse_token_price(
    body: &serde_json::Value,
    token: &TokenId,
) -> Result<Option<Decimal>, DataSourceError> {
    let Some(usd) = body.get(token.as_str()).and_then(|entry| entry.get("usd")) else {
        return Ok(None);
    };

    let text = match usd {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return Err(DataSourceError::ParseError("usd price is not a number".to_string())),
    };

    // Small prices come back in exponent form, e.g. 1.2e-7.
    Decimal::from_str(&text)
        .or_else(|_| RustDecimal::from_scientific(&text).map(Decimal::new))
        .map(Some)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid usd price: {}", e)))
}
