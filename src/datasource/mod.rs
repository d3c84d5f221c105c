//! Data source abstractions for fetching position snapshots and token prices.

use crate::domain::{Address, BlockNumber, Decimal, PositionSnapshot, TokenId};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

pub mod coingecko;
pub mod mock;
pub mod subgraph;

pub use coingecko::CoingeckoPriceOracle;
pub use mock::{MockDataSource, StaticPriceOracle};
pub use subgraph::SubgraphDataSource;

/// Source of position snapshots for an account.
///
/// Implementations must handle pagination and retry/backoff.
#[async_trait]
pub trait SnapshotSource: Send + Sync + fmt::Debug {
    /// Fetch every snapshot owned by `address` at or above `min_block`.
    ///
    /// # Returns
    /// Snapshots in any order (typically newest first); the ledger re-orders them.
    async fn fetch_snapshots(
        &self,
        address: &Address,
        min_block: BlockNumber,
    ) -> Result<Vec<PositionSnapshot>, DataSourceError>;
}

/// Best-effort USD price feed.
#[async_trait]
pub trait PriceOracle: Send + Sync + fmt::Debug {
    /// USD unit price of `token`, or None if the feed does not know it.
    async fn price_of(&self, token: &TokenId) -> Result<Option<Decimal>, DataSourceError>;

    /// USD unit prices for several tokens. Tokens the feed does not know are absent.
    ///
    /// The default asks for each token concurrently and leaves out failed lookups.
    /// Feeds with a multi-token endpoint should override this with batched requests.
    async fn prices_of(
        &self,
        tokens: &[TokenId],
    ) -> Result<HashMap<TokenId, Decimal>, DataSourceError> {
        let results = join_all(tokens.iter().map(|token| self.price_of(token))).await;

        let mut prices = HashMap::new();
        for (token, result) in tokens.iter().zip(results) {
            match result {
                Ok(Some(price)) => {
                    prices.insert(token.clone(), price);
                }
                Ok(None) => {}
                Err(e) => warn!("Price lookup failed for token {}: {}", token, e),
            }
        }
        Ok(prices)
    }
}

/// Retry policy shared by the HTTP clients: exponential, giving up after 30s.
pub(crate) fn retry_policy() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(30)),
        ..Default::default()
    }
}

/// Classify an HTTP status for retry: 429 and 5xx are transient, other failures permanent.
pub(crate) fn check_status(status: u16) -> Result<(), backoff::Error<DataSourceError>> {
    match status {
        200..=299 => Ok(()),
        429 => Err(backoff::Error::transient(DataSourceError::RateLimited)),
        500..=599 => Err(backoff::Error::transient(DataSourceError::HttpError {
            status,
            message: "Server error".to_string(),
        })),
        _ => Err(backoff::Error::permanent(DataSourceError::HttpError {
            status,
            message: "Client error".to_string(),
        })),
    }
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// The GraphQL endpoint answered with an `errors` array
    QueryError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::QueryError(msg) => write!(f, "Subgraph errors: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
