//! Mock data sources for testing without network calls.

use super::{DataSourceError, PriceOracle, SnapshotSource};
use crate::domain::{Address, BlockNumber, Decimal, PositionSnapshot, TokenId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Mock snapshot source that returns predefined test data.
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    snapshots: Vec<(Address, PositionSnapshot)>,
    failure: Option<DataSourceError>,
}

impl MockDataSource {
    /// Create a new mock data source with empty data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot owned by `owner`.
    pub fn with_snapshot(mut self, owner: &str, snapshot: PositionSnapshot) -> Self {
        self.snapshots.push((Address::new(owner.to_string()), snapshot));
        self
    }

    /// Add multiple snapshots owned by `owner`.
    pub fn with_snapshots(mut self, owner: &str, snapshots: Vec<PositionSnapshot>) -> Self {
        let owner = Address::new(owner.to_string());
        self.snapshots
            .extend(snapshots.into_iter().map(|s| (owner.clone(), s)));
        self
    }

    /// Make every fetch fail with `error`.
    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl SnapshotSource for MockDataSource {
    async fn fetch_snapshots(
        &self,
        address: &Address,
        min_block: BlockNumber,
    ) -> Result<Vec<PositionSnapshot>, DataSourceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let mut snapshots: Vec<PositionSnapshot> = self
            .snapshots
            .iter()
            .filter(|(owner, s)| owner == address && s.block_number >= min_block)
            .map(|(_, s)| s.clone())
            .collect();

        // Newest first, as the subgraph source returns them.
        snapshots.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        Ok(snapshots)
    }
}

/// Price oracle backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: HashMap<TokenId, Decimal>,
    failure: Option<DataSourceError>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, token: &str, price: Decimal) -> Self {
        self.prices.insert(TokenId::new(token), price);
        self
    }

    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn price_of(&self, token: &TokenId) -> Result<Option<Decimal>, DataSourceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self.prices.get(token).copied())
    }
}
