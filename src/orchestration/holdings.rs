use crate::datasource::{PriceOracle, SnapshotSource};
use crate::domain::{Address, BlockNumber, HoldingRecord, HoldingsSummary, TokenId};
use crate::engine::{order_oldest_first, PositionLedger, PriceTable, ValuationResolver};
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point for rebuilding an account's LP holdings.
///
/// Every call builds its own ledger, so concurrent reconstructions share no state.
#[derive(Clone)]
pub struct HoldingsService {
    source: Arc<dyn SnapshotSource>,
    oracle: Option<Arc<dyn PriceOracle>>,
    valuation: ValuationResolver,
}

impl HoldingsService {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        oracle: Option<Arc<dyn PriceOracle>>,
        valuation: ValuationResolver,
    ) -> Self {
        Self {
            source,
            oracle,
            valuation,
        }
    }

    /// Rebuild holding records for `address` from snapshots at or above `min_block`.
    ///
    /// Never fails: an unreachable snapshot source yields an empty list.
    pub async fn reconstruct_holdings(
        &self,
        address: &Address,
        min_block: BlockNumber,
    ) -> Vec<HoldingRecord> {
        let snapshots = match self.source.fetch_snapshots(address, min_block).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!("Snapshot fetch failed for {}: {}", address, e);
                return Vec::new();
            }
        };

        let mut ledger = PositionLedger::new(self.valuation.clone());
        for snapshot in order_oldest_first(&snapshots) {
            ledger.process_snapshot(snapshot);
        }

        let prices = self.fetch_prices(ledger.tokens_needing_prices()).await;
        let records = ledger.finish(&prices);

        let summary = HoldingsSummary::from_records(&records);
        info!(
            "Reconstructed holdings for {}: snapshots={}, open={}, closed={}, equity_usd={}",
            address,
            snapshots.len(),
            summary.open_count,
            summary.closed_count,
            summary.equity_usd
        );

        records
    }

    /// Ask the oracle for every token at once; a failed lookup leaves the table empty.
    async fn fetch_prices(&self, tokens: Vec<TokenId>) -> PriceTable {
        let Some(oracle) = &self.oracle else {
            return PriceTable::new();
        };
        if tokens.is_empty() {
            return PriceTable::new();
        }

        let prices = match oracle.prices_of(&tokens).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!("Oracle lookup failed for {} tokens: {}", tokens.len(), e);
                return PriceTable::new();
            }
        };

        for token in tokens.iter().filter(|t| !prices.contains_key(*t)) {
            warn!("No oracle price for token {}", token);
        }
        prices.into_iter().collect()
    }
}
