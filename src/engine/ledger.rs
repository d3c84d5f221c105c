use crate::domain::{
    Decimal, HoldingRecord, HoldingStatus, LiquidityEvent, PositionId, PositionSnapshot, TokenId,
};
use std::collections::{HashMap, HashSet};

use super::fee_accrual::FeeAccrualCalculator;
use super::fixed_point::tick_to_price;
use super::valuation::{PriceTable, TokenPrices, ValuationResolver};

/// Replays one account's position snapshots into holding records.
///
/// A ledger owns all of its state and is meant to live for a single reconstruction.
pub struct PositionLedger {
    valuation: ValuationResolver,
    fees: FeeAccrualCalculator,

    /// Open/closed flag per position; absent means never seen opening.
    position_status: HashMap<PositionId, bool>,
    /// Most recent snapshot observed per position.
    latest: HashMap<PositionId, PositionSnapshot>,
    /// Positions of each id's records inside `records`.
    record_index: HashMap<PositionId, Vec<usize>>,

    // Outputs accumulated during processing.
    records: Vec<HoldingRecord>,
}

impl PositionLedger {
    pub fn new(valuation: ValuationResolver) -> Self {
        Self {
            valuation,
            fees: FeeAccrualCalculator::new(),
            position_status: HashMap::new(),
            latest: HashMap::new(),
            record_index: HashMap::new(),
            records: Vec::new(),
        }
    }

    /// Process a full snapshot stream, oldest to newest, and enrich what stays open.
    ///
    /// Input order does not matter; see [`order_oldest_first`].
    pub fn reconstruct(
        valuation: ValuationResolver,
        snapshots: &[PositionSnapshot],
        prices: &PriceTable,
    ) -> Vec<HoldingRecord> {
        let mut ledger = Self::new(valuation);
        for snapshot in order_oldest_first(snapshots) {
            ledger.process_snapshot(snapshot);
        }
        ledger.finish(prices)
    }

    /// Process a single snapshot. Callers must feed snapshots oldest first.
    pub fn process_snapshot(&mut self, snapshot: &PositionSnapshot) {
        let id = &snapshot.position_id;
        let status = self.position_status.get(id).copied();

        match (status, snapshot.has_liquidity()) {
            (None, true) => {
                if let Some(mint) = snapshot.first_mint() {
                    self.handle_open(snapshot, mint);
                }
            }
            (Some(true), false) => {
                if let Some(burn) = snapshot.first_burn() {
                    self.handle_close(snapshot, burn);
                }
            }
            // Partial increases/decreases and re-opens of a closed id leave records untouched.
            _ => {}
        }

        self.latest.insert(id.clone(), snapshot.clone());
    }

    /// Tokens of still-open records whose pool quote cannot price them.
    ///
    /// These are the tokens worth asking a price oracle about before [`finish`](Self::finish).
    pub fn tokens_needing_prices(&self) -> Vec<TokenId> {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();

        for record in self.records.iter().filter(|r| r.is_open()) {
            let Some(latest) = self.latest.get(&record.position_id) else {
                continue;
            };
            if self.valuation.quote_prices(&latest.pool).is_some() {
                continue;
            }
            for token in [&record.token0, &record.token1] {
                if seen.insert(token.clone()) {
                    tokens.push(token.clone());
                }
            }
        }

        tokens
    }

    /// Fill present-value fields of records still open and return all records.
    pub fn finish(mut self, prices: &PriceTable) -> Vec<HoldingRecord> {
        for record in self.records.iter_mut().filter(|r| r.is_open()) {
            let Some(latest) = self.latest.get(&record.position_id) else {
                continue;
            };

            let current = self
                .valuation
                .quote_prices(&latest.pool)
                .unwrap_or_else(|| prices.pair(&record.token0, &record.token1));
            let fees = self.fees.accrued_fees(latest);

            let fee_usd = current.value_of(fees.token0, fees.token1);
            let equity_token0 = add_or_zero(latest.withdrawn_token0, fees.token0, "equity token0");
            let equity_token1 = add_or_zero(latest.withdrawn_token1, fees.token1, "equity token1");

            record.fee_token0 = Some(fees.token0);
            record.fee_token1 = Some(fees.token1);
            record.fee_usd = Some(fee_usd);
            record.equity_token0 = Some(equity_token0);
            record.equity_token1 = Some(equity_token1);
            record.equity_usd = Some(current.value_of(equity_token0, equity_token1));
            record.equity_token0_price = Some(current.token0);
            record.equity_token1_price = Some(current.token1);
            record.in_range = latest
                .pool
                .tick
                .map(|tick| tick >= record.tick_lower && tick < record.tick_upper);
        }

        self.records
    }

    /// Records accumulated so far, before enrichment.
    pub fn records(&self) -> &[HoldingRecord] {
        &self.records
    }

    /// Handle a 0 -> positive liquidity transition carrying a mint.
    fn handle_open(&mut self, snapshot: &PositionSnapshot, mint: &LiquidityEvent) {
        let pool = &snapshot.pool;
        let open_prices = self.valuation.resolve(
            &pool.token0.id,
            &pool.token1.id,
            mint.amount_usd,
            snapshot.deposited_token0,
            snapshot.deposited_token1,
        );

        let tick_lower = snapshot.tick_lower.tick_idx;
        let tick_upper = snapshot.tick_upper.tick_idx;
        let (decimals0, decimals1) = (pool.token0.decimals, pool.token1.decimals);

        let record = HoldingRecord {
            position_id: snapshot.position_id.clone(),
            status: HoldingStatus::Opening,
            pool_id: pool.id.clone(),
            token0: pool.token0.id.clone(),
            token1: pool.token1.id.clone(),
            token0_symbol: pool.token0.symbol.clone(),
            token1_symbol: pool.token1.symbol.clone(),
            fee_tier: pool.fee_tier,
            tick_lower,
            tick_upper,
            price_lower: tick_to_price(tick_lower, decimals0, decimals1),
            price_upper: tick_to_price(tick_upper, decimals0, decimals1),
            in_range: None,
            principal_usd: mint.amount_usd,
            principal_token0: snapshot.deposited_token0,
            principal_token1: snapshot.deposited_token1,
            open_token0_price: open_prices.token0,
            open_token1_price: open_prices.token1,
            open_transaction: mint.transaction_id.clone(),
            open_timestamp: snapshot.timestamp,
            fee_usd: None,
            fee_token0: None,
            fee_token1: None,
            equity_usd: None,
            equity_token0: None,
            equity_token1: None,
            equity_token0_price: None,
            equity_token1_price: None,
            close_transaction: None,
            close_timestamp: None,
        };

        self.record_index
            .entry(snapshot.position_id.clone())
            .or_default()
            .push(self.records.len());
        self.records.push(record);
        self.position_status
            .insert(snapshot.position_id.clone(), true);
    }

    /// Handle a positive -> 0 liquidity transition carrying a burn.
    fn handle_close(&mut self, snapshot: &PositionSnapshot, burn: &LiquidityEvent) {
        let pool = &snapshot.pool;
        let close_prices: TokenPrices = self.valuation.resolve(
            &pool.token0.id,
            &pool.token1.id,
            burn.amount_usd,
            snapshot.withdrawn_token0,
            snapshot.withdrawn_token1,
        );

        let indices = self
            .record_index
            .get(&snapshot.position_id)
            .cloned()
            .unwrap_or_default();

        for idx in indices {
            let record = &mut self.records[idx];
            let fee_token0 = snapshot.collected_fees_token0;
            let fee_token1 = snapshot.collected_fees_token1;
            let fee_usd = close_prices.value_of(fee_token0, fee_token1);

            record.status = HoldingStatus::Closed;
            record.equity_token0_price = Some(close_prices.token0);
            record.equity_token1_price = Some(close_prices.token1);
            record.fee_token0 = Some(fee_token0);
            record.fee_token1 = Some(fee_token1);
            record.fee_usd = Some(fee_usd);
            record.equity_token0 = Some(add_or_zero(
                snapshot.withdrawn_token0,
                fee_token0,
                "equity token0",
            ));
            record.equity_token1 = Some(add_or_zero(
                snapshot.withdrawn_token1,
                fee_token1,
                "equity token1",
            ));
            record.equity_usd = Some(add_or_zero(fee_usd, burn.amount_usd, "equity usd"));
            record.close_transaction = Some(burn.transaction_id.clone());
            record.close_timestamp = Some(snapshot.timestamp);
        }

        self.position_status
            .insert(snapshot.position_id.clone(), false);
    }
}

fn add_or_zero(a: Decimal, b: Decimal, what: &str) -> Decimal {
    Decimal::or_zero(a.checked_add(b), what)
}

/// Order snapshots by block, oldest first.
///
/// Sources usually return newest first, so the input is reversed before a stable
/// sort; snapshots sharing a block keep their reversed relative order.
pub fn order_oldest_first(snapshots: &[PositionSnapshot]) -> Vec<&PositionSnapshot> {
    let mut ordered: Vec<&PositionSnapshot> = snapshots.iter().rev().collect();
    ordered.sort_by_key(|s| s.block_number);
    ordered
}
