//! Holding records: the accounting of one open-to-close (or open-to-present) LP episode.

use super::{Decimal, FeeTier, PositionId, Timestamp, TokenId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldingStatus {
    /// Liquidity still provided; close-side fields hold present-value estimates.
    Opening,
    /// Liquidity fully burned; close-side fields are realized values.
    Closed,
}

/// Accounting record for one LP episode.
///
/// Created on a 0 -> positive liquidity transition and filled in place either by
/// the closing burn or, for episodes still open, by present-value enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingRecord {
    pub position_id: PositionId,
    pub status: HoldingStatus,
    pub pool_id: String,
    pub token0: TokenId,
    pub token1: TokenId,
    pub token0_symbol: Option<String>,
    pub token1_symbol: Option<String>,
    pub fee_tier: FeeTier,

    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Range bounds as token0 priced in token1.
    pub price_lower: Option<Decimal>,
    pub price_upper: Option<Decimal>,
    /// Whether the pool's current tick sits inside the range (open records only).
    pub in_range: Option<bool>,

    // lp opened
    pub principal_usd: Decimal,
    pub principal_token0: Decimal,
    pub principal_token1: Decimal,
    pub open_token0_price: Decimal,
    pub open_token1_price: Decimal,
    pub open_transaction: String,
    pub open_timestamp: Timestamp,

    // lp closed, or present value if still opening; fees are included in equity
    pub fee_usd: Option<Decimal>,
    pub fee_token0: Option<Decimal>,
    pub fee_token1: Option<Decimal>,
    pub equity_usd: Option<Decimal>,
    pub equity_token0: Option<Decimal>,
    pub equity_token1: Option<Decimal>,
    pub equity_token0_price: Option<Decimal>,
    pub equity_token1_price: Option<Decimal>,

    pub close_transaction: Option<String>,
    pub close_timestamp: Option<Timestamp>,
}

impl HoldingRecord {
    pub fn is_open(&self) -> bool {
        self.status == HoldingStatus::Opening
    }

    /// Equity minus principal, once equity is known.
    pub fn pnl_usd(&self) -> Option<Decimal> {
        self.equity_usd
            .and_then(|equity| equity.checked_sub(self.principal_usd))
    }

    /// Fees earned as a fraction of principal.
    pub fn fee_return(&self) -> Option<Decimal> {
        self.fee_usd
            .and_then(|fee| fee.checked_div(self.principal_usd))
    }
}

/// Totals across a set of holding records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsSummary {
    pub open_count: usize,
    pub closed_count: usize,
    pub principal_usd: Decimal,
    pub fee_usd: Decimal,
    pub equity_usd: Decimal,
    pub pnl_usd: Decimal,
}

impl HoldingsSummary {
    pub fn from_records(records: &[HoldingRecord]) -> Self {
        let open_count = records.iter().filter(|r| r.is_open()).count();
        let principal_usd = total(records.iter().map(|r| r.principal_usd), "principal total");
        let fee_usd = total(records.iter().filter_map(|r| r.fee_usd), "fee total");
        let equity_usd = total(records.iter().filter_map(|r| r.equity_usd), "equity total");
        let pnl_usd = total(records.iter().filter_map(|r| r.pnl_usd()), "pnl total");

        Self {
            open_count,
            closed_count: records.len() - open_count,
            principal_usd,
            fee_usd,
            equity_usd,
            pnl_usd,
        }
    }
}

fn total(values: impl Iterator<Item = Decimal>, what: &str) -> Decimal {
    Decimal::or_zero(Decimal::checked_sum(values), what)
}
