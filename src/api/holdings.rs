use crate::api::AppState;
use crate::domain::{Address, BlockNumber, Decimal, HoldingRecord, HoldingsSummary, Timestamp};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsQuery {
    pub address: String,
    pub min_block: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsResponse {
    pub records: Vec<HoldingRecordDto>,
    pub summary: HoldingsSummaryDto,
}

/// Holding record as rendered by the dashboard. Decimals are strings to keep precision.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecordDto {
    pub position_id: String,
    pub status: String,
    pub pool_id: String,
    pub token0: String,
    pub token1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token0_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token1_symbol: Option<String>,
    pub fee_tier: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub price_lower: Option<String>,
    pub price_upper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_range: Option<bool>,

    pub principal_usd: String,
    pub principal_token0: String,
    pub principal_token1: String,
    pub open_token0_price: String,
    pub open_token1_price: String,
    pub open_transaction: String,
    pub open_time: Option<String>,

    pub fee_usd: Option<String>,
    pub fee_token0: Option<String>,
    pub fee_token1: Option<String>,
    pub equity_usd: Option<String>,
    pub equity_token0: Option<String>,
    pub equity_token1: Option<String>,
    pub equity_token0_price: Option<String>,
    pub equity_token1_price: Option<String>,
    pub pnl_usd: Option<String>,
    pub fee_return: Option<String>,

    pub close_transaction: Option<String>,
    pub close_time: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsSummaryDto {
    pub open_count: usize,
    pub closed_count: usize,
    pub principal_usd: String,
    pub fee_usd: String,
    pub equity_usd: String,
    pub pnl_usd: String,
}

pub async fn get_holdings(
    Query(params): Query<HoldingsQuery>,
    State(state): State<AppState>,
) -> Result<Json<HoldingsResponse>, AppError> {
    let address = Address::from_str(&params.address)?;
    let min_block = BlockNumber::new(params.min_block.unwrap_or(0));

    let records = state
        .holdings
        .reconstruct_holdings(&address, min_block)
        .await;
    let summary = HoldingsSummary::from_records(&records);

    Ok(Json(HoldingsResponse {
        records: records.iter().map(HoldingRecordDto::from).collect(),
        summary: HoldingsSummaryDto::from(&summary),
    }))
}

fn dec(value: Decimal) -> String {
    value.to_canonical_string()
}

fn opt_dec(value: Option<Decimal>) -> Option<String> {
    value.map(dec)
}

fn rfc3339(ts: Timestamp) -> Option<String> {
    ts.to_datetime().map(|dt| dt.to_rfc3339())
}

impl From<&HoldingRecord> for HoldingRecordDto {
    fn from(r: &HoldingRecord) -> Self {
        Self {
            position_id: r.position_id.to_string(),
            status: if r.is_open() { "opening" } else { "closed" }.to_string(),
            pool_id: r.pool_id.clone(),
            token0: r.token0.to_string(),
            token1: r.token1.to_string(),
            token0_symbol: r.token0_symbol.clone(),
            token1_symbol: r.token1_symbol.clone(),
            fee_tier: r.fee_tier.percentage(),
            tick_lower: r.tick_lower,
            tick_upper: r.tick_upper,
            price_lower: opt_dec(r.price_lower),
            price_upper: opt_dec(r.price_upper),
            in_range: r.in_range,
            principal_usd: dec(r.principal_usd),
            principal_token0: dec(r.principal_token0),
            principal_token1: dec(r.principal_token1),
            open_token0_price: dec(r.open_token0_price),
            open_token1_price: dec(r.open_token1_price),
            open_transaction: r.open_transaction.clone(),
            open_time: rfc3339(r.open_timestamp),
            fee_usd: opt_dec(r.fee_usd),
            fee_token0: opt_dec(r.fee_token0),
            fee_token1: opt_dec(r.fee_token1),
            equity_usd: opt_dec(r.equity_usd),
            equity_token0: opt_dec(r.equity_token0),
            equity_token1: opt_dec(r.equity_token1),
            equity_token0_price: opt_dec(r.equity_token0_price),
            equity_token1_price: opt_dec(r.equity_token1_price),
            pnl_usd: opt_dec(r.pnl_usd()),
            fee_return: opt_dec(r.fee_return()),
            close_transaction: r.close_transaction.clone(),
            close_time: r.close_timestamp.and_then(rfc3339),
        }
    }
}

impl From<&HoldingsSummary> for HoldingsSummaryDto {
    fn from(s: &HoldingsSummary) -> Self {
        Self {
            open_count: s.open_count,
            closed_count: s.closed_count,
            principal_usd: dec(s.principal_usd),
            fee_usd: dec(s.fee_usd),
            equity_usd: dec(s.equity_usd),
            pnl_usd: dec(s.pnl_usd),
        }
    }
}
