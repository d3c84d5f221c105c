//! Uniswap V3 subgraph client implementation.

use super::{check_status, retry_policy, DataSourceError, SnapshotSource};
use crate::domain::{
    Address, BlockNumber, Decimal, FeeTier, LiquidityEvent, PoolSnapshot, PositionId,
    PositionSnapshot, TickBoundary, Timestamp, TokenId, TokenInfo,
};
use crate::engine::fixed_point::parse_u256;
use async_trait::async_trait;
use backoff::future::retry;
use primitive_types::U256;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, warn};

/// Page size for `positionSnapshots` queries.
const PAGE_SIZE: usize = 1000;

// Paged by unique snapshot id so pages never overlap or skip entries.
const POSITION_SNAPSHOTS_QUERY: &str = r#"
query PositionSnapshots($owner: String!, $minBlock: BigInt!, $first: Int!, $lastId: ID!) {
  positionSnapshots(
    first: $first
    orderBy: id
    orderDirection: asc
    where: { owner: $owner, blockNumber_gte: $minBlock, id_gt: $lastId }
  ) {
    id
    position {
      id
      tickLower { tickIdx feeGrowthOutside0X128 feeGrowthOutside1X128 }
      tickUpper { tickIdx feeGrowthOutside0X128 feeGrowthOutside1X128 }
      feeGrowthInside0LastX128
      feeGrowthInside1LastX128
    }
    pool {
      id
      token0 { id symbol decimals }
      token1 { id symbol decimals }
      feeGrowthGlobal0X128
      feeGrowthGlobal1X128
      feeTier
      tick
      token0Price
      token1Price
    }
    liquidity
    blockNumber
    timestamp
    depositedToken0
    depositedToken1
    withdrawnToken0
    withdrawnToken1
    collectedFeesToken0
    collectedFeesToken1
    transaction {
      mints { transaction { id } amountUSD }
      burns { transaction { id } amountUSD }
    }
  }
}
"#;

/// Snapshot source backed by a Uniswap V3 subgraph GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct SubgraphDataSource {
    client: Client,
    endpoint: String,
}

impl SubgraphDataSource {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    async fn post_query(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, DataSourceError> {
        let body = retry(retry_policy(), || async {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            check_status(response.status().as_u16())?;

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await?;

        extract_data(body)
    }

    async fn fetch_page(
        &self,
        address: &Address,
        min_block: BlockNumber,
        last_id: String,
    ) -> Result<Vec<serde_json::Value>, DataSourceError> {
        let payload = serde_json::json!({
            "query": POSITION_SNAPSHOTS_QUERY,
            "variables": {
                "owner": address.as_str(),
                "minBlock": min_block.as_u64().to_string(),
                "first": PAGE_SIZE,
                "lastId": last_id,
            }
        });

        let data = self.post_query(payload).await?;
        data.get("positionSnapshots")
            .and_then(|v| v.as_array())
            .cloned()
            .ok_or_else(|| DataSourceError::ParseError("Expected positionSnapshots array".to_string()))
    }
}

#[async_trait]
impl SnapshotSource for SubgraphDataSource {
    async fn fetch_snapshots(
        &self,
        address: &Address,
        min_block: BlockNumber,
    ) -> Result<Vec<PositionSnapshot>, DataSourceError> {
        debug!(
            "Fetching position snapshots for address={}, min_block={}",
            address,
            min_block.as_u64()
        );

        let entries = collect_pages(PAGE_SIZE, move |last_id| {
            self.fetch_page(address, min_block, last_id)
        })
        .await?;

        let mut snapshots = Vec::with_capacity(entries.len());
        for snapshot_json in entries {
            match parse_snapshot(snapshot_json) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!("Failed to parse position snapshot: {}", e);
                }
            }
        }

        // Pages arrive in id order; callers expect newest first.
        snapshots.sort_by(|a, b| b.block_number.cmp(&a.block_number));

        debug!("Fetched {} position snapshots for {}", snapshots.len(), address);
        Ok(snapshots)
    }
}

/// Request pages keyed on the last seen `id` until a page comes back short.
///
/// Every raw entry is returned in fetch order. An entry without an `id` cannot
/// advance the cursor and fails the whole walk rather than truncating it.
async fn collect_pages<F, Fut>(
    page_size: usize,
    mut fetch_page: F,
) -> Result<Vec<serde_json::Value>, DataSourceError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<serde_json::Value>, DataSourceError>>,
{
    let mut entries = Vec::new();
    let mut last_id = String::new();

    loop {
        let page = fetch_page(last_id.clone()).await?;
        let page_len = page.len();

        if let Some(last) = page.last() {
            last_id = last
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    DataSourceError::ParseError("Position snapshot without id".to_string())
                })?;
        }
        entries.extend(page);

        if page_len < page_size {
            break;
        }
    }

    Ok(entries)
}

/// Unwrap a GraphQL response envelope, turning an `errors` array into a failure.
fn extract_data(body: serde_json::Value) -> Result<serde_json::Value, DataSourceError> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            return Err(DataSourceError::QueryError(
                serde_json::Value::Array(errors.clone()).to_string(),
            ));
        }
    }

    body.get("data")
        .filter(|d| !d.is_null())
        .cloned()
        .ok_or_else(|| DataSourceError::ParseError("Missing data field".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPositionSnapshot {
    position: RawPosition,
    pool: RawPool,
    liquidity: String,
    block_number: String,
    timestamp: String,
    deposited_token0: String,
    deposited_token1: String,
    withdrawn_token0: String,
    withdrawn_token1: String,
    collected_fees_token0: String,
    collected_fees_token1: String,
    transaction: RawTransaction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    id: String,
    tick_lower: RawTick,
    tick_upper: RawTick,
    fee_growth_inside0_last_x128: String,
    fee_growth_inside1_last_x128: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTick {
    tick_idx: String,
    fee_growth_outside0_x128: String,
    #[serde(default)]
    fee_growth_outside1_x128: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPool {
    id: String,
    token0: RawToken,
    token1: RawToken,
    fee_growth_global0_x128: String,
    fee_growth_global1_x128: String,
    fee_tier: String,
    #[serde(default)]
    tick: Option<String>,
    #[serde(default)]
    token0_price: Option<String>,
    #[serde(default)]
    token1_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    id: String,
    #[serde(default)]
    symbol: Option<String>,
    decimals: String,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(default)]
    mints: Vec<RawLiquidityEvent>,
    #[serde(default)]
    burns: Vec<RawLiquidityEvent>,
}

#[derive(Debug, Deserialize)]
struct RawLiquidityEvent {
    transaction: RawTransactionRef,
    #[serde(rename = "amountUSD")]
    amount_usd: String,
}

#[derive(Debug, Deserialize)]
struct RawTransactionRef {
    id: String,
}

fn parse_snapshot(snapshot_json: serde_json::Value) -> Result<PositionSnapshot, DataSourceError> {
    let raw: RawPositionSnapshot = serde_json::from_value(snapshot_json)
        .map_err(|e| DataSourceError::ParseError(e.to_string()))?;

    let RawPositionSnapshot {
        position,
        pool,
        liquidity,
        block_number,
        timestamp,
        deposited_token0,
        deposited_token1,
        withdrawn_token0,
        withdrawn_token1,
        collected_fees_token0,
        collected_fees_token1,
        transaction,
    } = raw;

    Ok(PositionSnapshot {
        position_id: PositionId::new(position.id),
        liquidity: uint("liquidity", &liquidity)?,
        tick_lower: parse_tick("tickLower", &position.tick_lower)?,
        tick_upper: parse_tick("tickUpper", &position.tick_upper)?,
        fee_growth_inside0_last_x128: uint(
            "feeGrowthInside0LastX128",
            &position.fee_growth_inside0_last_x128,
        )?,
        fee_growth_inside1_last_x128: uint(
            "feeGrowthInside1LastX128",
            &position.fee_growth_inside1_last_x128,
        )?,
        pool: parse_pool(pool)?,
        block_number: BlockNumber::new(int("blockNumber", &block_number)?),
        timestamp: Timestamp::new(int("timestamp", &timestamp)?),
        deposited_token0: decimal("depositedToken0", &deposited_token0)?,
        deposited_token1: decimal("depositedToken1", &deposited_token1)?,
        withdrawn_token0: decimal("withdrawnToken0", &withdrawn_token0)?,
        withdrawn_token1: decimal("withdrawnToken1", &withdrawn_token1)?,
        collected_fees_token0: decimal("collectedFeesToken0", &collected_fees_token0)?,
        collected_fees_token1: decimal("collectedFeesToken1", &collected_fees_token1)?,
        mints: parse_events(transaction.mints)?,
        burns: parse_events(transaction.burns)?,
    })
}

fn parse_tick(field: &str, raw: &RawTick) -> Result<TickBoundary, DataSourceError> {
    Ok(TickBoundary {
        tick_idx: int(field, &raw.tick_idx)?,
        fee_growth_outside0_x128: uint(field, &raw.fee_growth_outside0_x128)?,
        fee_growth_outside1_x128: raw
            .fee_growth_outside1_x128
            .as_deref()
            .map(|s| uint(field, s))
            .transpose()?
            .unwrap_or_default(),
    })
}

fn parse_pool(raw: RawPool) -> Result<PoolSnapshot, DataSourceError> {
    Ok(PoolSnapshot {
        token0: parse_token(raw.token0)?,
        token1: parse_token(raw.token1)?,
        fee_tier: FeeTier::new(int("feeTier", &raw.fee_tier)?),
        fee_growth_global0_x128: uint("feeGrowthGlobal0X128", &raw.fee_growth_global0_x128)?,
        fee_growth_global1_x128: uint("feeGrowthGlobal1X128", &raw.fee_growth_global1_x128)?,
        tick: raw.tick.as_deref().map(|s| int("tick", s)).transpose()?,
        token0_price: raw
            .token0_price
            .as_deref()
            .map(|s| decimal("token0Price", s))
            .transpose()?,
        token1_price: raw
            .token1_price
            .as_deref()
            .map(|s| decimal("token1Price", s))
            .transpose()?,
        id: raw.id,
    })
}

fn parse_token(raw: RawToken) -> Result<TokenInfo, DataSourceError> {
    Ok(TokenInfo {
        decimals: int("decimals", &raw.decimals)?,
        id: TokenId::new(raw.id),
        symbol: raw.symbol,
    })
}

fn parse_events(raw: Vec<RawLiquidityEvent>) -> Result<Vec<LiquidityEvent>, DataSourceError> {
    raw.into_iter()
        .map(|e| {
            Ok(LiquidityEvent {
                amount_usd: decimal("amountUSD", &e.amount_usd)?,
                transaction_id: e.transaction.id,
            })
        })
        .collect()
}

fn uint(field: &str, s: &str) -> Result<U256, DataSourceError> {
    parse_u256(s).map_err(|e| DataSourceError::ParseError(format!("Invalid {}: {}", field, e)))
}

fn int<T: FromStr>(field: &str, s: &str) -> Result<T, DataSourceError> {
    s.trim()
        .parse::<T>()
        .map_err(|_| DataSourceError::ParseError(format!("Invalid {}: {}", field, s)))
}

fn decimal(field: &str, s: &str) -> Result<Decimal, DataSourceError> {
    Decimal::from_str_canonical(s)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid {}: {}", field, e)))
}
