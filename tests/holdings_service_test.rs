use lphistory::domain::{FeeTier, LiquidityEvent, PoolSnapshot, TickBoundary, Timestamp, TokenInfo};
use lphistory::engine::{StablecoinSet, ValuationResolver};
use lphistory::{
    Address, BlockNumber, DataSourceError, Decimal, HoldingStatus, HoldingsService,
    MockDataSource, PositionId, PositionSnapshot, PriceOracle, StaticPriceOracle, TokenId,
};
use primitive_types::U256;
use std::sync::Arc;

const OWNER: &str = "0x803545a8696836df39207f9e3859d11775608a83";
const USDC: &str = "0x7f5c764cbc14f9669b88837ca1490cca17c31607";
const OP: &str = "0x4200000000000000000000000000000000000042";
const WETH: &str = "0x4200000000000000000000000000000000000006";

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn token(id: &str, decimals: u8) -> TokenInfo {
    TokenInfo {
        id: TokenId::new(id),
        symbol: None,
        decimals,
    }
}

fn snapshot(id: &str, block: u64, liquidity: u64, token0: &str, token1: &str) -> PositionSnapshot {
    PositionSnapshot {
        position_id: PositionId::new(id),
        liquidity: U256::from(liquidity),
        tick_lower: TickBoundary {
            tick_idx: -276330,
            ..Default::default()
        },
        tick_upper: TickBoundary {
            tick_idx: -276310,
            ..Default::default()
        },
        fee_growth_inside0_last_x128: U256::zero(),
        fee_growth_inside1_last_x128: U256::zero(),
        pool: PoolSnapshot {
            id: format!("0xpool{}", id),
            token0: token(token0, 18),
            token1: token(token1, 18),
            fee_tier: FeeTier::new(3000),
            fee_growth_global0_x128: U256::zero(),
            fee_growth_global1_x128: U256::zero(),
            tick: None,
            token0_price: None,
            token1_price: None,
        },
        block_number: BlockNumber::new(block),
        timestamp: Timestamp::new(1_690_000_000 + block as i64),
        deposited_token0: Decimal::zero(),
        deposited_token1: Decimal::zero(),
        withdrawn_token0: Decimal::zero(),
        withdrawn_token1: Decimal::zero(),
        collected_fees_token0: Decimal::zero(),
        collected_fees_token1: Decimal::zero(),
        mints: vec![],
        burns: vec![],
    }
}

fn minted(mut s: PositionSnapshot, usd: &str) -> PositionSnapshot {
    s.mints.push(LiquidityEvent {
        transaction_id: format!("0xmint{}", s.position_id),
        amount_usd: d(usd),
    });
    s
}

fn burned(mut s: PositionSnapshot, usd: &str) -> PositionSnapshot {
    s.burns.push(LiquidityEvent {
        transaction_id: format!("0xburn{}", s.position_id),
        amount_usd: d(usd),
    });
    s
}

fn service(source: MockDataSource, oracle: Option<StaticPriceOracle>) -> HoldingsService {
    HoldingsService::new(
        Arc::new(source),
        oracle.map(|o| Arc::new(o) as Arc<dyn PriceOracle>),
        ValuationResolver::new(StablecoinSet::new([USDC])),
    )
}

fn owner() -> Address {
    Address::new(OWNER.to_string())
}

#[tokio::test]
async fn test_fetch_failure_returns_empty() {
    let source = MockDataSource::new()
        .with_snapshot(OWNER, minted(snapshot("1", 10, 100, OP, USDC), "50"))
        .failing(DataSourceError::NetworkError("connection refused".to_string()));

    let records = service(source, None)
        .reconstruct_holdings(&owner(), BlockNumber::default())
        .await;
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_query_error_returns_empty() {
    let source = MockDataSource::new()
        .failing(DataSourceError::QueryError("[\"indexing error\"]".to_string()));

    let records = service(source, None)
        .reconstruct_holdings(&owner(), BlockNumber::default())
        .await;
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_full_cycle_and_open_position() {
    let mut open1 = minted(snapshot("1", 10, 100, OP, USDC), "300");
    open1.deposited_token0 = d("100");
    open1.deposited_token1 = d("100");

    let mut close1 = burned(snapshot("1", 20, 0, OP, USDC), "330");
    close1.withdrawn_token0 = d("100");
    close1.withdrawn_token1 = d("130");

    let mut open2 = minted(snapshot("2", 15, 500, USDC, OP), "40");
    open2.deposited_token0 = d("20");
    open2.deposited_token1 = d("10");

    let source = MockDataSource::new().with_snapshots(OWNER, vec![open1, close1, open2]);
    let records = service(source, None)
        .reconstruct_holdings(&owner(), BlockNumber::default())
        .await;

    assert_eq!(records.len(), 2);

    let closed = &records[0];
    assert_eq!(closed.position_id, PositionId::new("1"));
    assert_eq!(closed.status, HoldingStatus::Closed);
    assert_eq!(closed.open_token0_price, d("2"));
    assert_eq!(closed.equity_token0_price, Some(d("2")));
    assert_eq!(closed.equity_usd, Some(d("330")));

    let open = &records[1];
    assert_eq!(open.position_id, PositionId::new("2"));
    assert_eq!(open.status, HoldingStatus::Opening);
    assert_eq!(open.open_token0_price, d("1"));
    assert_eq!(open.open_token1_price, d("2"));
    assert!(open.equity_usd.is_some());
}

#[tokio::test]
async fn test_min_block_filters_history() {
    let source = MockDataSource::new().with_snapshots(
        OWNER,
        vec![
            minted(snapshot("1", 10, 100, OP, USDC), "10"),
            minted(snapshot("2", 30, 100, OP, USDC), "20"),
        ],
    );

    let records = service(source, None)
        .reconstruct_holdings(&owner(), BlockNumber::new(20))
        .await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].position_id, PositionId::new("2"));
}

#[tokio::test]
async fn test_other_owners_are_ignored() {
    let source = MockDataSource::new().with_snapshot(
        "0x0000000000000000000000000000000000000001",
        minted(snapshot("1", 10, 100, OP, USDC), "10"),
    );

    let records = service(source, None)
        .reconstruct_holdings(&owner(), BlockNumber::default())
        .await;
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_oracle_prices_open_position_without_stable_leg() {
    let mut open = minted(snapshot("7", 10, 100, OP, WETH), "500");
    open.withdrawn_token0 = d("10");
    open.withdrawn_token1 = d("0.1");

    let source = MockDataSource::new().with_snapshot(OWNER, open);
    let oracle = StaticPriceOracle::new()
        .with_price(OP, d("1.5"))
        .with_price(WETH, d("2000"));

    let records = service(source, Some(oracle))
        .reconstruct_holdings(&owner(), BlockNumber::default())
        .await;

    let r = &records[0];
    assert_eq!(r.open_token0_price, Decimal::zero());
    assert_eq!(r.equity_token0_price, Some(d("1.5")));
    assert_eq!(r.equity_token1_price, Some(d("2000")));
    assert_eq!(r.equity_usd, Some(d("215")));
}

#[tokio::test]
async fn test_oracle_failure_degrades_to_zero_prices() {
    let mut open = minted(snapshot("7", 10, 100, OP, WETH), "500");
    open.withdrawn_token0 = d("10");

    let source = MockDataSource::new().with_snapshot(OWNER, open);
    let oracle = StaticPriceOracle::new().failing(DataSourceError::RateLimited);

    let records = service(source, Some(oracle))
        .reconstruct_holdings(&owner(), BlockNumber::default())
        .await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].equity_token0_price, Some(Decimal::zero()));
    assert_eq!(records[0].equity_usd, Some(Decimal::zero()));
}
