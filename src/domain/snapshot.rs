//! Point-in-time observations of an LP position, as delivered by the snapshot source.

use super::{BlockNumber, Decimal, FeeTier, PositionId, Timestamp, TokenId};
use primitive_types::U256;

/// Token identity and precision as seen on a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub id: TokenId,
    pub symbol: Option<String>,
    pub decimals: u8,
}

/// Pool state captured alongside a position snapshot.
///
/// Fee-growth counters are global to the pool and monotonic across all of its positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub id: String,
    pub token0: TokenInfo,
    pub token1: TokenInfo,
    pub fee_tier: FeeTier,
    pub fee_growth_global0_x128: U256,
    pub fee_growth_global1_x128: U256,
    /// Current tick, when the source provides it.
    pub tick: Option<i32>,
    /// Units of token0 per one token1.
    pub token0_price: Option<Decimal>,
    /// Units of token1 per one token0.
    pub token1_price: Option<Decimal>,
}

/// One end of a position's price range with its fee-growth-outside checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickBoundary {
    pub tick_idx: i32,
    pub fee_growth_outside0_x128: U256,
    pub fee_growth_outside1_x128: U256,
}

/// A mint or burn carried by the snapshot's transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityEvent {
    pub transaction_id: String,
    pub amount_usd: Decimal,
}

/// A position's full state immediately after a liquidity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub position_id: PositionId,
    pub liquidity: U256,
    pub tick_lower: TickBoundary,
    pub tick_upper: TickBoundary,
    pub fee_growth_inside0_last_x128: U256,
    pub fee_growth_inside1_last_x128: U256,
    pub pool: PoolSnapshot,
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub deposited_token0: Decimal,
    pub deposited_token1: Decimal,
    pub withdrawn_token0: Decimal,
    pub withdrawn_token1: Decimal,
    pub collected_fees_token0: Decimal,
    pub collected_fees_token1: Decimal,
    pub mints: Vec<LiquidityEvent>,
    pub burns: Vec<LiquidityEvent>,
}

impl PositionSnapshot {
    pub fn has_liquidity(&self) -> bool {
        !self.liquidity.is_zero()
    }

    pub fn first_mint(&self) -> Option<&LiquidityEvent> {
        self.mints.first()
    }

    pub fn first_burn(&self) -> Option<&LiquidityEvent> {
        self.burns.first()
    }
}
