//! Uncollected fee estimation from Uniswap V3 fee-growth checkpoints.

use super::fixed_point::{mul_shift_q128, raw_to_token_amount};
use crate::domain::{Decimal, PositionSnapshot};
use primitive_types::{U256, U512};
use tracing::warn;

/// Fee amounts owed to a position but not yet collected, in token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccruedFees {
    pub token0: Decimal,
    pub token1: Decimal,
}

/// Inputs for a single token's fee accrual.
#[derive(Debug, Clone, Copy)]
struct FeeGrowthInputs {
    global: U256,
    outside_lower: U256,
    outside_upper: U256,
    inside_last: U256,
}

/// Computes uncollected fees for open positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeAccrualCalculator;

impl FeeAccrualCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Fees accrued by the position in `snapshot` since its last checkpoint.
    pub fn accrued_fees(&self, snapshot: &PositionSnapshot) -> AccruedFees {
        let pool = &snapshot.pool;
        let lower = &snapshot.tick_lower;
        let upper = &snapshot.tick_upper;

        let token0 = FeeGrowthInputs {
            global: pool.fee_growth_global0_x128,
            outside_lower: lower.fee_growth_outside0_x128,
            outside_upper: upper.fee_growth_outside0_x128,
            inside_last: snapshot.fee_growth_inside0_last_x128,
        };
        let token1 = FeeGrowthInputs {
            global: pool.fee_growth_global1_x128,
            outside_lower: lower.fee_growth_outside1_x128,
            outside_upper: upper.fee_growth_outside1_x128,
            inside_last: snapshot.fee_growth_inside1_last_x128,
        };

        let range = (pool.tick, lower.tick_idx, upper.tick_idx);
        AccruedFees {
            token0: self.token_fee(range, token0, snapshot.liquidity, pool.token0.decimals),
            token1: self.token_fee(range, token1, snapshot.liquidity, pool.token1.decimals),
        }
    }

    fn token_fee(
        &self,
        (current_tick, tick_lower, tick_upper): (Option<i32>, i32, i32),
        inputs: FeeGrowthInputs,
        liquidity: U256,
        decimals: u8,
    ) -> Decimal {
        let inside = fee_growth_inside(
            current_tick,
            tick_lower,
            tick_upper,
            inputs.global,
            inputs.outside_lower,
            inputs.outside_upper,
        );

        let raw = uncollected_raw(inside, inputs.inside_last, liquidity);
        match raw_to_token_amount(raw, decimals) {
            Ok(amount) => amount,
            Err(e) => {
                warn!("Fee amount out of range, treating as zero: {}", e);
                Decimal::zero()
            }
        }
    }
}

/// Fee growth per unit of liquidity inside `[tick_lower, tick_upper)`.
///
/// Mirrors `Tick.getFeeGrowthInside`: the outside checkpoint of a boundary refers to
/// the side of the boundary opposite the current tick, so each term is flipped when
/// the current tick is on the other side. Arithmetic wraps modulo 2^256 as on-chain.
/// Without a known current tick the position is assumed to be in range.
pub fn fee_growth_inside(
    current_tick: Option<i32>,
    tick_lower: i32,
    tick_upper: i32,
    global: U256,
    outside_lower: U256,
    outside_upper: U256,
) -> U256 {
    let (below, above) = match current_tick {
        Some(tick) => {
            let below = if tick >= tick_lower {
                outside_lower
            } else {
                global.overflowing_sub(outside_lower).0
            };
            let above = if tick < tick_upper {
                outside_upper
            } else {
                global.overflowing_sub(outside_upper).0
            };
            (below, above)
        }
        None => (outside_lower, outside_upper),
    };

    global.overflowing_sub(below).0.overflowing_sub(above).0
}

/// Raw token amount owed: `floor((inside - inside_last) * liquidity / 2^128)`.
///
/// A checkpoint ahead of the freshly computed growth means inconsistent data; owes zero.
pub fn uncollected_raw(inside: U256, inside_last: U256, liquidity: U256) -> U512 {
    match inside.checked_sub(inside_last) {
        Some(delta) => mul_shift_q128(delta, liquidity),
        None => U512::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BlockNumber, FeeTier, PoolSnapshot, PositionId, TickBoundary, Timestamp, TokenId,
        TokenInfo,
    };

    fn q128() -> U256 {
        U256::one() << 128
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn snapshot(
        tick: Option<i32>,
        global0: U256,
        outside_lower0: U256,
        outside_upper0: U256,
        inside_last0: U256,
        liquidity: U256,
    ) -> PositionSnapshot {
        PositionSnapshot {
            position_id: PositionId::new("1"),
            liquidity,
            tick_lower: TickBoundary {
                tick_idx: -100,
                fee_growth_outside0_x128: outside_lower0,
                fee_growth_outside1_x128: U256::zero(),
            },
            tick_upper: TickBoundary {
                tick_idx: 100,
                fee_growth_outside0_x128: outside_upper0,
                fee_growth_outside1_x128: U256::zero(),
            },
            fee_growth_inside0_last_x128: inside_last0,
            fee_growth_inside1_last_x128: U256::zero(),
            pool: PoolSnapshot {
                id: "0xpool".to_string(),
                token0: TokenInfo {
                    id: TokenId::new("0xa"),
                    symbol: None,
                    decimals: 6,
                },
                token1: TokenInfo {
                    id: TokenId::new("0xb"),
                    symbol: None,
                    decimals: 18,
                },
                fee_tier: FeeTier::new(3000),
                fee_growth_global0_x128: global0,
                fee_growth_global1_x128: U256::zero(),
                tick,
                token0_price: None,
                token1_price: None,
            },
            block_number: BlockNumber::new(1),
            timestamp: Timestamp::new(1),
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

    #[test]
    fn test_fee_growth_inside_in_range() {
        let inside = fee_growth_inside(
            Some(0),
            -100,
            100,
            U256::from(1000u32),
            U256::from(100u32),
            U256::from(200u32),
        );
        assert_eq!(inside, U256::from(700u32));
    }

    #[test]
    fn test_fee_growth_inside_below_range() {
        // Current tick under the range: below = global - outsideLower.
        let inside = fee_growth_inside(
            Some(-200),
            -100,
            100,
            U256::from(1000u32),
            U256::from(300u32),
            U256::from(200u32),
        );
        // below = 700, above = 200, inside = 1000 - 700 - 200 = 100
        assert_eq!(inside, U256::from(100u32));
    }

    #[test]
    fn test_fee_growth_inside_above_range() {
        let inside = fee_growth_inside(
            Some(100),
            -100,
            100,
            U256::from(1000u32),
            U256::from(100u32),
            U256::from(600u32),
        );
        // below = 100, above = 1000 - 600 = 400, inside = 500
        assert_eq!(inside, U256::from(500u32));
    }

    #[test]
    fn test_fee_growth_inside_unknown_tick_uses_raw_values() {
        let inside = fee_growth_inside(
            None,
            -100,
            100,
            U256::from(1000u32),
            U256::from(100u32),
            U256::from(200u32),
        );
        assert_eq!(inside, U256::from(700u32));
    }

    #[test]
    fn test_fee_growth_inside_wraps() {
        let inside = fee_growth_inside(
            Some(0),
            -100,
            100,
            U256::from(10u32),
            U256::from(20u32),
            U256::zero(),
        );
        assert_eq!(inside, U256::MAX - U256::from(9u32));
    }

    #[test]
    fn test_uncollected_raw_truncates() {
        // D * L / 2^128 with D = 2^128 + 2^127 and L = 3 -> floor(4.5) = 4.
        let d_q128 = q128() + (q128() >> 1);
        assert_eq!(
            uncollected_raw(d_q128, U256::zero(), U256::from(3u8)),
            U512::from(4u8)
        );
    }

    #[test]
    fn test_uncollected_raw_matches_formula() {
        let inside_last = U256::from_dec_str("5643232589123202072279476202331375214447141").unwrap();
        let delta = U256::from_dec_str("1000000000000000000000000000000000000000").unwrap();
        let liquidity = U256::from_dec_str("199486544038781090").unwrap();

        let expected = (U512::from(delta) * U512::from(liquidity)) >> 128;
        let raw = uncollected_raw(inside_last + delta, inside_last, liquidity);
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_uncollected_raw_clamps_negative_delta() {
        assert_eq!(
            uncollected_raw(U256::from(5u8), U256::from(6u8), U256::from(1000u32)),
            U512::zero()
        );
    }

    #[test]
    fn test_accrued_fees_scales_by_decimals() {
        // delta = 2 * 2^128 per unit liquidity, L = 1_500_000 -> 3_000_000 raw -> 3 (6 decimals)
        let s = snapshot(
            Some(0),
            q128() * U256::from(2u8),
            U256::zero(),
            U256::zero(),
            U256::zero(),
            U256::from(1_500_000u64),
        );
        let fees = FeeAccrualCalculator::new().accrued_fees(&s);
        assert_eq!(fees.token0, d("3"));
        assert_eq!(fees.token1, Decimal::zero());
    }

    #[test]
    fn test_accrued_fees_monotonic_in_global_growth() {
        let calc = FeeAccrualCalculator::new();
        let liquidity = U256::from_dec_str("626275517193904256").unwrap();
        let outside_lower = U256::from_dec_str("9354102241694890923577159749819144773639176").unwrap();
        let outside_upper = U256::from_dec_str("4923543797226838347637301965437811442105092").unwrap();
        let inside_last = U256::from_dec_str("4338909725714742598270584242967803989973862").unwrap();
        let base_global = U256::from_dec_str("110406942604219311187937492467171708429917490").unwrap();

        let mut previous = Decimal::zero();
        for step in 0u64..20 {
            let global = base_global + U256::from(step) * (q128() >> 4);
            let s = snapshot(Some(0), global, outside_lower, outside_upper, inside_last, liquidity);
            let fee = calc.accrued_fees(&s).token0;
            assert!(!fee.is_negative());
            assert!(fee >= previous, "fee decreased at step {}", step);
            previous = fee;
        }
        assert!(previous.is_positive());
    }

    #[test]
    fn test_accrued_fees_stale_checkpoint_is_zero() {
        let s = snapshot(
            Some(0),
            U256::from(100u32),
            U256::zero(),
            U256::zero(),
            U256::from(200u32),
            U256::from(1_000_000u64),
        );
        let fees = FeeAccrualCalculator::new().accrued_fees(&s);
        assert_eq!(fees.token0, Decimal::zero());
    }
}
