//! USD unit prices inferred from a stablecoin leg.

use super::fixed_point::tick_to_price;
use crate::domain::{Decimal, PoolSnapshot, TokenId};
use std::collections::{HashMap, HashSet};

/// Known USD stablecoins, matched case-insensitively by contract id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StablecoinSet {
    tokens: HashSet<TokenId>,
}

impl StablecoinSet {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(TokenId::new).collect(),
        }
    }

    pub fn contains(&self, token: &TokenId) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// USD unit prices for a pool's two tokens. Zero means unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenPrices {
    pub token0: Decimal,
    pub token1: Decimal,
}

impl TokenPrices {
    pub fn new(token0: Decimal, token1: Decimal) -> Self {
        Self { token0, token1 }
    }

    /// USD value of a pair of token amounts, zero if the product overflows.
    pub fn value_of(&self, amount0: Decimal, amount1: Decimal) -> Decimal {
        let value = amount0
            .checked_mul(self.token0)
            .zip(amount1.checked_mul(self.token1))
            .and_then(|(value0, value1)| value0.checked_add(value1));
        Decimal::or_zero(value, "token value")
    }

    pub fn is_resolved(&self) -> bool {
        !self.token0.is_zero() || !self.token1.is_zero()
    }
}

/// Best-effort USD prices per token, gathered from an external oracle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTable {
    prices: HashMap<TokenId, Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: TokenId, price: Decimal) {
        self.prices.insert(token, price);
    }

    pub fn get(&self, token: &TokenId) -> Option<Decimal> {
        self.prices.get(token).copied()
    }

    /// Prices for a token pair, zero where the table has no entry.
    pub fn pair(&self, token0: &TokenId, token1: &TokenId) -> TokenPrices {
        TokenPrices::new(
            self.get(token0).unwrap_or_default(),
            self.get(token1).unwrap_or_default(),
        )
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(TokenId, Decimal)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (TokenId, Decimal)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValuationResolver {
    stablecoins: StablecoinSet,
}

impl ValuationResolver {
    pub fn new(stablecoins: StablecoinSet) -> Self {
        Self { stablecoins }
    }

    pub fn stablecoins(&self) -> &StablecoinSet {
        &self.stablecoins
    }

    /// Prices implied by a mint or burn worth `total_usd` that moved `amount0`/`amount1`.
    ///
    /// The stablecoin leg is pinned at 1 USD and the other leg absorbs the remainder.
    /// Pairs without a stablecoin resolve to zero for both legs.
    pub fn resolve(
        &self,
        token0: &TokenId,
        token1: &TokenId,
        total_usd: Decimal,
        amount0: Decimal,
        amount1: Decimal,
    ) -> TokenPrices {
        if self.stablecoins.contains(token0) {
            TokenPrices::new(Decimal::one(), residual_price(total_usd, amount0, amount1))
        } else if self.stablecoins.contains(token1) {
            TokenPrices::new(residual_price(total_usd, amount1, amount0), Decimal::one())
        } else {
            TokenPrices::default()
        }
    }

    /// Current USD prices from the pool's own quote, when one leg is a stablecoin.
    ///
    /// Uses the subgraph's token prices and falls back to the current tick.
    pub fn quote_prices(&self, pool: &PoolSnapshot) -> Option<TokenPrices> {
        if self.stablecoins.contains(&pool.token1.id) {
            let price0 = pool
                .token1_price
                .or_else(|| self.tick_price(pool))?;
            Some(TokenPrices::new(price0.non_negative(), Decimal::one()))
        } else if self.stablecoins.contains(&pool.token0.id) {
            let price1 = pool
                .token0_price
                .or_else(|| self.tick_price(pool).and_then(|p| Decimal::one().checked_div(p)))?;
            Some(TokenPrices::new(Decimal::one(), price1.non_negative()))
        } else {
            None
        }
    }

    fn tick_price(&self, pool: &PoolSnapshot) -> Option<Decimal> {
        tick_to_price(pool.tick?, pool.token0.decimals, pool.token1.decimals)
    }
}

/// `(total - stable_amount) / other_amount`, zero when the divisor is zero or on overflow.
fn residual_price(total_usd: Decimal, stable_amount: Decimal, other_amount: Decimal) -> Decimal {
    total_usd
        .checked_sub(stable_amount)
        .and_then(|remainder| remainder.checked_div(other_amount))
        .unwrap_or_default()
        .non_negative()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeeTier, TokenInfo};
    use primitive_types::U256;

    const USDC: &str = "0x7F5c764cBc14f9669B88837ca1490cCa17c31607";
    const OP: &str = "0x4200000000000000000000000000000000000042";
    const WETH: &str = "0x4200000000000000000000000000000000000006";

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn resolver() -> ValuationResolver {
        ValuationResolver::new(StablecoinSet::new([USDC]))
    }

    fn pool(token0: &str, token1: &str) -> PoolSnapshot {
        PoolSnapshot {
            id: "0xpool".to_string(),
            token0: TokenInfo {
                id: TokenId::new(token0),
                symbol: None,
                decimals: 18,
            },
            token1: TokenInfo {
                id: TokenId::new(token1),
                symbol: None,
                decimals: 18,
            },
            fee_tier: FeeTier::new(3000),
            fee_growth_global0_x128: U256::zero(),
            fee_growth_global1_x128: U256::zero(),
            tick: None,
            token0_price: None,
            token1_price: None,
        }
    }

    #[test]
    fn test_stablecoin_match_is_case_insensitive() {
        let set = StablecoinSet::new([USDC]);
        assert!(set.contains(&TokenId::new(USDC.to_lowercase())));
        assert!(set.contains(&TokenId::new(USDC.to_uppercase().replace("0X", "0x"))));
        assert!(!set.contains(&TokenId::new(OP)));
    }

    #[test]
    fn test_resolve_token1_stable() {
        let prices = resolver().resolve(
            &TokenId::new(OP),
            &TokenId::new(USDC),
            d("200"),
            d("100"),
            d("100"),
        );
        assert_eq!(prices, TokenPrices::new(d("1"), d("1")));
    }

    #[test]
    fn test_resolve_token0_stable() {
        let prices = resolver().resolve(
            &TokenId::new(USDC),
            &TokenId::new(WETH),
            d("5000"),
            d("1000"),
            d("2"),
        );
        assert_eq!(prices, TokenPrices::new(d("1"), d("2000")));
    }

    #[test]
    fn test_resolve_no_stablecoin_is_zero() {
        let prices = resolver().resolve(
            &TokenId::new(OP),
            &TokenId::new(WETH),
            d("5000"),
            d("1000"),
            d("2"),
        );
        assert_eq!(prices, TokenPrices::default());
        assert!(!prices.is_resolved());
    }

    #[test]
    fn test_resolve_zero_amount_does_not_panic() {
        let prices = resolver().resolve(
            &TokenId::new(OP),
            &TokenId::new(USDC),
            d("200"),
            Decimal::zero(),
            d("200"),
        );
        assert_eq!(prices, TokenPrices::new(Decimal::zero(), d("1")));
    }

    #[test]
    fn test_resolve_inconsistent_total_clamps_to_zero() {
        let prices = resolver().resolve(
            &TokenId::new(OP),
            &TokenId::new(USDC),
            d("50"),
            d("10"),
            d("100"),
        );
        assert_eq!(prices.token0, Decimal::zero());
    }

    #[test]
    fn test_value_of() {
        let prices = TokenPrices::new(d("1.1"), d("1"));
        assert_eq!(prices.value_of(d("1"), d("1")), d("2.1"));
    }

    #[test]
    fn test_quote_prices_from_subgraph_quote() {
        let mut p = pool(OP, USDC);
        p.token0_price = Some(d("0.5"));
        p.token1_price = Some(d("2"));
        assert_eq!(
            resolver().quote_prices(&p),
            Some(TokenPrices::new(d("2"), d("1")))
        );

        let mut p = pool(USDC, WETH);
        p.token0_price = Some(d("2000"));
        p.token1_price = Some(d("0.0005"));
        assert_eq!(
            resolver().quote_prices(&p),
            Some(TokenPrices::new(d("1"), d("2000")))
        );
    }

    #[test]
    fn test_quote_prices_falls_back_to_tick() {
        let mut p = pool(OP, USDC);
        p.tick = Some(0);
        assert_eq!(
            resolver().quote_prices(&p),
            Some(TokenPrices::new(d("1"), d("1")))
        );
    }

    #[test]
    fn test_price_table_pair_defaults_to_zero() {
        let table: PriceTable = [(TokenId::new(OP), d("1.8"))].into_iter().collect();
        assert_eq!(
            table.pair(&TokenId::new(OP), &TokenId::new(WETH)),
            TokenPrices::new(d("1.8"), Decimal::zero())
        );
    }

    #[test]
    fn test_quote_prices_unresolved() {
        assert_eq!(resolver().quote_prices(&pool(OP, USDC)), None);
        assert_eq!(resolver().quote_prices(&pool(OP, WETH)), None);
    }
}
