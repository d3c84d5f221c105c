//! Pure computation engine(s) for LP holding reconstruction.
//!
//! Nothing here performs I/O; inputs are fully fetched snapshots and prices.

pub mod fee_accrual;
pub mod fixed_point;
pub mod ledger;
pub mod valuation;

pub use fee_accrual::{AccruedFees, FeeAccrualCalculator};
pub use fixed_point::{tick_to_price, FixedPointError};
pub use ledger::{order_oldest_first, PositionLedger};
pub use valuation::{PriceTable, StablecoinSet, TokenPrices, ValuationResolver};
