//! Domain types for LP position history.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Address, TokenId, PositionId, BlockNumber, Timestamp, FeeTier
//! - Position snapshots as delivered by the snapshot source
//! - Holding records produced by the ledger

pub mod decimal;
pub mod holding;
pub mod primitives;
pub mod snapshot;

pub use decimal::Decimal;
pub use holding::{HoldingRecord, HoldingStatus, HoldingsSummary};
pub use primitives::{
    Address, AddressParseError, BlockNumber, FeeTier, PositionId, Timestamp, TokenId,
};
pub use snapshot::{LiquidityEvent, PoolSnapshot, PositionSnapshot, TickBoundary, TokenInfo};
