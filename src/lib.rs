pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{
    DataSourceError, MockDataSource, PriceOracle, SnapshotSource, StaticPriceOracle,
    SubgraphDataSource,
};
pub use domain::{
    Address, BlockNumber, Decimal, HoldingRecord, HoldingStatus, HoldingsSummary, PositionId,
    PositionSnapshot, TokenId,
};
pub use engine::PositionLedger;
pub use error::AppError;
pub use orchestration::HoldingsService;
