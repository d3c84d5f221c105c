use lphistory::config::PriceOracleMode;
use lphistory::datasource::{CoingeckoPriceOracle, SubgraphDataSource};
use lphistory::engine::{StablecoinSet, ValuationResolver};
use lphistory::{api, config::Config, HoldingsService, PriceOracle, SnapshotSource};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    let source: Arc<dyn SnapshotSource> =
        Arc::new(SubgraphDataSource::new(config.subgraph_url.clone()));
    let oracle: Option<Arc<dyn PriceOracle>> = match config.price_oracle {
        PriceOracleMode::Coingecko => Some(Arc::new(CoingeckoPriceOracle::new(
            config.price_api_url.clone(),
            config.price_platform.clone(),
        ))),
        PriceOracleMode::None => None,
    };
    let valuation = ValuationResolver::new(StablecoinSet::new(config.stablecoins.clone()));
    let holdings = Arc::new(HoldingsService::new(source, oracle, valuation));

    tracing::info!(
        "Using subgraph {} with {} stablecoin(s), price oracle {:?}",
        config.subgraph_url,
        config.stablecoins.len(),
        config.price_oracle
    );

    // Create router
    let app = api::create_router(api::AppState::new(holdings));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
