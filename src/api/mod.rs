pub mod health;
pub mod holdings;

use crate::orchestration::HoldingsService;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub holdings: Arc<HoldingsService>,
}

impl AppState {
    pub fn new(holdings: Arc<HoldingsService>) -> Self {
        Self { holdings }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/holdings", get(holdings::get_holdings))
        .layer(cors)
        .with_state(state)
}
