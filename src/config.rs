use std::collections::HashMap;
use thiserror::Error;

/// Bridged USDC on Optimism, the default stable quote asset.
pub const DEFAULT_STABLECOIN: &str = "0x7f5c764cbc14f9669b88837ca1490cca17c31607";
pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_PRICE_PLATFORM: &str = "optimistic-ethereum";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub subgraph_url: String,
    pub stablecoins: Vec<String>,
    pub price_api_url: String,
    pub price_platform: String,
    pub price_oracle: PriceOracleMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOracleMode {
    Coingecko,
    None,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let subgraph_url = env_map
            .get("SUBGRAPH_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("SUBGRAPH_URL".to_string()))?;

        let stablecoins = parse_stablecoins(env_map.get("STABLECOINS").map(|s| s.as_str()))?;

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string());

        let price_platform = env_map
            .get("PRICE_PLATFORM")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRICE_PLATFORM.to_string());

        let price_oracle = match env_map
            .get("PRICE_ORACLE")
            .map(|s| s.as_str())
            .unwrap_or("coingecko")
        {
            "coingecko" => PriceOracleMode::Coingecko,
            "none" => PriceOracleMode::None,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PRICE_ORACLE".to_string(),
                    format!("must be coingecko or none, got {}", other),
                ))
            }
        };

        Ok(Config {
            port,
            subgraph_url,
            stablecoins,
            price_api_url,
            price_platform,
            price_oracle,
        })
    }
}

fn parse_stablecoins(raw: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(vec![DEFAULT_STABLECOIN.to_string()]);
    };

    let tokens: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(ConfigError::InvalidValue(
            "STABLECOINS".to_string(),
            "must list at least one token address".to_string(),
        ));
    }
    if let Some(bad) = tokens.iter().find(|t| !t.starts_with("0x")) {
        return Err(ConfigError::InvalidValue(
            "STABLECOINS".to_string(),
            format!("{} is not a 0x-prefixed address", bad),
        ));
    }

    Ok(tokens)
}
