//! Bot configuration: YAML + environment-variable secret overrides.

use crate::application::engine::EngineConfig;
use crate::application::execution_controller::ExecutionConfig;
use crate::application::quote_generator::QuoteGeneratorConfig;
use crate::application::risk_gate::RiskGateConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level bot configuration, loaded from YAML with secrets overridden
/// from the environment (never committed to the YAML file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub database: DatabaseConfig,
    pub polymarket: PolymarketConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionTimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolymarketConfig {
    pub clob_base_url: String,
    pub ws_url: String,
    pub gamma_url: String,
    pub chain_id: u64,

    /// Secrets, never read from YAML: `#[serde(skip)]` fields populated from
    /// the environment in `load()`.
    #[serde(skip)]
    pub api_key: String,
    #[serde(skip)]
    pub api_secret: String,
    #[serde(skip)]
    pub api_passphrase: String,
    #[serde(skip)]
    pub funder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub max_markets: usize,
    pub quote_spread_bps: f64,
    pub scan_interval_ms: u64,
    pub order_size_usdc: f64,
    pub max_order_size_usdc: f64,
    pub min_liquidity_usdc: f64,
    pub price_staleness_ms: u64,
    pub quote_refresh_ms: u64,
    pub quote_ttl_ms: u64,
    pub reprice_threshold_bps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_total_exposure_usdc: f64,
    pub max_per_market_exposure_usdc: f64,
    pub max_daily_loss_usdc: f64,
    pub max_consecutive_losses: u32,
    pub circuit_breaker_cooldown_s: i64,
    pub max_open_orders: usize,
    pub position_limit_per_outcome: f64,
    #[serde(default)]
    pub sell_reduces_exposure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTimingConfig {
    pub order_timeout_ms: u64,
    pub cancel_stale_after_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BotConfig {
    /// Load configuration from a YAML file, then layer environment-provided
    /// secrets and overrides on top, then validate.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: BotConfig = serde_yaml::from_str(&yaml_content)?;

        dotenv::dotenv().ok();

        config.polymarket.api_key = std::env::var("POLY_API_KEY").map_err(|_| ConfigError::EnvVarMissing("POLY_API_KEY".to_string()))?;
        config.polymarket.api_secret = std::env::var("POLY_API_SECRET").map_err(|_| ConfigError::EnvVarMissing("POLY_API_SECRET".to_string()))?;
        config.polymarket.api_passphrase = std::env::var("POLY_API_PASSPHRASE").map_err(|_| ConfigError::EnvVarMissing("POLY_API_PASSPHRASE".to_string()))?;
        config.polymarket.funder = std::env::var("POLY_FUNDER").unwrap_or_default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            info!("overriding database URL from environment variable");
            config.database.url = db_url;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.strategy.quote_refresh_ms >= self.strategy.quote_ttl_ms {
            return Err(ConfigError::ValidationError("strategy.quote_refresh_ms must be less than strategy.quote_ttl_ms".to_string()));
        }
        if self.strategy.max_markets == 0 {
            return Err(ConfigError::ValidationError("strategy.max_markets must be greater than 0".to_string()));
        }
        if self.strategy.min_liquidity_usdc < 0.0 {
            return Err(ConfigError::ValidationError("strategy.min_liquidity_usdc cannot be negative".to_string()));
        }
        if self.strategy.order_size_usdc > self.strategy.max_order_size_usdc {
            return Err(ConfigError::ValidationError("strategy.order_size_usdc must be <= strategy.max_order_size_usdc".to_string()));
        }
        if self.risk.max_per_market_exposure_usdc > self.risk.max_total_exposure_usdc {
            return Err(ConfigError::ValidationError("risk.max_per_market_exposure_usdc must be <= risk.max_total_exposure_usdc".to_string()));
        }
        if self.risk.position_limit_per_outcome <= 0.0 {
            return Err(ConfigError::ValidationError("risk.position_limit_per_outcome must be positive".to_string()));
        }
        Ok(())
    }

    pub fn quote_generator_config(&self) -> QuoteGeneratorConfig {
        QuoteGeneratorConfig {
            quote_spread_bps: self.strategy.quote_spread_bps,
            min_liquidity_usdc: self.strategy.min_liquidity_usdc,
            inventory_limit: self.risk.position_limit_per_outcome,
        }
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            reprice_threshold_bps: self.strategy.reprice_threshold_bps,
            quote_ttl: chrono::Duration::milliseconds(self.strategy.quote_ttl_ms as i64),
            quote_refresh_min_interval: chrono::Duration::milliseconds(self.strategy.quote_refresh_ms as i64),
            order_size_usdc: self.strategy.order_size_usdc,
            max_order_size_usdc: self.strategy.max_order_size_usdc,
        }
    }

    pub fn risk_gate_config(&self) -> RiskGateConfig {
        RiskGateConfig {
            max_total_exposure_usdc: self.risk.max_total_exposure_usdc,
            max_per_market_exposure_usdc: self.risk.max_per_market_exposure_usdc,
            max_daily_loss_usdc: self.risk.max_daily_loss_usdc,
            max_consecutive_losses: self.risk.max_consecutive_losses,
            circuit_breaker_cooldown_s: self.risk.circuit_breaker_cooldown_s,
            max_open_orders: self.risk.max_open_orders,
            sell_reduces_exposure: self.risk.sell_reduces_exposure,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            discovery_interval: StdDuration::from_secs(60),
            scan_interval: StdDuration::from_millis(self.strategy.scan_interval_ms),
            backfill_interval: StdDuration::from_secs(3),
            backfill_batch: 3,
            staleness_horizon: chrono::Duration::milliseconds(self.strategy.price_staleness_ms as i64),
            max_markets: self.strategy.max_markets,
        }
    }
}
