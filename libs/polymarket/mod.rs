//! Polymarket automated market-making trading core.
//!
//! Clean Architecture layout: `domain` (pure entities), `application` (use
//! cases: quote generation, risk gating, execution reconciliation, the
//! engine orchestrator), `infrastructure` (exchange client, durable store,
//! config, logging).

pub mod domain;
pub mod infrastructure;
pub mod application;

pub use infrastructure::{init_tracing, BotConfig};

pub use application::{Engine, EngineConfig, ExecutionConfig, ExecutionController, QuoteGenerator, QuoteGeneratorConfig, RiskGate, RiskGateConfig};
pub use domain::{Book, BookStore, LiveOrder, Market, MarketRegistry, OrderKey, OrderStatus, Outcome, Position, PositionKey, Side};
