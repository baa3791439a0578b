//! Infrastructure Layer
//!
//! Contains implementations of external interfaces (exchange client,
//! durable store, config, logging). Depends on the domain layer but not on
//! the application layer.

pub mod config;
pub mod exchange_client;
pub mod logging;

// Re-export config types
pub use config::BotConfig;

// Re-export infrastructure services
pub use exchange_client::{build_auth, run_book_stream, PolymarketExchangeClient};
pub use logging::{init_tracing, init_tracing_with_level};
