//! Polymarket Market-Making Bot - Main Library
//!
//! This crate provides the binary entry point for the market-making trading
//! core, following Clean Architecture principles.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI)
//! - **polymarket**: Core business logic (re-exported from workspace)
//! - **hypersockets**: WebSocket library (re-exported from workspace)
//! - **market_db**: Durable store (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use polymarket_mm_bot::bin_common::{load_config_from_env, ConfigType};
//! use polymarket_mm_bot::polymarket::application::Engine;
//! ```

// Re-export workspace libraries for convenience
pub use hypersockets;
pub use market_db;
pub use polymarket;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables
    //!
    //! Provides shared functionality for the presentation layer (binaries)
    //! following Clean Architecture principles.

    pub mod cli;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
}
