//! Domain Layer
//!
//! Pure business entities for the market-making core. No dependency on
//! infrastructure or application layers.

pub mod book;
pub mod market;
pub mod order;
pub mod position;
pub mod quote;
pub mod risk;

pub use book::{Book, BookSide, BookStore, Level};
pub use market::{Market, MarketRegistry};
pub use order::{LiveOrder, OrderKey, OrderStatus, Outcome, Side};
pub use position::{Position, PositionKey};
pub use quote::{DesiredQuote, QuoteOrder};
pub use risk::{Breaker, RejectReason, RiskState};
