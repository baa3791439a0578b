//! Concrete `application::ports::ExchangeClient` over the Polymarket CLOB +
//! Gamma APIs, plus the live book-stream task that keeps `BookStore` warm
//! between REST backfills.

pub mod auth;
pub mod rest;
pub mod stream;

pub use auth::build_auth;
pub use rest::PolymarketExchangeClient;
pub use stream::run_book_stream;
