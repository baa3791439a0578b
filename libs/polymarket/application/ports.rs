//! Ports the application layer depends on but does not implement.
//!
//! `infrastructure::exchange_client` provides the concrete `ExchangeClient`
//! over the `polymarket-client` crate. The durable store has no port of its
//! own: `execution_controller` depends on `market_db::MarketDatabase`
//! directly, the same way the teacher's executor talks straight to its own
//! database crate with no intervening trait.

use crate::domain::order::Side;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rate limited")]
    RateLimited,
    #[error("order rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

#[derive(Debug, Clone)]
pub struct BookPayload {
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub token_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderResponse {
    pub order_id: String,
}

/// Remote order status vocabulary, pre-mapping of MATCHED -> FILLED onto the
/// domain's `OrderStatus` happens at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOrderState {
    Pending,
    Open,
    Matched,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone)]
pub struct RemoteOrderStatus {
    pub state: RemoteOrderState,
    pub size_matched: f64,
}

#[derive(Debug, Clone)]
pub struct CandidateMarket {
    pub market_id: String,
    pub condition_id: String,
    pub question: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub accepting_orders: bool,
    pub has_order_book: bool,
}

/// Typed request/response facade over REST + WS, per-call latency is
/// recorded by the implementation, not this trait.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn list_markets(&self, cursor: Option<String>) -> Result<(Vec<CandidateMarket>, Option<String>)>;
    async fn get_book(&self, token_id: &str) -> Result<BookPayload>;
    async fn place_order(&self, req: PlaceOrderRequest) -> Result<PlaceOrderResponse>;
    async fn get_order(&self, order_id: &str) -> Result<RemoteOrderStatus>;
    async fn cancel_order(&self, order_id: &str) -> Result<()>;
    async fn cancel_all(&self) -> Result<usize>;
    /// Most recently observed round-trip latency across any call, in ms.
    fn last_latency_ms(&self) -> Option<u64>;
}
