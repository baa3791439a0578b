//! CLOB market-data WebSocket stream: message shapes and a builder wired
//! onto `hypersockets` for reconnect/heartbeat handling.

use crate::types::PriceLevel;
use hypersockets::core::*;
use hypersockets::{MessageHandler, MessageRouter, TextPongDetector, WsMessage};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("hypersockets error: {0}")]
    Hypersockets(#[from] hypersockets::HyperSocketError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Subscription message sent after connecting.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSubscription {
    pub assets_ids: Vec<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
}

impl MarketSubscription {
    pub fn new(token_ids: Vec<String>) -> Self {
        Self {
            assets_ids: token_ids,
            msg_type: "market".to_string(),
        }
    }
}

/// Initial orderbook snapshot. The server sends an array of these, one per
/// asset, right after a subscription is accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct BookSnapshot {
    pub market: String,
    pub asset_id: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub event_type: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Incremental price-level change for one or more assets.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeEvent {
    pub market: String,
    pub price_changes: Vec<PriceChange>,
    pub timestamp: String,
    pub event_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceChange {
    pub asset_id: String,
    pub price: String,
    pub size: String,
    pub side: String,
    #[serde(default)]
    pub hash: Option<String>,
    pub best_bid: String,
    pub best_ask: String,
}

/// Union of all incoming book-stream messages.
#[derive(Debug)]
pub enum BookStreamMessage {
    Snapshots(Vec<BookSnapshot>),
    PriceChange(PriceChangeEvent),
    Pong,
    Unknown(String),
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct BookStreamRoute(pub String);

struct BookStreamRouter {
    stream_id: String,
}

#[async_trait::async_trait]
impl MessageRouter for BookStreamRouter {
    type Message = BookStreamMessage;
    type RouteKey = BookStreamRoute;

    async fn parse(&self, message: WsMessage) -> hypersockets::Result<Self::Message> {
        let text = match message.as_text() {
            Some(t) => t,
            None => return Ok(BookStreamMessage::Unknown("binary data".to_string())),
        };

        if text == "PONG" {
            return Ok(BookStreamMessage::Pong);
        }

        if let Ok(snapshots) = serde_json::from_str::<Vec<BookSnapshot>>(text) {
            if snapshots.first().map(|s| s.event_type.as_str()) == Some("book") {
                return Ok(BookStreamMessage::Snapshots(snapshots));
            }
        }

        if let Ok(snapshot) = serde_json::from_str::<BookSnapshot>(text) {
            if snapshot.event_type == "book" {
                return Ok(BookStreamMessage::Snapshots(vec![snapshot]));
            }
        }

        if let Ok(price_change) = serde_json::from_str::<PriceChangeEvent>(text) {
            if price_change.event_type == "price_change" {
                return Ok(BookStreamMessage::PriceChange(price_change));
            }
        }

        debug!("[BookStream {}] unrecognized message: {}", self.stream_id, text);
        Ok(BookStreamMessage::Unknown(text.to_string()))
    }

    fn route_key(&self, _message: &Self::Message) -> Self::RouteKey {
        BookStreamRoute(self.stream_id.clone())
    }
}

/// Forwards every parsed message onto an mpsc channel for a consumer task
/// to fold into its own book state.
struct ForwardingHandler {
    tx: mpsc::UnboundedSender<BookStreamMessage>,
}

impl MessageHandler<BookStreamMessage> for ForwardingHandler {
    fn handle(&mut self, message: BookStreamMessage) -> hypersockets::Result<()> {
        let _ = self.tx.send(message);
        Ok(())
    }
}

pub struct BookStream {
    pub client: WebSocketClient<BookStreamRouter, BookStreamMessage>,
    pub events: mpsc::UnboundedReceiver<BookStreamMessage>,
}

impl BookStream {
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.client.shutdown().await?;
        Ok(())
    }
}

/// Open a market-data book stream for a set of token ids against the given
/// WebSocket endpoint, subscribing immediately on connect.
pub async fn build_book_stream(ws_url: &str, stream_id: String, token_ids: Vec<String>) -> Result<BookStream> {
    let (tx, rx) = mpsc::unbounded_channel();

    let router = BookStreamRouter { stream_id: stream_id.clone() };
    let handler = ForwardingHandler { tx };

    let subscription = MarketSubscription::new(token_ids);
    let subscription_json = serde_json::to_string(&subscription)?;

    let pong_detector = Arc::new(TextPongDetector::new("PONG".to_string()));
    let shutdown_flag = Arc::new(AtomicBool::new(true));

    let route = BookStreamRoute(stream_id.clone());

    let client = WebSocketClientBuilder::new()
        .url(ws_url)
        .router(router, move |routing| routing.handler(route.clone(), handler))
        .heartbeat(Duration::from_secs(5), WsMessage::Text("PING".to_string()))
        .pong_detector(pong_detector)
        .pong_timeout(Duration::from_secs(15))
        .subscription(WsMessage::Text(subscription_json))
        .shutdown_flag(shutdown_flag)
        .build()
        .await?;

    tokio::task::yield_now().await;

    let start = std::time::Instant::now();
    while !client.is_connected() && start.elapsed() < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    if !client.is_connected() {
        warn!("[BookStream {}] not connected after 5s wait", stream_id);
    }

    Ok(BookStream { client, events: rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_shape() {
        let sub = MarketSubscription::new(vec!["a".to_string(), "b".to_string()]);
        let json = serde_json::to_string(&sub).unwrap();
        assert!(json.contains("\"type\":\"market\""));
        assert!(json.contains("\"assets_ids\""));
    }
}
