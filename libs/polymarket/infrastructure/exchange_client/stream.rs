//! Live order-book deltas over the CLOB market-data WebSocket, folded
//! directly into a shared `BookStore` so the engine's scan loop always reads
//! the freshest book without waiting on the REST backfill cadence.

use crate::domain::book::BookStore;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use polymarket_client::{build_book_stream, BookStreamMessage, PriceLevel};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Connection health for the live book-stream feed, shared between
/// [`run_book_stream`] and `Engine::get_state` so external callers can see
/// feed health without parsing log output.
pub struct StreamState {
    connected: AtomicBool,
    last_message_at: Mutex<Option<DateTime<Utc>>>,
    reconnect_count: AtomicU64,
    latency_ms: Mutex<Option<u64>>,
    subscribed_tokens: Mutex<Vec<String>>,
    last_error: Mutex<Option<String>>,
}

impl StreamState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            last_message_at: Mutex::new(None),
            reconnect_count: AtomicU64::new(0),
            latency_ms: Mutex::new(None),
            subscribed_tokens: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
        })
    }

    pub fn snapshot(&self) -> StreamStatus {
        StreamStatus {
            connected: self.connected.load(Ordering::SeqCst),
            last_message_at: *self.last_message_at.lock(),
            reconnect_count: self.reconnect_count.load(Ordering::SeqCst),
            latency_ms: *self.latency_ms.lock(),
            subscribed_tokens: self.subscribed_tokens.lock().clone(),
            last_error: self.last_error.lock().clone(),
        }
    }

    pub fn mark_connected(&self, tokens: &[String]) {
        self.connected.store(true, Ordering::SeqCst);
        *self.subscribed_tokens.lock() = tokens.to_vec();
    }

    pub fn mark_disconnected(&self, error: impl Into<String>) {
        self.connected.store(false, Ordering::SeqCst);
        *self.last_error.lock() = Some(error.into());
    }

    pub fn record_message(&self, received_at: Instant, enqueued_at: DateTime<Utc>) {
        *self.last_message_at.lock() = Some(enqueued_at);
        *self.latency_ms.lock() = Some(received_at.elapsed().as_millis() as u64);
    }

    pub fn record_reconnect(&self) {
        self.reconnect_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A point-in-time, `Clone`-able view of [`StreamState`] for snapshotting
/// into `EngineState`.
#[derive(Debug, Clone, Default)]
pub struct StreamStatus {
    pub connected: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub reconnect_count: u64,
    pub latency_ms: Option<u64>,
    pub subscribed_tokens: Vec<String>,
    pub last_error: Option<String>,
}

fn to_pairs(levels: &[PriceLevel]) -> Vec<(f64, f64)> {
    levels.iter().map(|l| (l.price_f64(), l.size_f64())).collect()
}

fn backoff_delay(attempt: u32) -> Duration {
    let scaled = BASE_BACKOFF.saturating_mul(1 << attempt.min(5));
    scaled.min(MAX_BACKOFF)
}

/// Runs until `token_ids` is empty or the task is aborted. Reconnects with an
/// exponential backoff (doubling from `BASE_BACKOFF`, capped at
/// `MAX_BACKOFF`) whenever the underlying socket fails to connect or drops;
/// the backoff resets to zero on the next successful connect.
pub async fn run_book_stream(ws_url: String, books: Arc<RwLock<BookStore>>, token_ids: Vec<String>, state: Arc<StreamState>) {
    if token_ids.is_empty() {
        return;
    }

    let mut attempt: u32 = 0;

    loop {
        info!(tokens = token_ids.len(), attempt, "connecting book stream");
        let mut stream = match build_book_stream(&ws_url, "mm-engine".to_string(), token_ids.clone()).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, attempt, "failed to open book stream, retrying");
                state.mark_disconnected(format!("book stream connect failed: {e}"));
                state.record_reconnect();
                let delay = backoff_delay(attempt);
                attempt = attempt.saturating_add(1);
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        attempt = 0;
        state.mark_connected(&token_ids);

        while let Some(message) = stream.events.recv().await {
            let received_at = Instant::now();
            let now = chrono::Utc::now();
            match message {
                BookStreamMessage::Snapshots(snapshots) => {
                    let mut store = books.write();
                    for snap in snapshots {
                        store.update(&snap.asset_id, &to_pairs(&snap.bids), &to_pairs(&snap.asks), now);
                    }
                }
                BookStreamMessage::PriceChange(event) => {
                    // The wire sends one changed level per message; `apply_delta`
                    // replaces a side wholesale, so merge the change into the
                    // side's current levels before writing it back.
                    let mut store = books.write();
                    for change in event.price_changes {
                        let price: f64 = change.price.parse().unwrap_or(0.0);
                        let size: f64 = change.size.parse().unwrap_or(0.0);
                        let is_bid = change.side.eq_ignore_ascii_case("buy");

                        let mut levels: Vec<(f64, f64)> = match store.get(&change.asset_id) {
                            Some(book) => {
                                let side = if is_bid { book.bids.levels() } else { book.asks.levels() };
                                side.iter().map(|l| (l.price, l.size)).collect()
                            }
                            None => Vec::new(),
                        };

                        levels.retain(|&(p, _)| (p - price).abs() > 1e-9);
                        if size > 0.0 {
                            levels.push((price, size));
                        }

                        if is_bid {
                            store.apply_delta(&change.asset_id, Some(&levels), None, now);
                        } else {
                            store.apply_delta(&change.asset_id, None, Some(&levels), now);
                        }
                    }
                }
                BookStreamMessage::Pong => {}
                BookStreamMessage::Unknown(text) => debug!(%text, "unrecognized book stream message"),
            }
            state.record_message(received_at, now);
        }

        warn!(attempt, "book stream closed, reconnecting");
        state.mark_disconnected("book stream closed");
        state.record_reconnect();
        let delay = backoff_delay(attempt);
        attempt = attempt.saturating_add(1);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_sixty_seconds() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2), Duration::from_secs(8));
        assert_eq!(backoff_delay(3), Duration::from_secs(16));
        assert_eq!(backoff_delay(4), Duration::from_secs(32));
        assert_eq!(backoff_delay(5), Duration::from_secs(60));
        assert_eq!(backoff_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn snapshot_reflects_connect_and_disconnect_transitions() {
        let state = StreamState::new();
        let tokens = vec!["tok-a".to_string(), "tok-b".to_string()];
        state.mark_connected(&tokens);
        let s = state.snapshot();
        assert!(s.connected);
        assert_eq!(s.subscribed_tokens, tokens);

        state.mark_disconnected("stream closed");
        state.record_reconnect();
        let s = state.snapshot();
        assert!(!s.connected);
        assert_eq!(s.reconnect_count, 1);
        assert_eq!(s.last_error.as_deref(), Some("stream closed"));
    }
}
