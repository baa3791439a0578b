//! Order-book domain entity: per-token snapshot of bid/ask ladders.
//!
//! Sorted `Vec` with binary-search updates, same cache-friendly shape as the
//! teacher's integer-micros orderbook, but quantized to three-decimal `f64`
//! prices per the numeric policy this crate settled on (see DESIGN.md).

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// One (price, size) level. Both already rounded/validated on entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

/// Round a price to three decimal digits, matching the quoting precision
/// used throughout the strategy.
pub fn round_price(price: f64) -> f64 {
    (price * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone)]
pub struct BookSide {
    levels: Vec<Level>,
    is_bid: bool,
}

impl BookSide {
    fn new(is_bid: bool) -> Self {
        Self { levels: Vec::with_capacity(32), is_bid }
    }

    /// Replace the side wholesale, sorting bids descending / asks ascending.
    fn replace(&mut self, raw: &[(f64, f64)]) {
        self.levels.clear();
        self.levels.reserve(raw.len());
        for &(price, size) in raw {
            if size > 0.0 {
                self.levels.push(Level { price: round_price(price), size });
            }
        }
        if self.is_bid {
            self.levels.sort_unstable_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));
        } else {
            self.levels.sort_unstable_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
        }
    }

    fn best(&self) -> Option<Level> {
        self.levels.first().copied()
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }
}

/// Book snapshot for a single outcome token: bids sorted descending, asks
/// ascending, stamped with the time it was last replaced or mutated.
#[derive(Debug, Clone)]
pub struct Book {
    pub token_id: String,
    pub bids: BookSide,
    pub asks: BookSide,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn new(token_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            token_id: token_id.into(),
            bids: BookSide::new(true),
            asks: BookSide::new(false),
            updated_at: now,
        }
    }

    /// Replace the whole book atomically from a REST backfill. Accepts raw
    /// (price, size) pairs already parsed from either `{bids,asks}` or
    /// `{buys,sells}` wire shapes.
    pub fn replace_snapshot(&mut self, bids: &[(f64, f64)], asks: &[(f64, f64)], now: DateTime<Utc>) {
        self.bids.replace(bids);
        self.asks.replace(asks);
        self.updated_at = now;
    }

    /// Apply a streaming delta. A side left as `None` leaves the other side's
    /// prior snapshot untouched, per the per-side replace-if-present rule.
    pub fn apply_delta(&mut self, bids: Option<&[(f64, f64)]>, asks: Option<&[(f64, f64)]>, now: DateTime<Utc>) {
        if let Some(bids) = bids {
            self.bids.replace(bids);
        }
        if let Some(asks) = asks {
            self.asks.replace(asks);
        }
        self.updated_at = now;
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.best()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.best()
    }

    /// Arithmetic mean of best bid/ask; falls back to whichever side is
    /// populated. `None` when the book is entirely empty.
    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / 2.0),
            (Some(b), None) => Some(b.price),
            (None, Some(a)) => Some(a.price),
            (None, None) => None,
        }
    }

    /// Quoted spread in basis points relative to best bid.
    pub fn spread_bps(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) if b.price > 0.0 => Some((a.price - b.price) / b.price * 10_000.0),
            _ => None,
        }
    }

    /// A book is internally consistent only when best bid < best ask
    /// whenever both sides are populated; a violation means the book should
    /// be treated as stale.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => b.price >= a.price,
            _ => false,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.updated_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, horizon: chrono::Duration) -> bool {
        self.age(now) > horizon || self.is_crossed()
    }
}

/// In-memory store of books keyed by token-id. Never blocks; updates for
/// unknown tokens are simply ignored by the caller (the store itself has no
/// notion of "known" tokens - that's the registry's job).
#[derive(Debug, Default)]
pub struct BookStore {
    books: std::collections::HashMap<String, Book>,
}

impl BookStore {
    pub fn new() -> Self {
        Self { books: std::collections::HashMap::new() }
    }

    pub fn get(&self, token_id: &str) -> Option<&Book> {
        self.books.get(token_id)
    }

    /// Replace a token's snapshot wholesale (REST backfill path).
    pub fn update(&mut self, token_id: &str, bids: &[(f64, f64)], asks: &[(f64, f64)], now: DateTime<Utc>) {
        self.books
            .entry(token_id.to_string())
            .and_modify(|b| b.replace_snapshot(bids, asks, now))
            .or_insert_with(|| {
                let mut book = Book::new(token_id, now);
                book.replace_snapshot(bids, asks, now);
                book
            });
    }

    /// Apply a streaming delta (per-side replace-if-present).
    pub fn apply_delta(
        &mut self,
        token_id: &str,
        bids: Option<&[(f64, f64)]>,
        asks: Option<&[(f64, f64)]>,
        now: DateTime<Utc>,
    ) {
        self.books
            .entry(token_id.to_string())
            .and_modify(|b| b.apply_delta(bids, asks, now))
            .or_insert_with(|| {
                let mut book = Book::new(token_id, now);
                book.apply_delta(bids, asks, now);
                book
            });
    }

    pub fn remove(&mut self, token_id: &str) {
        self.books.remove(token_id);
    }

    pub fn stale_tokens(&self, now: DateTime<Utc>, horizon: chrono::Duration) -> Vec<String> {
        let mut stale: Vec<(&String, chrono::Duration)> = self
            .books
            .iter()
            .filter(|(_, b)| b.is_stale(now, horizon))
            .map(|(id, b)| (id, b.age(now)))
            .collect();
        stale.sort_by(|a, b| b.1.cmp(&a.1));
        stale.into_iter().map(|(id, _)| id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(secs)
    }

    #[test]
    fn snapshot_replace_is_idempotent() {
        let mut book = Book::new("tok", t(0));
        book.replace_snapshot(&[(0.40, 100.0), (0.39, 50.0)], &[(0.50, 80.0)], t(0));
        let before = (book.best_bid(), book.best_ask());
        book.replace_snapshot(&[(0.40, 100.0), (0.39, 50.0)], &[(0.50, 80.0)], t(1));
        let after = (book.best_bid(), book.best_ask());
        assert_eq!(before, after);
    }

    #[test]
    fn delta_replaces_only_present_side() {
        let mut book = Book::new("tok", t(0));
        book.replace_snapshot(&[(0.40, 100.0), (0.39, 50.0)], &[(0.50, 80.0)], t(0));
        book.apply_delta(Some(&[(0.41, 90.0)]), None, t(1));
        assert_eq!(book.best_bid().unwrap().price, 0.41);
        assert_eq!(book.best_ask().unwrap().price, 0.50);
    }

    #[test]
    fn mid_is_mean_of_best_bid_ask() {
        let mut book = Book::new("tok", t(0));
        book.replace_snapshot(&[(0.40, 10.0)], &[(0.50, 10.0)], t(0));
        assert_eq!(book.mid(), Some(0.45));
    }

    #[test]
    fn crossed_book_is_stale() {
        let mut book = Book::new("tok", t(0));
        book.replace_snapshot(&[(0.60, 10.0)], &[(0.50, 10.0)], t(0));
        assert!(book.is_crossed());
        assert!(book.is_stale(t(0), Duration::milliseconds(2000)));
    }

    #[test]
    fn store_ignores_unknown_get() {
        let store = BookStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn store_tracks_staleness_oldest_first() {
        let mut store = BookStore::new();
        store.update("a", &[(0.4, 10.0)], &[(0.5, 10.0)], t(-10));
        store.update("b", &[(0.4, 10.0)], &[(0.5, 10.0)], t(-5));
        let stale = store.stale_tokens(t(0), Duration::milliseconds(2000));
        assert_eq!(stale, vec!["a".to_string(), "b".to_string()]);
    }
}
