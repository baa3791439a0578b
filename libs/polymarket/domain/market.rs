//! Market registry: condition-id -> (YES token, NO token, metadata).

use crate::domain::book::BookStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Market {
    pub market_id: String,
    pub condition_id: String,
    pub question: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub active: bool,
    pub last_quote_at: Option<DateTime<Utc>>,
}

impl Market {
    pub fn new(
        market_id: impl Into<String>,
        condition_id: impl Into<String>,
        question: impl Into<String>,
        yes_token_id: impl Into<String>,
        no_token_id: impl Into<String>,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            condition_id: condition_id.into(),
            question: question.into(),
            yes_token_id: yes_token_id.into(),
            no_token_id: no_token_id.into(),
            active: true,
            last_quote_at: None,
        }
    }

    /// A market is ready only once both its books exist and neither exceeds
    /// the staleness horizon.
    pub fn is_ready(&self, books: &BookStore, now: DateTime<Utc>, horizon: chrono::Duration) -> bool {
        if !self.active {
            return false;
        }
        let yes_fresh = books.get(&self.yes_token_id).map(|b| !b.is_stale(now, horizon)).unwrap_or(false);
        let no_fresh = books.get(&self.no_token_id).map(|b| !b.is_stale(now, horizon)).unwrap_or(false);
        yes_fresh && no_fresh
    }
}

/// Owns the set of known markets; books hang off via token-id lookups only
/// (a weak relation) so removing a market never has to mutate the book
/// store directly.
#[derive(Clone)]
pub struct MarketRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    by_condition: DashMap<String, Market>,
    token_to_condition: DashMap<String, String>,
    max_markets: Mutex<usize>,
}

impl MarketRegistry {
    pub fn new(max_markets: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                by_condition: DashMap::new(),
                token_to_condition: DashMap::new(),
                max_markets: Mutex::new(max_markets),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.by_condition.len()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= *self.inner.max_markets.lock()
    }

    pub fn contains(&self, condition_id: &str) -> bool {
        self.inner.by_condition.contains_key(condition_id)
    }

    /// Add a market. Returns `false` if the condition-id already exists or
    /// the registry is at capacity (uniqueness + capacity are enforced here,
    /// not by the caller).
    pub fn add(&self, market: Market) -> bool {
        if self.is_full() || self.contains(&market.condition_id) {
            return false;
        }
        self.inner.token_to_condition.insert(market.yes_token_id.clone(), market.condition_id.clone());
        self.inner.token_to_condition.insert(market.no_token_id.clone(), market.condition_id.clone());
        self.inner.by_condition.insert(market.condition_id.clone(), market);
        true
    }

    /// Remove a market, detaching its token->condition relations. Book
    /// entries themselves are left for the caller to evict from the book
    /// store if desired.
    pub fn remove(&self, condition_id: &str) -> Option<Market> {
        let removed = self.inner.by_condition.remove(condition_id).map(|(_, m)| m);
        if let Some(ref m) = removed {
            self.inner.token_to_condition.remove(&m.yes_token_id);
            self.inner.token_to_condition.remove(&m.no_token_id);
        }
        removed
    }

    pub fn lookup_by_token(&self, token_id: &str) -> Option<Market> {
        let condition_id = self.inner.token_to_condition.get(token_id)?.clone();
        self.inner.by_condition.get(&condition_id).map(|m| m.clone())
    }

    pub fn get(&self, condition_id: &str) -> Option<Market> {
        self.inner.by_condition.get(condition_id).map(|m| m.clone())
    }

    pub fn set_last_quote_at(&self, condition_id: &str, at: DateTime<Utc>) {
        if let Some(mut m) = self.inner.by_condition.get_mut(condition_id) {
            m.last_quote_at = Some(at);
        }
    }

    pub fn iter(&self) -> Vec<Market> {
        self.inner.by_condition.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(cid: &str) -> Market {
        Market::new("m1", cid, "q?", format!("{cid}-yes"), format!("{cid}-no"))
    }

    #[test]
    fn add_enforces_uniqueness() {
        let reg = MarketRegistry::new(10);
        assert!(reg.add(market("c1")));
        assert!(!reg.add(market("c1")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn add_enforces_capacity() {
        let reg = MarketRegistry::new(1);
        assert!(reg.add(market("c1")));
        assert!(!reg.add(market("c2")));
    }

    #[test]
    fn remove_detaches_token_lookup() {
        let reg = MarketRegistry::new(10);
        reg.add(market("c1"));
        assert!(reg.lookup_by_token("c1-yes").is_some());
        reg.remove("c1");
        assert!(reg.lookup_by_token("c1-yes").is_none());
    }

    #[test]
    fn market_ready_requires_both_fresh_books() {
        let mut books = BookStore::new();
        let now = Utc::now();
        let horizon = chrono::Duration::milliseconds(2000);
        let m = market("c1");
        assert!(!m.is_ready(&books, now, horizon));

        books.update(&m.yes_token_id, &[(0.4, 1.0)], &[(0.5, 1.0)], now);
        assert!(!m.is_ready(&books, now, horizon));

        books.update(&m.no_token_id, &[(0.4, 1.0)], &[(0.5, 1.0)], now);
        assert!(m.is_ready(&books, now, horizon));
    }
}
