//! Inventory-aware two-sided quote generation.

use crate::domain::book::BookStore;
use crate::domain::market::MarketRegistry;
use crate::domain::order::{Outcome, Side};
use crate::domain::position::PositionKey;
use crate::domain::quote::{DesiredQuote, QuoteOrder};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct QuoteGeneratorConfig {
    pub quote_spread_bps: f64,
    pub min_liquidity_usdc: f64,
    pub inventory_limit: f64,
}

pub struct QuoteGenerator {
    config: QuoteGeneratorConfig,
}

impl QuoteGenerator {
    pub fn new(config: QuoteGeneratorConfig) -> Self {
        Self { config }
    }

    /// Produce a desired quote for every active, ready market. `positions`
    /// maps (condition_id, outcome) to signed size; markets with no entry
    /// are treated as flat.
    pub fn generate(
        &self,
        registry: &MarketRegistry,
        books: &BookStore,
        positions: &HashMap<PositionKey, f64>,
        now: chrono::DateTime<chrono::Utc>,
        staleness_horizon: chrono::Duration,
    ) -> Vec<DesiredQuote> {
        registry
            .iter()
            .into_iter()
            .filter(|m| m.is_ready(books, now, staleness_horizon))
            .filter_map(|m| {
                let yes_pos = positions.get(&PositionKey { condition_id: m.condition_id.clone(), outcome: Outcome::Yes }).copied().unwrap_or(0.0);
                let no_pos = positions.get(&PositionKey { condition_id: m.condition_id.clone(), outcome: Outcome::No }).copied().unwrap_or(0.0);
                let yes_book = books.get(&m.yes_token_id)?;
                let no_book = books.get(&m.no_token_id)?;
                self.quote_market(
                    &m.market_id,
                    &m.condition_id,
                    &m.yes_token_id,
                    &m.no_token_id,
                    yes_book,
                    no_book,
                    yes_pos,
                    no_pos,
                )
            })
            .collect()
    }

    fn quote_market(
        &self,
        market_id: &str,
        condition_id: &str,
        yes_token_id: &str,
        no_token_id: &str,
        yes_book: &crate::domain::book::Book,
        no_book: &crate::domain::book::Book,
        yes_pos: f64,
        no_pos: f64,
    ) -> Option<DesiredQuote> {
        let yes_bid = yes_book.best_bid()?;
        let yes_ask = yes_book.best_ask()?;
        let no_bid = no_book.best_bid()?;
        let no_ask = no_book.best_ask()?;
        let yes_mid = yes_book.mid()?;
        let no_mid = no_book.mid()?;

        let yes_liq = yes_bid.size.min(yes_ask.size) * yes_mid;
        let no_liq = no_bid.size.min(no_ask.size) * no_mid;
        if yes_liq.min(no_liq) < self.config.min_liquidity_usdc {
            return None;
        }

        let skew = (yes_pos.abs().max(no_pos.abs()) / self.config.inventory_limit).min(1.0).max(0.0);
        let spread_scale = 1.0 + skew;
        let size_scale = (1.0 - skew).max(0.2);

        let half_spread_yes = (self.config.quote_spread_bps / 20000.0) * yes_mid * spread_scale;
        let half_spread_no = (self.config.quote_spread_bps / 20000.0) * no_mid * spread_scale;

        let px = |p: f64| -> f64 {
            let clamped = p.max(0.01).min(0.99);
            (clamped * 1000.0).round() / 1000.0
        };

        let yes_bid_px = px(yes_mid - half_spread_yes);
        let yes_ask_px = px(yes_mid + half_spread_yes);
        let no_bid_px = px(no_mid - half_spread_no);
        let no_ask_px = px(no_mid + half_spread_no);

        if yes_bid_px >= yes_ask_px || no_bid_px >= no_ask_px {
            return None;
        }

        let raw_min = yes_bid.size.min(yes_ask.size).min(no_bid.size).min(no_ask.size);
        let size = raw_min * size_scale;

        let spread_bps = (yes_ask_px - yes_bid_px) / yes_bid_px.max(0.0001) * 10_000.0;

        Some(DesiredQuote {
            market_id: market_id.to_string(),
            condition_id: condition_id.to_string(),
            spread_bps,
            yes_mid,
            no_mid,
            max_size: size,
            orders: [
                QuoteOrder { token_id: yes_token_id.to_string(), outcome: Outcome::Yes, side: Side::Buy, price: yes_bid_px, size },
                QuoteOrder { token_id: yes_token_id.to_string(), outcome: Outcome::Yes, side: Side::Sell, price: yes_ask_px, size },
                QuoteOrder { token_id: no_token_id.to_string(), outcome: Outcome::No, side: Side::Buy, price: no_bid_px, size },
                QuoteOrder { token_id: no_token_id.to_string(), outcome: Outcome::No, side: Side::Sell, price: no_ask_px, size },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Market;
    use chrono::Utc;

    fn setup() -> (MarketRegistry, BookStore, Market) {
        let registry = MarketRegistry::new(10);
        let market = Market::new("m1", "c1", "q?", "yes-tok", "no-tok");
        registry.add(market.clone());
        let mut books = BookStore::new();
        let now = Utc::now();
        books.update("yes-tok", &[(0.40, 100.0)], &[(0.50, 100.0)], now);
        books.update("no-tok", &[(0.48, 100.0)], &[(0.52, 100.0)], now);
        (registry, books, market)
    }

    #[test]
    fn generates_four_orders_when_ready() {
        let (registry, books, _m) = setup();
        let gen = QuoteGenerator::new(QuoteGeneratorConfig { quote_spread_bps: 20.0, min_liquidity_usdc: 1.0, inventory_limit: 100.0 });
        let quotes = gen.generate(&registry, &books, &HashMap::new(), Utc::now(), chrono::Duration::milliseconds(2000));
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].orders.len(), 4);
    }

    #[test]
    fn skips_markets_below_min_liquidity() {
        let (registry, books, _m) = setup();
        let gen = QuoteGenerator::new(QuoteGeneratorConfig { quote_spread_bps: 20.0, min_liquidity_usdc: 1_000_000.0, inventory_limit: 100.0 });
        let quotes = gen.generate(&registry, &books, &HashMap::new(), Utc::now(), chrono::Duration::milliseconds(2000));
        assert!(quotes.is_empty());
    }

    #[test]
    fn inventory_skew_widens_spread_and_shrinks_size() {
        let registry = MarketRegistry::new(10);
        registry.add(Market::new("m1", "c1", "q?", "yes-tok", "no-tok"));
        let mut books = BookStore::new();
        let now = Utc::now();
        books.update("yes-tok", &[(0.50, 1000.0)], &[(0.50, 1000.0)], now);
        books.update("no-tok", &[(0.50, 1000.0)], &[(0.50, 1000.0)], now);

        let gen = QuoteGenerator::new(QuoteGeneratorConfig { quote_spread_bps: 20.0, min_liquidity_usdc: 1.0, inventory_limit: 100.0 });
        let mut positions = HashMap::new();
        positions.insert(PositionKey { condition_id: "c1".into(), outcome: Outcome::Yes }, 80.0);

        // skew = 0.8, spread_scale = 1.8, half_spread = (20/20000)*0.50*1.8 = 0.0009
        let quotes = gen.generate(&registry, &books, &positions, now, chrono::Duration::milliseconds(2000));
        assert_eq!(quotes.len(), 1);
        let yes_buy = quotes[0].order_for("yes-tok", Side::Buy).unwrap();
        let yes_sell = quotes[0].order_for("yes-tok", Side::Sell).unwrap();
        assert!((yes_buy.price - 0.499).abs() < 1e-9);
        assert!((yes_sell.price - 0.501).abs() < 1e-9);
        // size_scale = max(0.2, 1-0.8) = 0.2, raw top-size min across both books = 1000
        assert!((yes_buy.size - 200.0).abs() < 1e-6);
    }

    #[test]
    fn collapsed_spread_after_rounding_skips_market() {
        let registry = MarketRegistry::new(10);
        registry.add(Market::new("m1", "c1", "q?", "yes-tok", "no-tok"));
        let mut books = BookStore::new();
        let now = Utc::now();
        books.update("yes-tok", &[(0.010, 100.0)], &[(0.011, 100.0)], now);
        books.update("no-tok", &[(0.989, 100.0)], &[(0.990, 100.0)], now);
        let gen = QuoteGenerator::new(QuoteGeneratorConfig { quote_spread_bps: 1.0, min_liquidity_usdc: 0.1, inventory_limit: 100.0 });
        let quotes = gen.generate(&registry, &books, &HashMap::new(), now, chrono::Duration::milliseconds(2000));
        assert!(quotes.is_empty());
    }
}
