//! Desired-quote value types: the output of the quote generator, consumed
//! by the execution controller. Regenerated every scan tick; never
//! persisted.

use crate::domain::order::{Outcome, Side};

#[derive(Debug, Clone)]
pub struct QuoteOrder {
    pub token_id: String,
    pub outcome: Outcome,
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone)]
pub struct DesiredQuote {
    pub market_id: String,
    pub condition_id: String,
    pub spread_bps: f64,
    pub yes_mid: f64,
    pub no_mid: f64,
    pub max_size: f64,
    pub orders: [QuoteOrder; 4],
}

impl DesiredQuote {
    pub fn order_for(&self, token_id: &str, side: Side) -> Option<&QuoteOrder> {
        self.orders.iter().find(|o| o.token_id == token_id && o.side == side)
    }
}
