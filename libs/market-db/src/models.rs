//! Row types for the trading core's durable store.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A resting position, keyed by (condition_id, outcome).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPosition {
    pub condition_id: String,
    pub outcome: String,
    pub market_id: String,
    pub size: f64,
    pub avg_price: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbOrder {
    pub order_id: String,
    pub market_id: String,
    pub condition_id: String,
    pub token_id: String,
    pub side: String,
    pub outcome: String,
    pub price: f64,
    pub size: f64,
    pub filled_size: f64,
    pub status: String,
    pub created_at: String,
    pub ack_latency_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteEventAction {
    Place,
    Cancel,
}

impl QuoteEventAction {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteEventAction::Place => "PLACE",
            QuoteEventAction::Cancel => "CANCEL",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbFill {
    pub order_id: String,
    pub condition_id: String,
    pub token_id: String,
    pub side: String,
    pub price: f64,
    pub size: f64,
    pub realized_pnl: f64,
    pub filled_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRebate {
    pub order_id: String,
    pub condition_id: String,
    pub amount_usdc: f64,
    pub earned_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbArbCycle {
    pub id: String,
    pub condition_id: String,
    pub pnl: f64,
    pub closed_at: String,
}
