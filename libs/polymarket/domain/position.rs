//! Position domain entity: net size + average entry price per outcome.

use crate::domain::order::{Outcome, Side};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub condition_id: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct Position {
    pub condition_id: String,
    pub outcome: Outcome,
    pub market_id: String,
    pub size: f64,
    pub avg_price: f64,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn flat(condition_id: impl Into<String>, outcome: Outcome, market_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            condition_id: condition_id.into(),
            outcome,
            market_id: market_id.into(),
            size: 0.0,
            avg_price: 0.0,
            updated_at: now,
        }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey { condition_id: self.condition_id.clone(), outcome: self.outcome }
    }

    /// Apply a fill of `delta` (always positive) at `price` on `side`.
    /// A BUY adds size and blends the average price by a size-weighted mean;
    /// a SELL subtracts. The average price resets to zero exactly when size
    /// returns to zero.
    pub fn apply_fill(&mut self, side: Side, price: f64, delta: f64, now: DateTime<Utc>) {
        let signed_delta = match side {
            Side::Buy => delta,
            Side::Sell => -delta,
        };
        let new_size = self.size + signed_delta;

        if matches!(side, Side::Buy) && new_size.abs() > 1e-9 {
            self.avg_price = (self.size * self.avg_price + delta * price) / new_size;
        }

        self.size = new_size;
        if self.size.abs() <= 1e-9 {
            self.size = 0.0;
            self.avg_price = 0.0;
        }
        self.updated_at = now;
    }
}
