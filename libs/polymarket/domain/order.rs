//! Live order domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected)
    }

    pub fn is_live(self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Partial)
    }
}

/// Identifies a live order for reconciliation purposes. Two orders on the
/// same condition/token/side are considered the same "slot" - only one may
/// be resting at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub condition_id: String,
    pub token_id: String,
    pub side: Side,
}

#[derive(Debug, Clone)]
pub struct LiveOrder {
    pub order_id: String,
    pub market_id: String,
    pub condition_id: String,
    pub token_id: String,
    pub side: Side,
    pub outcome: Outcome,
    pub price: f64,
    pub size: f64,
    pub filled_size: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub ack_latency_ms: Option<u64>,
}

impl LiveOrder {
    pub fn key(&self) -> OrderKey {
        OrderKey { condition_id: self.condition_id.clone(), token_id: self.token_id.clone(), side: self.side }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Terminal statuses are sticky: once set, no later transition applies.
    pub fn transition_to(&mut self, status: OrderStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
    }

    /// Apply an incremental fill. `delta` must be >= 0; the resulting
    /// filled_size is clamped to `size` to preserve the filled <= size
    /// invariant.
    pub fn apply_fill_delta(&mut self, delta: f64) {
        self.filled_size = (self.filled_size + delta).min(self.size);
        if self.status.is_terminal() {
            return;
        }
        self.status = if self.filled_size >= self.size - 1e-6 {
            OrderStatus::Filled
        } else if self.filled_size > 0.0 {
            OrderStatus::Partial
        } else {
            self.status
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> LiveOrder {
        LiveOrder {
            order_id: "o1".into(),
            market_id: "m1".into(),
            condition_id: "c1".into(),
            token_id: "t1".into(),
            side: Side::Buy,
            outcome: Outcome::Yes,
            price: 0.5,
            size: 10.0,
            filled_size: 0.0,
            status: OrderStatus::Open,
            created_at: Utc::now(),
            ack_latency_ms: Some(5),
        }
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut o = order();
        o.transition_to(OrderStatus::Cancelled);
        assert_eq!(o.status, OrderStatus::Cancelled);
        o.transition_to(OrderStatus::Open);
        assert_eq!(o.status, OrderStatus::Cancelled);
    }

    #[test]
    fn fill_delta_never_exceeds_size() {
        let mut o = order();
        o.apply_fill_delta(4.0);
        assert_eq!(o.status, OrderStatus::Partial);
        o.apply_fill_delta(100.0);
        assert_eq!(o.filled_size, 10.0);
        assert_eq!(o.status, OrderStatus::Filled);
    }

    #[test]
    fn terminal_order_ignores_further_fills_for_status() {
        let mut o = order();
        o.transition_to(OrderStatus::Cancelled);
        o.apply_fill_delta(5.0);
        assert_eq!(o.status, OrderStatus::Cancelled);
    }
}
