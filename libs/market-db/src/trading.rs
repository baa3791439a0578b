//! Durable-store operations for the trading core: positions, orders, fills,
//! rebates, arb cycles, metrics and the append-only event log.

use crate::models::{DbArbCycle, DbFill, DbOrder, DbPosition, DbRebate, QuoteEventAction};
use crate::{MarketDatabase, Result};
use chrono::Utc;

impl MarketDatabase {
    pub async fn upsert_position(&self, position: DbPosition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (condition_id, outcome, market_id, size, avg_price, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(condition_id, outcome) DO UPDATE SET
                market_id = excluded.market_id,
                size = excluded.size,
                avg_price = excluded.avg_price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&position.condition_id)
        .bind(&position.outcome)
        .bind(&position.market_id)
        .bind(position.size)
        .bind(position.avg_price)
        .bind(&position.updated_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn get_all_positions(&self) -> Result<Vec<DbPosition>> {
        let positions = sqlx::query_as::<_, DbPosition>("SELECT * FROM positions")
            .fetch_all(self.pool())
            .await?;

        Ok(positions)
    }

    pub async fn insert_order(&self, order: DbOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, market_id, condition_id, token_id, side, outcome,
                price, size, filled_size, status, created_at, ack_latency_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(order_id) DO UPDATE SET
                filled_size = excluded.filled_size,
                status = excluded.status,
                ack_latency_ms = excluded.ack_latency_ms
            "#,
        )
        .bind(&order.order_id)
        .bind(&order.market_id)
        .bind(&order.condition_id)
        .bind(&order.token_id)
        .bind(&order.side)
        .bind(&order.outcome)
        .bind(order.price)
        .bind(order.size)
        .bind(order.filled_size)
        .bind(&order.status)
        .bind(&order.created_at)
        .bind(order.ack_latency_ms)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn update_order_status(&self, order_id: &str, status: &str, filled_size: f64) -> Result<()> {
        sqlx::query("UPDATE orders SET status = ?, filled_size = ? WHERE order_id = ?")
            .bind(status)
            .bind(filled_size)
            .bind(order_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn get_open_orders(&self) -> Result<Vec<DbOrder>> {
        let orders = sqlx::query_as::<_, DbOrder>(
            "SELECT * FROM orders WHERE status IN ('PENDING', 'OPEN', 'PARTIAL')",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(orders)
    }

    /// Sum of `price * size` across BUY legs of open orders, for exposure checks.
    pub async fn get_total_exposure(&self) -> Result<f64> {
        let (exposure,): (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT SUM(price * size) FROM orders
            WHERE status IN ('PENDING', 'OPEN', 'PARTIAL') AND side = 'BUY'
            "#,
        )
        .fetch_one(self.pool())
        .await?;

        Ok(exposure.unwrap_or(0.0))
    }

    pub async fn get_market_exposure(&self, condition_id: &str) -> Result<f64> {
        let (exposure,): (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT SUM(price * size) FROM orders
            WHERE status IN ('PENDING', 'OPEN', 'PARTIAL') AND side = 'BUY' AND condition_id = ?
            "#,
        )
        .bind(condition_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exposure.unwrap_or(0.0))
    }

    pub async fn record_quote_event(
        &self,
        order_id: &str,
        condition_id: &str,
        token_id: &str,
        action: QuoteEventAction,
        price: Option<f64>,
        size: Option<f64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quote_events (order_id, condition_id, token_id, action, price, size, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(condition_id)
        .bind(token_id)
        .bind(action.as_str())
        .bind(price)
        .bind(size)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn insert_fill(&self, fill: DbFill) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fills (order_id, condition_id, token_id, side, price, size, realized_pnl, filled_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fill.order_id)
        .bind(&fill.condition_id)
        .bind(&fill.token_id)
        .bind(&fill.side)
        .bind(fill.price)
        .bind(fill.size)
        .bind(fill.realized_pnl)
        .bind(&fill.filled_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn insert_rebate(&self, rebate: DbRebate) -> Result<()> {
        sqlx::query(
            "INSERT INTO rebates (order_id, condition_id, amount_usdc, earned_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&rebate.order_id)
        .bind(&rebate.condition_id)
        .bind(rebate.amount_usdc)
        .bind(&rebate.earned_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn insert_arb_cycle(&self, cycle: DbArbCycle) -> Result<()> {
        sqlx::query(
            "INSERT INTO arb_cycles (id, condition_id, pnl, closed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&cycle.id)
        .bind(&cycle.condition_id)
        .bind(cycle.pnl)
        .bind(&cycle.closed_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn set_metric(&self, name: &str, value: f64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metrics (name, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn get_metric(&self, name: &str) -> Result<Option<f64>> {
        let row: Option<(f64,)> = sqlx::query_as("SELECT value FROM metrics WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|(v,)| v))
    }

    pub async fn append_event_log(&self, kind: &str, detail: &str) -> Result<()> {
        sqlx::query("INSERT INTO event_log (kind, detail, recorded_at) VALUES (?, ?, ?)")
            .bind(kind)
            .bind(detail)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DbPosition;

    async fn db() -> MarketDatabase {
        MarketDatabase::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn position_upsert_is_idempotent_on_key() {
        let db = db().await;
        let pos = DbPosition {
            condition_id: "c1".into(),
            outcome: "YES".into(),
            market_id: "m1".into(),
            size: 10.0,
            avg_price: 0.4,
            updated_at: Utc::now().to_rfc3339(),
        };
        db.upsert_position(pos.clone()).await.unwrap();
        db.upsert_position(DbPosition { size: 12.0, ..pos }).await.unwrap();

        let all = db.get_all_positions().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].size, 12.0);
    }

    #[tokio::test]
    async fn exposure_sums_open_buy_legs_only() {
        let db = db().await;
        db.insert_order(DbOrder {
            order_id: "o1".into(),
            market_id: "m1".into(),
            condition_id: "c1".into(),
            token_id: "t1".into(),
            side: "BUY".into(),
            outcome: "YES".into(),
            price: 0.5,
            size: 10.0,
            filled_size: 0.0,
            status: "OPEN".into(),
            created_at: Utc::now().to_rfc3339(),
            ack_latency_ms: Some(5),
        })
        .await
        .unwrap();
        db.insert_order(DbOrder {
            order_id: "o2".into(),
            market_id: "m1".into(),
            condition_id: "c1".into(),
            token_id: "t1".into(),
            side: "SELL".into(),
            outcome: "YES".into(),
            price: 0.6,
            size: 10.0,
            filled_size: 0.0,
            status: "OPEN".into(),
            created_at: Utc::now().to_rfc3339(),
            ack_latency_ms: Some(5),
        })
        .await
        .unwrap();

        assert_eq!(db.get_total_exposure().await.unwrap(), 5.0);
        assert_eq!(db.get_market_exposure("c1").await.unwrap(), 5.0);
    }
}
