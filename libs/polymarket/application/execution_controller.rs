//! Reconciles desired quotes against live orders, tracks fills into
//! positions and PnL, and feeds results back into the risk gate.

use crate::application::ports::{ExchangeClient, PlaceOrderRequest, RemoteOrderState, RemoteOrderStatus};
use crate::application::risk_gate::{Candidate, RiskGate};
use crate::domain::order::{LiveOrder, OrderKey, OrderStatus, Outcome, Side};
use crate::domain::position::{Position, PositionKey};
use crate::domain::quote::DesiredQuote;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use market_db::{DbFill, DbOrder, DbPosition, DbRebate, MarketDatabase, QuoteEventAction};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub reprice_threshold_bps: f64,
    pub quote_ttl: chrono::Duration,
    pub quote_refresh_min_interval: chrono::Duration,
    /// Per-order size target and hard ceiling, both applied as a plain
    /// `min()` against the generator's liquidity-derived size (source's own
    /// simplification: these are nominally USDC targets but are compared
    /// directly against the token-denominated quote size, same as upstream).
    pub order_size_usdc: f64,
    pub max_order_size_usdc: f64,
}

/// A placement attempt, kept around for `recent_orders()` regardless of
/// whether it was accepted. Distinct from `LiveOrder`, which only tracks
/// orders currently resting on the book.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub order_id: String,
    pub market_id: String,
    pub condition_id: String,
    pub token_id: String,
    pub side: Side,
    pub outcome: Outcome,
    pub price: f64,
    pub size: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub latency_ms: Option<u64>,
}

const RECENT_ORDERS_CAPACITY: usize = 200;
const PNL_HISTORY_CAPACITY: usize = 100;

pub struct ExecutionController<C: ExchangeClient> {
    client: Arc<C>,
    store: Arc<MarketDatabase>,
    risk_gate: Arc<RiskGate>,
    config: parking_lot::RwLock<ExecutionConfig>,
    live_orders: DashMap<OrderKey, LiveOrder>,
    positions: DashMap<PositionKey, Position>,
    paused: AtomicBool,
    last_refresh: parking_lot::Mutex<Option<DateTime<Utc>>>,
    cumulative_pnl: parking_lot::Mutex<f64>,
    recent_orders: parking_lot::Mutex<VecDeque<OrderRecord>>,
    pnl_history: parking_lot::Mutex<VecDeque<(DateTime<Utc>, f64)>>,
}

const SIZE_EPSILON: f64 = 1e-6;

impl<C: ExchangeClient + 'static> ExecutionController<C> {
    pub fn new(client: Arc<C>, store: Arc<MarketDatabase>, risk_gate: Arc<RiskGate>, config: ExecutionConfig) -> Self {
        Self {
            client,
            store,
            risk_gate,
            config: parking_lot::RwLock::new(config),
            live_orders: DashMap::new(),
            positions: DashMap::new(),
            paused: AtomicBool::new(false),
            last_refresh: parking_lot::Mutex::new(None),
            cumulative_pnl: parking_lot::Mutex::new(0.0),
            recent_orders: parking_lot::Mutex::new(VecDeque::with_capacity(RECENT_ORDERS_CAPACITY)),
            pnl_history: parking_lot::Mutex::new(VecDeque::with_capacity(PNL_HISTORY_CAPACITY)),
        }
    }

    fn push_recent_order(&self, record: OrderRecord) {
        let mut recent = self.recent_orders.lock();
        if recent.len() >= RECENT_ORDERS_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(record);
    }

    /// Most recent placement attempts (accepted or rejected), newest last,
    /// capped at 200 entries.
    pub fn recent_orders(&self) -> Vec<OrderRecord> {
        self.recent_orders.lock().iter().cloned().collect()
    }

    fn push_pnl_history(&self, now: DateTime<Utc>, cumulative: f64) {
        let mut history = self.pnl_history.lock();
        if history.len() >= PNL_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back((now, cumulative));
    }

    /// Cumulative-PnL samples taken at each fill, oldest first, capped at
    /// 100 entries.
    pub fn pnl_history(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.pnl_history.lock().iter().cloned().collect()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> ExecutionConfig {
        self.config.read().clone()
    }

    pub fn update_config(&self, config: ExecutionConfig) {
        *self.config.write() = config;
    }

    /// Load positions from the durable store at start. The durable store is
    /// the only authority for positions across restarts.
    pub async fn load_positions(&self) -> market_db::Result<()> {
        for row in self.store.get_all_positions().await? {
            let outcome = if row.outcome == "YES" { Outcome::Yes } else { Outcome::No };
            let key = PositionKey { condition_id: row.condition_id.clone(), outcome };
            self.positions.insert(
                key,
                Position {
                    condition_id: row.condition_id,
                    outcome,
                    market_id: row.market_id,
                    size: row.size,
                    avg_price: row.avg_price,
                    updated_at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    pub fn position(&self, key: &PositionKey) -> Option<Position> {
        self.positions.get(key).map(|p| p.clone())
    }

    fn total_exposure(&self) -> f64 {
        self.live_orders
            .iter()
            .filter(|e| e.status.is_live() && matches!(e.side, Side::Buy))
            .map(|e| e.price * e.size)
            .sum()
    }

    fn market_exposure(&self, condition_id: &str) -> f64 {
        self.live_orders
            .iter()
            .filter(|e| e.status.is_live() && matches!(e.side, Side::Buy) && e.condition_id == condition_id)
            .map(|e| e.price * e.size)
            .sum()
    }

    fn open_order_count(&self) -> usize {
        self.live_orders.iter().filter(|e| e.status.is_live()).count()
    }

    pub fn open_order_count_pub(&self) -> usize {
        self.open_order_count()
    }

    pub fn breaker_status(&self, now: DateTime<Utc>) -> (bool, Option<String>, chrono::Duration) {
        self.risk_gate.breaker_status(now)
    }

    /// Shared risk gate, for hot-reloading its caps from the engine layer.
    pub fn risk_gate(&self) -> &Arc<RiskGate> {
        &self.risk_gate
    }

    /// Caps the generator's liquidity-derived size against the configured
    /// order-size target and hard ceiling.
    fn clamp_order_size(&self, size: f64) -> f64 {
        let config = self.config.read();
        size.min(config.order_size_usdc).min(config.max_order_size_usdc)
    }

    /// An existing live order is kept iff status is live, size/price/age all
    /// fall within tolerance of the desired order.
    fn keep(&self, live: &LiveOrder, desired_price: f64, desired_size: f64, now: DateTime<Utc>) -> bool {
        if !live.status.is_live() {
            return false;
        }
        if (live.size - desired_size).abs() > SIZE_EPSILON {
            return false;
        }
        if live.price <= 0.0 {
            return false;
        }
        let config = self.config.read();
        let drift_bps = (live.price - desired_price).abs() / live.price * 10_000.0;
        if drift_bps >= config.reprice_threshold_bps {
            return false;
        }
        live.age(now) < config.quote_ttl
    }

    /// Reconcile desired quotes against live orders. If paused, no new
    /// orders are placed, but existing state is left untouched (cancellation
    /// cleanup for stale keys still runs since that is not "new order").
    pub async fn sync_quotes(&self, quotes: &[DesiredQuote], now: DateTime<Utc>) {
        for quote in quotes {
            let candidate = Candidate {
                quote,
                current_total_exposure: self.total_exposure(),
                current_market_exposure: self.market_exposure(&quote.condition_id),
                open_order_count: self.open_order_count(),
            };
            let (allowed, reason) = self.risk_gate.check(&candidate, now);
            if !allowed {
                info!(condition_id = %quote.condition_id, reason = ?reason, "risk gate rejected quote");
                continue;
            }

            let mut desired_keys = HashSet::new();
            for order in &quote.orders {
                let size = self.clamp_order_size(order.size);
                let key = OrderKey { condition_id: quote.condition_id.clone(), token_id: order.token_id.clone(), side: order.side };
                desired_keys.insert(key.clone());

                let existing = self.live_orders.get(&key).map(|e| e.clone());
                let should_keep = existing.as_ref().map(|e| self.keep(e, order.price, size, now)).unwrap_or(false);
                if should_keep {
                    continue;
                }
                if self.paused.load(Ordering::SeqCst) {
                    // Existing order that no longer matches still gets cancelled,
                    // but no replacement is placed while paused.
                    if let Some(stale) = existing {
                        self.cancel_live_order(&key, &stale.order_id).await;
                    }
                    continue;
                }

                if let Some(stale) = existing {
                    // Cancel is issued and the slot is freed immediately; the
                    // replacement is placed without waiting for the cancel's
                    // acknowledgement, so confirmations may interleave.
                    self.spawn_cancel(key.clone(), stale.order_id.clone());
                    self.live_orders.remove(&key);
                }
                self.place_live_order(&quote.market_id, &quote.condition_id, order.token_id.clone(), order.outcome, order.side, order.price, size).await;
            }

            let stale_keys: Vec<OrderKey> = self
                .live_orders
                .iter()
                .filter(|e| e.condition_id == quote.condition_id && !desired_keys.contains(&(*e).key()))
                .map(|e| (*e).key())
                .collect();
            for key in stale_keys {
                if let Some(order) = self.live_orders.get(&key).map(|e| e.clone()) {
                    self.cancel_live_order(&key, &order.order_id).await;
                }
            }
        }

        // A market that dropped out of this tick's desired quotes entirely
        // (no longer ready, no longer liquid) never appears in the loop
        // above; its resting orders would otherwise never get cancelled.
        let quoted_conditions: HashSet<&str> = quotes.iter().map(|q| q.condition_id.as_str()).collect();
        let orphaned_keys: Vec<OrderKey> = self
            .live_orders
            .iter()
            .filter(|e| !quoted_conditions.contains(e.condition_id.as_str()))
            .map(|e| (*e).key())
            .collect();
        for key in orphaned_keys {
            if let Some(order) = self.live_orders.get(&key).map(|e| e.clone()) {
                self.cancel_live_order(&key, &order.order_id).await;
            }
        }
    }

    async fn place_live_order(&self, market_id: &str, condition_id: &str, token_id: String, outcome: Outcome, side: Side, price: f64, size: f64) {
        let key = OrderKey { condition_id: condition_id.to_string(), token_id: token_id.clone(), side };
        let send_at = std::time::Instant::now();

        match self.client.place_order(PlaceOrderRequest { token_id: token_id.clone(), side, price, size }).await {
            Ok(resp) => {
                let latency_ms = send_at.elapsed().as_millis() as u64;
                let order = LiveOrder {
                    order_id: resp.order_id.clone(),
                    market_id: market_id.to_string(),
                    condition_id: condition_id.to_string(),
                    token_id,
                    side,
                    outcome,
                    price,
                    size,
                    filled_size: 0.0,
                    status: OrderStatus::Open,
                    created_at: Utc::now(),
                    ack_latency_ms: Some(latency_ms),
                };
                let _ = self
                    .store
                    .insert_order(DbOrder {
                        order_id: order.order_id.clone(),
                        market_id: order.market_id.clone(),
                        condition_id: order.condition_id.clone(),
                        token_id: order.token_id.clone(),
                        side: side_str(side),
                        outcome: outcome_str(outcome),
                        price: order.price,
                        size: order.size,
                        filled_size: 0.0,
                        status: "OPEN".to_string(),
                        created_at: order.created_at.to_rfc3339(),
                        ack_latency_ms: Some(latency_ms as i64),
                    })
                    .await;
                let _ = self.store.record_quote_event(&order.order_id, condition_id, &order.token_id, QuoteEventAction::Place, Some(price), Some(size)).await;
                self.push_recent_order(OrderRecord {
                    order_id: order.order_id.clone(),
                    market_id: order.market_id.clone(),
                    condition_id: order.condition_id.clone(),
                    token_id: order.token_id.clone(),
                    side: order.side,
                    outcome: order.outcome,
                    price: order.price,
                    size: order.size,
                    status: OrderStatus::Open,
                    created_at: order.created_at,
                    latency_ms: order.ack_latency_ms,
                });
                self.live_orders.insert(key, order);
            }
            Err(e) => {
                warn!(error = %e, condition_id, %price, %size, "order placement rejected");
                let latency_ms = send_at.elapsed().as_millis() as u64;
                self.push_recent_order(OrderRecord {
                    order_id: String::new(),
                    market_id: market_id.to_string(),
                    condition_id: condition_id.to_string(),
                    token_id,
                    side,
                    outcome,
                    price,
                    size,
                    status: OrderStatus::Rejected,
                    created_at: Utc::now(),
                    latency_ms: Some(latency_ms),
                });
            }
        }
    }

    /// Fire a cancel request without waiting for its completion. Used when a
    /// replacement is about to be placed in the same slot; the slot is freed
    /// from `live_orders` by the caller before this returns.
    fn spawn_cancel(&self, key: OrderKey, order_id: String) {
        let client = self.client.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = client.cancel_order(&order_id).await {
                warn!(error = %e, order_id, "cancel request failed");
            }
            let _ = store.record_quote_event(&order_id, &key.condition_id, &key.token_id, QuoteEventAction::Cancel, None, None).await;
        });
    }

    async fn cancel_live_order(&self, key: &OrderKey, order_id: &str) {
        if let Err(e) = self.client.cancel_order(order_id).await {
            warn!(error = %e, order_id, "cancel request failed");
        }
        let _ = self.store.record_quote_event(order_id, &key.condition_id, &key.token_id, QuoteEventAction::Cancel, None, None).await;
        if let Some(mut entry) = self.live_orders.get_mut(key) {
            entry.transition_to(OrderStatus::Cancelled);
        }
        self.live_orders.remove(key);
    }

    /// Poll remote status for every live order; rate-limited by the caller
    /// to at most one pass per `quote_refresh_min_interval`.
    pub async fn refresh_open_orders(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_refresh.lock();
            if let Some(prev) = *last {
                if now - prev < self.config.read().quote_refresh_min_interval {
                    return;
                }
            }
            *last = Some(now);
        }

        let quote_ttl = self.config.read().quote_ttl;
        let keys: Vec<OrderKey> = self.live_orders.iter().filter(|e| e.status.is_live()).map(|e| (*e).key()).collect();
        for key in keys {
            let Some(order) = self.live_orders.get(&key).map(|e| e.clone()) else { continue };

            if order.age(now) > quote_ttl {
                self.cancel_live_order(&key, &order.order_id).await;
                continue;
            }

            match self.client.get_order(&order.order_id).await {
                Ok(status) => self.apply_remote_status(&key, &order, status, now).await,
                Err(e) => debug!(error = %e, order_id = %order.order_id, "order status poll failed"),
            }
        }
    }

    async fn apply_remote_status(&self, key: &OrderKey, order: &LiveOrder, status: RemoteOrderStatus, now: DateTime<Utc>) {
        let RemoteOrderStatus { state, size_matched } = status;

        match state {
            RemoteOrderState::Cancelled | RemoteOrderState::Expired => {
                if let Some(mut entry) = self.live_orders.get_mut(key) {
                    entry.transition_to(OrderStatus::Cancelled);
                }
                self.live_orders.remove(key);
            }
            RemoteOrderState::Matched => {
                let delta = (size_matched - order.filled_size).max(0.0);
                if delta > SIZE_EPSILON {
                    self.apply_fill(key, order, delta, now).await;
                }
                if let Some(mut entry) = self.live_orders.get_mut(key) {
                    entry.apply_fill_delta(order.size - entry.filled_size);
                }
            }
            RemoteOrderState::Open | RemoteOrderState::Pending => {
                let delta = (size_matched - order.filled_size).max(0.0);
                if delta > SIZE_EPSILON {
                    self.apply_fill(key, order, delta, now).await;
                    if let Some(mut entry) = self.live_orders.get_mut(key) {
                        entry.apply_fill_delta(delta);
                    }
                }
            }
        }
    }

    /// Apply an incremental fill of `delta` at the order's price: update the
    /// position, realized PnL, persist the fill row, and feed the PnL delta
    /// into the risk gate.
    async fn apply_fill(&self, key: &OrderKey, order: &LiveOrder, delta: f64, now: DateTime<Utc>) {
        let pos_key = PositionKey { condition_id: key.condition_id.clone(), outcome: order.outcome };
        let mut position = self
            .positions
            .entry(pos_key.clone())
            .or_insert_with(|| Position::flat(order.condition_id.clone(), order.outcome, order.market_id.clone(), now));
        position.apply_fill(order.side, order.price, delta, now);

        let _ = self
            .store
            .upsert_position(DbPosition {
                condition_id: position.condition_id.clone(),
                outcome: outcome_str(position.outcome),
                market_id: position.market_id.clone(),
                size: position.size,
                avg_price: position.avg_price,
                updated_at: position.updated_at.to_rfc3339(),
            })
            .await;

        let pnl_delta = delta * order.price * if matches!(order.side, Side::Sell) { 1.0 } else { -1.0 };
        *self.cumulative_pnl.lock() += pnl_delta;
        let cumulative = *self.cumulative_pnl.lock();
        self.push_pnl_history(now, cumulative);

        let _ = self
            .store
            .insert_fill(DbFill {
                order_id: order.order_id.clone(),
                condition_id: order.condition_id.clone(),
                token_id: order.token_id.clone(),
                side: side_str(order.side),
                price: order.price,
                size: delta,
                realized_pnl: pnl_delta,
                filled_at: now.to_rfc3339(),
            })
            .await;
        let _ = self.store.set_metric("cumulative_pnl", cumulative).await;

        self.risk_gate.record_cycle_result(pnl_delta, now);
    }

    pub async fn record_rebate(&self, order_id: &str, condition_id: &str, amount_usdc: f64, now: DateTime<Utc>) {
        let _ = self
            .store
            .insert_rebate(DbRebate { order_id: order_id.to_string(), condition_id: condition_id.to_string(), amount_usdc, earned_at: now.to_rfc3339() })
            .await;
    }

    /// Best-effort cancel of every known live order. Returns the count
    /// attempted; calling this twice in succession with no new orders placed
    /// in between returns the same count the second time (there being
    /// nothing left open).
    pub async fn cancel_all(&self) -> usize {
        let keys: Vec<(OrderKey, String)> = self.live_orders.iter().map(|e| ((*e).key(), e.order_id.clone())).collect();
        let count = keys.len();
        match self.client.cancel_all().await {
            Ok(_) => {
                for (key, _) in &keys {
                    if let Some(mut entry) = self.live_orders.get_mut(key) {
                        entry.transition_to(OrderStatus::Cancelled);
                    }
                }
                self.live_orders.clear();
            }
            Err(e) => warn!(error = %e, "cancel_all failed, falling back to per-order cancel"),
        }
        count
    }

    pub fn cumulative_pnl(&self) -> f64 {
        *self.cumulative_pnl.lock()
    }

    /// Best-effort durable record of a non-order control-plane event
    /// (started, stopped, paused, config reloaded, ...), distinct from
    /// `tracing` output and from the order/quote event log.
    pub async fn log_event(&self, kind: &str, detail: &str) {
        let _ = self.store.append_event_log(kind, detail).await;
    }
}

fn side_str(side: Side) -> String {
    match side {
        Side::Buy => "BUY".to_string(),
        Side::Sell => "SELL".to_string(),
    }
}

fn outcome_str(outcome: Outcome) -> String {
    match outcome {
        Outcome::Yes => "YES".to_string(),
        Outcome::No => "NO".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BookPayload, CandidateMarket, PlaceOrderResponse, RemoteOrderStatus};
    use crate::domain::order::{Outcome, Side};
    use crate::domain::quote::QuoteOrder;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU64;

    struct FakeClient {
        next_id: AtomicU64,
        placed: parking_lot::Mutex<Vec<PlaceOrderRequest>>,
        cancelled: parking_lot::Mutex<Vec<String>>,
        remote_status: parking_lot::Mutex<RemoteOrderStatus>,
    }

    impl FakeClient {
        fn new() -> Self {
            Self {
                next_id: AtomicU64::new(1),
                placed: parking_lot::Mutex::new(Vec::new()),
                cancelled: parking_lot::Mutex::new(Vec::new()),
                remote_status: parking_lot::Mutex::new(RemoteOrderStatus { state: RemoteOrderState::Open, size_matched: 0.0 }),
            }
        }
    }

    #[async_trait]
    impl ExchangeClient for FakeClient {
        async fn list_markets(&self, _cursor: Option<String>) -> crate::application::ports::Result<(Vec<CandidateMarket>, Option<String>)> {
            Ok((Vec::new(), None))
        }
        async fn get_book(&self, _token_id: &str) -> crate::application::ports::Result<BookPayload> {
            Ok(BookPayload { bids: vec![], asks: vec![] })
        }
        async fn place_order(&self, req: PlaceOrderRequest) -> crate::application::ports::Result<PlaceOrderResponse> {
            self.placed.lock().push(req);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(PlaceOrderResponse { order_id: format!("o{id}") })
        }
        async fn get_order(&self, _order_id: &str) -> crate::application::ports::Result<RemoteOrderStatus> {
            Ok(self.remote_status.lock().clone())
        }
        async fn cancel_order(&self, order_id: &str) -> crate::application::ports::Result<()> {
            self.cancelled.lock().push(order_id.to_string());
            Ok(())
        }
        async fn cancel_all(&self) -> crate::application::ports::Result<usize> {
            Ok(self.cancelled.lock().len())
        }
        fn last_latency_ms(&self) -> Option<u64> {
            None
        }
    }

    fn quote() -> DesiredQuote {
        DesiredQuote {
            market_id: "m1".into(),
            condition_id: "c1".into(),
            spread_bps: 20.0,
            yes_mid: 0.5,
            no_mid: 0.5,
            max_size: 10.0,
            orders: [
                QuoteOrder { token_id: "y".into(), outcome: Outcome::Yes, side: Side::Buy, price: 0.40, size: 10.0 },
                QuoteOrder { token_id: "y".into(), outcome: Outcome::Yes, side: Side::Sell, price: 0.50, size: 10.0 },
                QuoteOrder { token_id: "n".into(), outcome: Outcome::No, side: Side::Buy, price: 0.48, size: 10.0 },
                QuoteOrder { token_id: "n".into(), outcome: Outcome::No, side: Side::Sell, price: 0.52, size: 10.0 },
            ],
        }
    }

    async fn controller() -> (ExecutionController<FakeClient>, Arc<FakeClient>) {
        let client = Arc::new(FakeClient::new());
        let store = Arc::new(MarketDatabase::new(":memory:").await.unwrap());
        let risk_gate = RiskGate::new(
            crate::application::risk_gate::RiskGateConfig {
                max_total_exposure_usdc: 10_000.0,
                max_per_market_exposure_usdc: 10_000.0,
                max_daily_loss_usdc: 10_000.0,
                max_consecutive_losses: 100,
                circuit_breaker_cooldown_s: 300,
                max_open_orders: 1000,
                sell_reduces_exposure: false,
            },
            Utc::now(),
        );
        let config = ExecutionConfig {
            reprice_threshold_bps: 5.0,
            quote_ttl: chrono::Duration::seconds(15),
            quote_refresh_min_interval: chrono::Duration::milliseconds(2000),
            order_size_usdc: 1_000_000.0,
            max_order_size_usdc: 1_000_000.0,
        };
        (ExecutionController::new(client.clone(), store, risk_gate, config), client)
    }

    #[tokio::test]
    async fn sync_quotes_places_four_fresh_orders() {
        let (ctrl, client) = controller().await;
        let now = Utc::now();
        ctrl.sync_quotes(&[quote()], now).await;
        assert_eq!(client.placed.lock().len(), 4);
        assert_eq!(ctrl.open_order_count(), 4);
    }

    #[tokio::test]
    async fn keep_predicate_avoids_replace_within_threshold_scenario_s1() {
        let (ctrl, client) = controller().await;
        let now = Utc::now() - chrono::Duration::seconds(3);
        // seed one existing live order matching the YES-buy slot at 0.450
        ctrl.live_orders.insert(
            OrderKey { condition_id: "c1".into(), token_id: "y".into(), side: Side::Buy },
            LiveOrder {
                order_id: "existing".into(),
                market_id: "m1".into(),
                condition_id: "c1".into(),
                token_id: "y".into(),
                side: Side::Buy,
                outcome: Outcome::Yes,
                price: 0.450,
                size: 10.0,
                filled_size: 0.0,
                status: OrderStatus::Open,
                created_at: now,
                ack_latency_ms: Some(5),
            },
        );

        let mut q = quote();
        q.orders[0].price = 0.4499;
        // drift = |0.450-0.4499| / 0.450 * 10000 ~= 2.2bps, under the 5bps threshold -> keep
        ctrl.sync_quotes(&[q], Utc::now()).await;
        assert_eq!(client.cancelled.lock().len(), 0);
    }

    #[tokio::test]
    async fn reconciliation_keys_equal_desired_keys_invariant() {
        let (ctrl, _client) = controller().await;
        let now = Utc::now();
        let q = quote();
        ctrl.sync_quotes(&[q.clone()], now).await;
        let live_keys: HashSet<OrderKey> = ctrl.live_orders.iter().map(|e| (*e).key()).collect();
        let desired_keys: HashSet<OrderKey> = q
            .orders
            .iter()
            .map(|o| OrderKey { condition_id: q.condition_id.clone(), token_id: o.token_id.clone(), side: o.side })
            .collect();
        assert_eq!(live_keys, desired_keys);
    }

    #[tokio::test]
    async fn market_dropped_from_desired_quotes_gets_its_orders_cancelled() {
        let (ctrl, client) = controller().await;
        ctrl.sync_quotes(&[quote()], Utc::now()).await;
        assert_eq!(ctrl.open_order_count(), 4);

        ctrl.sync_quotes(&[], Utc::now()).await;
        assert_eq!(ctrl.open_order_count(), 0);
        assert_eq!(client.cancelled.lock().len(), 4);
    }

    #[tokio::test]
    async fn order_size_is_clamped_to_the_configured_ceiling() {
        let (ctrl, client) = controller().await;
        ctrl.update_config(ExecutionConfig {
            reprice_threshold_bps: 5.0,
            quote_ttl: chrono::Duration::seconds(15),
            quote_refresh_min_interval: chrono::Duration::milliseconds(2000),
            order_size_usdc: 1_000_000.0,
            max_order_size_usdc: 4.0,
        });
        ctrl.sync_quotes(&[quote()], Utc::now()).await;
        let placed = client.placed.lock();
        assert_eq!(placed.len(), 4);
        assert!(placed.iter().all(|r| (r.size - 4.0).abs() < 1e-9));
    }

    #[tokio::test]
    async fn recent_orders_records_every_placement_attempt() {
        let (ctrl, _client) = controller().await;
        ctrl.sync_quotes(&[quote()], Utc::now()).await;
        let recent = ctrl.recent_orders();
        assert_eq!(recent.len(), 4);
        assert!(recent.iter().all(|r| r.status == OrderStatus::Open));
    }

    #[tokio::test]
    async fn pnl_history_grows_on_fill() {
        let (ctrl, client) = controller().await;
        ctrl.sync_quotes(&[quote()], Utc::now()).await;
        assert!(ctrl.pnl_history().is_empty());

        client.remote_status.lock().size_matched = 10.0;
        client.remote_status.lock().state = RemoteOrderState::Matched;
        ctrl.refresh_open_orders(Utc::now() + chrono::Duration::seconds(3)).await;

        assert!(!ctrl.pnl_history().is_empty());
    }

    #[tokio::test]
    async fn cancel_all_twice_returns_same_count_second_time() {
        let (ctrl, _client) = controller().await;
        ctrl.sync_quotes(&[quote()], Utc::now()).await;
        let first = ctrl.cancel_all().await;
        assert_eq!(first, 4);
        let second = ctrl.cancel_all().await;
        assert_eq!(second, 0);
    }
}
