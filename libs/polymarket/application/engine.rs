//! Orchestrates discovery, quoting, and execution over a clock.
//!
//! Three cooperative loops share the registry/book-store/execution state:
//! discovery (find new markets, subscribe books), scan (generate quotes,
//! reconcile live orders), and backfill (REST-refresh the stalest books to
//! bound drift between WS deltas). Each loop is a plain `tokio` task; there
//! is no dedicated executor thread.

use crate::application::execution_controller::OrderRecord;
use crate::application::ports::{CandidateMarket, ExchangeClient};
use crate::application::quote_generator::QuoteGenerator;
use crate::application::ExecutionController;
use crate::domain::book::BookStore;
use crate::domain::market::{Market, MarketRegistry};
use crate::domain::position::PositionKey;
use crate::domain::risk::RejectReason;
use crate::infrastructure::exchange_client::stream::StreamState;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub discovery_interval: StdDuration,
    pub scan_interval: StdDuration,
    pub backfill_interval: StdDuration,
    pub backfill_batch: usize,
    pub staleness_horizon: chrono::Duration,
    pub max_markets: usize,
}

/// Events fed to listeners (a bounded log buffer, a TUI, a metrics sink).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Started,
    Stopped,
    Paused,
    Resumed,
    ConfigReloaded,
    MarketsDiscovered(usize),
    CycleComplete { quotes: usize },
    OrdersCancelled(usize),
}

/// A point-in-time snapshot of engine state for external inspection.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub running: bool,
    pub paused: bool,
    pub uptime: chrono::Duration,
    pub tracked_markets: usize,
    pub open_orders: usize,
    pub cumulative_pnl: f64,
    pub breaker_active: bool,
    pub breaker_reason: Option<String>,
    pub breaker_remaining_cooldown: chrono::Duration,
    pub rejection_counts: Vec<(RejectReason, u64)>,
    pub recent_orders: Vec<OrderRecord>,
    pub pnl_history: Vec<(chrono::DateTime<Utc>, f64)>,
    pub ws_connected: bool,
    pub ws_last_message_at: Option<chrono::DateTime<Utc>>,
    pub ws_reconnect_count: u64,
    pub ws_latency_ms: Option<u64>,
    pub ws_subscribed_tokens: Vec<String>,
    pub last_error: Option<String>,
}

const LOG_BUFFER_CAPACITY: usize = 500;

pub struct Engine<C: ExchangeClient + 'static> {
    config: RwLock<EngineConfig>,
    client: Arc<C>,
    registry: MarketRegistry,
    books: Arc<RwLock<BookStore>>,
    generator: RwLock<QuoteGenerator>,
    execution: Arc<ExecutionController<C>>,
    events: broadcast::Sender<EngineEvent>,
    running: AtomicBool,
    paused: AtomicBool,
    start_time: Mutex<Option<chrono::DateTime<Utc>>>,
    logs: Mutex<VecDeque<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stream_state: Arc<StreamState>,
}

impl<C: ExchangeClient + 'static> Engine<C> {
    pub fn new(
        config: EngineConfig,
        client: Arc<C>,
        registry: MarketRegistry,
        generator: QuoteGenerator,
        execution: Arc<ExecutionController<C>>,
    ) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(256);
        Arc::new(Self {
            config: RwLock::new(config),
            client,
            registry,
            books: Arc::new(RwLock::new(BookStore::new())),
            generator: RwLock::new(generator),
            execution,
            events: tx,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            start_time: Mutex::new(None),
            logs: Mutex::new(VecDeque::with_capacity(LOG_BUFFER_CAPACITY)),
            tasks: Mutex::new(Vec::new()),
            stream_state: StreamState::new(),
        })
    }

    /// Shared connection-state handle a WS feed task updates as it
    /// connects/drops/errors, surfaced back through [`Engine::get_state`].
    /// The engine itself never owns the feed task (it is spawned by the
    /// binary once the initial token set is known), so this is handed out
    /// rather than managed internally.
    pub fn ws_handles(&self) -> Arc<StreamState> {
        self.stream_state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: EngineEvent) {
        let line = format!("{event:?}");
        self.add_log(line.clone());
        let execution = self.execution.clone();
        tokio::spawn(async move {
            execution.log_event("engine", &line).await;
        });
        let _ = self.events.send(event);
    }

    fn add_log(&self, line: String) {
        let mut logs = self.logs.lock();
        if logs.len() >= LOG_BUFFER_CAPACITY {
            logs.pop_front();
        }
        logs.push_back(line);
    }

    pub fn recent_logs(&self) -> Vec<String> {
        self.logs.lock().iter().cloned().collect()
    }

    /// Shared book store, for wiring an out-of-band live book-stream task.
    pub fn book_store(&self) -> Arc<RwLock<BookStore>> {
        self.books.clone()
    }

    /// Every YES/NO token id currently tracked by the registry.
    pub fn tracked_token_ids(&self) -> Vec<String> {
        self.registry
            .iter()
            .into_iter()
            .flat_map(|m| [m.yes_token_id, m.no_token_id])
            .collect()
    }

    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.start_time.lock() = Some(Utc::now());
        if let Err(e) = self.execution.load_positions().await {
            warn!(error = %e, "failed to load positions at startup");
        }

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(self.clone().discovery_loop()));
        tasks.push(tokio::spawn(self.clone().scan_loop()));
        tasks.push(tokio::spawn(self.clone().backfill_loop()));
        drop(tasks);

        info!("engine started");
        self.emit(EngineEvent::Started);
    }

    pub async fn stop(self: &Arc<Self>) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for h in handles {
            h.abort();
        }
        let cancelled = self.execution.cancel_all().await;
        info!(cancelled, "engine stopped");
        self.emit(EngineEvent::OrdersCancelled(cancelled));
        self.emit(EngineEvent::Stopped);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.execution.pause();
        self.emit(EngineEvent::Paused);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.execution.resume();
        self.emit(EngineEvent::Resumed);
    }

    pub async fn cancel_all(&self) -> usize {
        let n = self.execution.cancel_all().await;
        self.emit(EngineEvent::OrdersCancelled(n));
        n
    }

    pub fn reload_config(&self, config: EngineConfig) {
        *self.config.write() = config;
        self.emit(EngineEvent::ConfigReloaded);
    }

    pub fn reload_quote_config(&self, config: crate::application::quote_generator::QuoteGeneratorConfig) {
        *self.generator.write() = QuoteGenerator::new(config);
        self.emit(EngineEvent::ConfigReloaded);
    }

    pub fn reload_risk_config(&self, config: crate::application::risk_gate::RiskGateConfig) {
        self.execution.risk_gate().update_config(config);
        self.emit(EngineEvent::ConfigReloaded);
    }

    /// Hot-swap every field it is safe to change without a restart: strategy
    /// knobs, risk caps, execution/engine timing. Exchange endpoints and
    /// credentials are baked into the already-constructed client and are not
    /// touched here; changing those requires restarting the process.
    pub fn reload_from_bot_config(&self, config: &crate::infrastructure::config::BotConfig) {
        *self.config.write() = config.engine_config();
        *self.generator.write() = QuoteGenerator::new(config.quote_generator_config());
        self.execution.update_config(config.execution_config());
        self.execution.risk_gate().update_config(config.risk_gate_config());
        self.emit(EngineEvent::ConfigReloaded);
    }

    pub fn reload_execution_config(&self, config: crate::application::execution_controller::ExecutionConfig) {
        self.execution.update_config(config);
        self.emit(EngineEvent::ConfigReloaded);
    }

    pub fn get_state(&self) -> EngineState {
        let now = Utc::now();
        let uptime = self.start_time.lock().map(|t| now - t).unwrap_or_else(chrono::Duration::zero);
        let (breaker_active, breaker_reason, breaker_remaining_cooldown) = self.execution.breaker_status(now);
        let stream = self.stream_state.snapshot();
        EngineState {
            running: self.running.load(Ordering::SeqCst),
            paused: self.paused.load(Ordering::SeqCst),
            uptime,
            tracked_markets: self.registry.len(),
            open_orders: self.execution.open_order_count_pub(),
            cumulative_pnl: self.execution.cumulative_pnl(),
            breaker_active,
            breaker_reason,
            breaker_remaining_cooldown,
            rejection_counts: self.execution.risk_gate().rejection_counts(),
            recent_orders: self.execution.recent_orders(),
            pnl_history: self.execution.pnl_history(),
            ws_connected: stream.connected,
            ws_last_message_at: stream.last_message_at,
            ws_reconnect_count: stream.reconnect_count,
            ws_latency_ms: stream.latency_ms,
            ws_subscribed_tokens: stream.subscribed_tokens,
            last_error: stream.last_error,
        }
    }

    /// Re-discover markets every `discovery_interval`: page through the
    /// exchange's market list, register new ones up to capacity, subscribe
    /// their books, and fetch an initial REST snapshot for each.
    async fn discovery_loop(self: Arc<Self>) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            match self.discover_markets().await {
                Ok(n) if n > 0 => self.emit(EngineEvent::MarketsDiscovered(n)),
                Ok(_) => {}
                Err(e) => error!(error = %e, "market discovery failed"),
            }
            let interval = self.config.read().discovery_interval;
            tokio::time::sleep(interval).await;
        }
    }

    async fn discover_markets(&self) -> crate::application::ports::Result<usize> {
        let mut added = 0usize;
        let mut cursor = None;
        loop {
            if self.registry.is_full() {
                break;
            }
            let (page, next) = self.client.list_markets(cursor).await?;
            for m in page {
                if !m.accepting_orders || !m.has_order_book {
                    continue;
                }
                if self.registry.contains(&m.condition_id) {
                    continue;
                }
                if self.registry.is_full() {
                    break;
                }
                self.register_market(&m).await;
                added += 1;
            }
            cursor = next;
            if cursor.is_none() {
                break;
            }
        }
        Ok(added)
    }

    async fn register_market(&self, m: &CandidateMarket) {
        let market = Market::new(m.market_id.as_str(), m.condition_id.as_str(), m.question.as_str(), m.yes_token_id.as_str(), m.no_token_id.as_str());
        if !self.registry.add(market) {
            return;
        }

        let fetches = [&m.yes_token_id, &m.no_token_id].map(|token_id| async move { (token_id, self.client.get_book(token_id).await) });
        for (token_id, result) in join_all(fetches).await {
            match result {
                Ok(payload) => {
                    self.books.write().update(token_id, &payload.bids, &payload.asks, Utc::now());
                }
                Err(e) => debug!(error = %e, token_id, "initial book snapshot failed"),
            }
        }
        debug!(condition_id = %m.condition_id, "market registered");
    }

    /// Generate and reconcile quotes every `scan_interval`.
    async fn scan_loop(self: Arc<Self>) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            let tick_start = Instant::now();
            let now = Utc::now();

            let positions = self.position_snapshot();
            let horizon = self.config.read().staleness_horizon;
            let quotes = {
                let books = self.books.read();
                self.generator.read().generate(&self.registry, &books, &positions, now, horizon)
            };

            self.execution.sync_quotes(&quotes, now).await;
            self.execution.refresh_open_orders(now).await;
            self.emit(EngineEvent::CycleComplete { quotes: quotes.len() });

            let interval = self.config.read().scan_interval;
            let elapsed = tick_start.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
    }

    fn position_snapshot(&self) -> HashMap<PositionKey, f64> {
        self.registry
            .iter()
            .into_iter()
            .flat_map(|m| {
                [
                    PositionKey { condition_id: m.condition_id.clone(), outcome: crate::domain::order::Outcome::Yes },
                    PositionKey { condition_id: m.condition_id.clone(), outcome: crate::domain::order::Outcome::No },
                ]
            })
            .filter_map(|key| self.execution.position(&key).map(|p| (key, p.size)))
            .collect()
    }

    /// REST-refresh the `backfill_batch` stalest books every
    /// `backfill_interval`, bounding drift between WS delta frames.
    async fn backfill_loop(self: Arc<Self>) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            let (horizon, batch) = {
                let cfg = self.config.read();
                (cfg.staleness_horizon, cfg.backfill_batch)
            };
            let stale: Vec<String> = {
                let books = self.books.read();
                books.stale_tokens(Utc::now(), horizon).into_iter().take(batch).collect()
            };
            let fetches = stale.into_iter().map(|token_id| async move { (token_id.clone(), self.client.get_book(&token_id).await) });
            for (token_id, result) in join_all(fetches).await {
                match result {
                    Ok(payload) => {
                        self.books.write().update(&token_id, &payload.bids, &payload.asks, Utc::now());
                    }
                    Err(e) => debug!(error = %e, token_id, "backfill refresh failed"),
                }
            }
            let interval = self.config.read().backfill_interval;
            tokio::time::sleep(interval).await;
        }
    }
}
