//! Pre-trade risk gate and post-trade bookkeeping.

use crate::domain::quote::DesiredQuote;
use crate::domain::risk::{RejectReason, RiskState};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RiskGateConfig {
    pub max_total_exposure_usdc: f64,
    pub max_per_market_exposure_usdc: f64,
    pub max_daily_loss_usdc: f64,
    pub max_consecutive_losses: u32,
    pub circuit_breaker_cooldown_s: i64,
    pub max_open_orders: usize,
    /// When true, SELL-leg notional nets against BUY-leg notional instead of
    /// being ignored (source's original simplification: both legs count as
    /// pure exposure, floored at zero rather than allowed to go negative).
    pub sell_reduces_exposure: bool,
}

/// A candidate action awaiting risk clearance: either a fresh quote (whose
/// BUY legs consume exposure budget) or a bare exposure probe.
pub struct Candidate<'a> {
    pub quote: &'a DesiredQuote,
    pub current_total_exposure: f64,
    pub current_market_exposure: f64,
    pub open_order_count: usize,
}

impl<'a> Candidate<'a> {
    /// Notional consumed by this candidate. By default, sum of price*size
    /// over BUY legs only (SELL legs release, not consume, budget). When
    /// `sell_reduces_exposure` is set, SELL-leg notional is netted against
    /// BUY-leg notional, floored at zero.
    pub fn notional(&self, sell_reduces_exposure: bool) -> f64 {
        use crate::domain::order::Side;
        let buy: f64 = self.quote.orders.iter().filter(|o| matches!(o.side, Side::Buy)).map(|o| o.price * o.size).sum();
        if !sell_reduces_exposure {
            return buy;
        }
        let sell: f64 = self.quote.orders.iter().filter(|o| matches!(o.side, Side::Sell)).map(|o| o.price * o.size).sum();
        (buy - sell).max(0.0)
    }
}

/// Thread-shared risk state plus the ordered pre-trade checks over it.
pub struct RiskGate {
    config: RwLock<RiskGateConfig>,
    state: Mutex<RiskState>,
}

impl RiskGate {
    pub fn new(config: RiskGateConfig, now: DateTime<Utc>) -> Arc<Self> {
        let cooldown = chrono::Duration::seconds(config.circuit_breaker_cooldown_s);
        Arc::new(Self { config: RwLock::new(config), state: Mutex::new(RiskState::new(now, cooldown)) })
    }

    /// Hot-swap the exposure/loss caps. The breaker cooldown already in
    /// flight keeps running against the old duration; only the next trip
    /// picks up a changed `circuit_breaker_cooldown_s`.
    pub fn update_config(&self, config: RiskGateConfig) {
        *self.config.write() = config;
    }

    /// Ordered pre-trade check: breaker -> daily loss -> consecutive losses
    /// -> total exposure -> per-market exposure -> open-order cap. Each
    /// rejection short-circuits and increments its reason counter.
    pub fn check(&self, candidate: &Candidate<'_>, now: DateTime<Utc>) -> (bool, Option<RejectReason>) {
        let config = self.config.read();
        let mut state = self.state.lock();
        state.maybe_reset_daily(now);

        if state.breaker.is_active(now) {
            state.record_reject(RejectReason::BreakerActive);
            return (false, Some(RejectReason::BreakerActive));
        }

        if state.daily_pnl <= -config.max_daily_loss_usdc {
            state.breaker.trip("daily loss limit exceeded", now);
            state.record_reject(RejectReason::DailyLossLimit);
            warn!(daily_pnl = state.daily_pnl, "circuit breaker tripped: daily loss limit");
            return (false, Some(RejectReason::DailyLossLimit));
        }

        if state.consecutive_losses >= config.max_consecutive_losses {
            let reason = format!("{} consecutive losses", state.consecutive_losses);
            state.breaker.trip(reason, now);
            state.record_reject(RejectReason::ConsecutiveLosses);
            warn!(consecutive_losses = state.consecutive_losses, "circuit breaker tripped");
            return (false, Some(RejectReason::ConsecutiveLosses));
        }

        let notional = candidate.notional(config.sell_reduces_exposure);

        if candidate.current_total_exposure + notional > config.max_total_exposure_usdc {
            state.record_reject(RejectReason::TotalExposure);
            return (false, Some(RejectReason::TotalExposure));
        }

        if candidate.current_market_exposure + notional > config.max_per_market_exposure_usdc {
            state.record_reject(RejectReason::PerMarketExposure);
            return (false, Some(RejectReason::PerMarketExposure));
        }

        if candidate.open_order_count >= config.max_open_orders {
            state.record_reject(RejectReason::OpenOrderCap);
            return (false, Some(RejectReason::OpenOrderCap));
        }

        (true, None)
    }

    pub fn record_cycle_result(&self, pnl: f64, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.record_cycle_result(pnl, now);
        info!(pnl, daily_pnl = state.daily_pnl, consecutive_losses = state.consecutive_losses, "cycle result recorded");
    }

    pub fn manual_reset_breaker(&self) {
        self.state.lock().breaker.reset();
    }

    pub fn rejection_counts(&self) -> Vec<(RejectReason, u64)> {
        self.state.lock().rejection_counts.iter().map(|(k, v)| (*k, *v)).collect()
    }

    pub fn breaker_status(&self, now: DateTime<Utc>) -> (bool, Option<String>, chrono::Duration) {
        let state = self.state.lock();
        (state.breaker.is_active(now), state.breaker.reason.clone(), state.breaker.remaining_cooldown(now))
    }

    pub fn daily_pnl(&self) -> f64 {
        self.state.lock().daily_pnl
    }
}
