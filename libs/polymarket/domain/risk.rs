//! Risk state domain entity: daily PnL, consecutive losses, circuit breaker.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    BreakerActive,
    DailyLossLimit,
    ConsecutiveLosses,
    TotalExposure,
    PerMarketExposure,
    OpenOrderCap,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::BreakerActive => "breaker_active",
            RejectReason::DailyLossLimit => "daily_loss_limit",
            RejectReason::ConsecutiveLosses => "consecutive_losses",
            RejectReason::TotalExposure => "total_exposure",
            RejectReason::PerMarketExposure => "per_market_exposure",
            RejectReason::OpenOrderCap => "open_order_cap",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Breaker {
    pub tripped: bool,
    pub trip_time: Option<DateTime<Utc>>,
    pub cooldown: chrono::Duration,
    pub reason: Option<String>,
}

impl Breaker {
    pub fn new(cooldown: chrono::Duration) -> Self {
        Self { tripped: false, trip_time: None, cooldown, reason: None }
    }

    pub fn trip(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.tripped = true;
        self.trip_time = Some(now);
        self.reason = Some(reason.into());
    }

    /// Self-clearing: active while tripped and elapsed-since-trip < cooldown.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match (self.tripped, self.trip_time) {
            (true, Some(trip_time)) => now - trip_time < self.cooldown,
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.tripped = false;
        self.trip_time = None;
        self.reason = None;
    }

    pub fn remaining_cooldown(&self, now: DateTime<Utc>) -> chrono::Duration {
        match self.trip_time {
            Some(trip_time) if self.is_active(now) => self.cooldown - (now - trip_time),
            _ => chrono::Duration::zero(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskState {
    pub daily_pnl: f64,
    pub last_reset_date: NaiveDate,
    pub consecutive_losses: u32,
    pub breaker: Breaker,
    pub rejection_counts: HashMap<RejectReason, u64>,
}

impl RiskState {
    pub fn new(now: DateTime<Utc>, breaker_cooldown: chrono::Duration) -> Self {
        Self {
            daily_pnl: 0.0,
            last_reset_date: now.date_naive(),
            consecutive_losses: 0,
            breaker: Breaker::new(breaker_cooldown),
            rejection_counts: HashMap::new(),
        }
    }

    /// Idempotent: resets daily PnL and the stored date whenever the wall
    /// clock calendar day has advanced past the stored date.
    pub fn maybe_reset_daily(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.last_reset_date {
            self.daily_pnl = 0.0;
            self.last_reset_date = today;
        }
    }

    pub fn record_reject(&mut self, reason: RejectReason) {
        *self.rejection_counts.entry(reason).or_insert(0) += 1;
    }

    /// Post-trade update: add to daily PnL, track consecutive losses.
    pub fn record_cycle_result(&mut self, pnl: f64, now: DateTime<Utc>) {
        self.maybe_reset_daily(now);
        self.daily_pnl += pnl;
        if pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn breaker_self_clears_after_cooldown() {
        let now = Utc::now();
        let mut breaker = Breaker::new(Duration::seconds(300));
        breaker.trip("test", now);
        assert!(breaker.is_active(now));
        assert!(!breaker.is_active(now + Duration::seconds(301)));
    }

    #[test]
    fn manual_reset_clears_unconditionally() {
        let now = Utc::now();
        let mut breaker = Breaker::new(Duration::seconds(300));
        breaker.trip("test", now);
        breaker.reset();
        assert!(!breaker.is_active(now));
    }

    #[test]
    fn consecutive_losses_reset_on_first_nonnegative() {
        let now = Utc::now();
        let mut state = RiskState::new(now, Duration::seconds(300));
        state.record_cycle_result(-1.0, now);
        state.record_cycle_result(-1.0, now);
        state.record_cycle_result(-1.0, now);
        assert_eq!(state.consecutive_losses, 3);
        state.record_cycle_result(0.5, now);
        assert_eq!(state.consecutive_losses, 0);
    }

    #[test]
    fn daily_reset_on_calendar_day_change() {
        use chrono::TimeZone;
        let day1 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 1).unwrap();
        let mut state = RiskState::new(day1, Duration::seconds(300));
        state.record_cycle_result(-40.0, day1);
        assert_eq!(state.daily_pnl, -40.0);
        state.record_cycle_result(0.5, day2);
        assert_eq!(state.daily_pnl, 0.5);
    }
}
