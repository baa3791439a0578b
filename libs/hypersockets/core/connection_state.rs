//! Lock-free connection state and metrics tracking.
//!
//! Both types are single `Atomic*` cells so reads never block a writer and
//! writers never block each other - the client's hot path (message pump,
//! heartbeat, reconnect loop) touches these on every frame.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of a single WebSocket connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    ShuttingDown,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
            ConnectionState::ShuttingDown => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::ShuttingDown,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Atomic cell holding a [`ConnectionState`].
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(initial: ConnectionState) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    pub fn is_shutting_down(&self) -> bool {
        self.get() == ConnectionState::ShuttingDown
    }
}

/// Lock-free counters for messages sent/received and reconnect attempts.
#[derive(Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips() {
        let s = AtomicConnectionState::new(ConnectionState::Disconnected);
        assert!(!s.is_connected());
        s.set(ConnectionState::Connected);
        assert!(s.is_connected());
        s.set(ConnectionState::ShuttingDown);
        assert!(s.is_shutting_down());
    }

    #[test]
    fn metrics_count() {
        let m = AtomicMetrics::new();
        m.increment_sent();
        m.increment_sent();
        m.increment_received();
        m.increment_reconnects();
        assert_eq!(m.messages_sent(), 2);
        assert_eq!(m.messages_received(), 1);
        assert_eq!(m.reconnect_count(), 1);
    }
}
