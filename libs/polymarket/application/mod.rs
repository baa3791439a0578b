//! Application Layer
//!
//! Contains use cases and application services.
//! This layer depends on domain and infrastructure layers.

pub mod engine;
pub mod execution_controller;
pub mod ports;
pub mod quote_generator;
pub mod risk_gate;

pub use engine::{Engine, EngineConfig, EngineEvent, EngineState};
pub use execution_controller::{ExecutionConfig, ExecutionController};
pub use ports::{CandidateMarket, ExchangeClient, ExchangeError, PlaceOrderRequest, PlaceOrderResponse, RemoteOrderState, RemoteOrderStatus};
pub use quote_generator::{QuoteGenerator, QuoteGeneratorConfig};
pub use risk_gate::{Candidate, RiskGate, RiskGateConfig};
