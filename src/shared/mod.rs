/// Shared types and utilities used across all layers
///
/// This module contains:
/// - Protocol definitions (pairs, requests, actions)
/// - The engine error taxonomy
/// - The framed action codec
/// - Metrics and low-level collections

pub mod protocol;
pub mod error;
pub mod codec;
pub mod collections;
pub mod metrics;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use protocol::{Action, OrderStatus, Request, Side, TradingPair, DEFAULT_MAX_PRICE};
