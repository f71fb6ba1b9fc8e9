//! Errors surfaced synchronously to engine callers.
//!
//! Nothing here ever produces an action on a book's stream: a rejected request
//! leaves the book untouched.

use crate::shared::protocol::TradingPair;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown trading pair: {0}")]
    UnknownPair(TradingPair),

    #[error("trading pair already registered: {0}")]
    DuplicatePair(TradingPair),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("order book closed: {0}")]
    BookClosed(TradingPair),

    /// Only raised under the fail-fast queue policy.
    #[error("request queue full for {0}")]
    QueueFull(TradingPair),

    /// The book's lane aborted on an internal invariant violation.
    #[error("execution lane failed for {0}")]
    LaneFailed(TradingPair),
}

impl EngineError {
    /// Metric label for rejection counters.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::UnknownPair(_) => "unknown_pair",
            EngineError::DuplicatePair(_) => "duplicate_pair",
            EngineError::InvalidRequest(_) => "invalid_request",
            EngineError::BookClosed(_) => "book_closed",
            EngineError::QueueFull(_) => "queue_full",
            EngineError::LaneFailed(_) => "lane_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
