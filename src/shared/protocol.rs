/// Request and action envelopes exchanged with the engine.
///
/// Requests flow in from whatever transport sits in front of the engine; actions
/// flow out on the per-book streams and the merged audit stream. The JSON shape of
/// an action is tagged by `kind`:
///
/// ```text
/// { "kind":"FILLED", "pair":{"base":"ETH","quote":"EOS"},
///   "orderId":7, "fromOrderId":6, "amount":5, "price":50 }
/// ```

use crate::shared::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default exclusive upper bound for prices (size of the dense tick ladder).
pub const DEFAULT_MAX_PRICE: u32 = 10_000_000;

/// Trading pair used as the routing key. Symbols are shared `Arc<str>` so actions
/// can carry the pair without reallocating per event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: Arc<str>,
    pub quote: Arc<str>,
}

impl TradingPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: Arc::from(base),
            quote: Arc::from(quote),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Parses `BASE/QUOTE`.
impl FromStr for TradingPair {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
                Ok(TradingPair::new(base.trim(), quote.trim()))
            }
            _ => Err(EngineError::InvalidRequest(format!(
                "trading pair must look like BASE/QUOTE, got {:?}",
                s
            ))),
        }
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Order lifecycle state.
///
/// NEW → OPEN | PARTIAL_FILLED | FILLED | CANCELLED, strictly forward.
/// PARTIAL_FILLED may be re-entered while the order rests; FILLED and CANCELLED
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Open,
    PartialFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    fn rank(self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Open => 1,
            OrderStatus::PartialFilled => 2,
            OrderStatus::Filled | OrderStatus::Cancelled => 3,
        }
    }

    /// Whether `self → next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self == OrderStatus::PartialFilled && next == OrderStatus::PartialFilled {
            return true;
        }
        next.rank() > self.rank()
    }
}

/// Requests accepted by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Submit {
        pair: TradingPair,
        id: u64,
        side: Side,
        price: u32,
        amount: u32,
    },
    Cancel {
        pair: TradingPair,
        id: u64,
    },
    Shutdown {
        pair: TradingPair,
    },
    ShutdownAll,
}

impl Request {
    /// Metric label for the request kind.
    pub fn label(&self) -> &'static str {
        match self {
            Request::Submit { .. } => "submit",
            Request::Cancel { .. } => "cancel",
            Request::Shutdown { .. } => "shutdown",
            Request::ShutdownAll => "shutdown_all",
        }
    }
}

/// Observable events emitted by a book, in the order it processed requests.
///
/// Fill events always carry the maker's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Buy {
        pair: TradingPair,
        order_id: u64,
        amount: u32,
        price: u32,
    },
    #[serde(rename_all = "camelCase")]
    Sell {
        pair: TradingPair,
        order_id: u64,
        amount: u32,
        price: u32,
    },
    #[serde(rename_all = "camelCase")]
    PartialFilled {
        pair: TradingPair,
        order_id: u64,
        from_order_id: u64,
        amount: u32,
        price: u32,
    },
    #[serde(rename_all = "camelCase")]
    Filled {
        pair: TradingPair,
        order_id: u64,
        from_order_id: u64,
        amount: u32,
        price: u32,
    },
    #[serde(rename_all = "camelCase")]
    Cancel { pair: TradingPair, order_id: u64 },
    #[serde(rename_all = "camelCase")]
    Cancelled { pair: TradingPair, order_id: u64 },
    Done { pair: TradingPair },
}

impl Action {
    /// Acceptance event for an incoming order, as received.
    pub fn accepted(pair: &TradingPair, side: Side, order_id: u64, amount: u32, price: u32) -> Self {
        let pair = pair.clone();
        match side {
            Side::Buy => Action::Buy { pair, order_id, amount, price },
            Side::Sell => Action::Sell { pair, order_id, amount, price },
        }
    }

    pub fn pair(&self) -> &TradingPair {
        match self {
            Action::Buy { pair, .. }
            | Action::Sell { pair, .. }
            | Action::PartialFilled { pair, .. }
            | Action::Filled { pair, .. }
            | Action::Cancel { pair, .. }
            | Action::Cancelled { pair, .. }
            | Action::Done { pair } => pair,
        }
    }

    /// The (taker) order the action is about. `None` for DONE.
    pub fn order_id(&self) -> Option<u64> {
        match self {
            Action::Buy { order_id, .. }
            | Action::Sell { order_id, .. }
            | Action::PartialFilled { order_id, .. }
            | Action::Filled { order_id, .. }
            | Action::Cancel { order_id, .. }
            | Action::Cancelled { order_id, .. } => Some(*order_id),
            Action::Done { .. } => None,
        }
    }

    /// `(maker_id, amount, price)` for fill actions.
    pub fn fill(&self) -> Option<(u64, u32, u32)> {
        match self {
            Action::PartialFilled { from_order_id, amount, price, .. }
            | Action::Filled { from_order_id, amount, price, .. } => Some((*from_order_id, *amount, *price)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self, Action::Done { .. })
    }

    /// Wire name of the action kind, also used as the metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Buy { .. } => "BUY",
            Action::Sell { .. } => "SELL",
            Action::PartialFilled { .. } => "PARTIAL_FILLED",
            Action::Filled { .. } => "FILLED",
            Action::Cancel { .. } => "CANCEL",
            Action::Cancelled { .. } => "CANCELLED",
            Action::Done { .. } => "DONE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy { order_id, amount, price, .. } | Action::Sell { order_id, amount, price, .. } => {
                write!(f, "{}({}, {}, {})", self.label(), order_id, price, amount)
            }
            Action::PartialFilled { order_id, from_order_id, amount, price, .. }
            | Action::Filled { order_id, from_order_id, amount, price, .. } => write!(
                f,
                "{}(order={}, from={}, amount={}, price={})",
                self.label(),
                order_id,
                from_order_id,
                amount,
                price
            ),
            Action::Cancel { order_id, .. } | Action::Cancelled { order_id, .. } => {
                write!(f, "{}({})", self.label(), order_id)
            }
            Action::Done { pair } => write!(f, "DONE({})", pair),
        }
    }
}
