/// Matching Engine - dispatcher over per-pair books
///
/// Owns the registry of books keyed by trading pair and routes each request to
/// that book's lane. Requests for one pair are applied in the order this
/// dispatcher accepted them; different pairs run in parallel with no ordering
/// between them.
///
/// ## Streams
/// Each lane writes to its own bounded action channel. A forwarder task per
/// book copies those actions onto:
/// - the **audit stream**, a bounded mpsc returned by [`MatchingEngine::new`]
///   that never drops (the forwarder waits for space)
/// - the **fan-out**, a `tokio::sync::broadcast` ring handed out by
///   [`MatchingEngine::subscribe`] where slow readers lose the oldest actions
///
/// ## Usage
/// ```rust,no_run
/// use matching_engine::application::services::{EngineConfig, MatchingEngine};
/// use matching_engine::shared::protocol::{Side, TradingPair};
///
/// # async fn demo() -> matching_engine::shared::Result<()> {
/// let (engine, mut audit) = MatchingEngine::new(EngineConfig::default());
/// let pair = TradingPair::new("ETH", "EOS");
/// engine.create_book(pair.clone())?;
/// engine.submit(&pair, 1, Side::Sell, 50, 50).await?;
/// engine.submit(&pair, 2, Side::Buy, 50, 50).await?;
/// engine.shutdown_all().await?;
/// while let Some(action) = audit.recv().await {
///     println!("{}", action);
/// }
/// # Ok(())
/// # }
/// ```

use crate::application::services::book_lane::{BookCommand, BookLane, LaneState, LaneStatus};
use crate::domain::order::Order;
use crate::domain::orderbook::{BTreeLadder, BookSnapshot, OrderBook, PriceLadder, TickLadder};
use crate::domain::validation::OrderValidator;
use crate::shared::error::{EngineError, Result};
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{Action, Request, Side, TradingPair, DEFAULT_MAX_PRICE};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock as Gate};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Price point storage used for new books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookLayout {
    /// Paged tick array with occupancy bitmaps
    #[default]
    Dense,
    /// Ordered map per side
    Sparse,
}

impl FromStr for BookLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dense" => Ok(BookLayout::Dense),
            "sparse" => Ok(BookLayout::Sparse),
            other => Err(format!("unknown book layout '{}', expected dense or sparse", other)),
        }
    }
}

impl fmt::Display for BookLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookLayout::Dense => "dense",
            BookLayout::Sparse => "sparse",
        })
    }
}

/// What a submit does when the book's request queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePolicy {
    /// Wait for queue space
    #[default]
    Block,
    /// Fail with `QueueFull`
    Reject,
}

impl FromStr for QueuePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(QueuePolicy::Block),
            "reject" => Ok(QueuePolicy::Reject),
            other => Err(format!("unknown queue policy '{}', expected block or reject", other)),
        }
    }
}

impl fmt::Display for QueuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueuePolicy::Block => "block",
            QueuePolicy::Reject => "reject",
        })
    }
}

/// Configuration for the matching engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Exclusive price bound, also the dense ladder size
    pub max_price: u32,

    /// Bounded request queue per book
    pub book_queue_depth: usize,

    /// Bounded outbound action channel per book
    pub action_queue_depth: usize,

    /// Bounded merged audit stream
    pub event_queue_depth: usize,

    /// Broadcast ring size for lossy subscribers
    pub fanout_capacity: usize,

    pub layout: BookLayout,

    pub queue_policy: QueuePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_price: DEFAULT_MAX_PRICE,
            book_queue_depth: 1_024,
            action_queue_depth: 1_024,
            event_queue_depth: 8_192,
            fanout_capacity: 4_096,
            layout: BookLayout::Dense,
            queue_policy: QueuePolicy::Block,
        }
    }
}

/// Dispatcher-side handle to a running book.
struct BookHandle {
    commands: mpsc::Sender<BookCommand>,
    status: Arc<LaneStatus>,
    /// Readers hold it from the status check until their command is queued;
    /// shutdown holds it exclusively while closing, so nothing accepted can
    /// land behind `Shutdown`.
    gate: Gate<()>,
    lane: Mutex<Option<JoinHandle<()>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl BookHandle {
    /// Error for a lane that no longer takes requests.
    fn unavailable(&self, pair: &TradingPair) -> EngineError {
        match self.status.get() {
            LaneState::Failed => EngineError::LaneFailed(pair.clone()),
            _ => EngineError::BookClosed(pair.clone()),
        }
    }
}

pub struct MatchingEngine {
    config: EngineConfig,
    validator: OrderValidator,
    books: RwLock<HashMap<TradingPair, Arc<BookHandle>>>,
    audit: mpsc::Sender<Action>,
    fanout: broadcast::Sender<Action>,
}

impl MatchingEngine {
    /// Creates an engine with no books, returning it with the audit stream.
    pub fn new(config: EngineConfig) -> (Self, mpsc::Receiver<Action>) {
        let (audit, audit_rx) = mpsc::channel(config.event_queue_depth.max(1));
        let (fanout, _) = broadcast::channel(config.fanout_capacity.max(1));
        let engine = Self {
            validator: OrderValidator::new(config.max_price),
            config,
            books: RwLock::new(HashMap::new()),
            audit,
            fanout,
        };
        (engine, audit_rx)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a book and spawns its lane.
    ///
    /// A pair whose previous book was shut down (or failed) can be created
    /// again; an open book yields `DuplicatePair`.
    ///
    /// # Panics
    /// Outside a tokio runtime.
    pub fn create_book(&self, pair: TradingPair) -> Result<()> {
        match self.config.layout {
            BookLayout::Dense => self.create_book_with_ladder(pair, TickLadder::new(self.config.max_price)),
            BookLayout::Sparse => self.create_book_with_ladder(pair, BTreeLadder::new(self.config.max_price)),
        }
    }

    /// Registers a book over a caller-supplied ladder, ignoring `layout`.
    pub fn create_book_with_ladder<L: PriceLadder>(&self, pair: TradingPair, ladder: L) -> Result<()> {
        self.validator.validate_pair(&pair)?;

        let mut books = self.books.write();
        if let Some(existing) = books.get(&pair) {
            if matches!(existing.status.get(), LaneState::Running | LaneState::Closing) {
                return Err(EngineError::DuplicatePair(pair));
            }
        }

        let (command_tx, command_rx) = mpsc::channel(self.config.book_queue_depth.max(1));
        let (action_tx, action_rx) = mpsc::channel(self.config.action_queue_depth.max(1));
        let status = Arc::new(LaneStatus::new());

        let lane = tokio::spawn(
            BookLane::new(
                OrderBook::with_ladder(pair.clone(), ladder),
                command_rx,
                action_tx,
                Arc::clone(&status),
            )
            .run(),
        );
        let forwarder = tokio::spawn(forward(
            pair.clone(),
            action_rx,
            self.audit.clone(),
            self.fanout.clone(),
        ));

        info!(pair = %pair, "order book created");
        books.insert(
            pair,
            Arc::new(BookHandle {
                commands: command_tx,
                status,
                gate: Gate::new(()),
                lane: Mutex::new(Some(lane)),
                forwarder: Mutex::new(Some(forwarder)),
            }),
        );
        Ok(())
    }

    /// Routes a new order to its book.
    pub async fn submit(&self, pair: &TradingPair, id: u64, side: Side, price: u32, amount: u32) -> Result<()> {
        let result = self.try_submit(pair, Order::new(id, side, price, amount)).await;
        record("submit", &result)
    }

    async fn try_submit(&self, pair: &TradingPair, order: Order) -> Result<()> {
        self.validator.validate_order(order.price, order.amount)?;
        self.route(pair, BookCommand::Submit(order)).await.map(drop)
    }

    /// Routes a cancel to its book. Unknown ids still produce CANCEL + CANCELLED.
    pub async fn cancel(&self, pair: &TradingPair, id: u64) -> Result<()> {
        let result = self.route(pair, BookCommand::Cancel(id)).await.map(drop);
        record("cancel", &result)
    }

    /// Asks a book to drain what it has already accepted, emit DONE and close.
    ///
    /// Returns once the request is queued; later requests for the pair fail
    /// with `BookClosed`.
    pub async fn shutdown(&self, pair: &TradingPair) -> Result<()> {
        let result = self.try_shutdown(pair).await;
        record("shutdown", &result)
    }

    async fn try_shutdown(&self, pair: &TradingPair) -> Result<()> {
        let handle = self.lookup(pair)?;
        let _closing = handle.gate.write().await;
        if !handle.status.begin_close() {
            return Err(handle.unavailable(pair));
        }
        info!(pair = %pair, "shutdown requested");
        handle
            .commands
            .send(BookCommand::Shutdown)
            .await
            .map_err(|_| handle.unavailable(pair))
    }

    /// Shuts every book down and waits until each has emitted DONE onto the
    /// streams. Reports `LaneFailed` if any lane aborted.
    pub async fn shutdown_all(&self) -> Result<()> {
        let handles: Vec<(TradingPair, Arc<BookHandle>)> = self
            .books
            .read()
            .iter()
            .map(|(pair, handle)| (pair.clone(), Arc::clone(handle)))
            .collect();
        info!(books = handles.len(), "shutting down all books");

        for (pair, handle) in &handles {
            let _closing = handle.gate.write().await;
            if handle.status.begin_close() && handle.commands.send(BookCommand::Shutdown).await.is_err() {
                debug!(pair = %pair, "lane already gone");
            }
        }

        let mut failure = None;
        for (pair, handle) in handles {
            let lane = handle.lane.lock().take();
            if let Some(lane) = lane {
                if let Err(e) = lane.await {
                    error!(pair = %pair, error = %e, "book lane did not finish cleanly");
                }
            }
            let forwarder = handle.forwarder.lock().take();
            if let Some(forwarder) = forwarder {
                let _ = forwarder.await;
            }
            if handle.status.get() == LaneState::Failed {
                failure.get_or_insert(EngineError::LaneFailed(pair));
            }
        }

        let result = match failure {
            Some(e) => Err(e),
            None => Ok(()),
        };
        record("shutdown_all", &result)
    }

    /// Generic entry point over every request kind.
    pub async fn handle(&self, request: Request) -> Result<()> {
        match request {
            Request::Submit {
                pair,
                id,
                side,
                price,
                amount,
            } => self.submit(&pair, id, side, price, amount).await,
            Request::Cancel { pair, id } => self.cancel(&pair, id).await,
            Request::Shutdown { pair } => self.shutdown(&pair).await,
            Request::ShutdownAll => self.shutdown_all().await,
        }
    }

    /// Live resting orders of a book, read on its lane after every request
    /// queued before this one.
    pub async fn snapshot(&self, pair: &TradingPair) -> Result<BookSnapshot> {
        let (reply, response) = oneshot::channel();
        let handle = self.route(pair, BookCommand::Snapshot(reply)).await?;
        response.await.map_err(|_| handle.unavailable(pair))
    }

    /// Lossy view of the merged action stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.fanout.subscribe()
    }

    /// Pairs whose books still accept requests, sorted.
    pub fn pairs(&self) -> Vec<TradingPair> {
        let mut pairs: Vec<TradingPair> = self
            .books
            .read()
            .iter()
            .filter(|(_, handle)| handle.status.get() == LaneState::Running)
            .map(|(pair, _)| pair.clone())
            .collect();
        pairs.sort();
        pairs
    }

    pub fn is_registered(&self, pair: &TradingPair) -> bool {
        self.books.read().contains_key(pair)
    }

    fn lookup(&self, pair: &TradingPair) -> Result<Arc<BookHandle>> {
        self.books
            .read()
            .get(pair)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPair(pair.clone()))
    }

    /// Queues `command` on a running book. The status check and the send
    /// happen under the book's gate, so a concurrent shutdown either sees the
    /// command already queued or the command sees the book closing.
    async fn route(&self, pair: &TradingPair, command: BookCommand) -> Result<Arc<BookHandle>> {
        let handle = self.lookup(pair)?;
        {
            let _open = handle.gate.read().await;
            if handle.status.get() != LaneState::Running {
                return Err(handle.unavailable(pair));
            }
            self.dispatch(&handle, pair, command).await?;
        }
        Ok(handle)
    }

    async fn dispatch(&self, handle: &BookHandle, pair: &TradingPair, command: BookCommand) -> Result<()> {
        match self.config.queue_policy {
            QueuePolicy::Block => handle
                .commands
                .send(command)
                .await
                .map_err(|_| handle.unavailable(pair)),
            QueuePolicy::Reject => handle.commands.try_send(command).map_err(|e| match e {
                TrySendError::Full(_) => EngineError::QueueFull(pair.clone()),
                TrySendError::Closed(_) => handle.unavailable(pair),
            }),
        }
    }
}

/// Copies one book's actions onto the audit stream and the fan-out.
async fn forward(
    pair: TradingPair,
    mut actions: mpsc::Receiver<Action>,
    audit: mpsc::Sender<Action>,
    fanout: broadcast::Sender<Action>,
) {
    let mut audit_open = true;
    while let Some(action) = actions.recv().await {
        METRICS.actions_total.with_label_values(&[action.label()]).inc();
        // Err only means nobody is subscribed.
        let _ = fanout.send(action.clone());
        if audit_open && audit.send(action).await.is_err() {
            audit_open = false;
            debug!(pair = %pair, "audit stream receiver dropped");
        }
    }
}

fn record(kind: &str, result: &Result<()>) -> Result<()> {
    match result {
        Ok(()) => {
            METRICS.requests_total.with_label_values(&[kind]).inc();
            Ok(())
        }
        Err(e) => {
            METRICS.rejections_total.with_label_values(&[e.reason()]).inc();
            debug!(kind, error = %e, "request rejected");
            Err(e.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_eos() -> TradingPair {
        TradingPair::new("ETH", "EOS")
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_price, 10_000_000);
        assert_eq!(config.book_queue_depth, 1_024);
        assert_eq!(config.layout, BookLayout::Dense);
        assert_eq!(config.queue_policy, QueuePolicy::Block);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_price": 1000, "layout": "sparse"}"#).unwrap();
        assert_eq!(config.max_price, 1_000);
        assert_eq!(config.layout, BookLayout::Sparse);
        assert_eq!(config.event_queue_depth, 8_192);
    }

    #[test]
    fn test_layout_and_policy_parse() {
        assert_eq!("Sparse".parse::<BookLayout>(), Ok(BookLayout::Sparse));
        assert_eq!("reject".parse::<QueuePolicy>(), Ok(QueuePolicy::Reject));
        assert!("tree".parse::<BookLayout>().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_and_recreate() {
        let (engine, _audit) = MatchingEngine::new(EngineConfig::default());
        engine.create_book(eth_eos()).unwrap();
        assert_eq!(engine.create_book(eth_eos()), Err(EngineError::DuplicatePair(eth_eos())));

        engine.shutdown(&eth_eos()).await.unwrap();
        assert_eq!(engine.pairs(), Vec::<TradingPair>::new());
        assert!(engine.is_registered(&eth_eos()));
        engine.shutdown_all().await.unwrap();
        engine.create_book(eth_eos()).unwrap();
        assert_eq!(engine.pairs(), vec![eth_eos()]);
    }

    #[tokio::test]
    async fn test_reject_policy_reports_full_queue() {
        let config = EngineConfig {
            max_price: 1_000,
            book_queue_depth: 1,
            queue_policy: QueuePolicy::Reject,
            ..EngineConfig::default()
        };
        let (engine, _audit) = MatchingEngine::new(config);
        engine.create_book(eth_eos()).unwrap();

        // Single-threaded test runtime: the lane cannot drain until we yield.
        engine.submit(&eth_eos(), 1, Side::Buy, 10, 1).await.unwrap();
        assert_eq!(
            engine.submit(&eth_eos(), 2, Side::Buy, 10, 1).await,
            Err(EngineError::QueueFull(eth_eos()))
        );
    }

    #[tokio::test]
    async fn test_failed_lane_reports_lane_failed() {
        use crate::application::services::book_lane::tests::FaultyLadder;

        let (engine, mut audit) = MatchingEngine::new(EngineConfig::default());
        engine
            .create_book_with_ladder(eth_eos(), FaultyLadder(TickLadder::new(1_000)))
            .unwrap();

        // queued before the lane hits the fault
        engine.submit(&eth_eos(), 1, Side::Buy, 40, 5).await.unwrap();
        assert_eq!(engine.snapshot(&eth_eos()).await, Err(EngineError::LaneFailed(eth_eos())));
        assert_eq!(
            engine.submit(&eth_eos(), 2, Side::Sell, 50, 5).await,
            Err(EngineError::LaneFailed(eth_eos()))
        );
        assert_eq!(engine.cancel(&eth_eos(), 1).await, Err(EngineError::LaneFailed(eth_eos())));
        assert_eq!(engine.shutdown(&eth_eos()).await, Err(EngineError::LaneFailed(eth_eos())));
        assert!(engine.pairs().is_empty());
        assert_eq!(engine.shutdown_all().await, Err(EngineError::LaneFailed(eth_eos())));

        drop(engine);
        assert!(audit.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_validation_precedes_routing() {
        let (engine, _audit) = MatchingEngine::new(EngineConfig::default());
        assert!(matches!(
            engine.submit(&eth_eos(), 1, Side::Buy, 0, 1).await,
            Err(EngineError::InvalidRequest(_))
        ));
        assert_eq!(
            engine.submit(&eth_eos(), 1, Side::Buy, 1, 1).await,
            Err(EngineError::UnknownPair(eth_eos()))
        );
        assert!(matches!(
            engine.create_book(TradingPair::new("", "EOS")),
            Err(EngineError::InvalidRequest(_))
        ));
    }
}
