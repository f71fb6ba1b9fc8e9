/// Book Lane - the single writer of one order book
///
/// Every book runs on its own tokio task. The task owns the `OrderBook`
/// outright, pulls commands off a bounded queue one at a time and runs each to
/// completion before looking at the next, so matching never suspends and never
/// locks. The only await points are the queue intake and the outbound action
/// channel.
///
/// ## Lifecycle
/// `Running` until a `Shutdown` command is applied (or every sender is gone),
/// then `Closed`. A panic inside the book flips the lane to `Failed`; the
/// dispatcher reports `LaneFailed` from then on.

use crate::domain::order::Order;
use crate::domain::orderbook::{BookSnapshot, OrderBook, PriceLadder};
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{Action, TradingPair};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Work items accepted by a lane.
#[derive(Debug)]
pub enum BookCommand {
    Submit(Order),
    Cancel(u64),
    Snapshot(oneshot::Sender<BookSnapshot>),
    Shutdown,
}

impl BookCommand {
    fn label(&self) -> &'static str {
        match self {
            BookCommand::Submit(_) => "submit",
            BookCommand::Cancel(_) => "cancel",
            BookCommand::Snapshot(_) => "snapshot",
            BookCommand::Shutdown => "shutdown",
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Running = 0,
    /// Shutdown accepted by the dispatcher, not yet applied by the lane.
    Closing = 1,
    Closed = 2,
    Failed = 3,
}

/// Lane state shared between the lane task and the dispatcher.
#[derive(Debug)]
pub struct LaneStatus(AtomicU8);

impl LaneStatus {
    pub fn new() -> Self {
        Self(AtomicU8::new(LaneState::Running as u8))
    }

    pub fn get(&self) -> LaneState {
        match self.0.load(Ordering::Acquire) {
            0 => LaneState::Running,
            1 => LaneState::Closing,
            2 => LaneState::Closed,
            _ => LaneState::Failed,
        }
    }

    pub fn set(&self, state: LaneState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Running -> Closing. Only one caller wins.
    pub fn begin_close(&self) -> bool {
        self.0
            .compare_exchange(
                LaneState::Running as u8,
                LaneState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Closing or Running -> Closed, leaving a failed lane failed.
    fn finish(&self) {
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
            (state != LaneState::Failed as u8).then_some(LaneState::Closed as u8)
        });
    }
}

impl Default for LaneStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the lane failed if the task unwinds.
struct PanicGuard {
    pair: TradingPair,
    status: Arc<LaneStatus>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.status.set(LaneState::Failed);
            METRICS.books_active.dec();
            error!(pair = %self.pair, "book lane aborted on an internal invariant violation");
        }
    }
}

pub struct BookLane<L: PriceLadder> {
    book: OrderBook<L>,
    commands: mpsc::Receiver<BookCommand>,
    actions: mpsc::Sender<Action>,
    status: Arc<LaneStatus>,
}

impl<L: PriceLadder> BookLane<L> {
    pub fn new(
        book: OrderBook<L>,
        commands: mpsc::Receiver<BookCommand>,
        actions: mpsc::Sender<Action>,
        status: Arc<LaneStatus>,
    ) -> Self {
        Self {
            book,
            commands,
            actions,
            status,
        }
    }

    /// Drives the book until shutdown. Consumes the lane.
    pub async fn run(mut self) {
        let pair = self.book.pair().clone();
        let _guard = PanicGuard {
            pair: pair.clone(),
            status: Arc::clone(&self.status),
        };
        METRICS.books_active.inc();
        info!(pair = %pair, "book lane started");

        while let Some(command) = self.commands.recv().await {
            self.apply(command).await;
            if self.book.is_closed() {
                break;
            }
        }

        if !self.book.is_closed() {
            debug!(pair = %pair, "all senders dropped, closing book");
            self.apply(BookCommand::Shutdown).await;
        }

        self.commands.close();
        let mut dropped = 0usize;
        while self.commands.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(pair = %pair, dropped, "discarded commands queued behind shutdown");
        }

        self.status.finish();
        METRICS.books_active.dec();
        info!(pair = %pair, "book lane stopped");
    }

    async fn apply(&mut self, command: BookCommand) {
        let timer = METRICS
            .request_duration
            .with_label_values(&[command.label()])
            .start_timer();

        let outcome = match command {
            BookCommand::Submit(order) => {
                debug!(pair = %self.book.pair(), order_id = order.id, "submit");
                self.book.submit(order)
            }
            BookCommand::Cancel(order_id) => {
                debug!(pair = %self.book.pair(), order_id, "cancel");
                self.book.cancel(order_id)
            }
            BookCommand::Snapshot(reply) => {
                let _ = reply.send(self.book.snapshot());
                timer.observe_duration();
                return;
            }
            BookCommand::Shutdown => {
                info!(pair = %self.book.pair(), "shutting down book");
                self.book.shutdown()
            }
        };
        timer.observe_duration();

        match outcome {
            Ok(actions) => {
                for action in actions {
                    if self.actions.send(action).await.is_err() {
                        warn!(pair = %self.book.pair(), "action stream closed, dropping actions");
                        break;
                    }
                }
            }
            Err(e) => {
                METRICS.rejections_total.with_label_values(&[e.reason()]).inc();
                warn!(pair = %self.book.pair(), error = %e, "request rejected by book");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::orderbook::{PricePoint, TickLadder};
    use crate::shared::protocol::Side;

    /// Ladder whose storage breaks the first time an order rests.
    pub(crate) struct FaultyLadder(pub TickLadder);

    impl PriceLadder for FaultyLadder {
        fn max_price(&self) -> u32 {
            self.0.max_price()
        }

        fn point(&self, side: Side, price: u32) -> Option<&PricePoint> {
            self.0.point(side, price)
        }

        fn point_mut(&mut self, side: Side, price: u32) -> Option<&mut PricePoint> {
            self.0.point_mut(side, price)
        }

        fn occupy(&mut self, _side: Side, price: u32) -> &mut PricePoint {
            panic!("corrupted price point at {}", price)
        }

        fn vacate(&mut self, side: Side, price: u32) {
            self.0.vacate(side, price)
        }

        fn next_bid_below(&self, price: u32) -> Option<u32> {
            self.0.next_bid_below(price)
        }

        fn next_ask_above(&self, price: u32) -> Option<u32> {
            self.0.next_ask_above(price)
        }

        fn occupied(&self, side: Side) -> Vec<u32> {
            self.0.occupied(side)
        }

        fn clear(&mut self) {
            self.0.clear()
        }
    }

    fn spawn_lane() -> (mpsc::Sender<BookCommand>, mpsc::Receiver<Action>, Arc<LaneStatus>, tokio::task::JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (action_tx, action_rx) = mpsc::channel(16);
        let status = Arc::new(LaneStatus::new());
        let book = OrderBook::new(TradingPair::new("ETH", "EOS"), 1_000);
        let lane = BookLane::new(book, command_rx, action_tx, Arc::clone(&status));
        let handle = tokio::spawn(lane.run());
        (command_tx, action_rx, status, handle)
    }

    #[tokio::test]
    async fn test_lane_emits_in_request_order_and_closes() {
        let (commands, mut actions, status, handle) = spawn_lane();
        commands.send(BookCommand::Submit(Order::new(1, Side::Sell, 50, 10))).await.unwrap();
        commands.send(BookCommand::Cancel(1)).await.unwrap();
        commands.send(BookCommand::Shutdown).await.unwrap();
        commands.send(BookCommand::Cancel(2)).await.ok();
        handle.await.unwrap();

        let mut labels = Vec::new();
        while let Some(action) = actions.recv().await {
            labels.push(action.label());
        }
        assert_eq!(labels, vec!["SELL", "CANCEL", "CANCELLED", "DONE"]);
        assert_eq!(status.get(), LaneState::Closed);
    }

    #[tokio::test]
    async fn test_snapshot_runs_on_lane() {
        let (commands, _actions, _status, _handle) = spawn_lane();
        commands.send(BookCommand::Submit(Order::new(1, Side::Buy, 40, 5))).await.unwrap();
        let (tx, rx) = oneshot::channel();
        commands.send(BookCommand::Snapshot(tx)).await.unwrap();
        let snapshot = rx.await.unwrap();
        assert_eq!(snapshot.best_bid, 40);
        assert_eq!(snapshot.bids[0].orders[0].id, 1);
    }

    #[tokio::test]
    async fn test_dropped_senders_still_emit_done() {
        let (commands, mut actions, status, handle) = spawn_lane();
        drop(commands);
        handle.await.unwrap();
        assert!(actions.recv().await.unwrap().is_done());
        assert_eq!(status.get(), LaneState::Closed);
    }

    #[tokio::test]
    async fn test_book_rejection_is_counted() {
        let rejected = || METRICS.rejections_total.with_label_values(&["invalid_request"]).get();
        let before = rejected();

        let (commands, mut actions, _status, handle) = spawn_lane();
        commands.send(BookCommand::Submit(Order::new(1, Side::Sell, 50, 10))).await.unwrap();
        // same live id again
        commands.send(BookCommand::Submit(Order::new(1, Side::Sell, 60, 10))).await.unwrap();
        commands.send(BookCommand::Shutdown).await.unwrap();
        handle.await.unwrap();

        let mut labels = Vec::new();
        while let Some(action) = actions.recv().await {
            labels.push(action.label());
        }
        assert_eq!(labels, vec!["SELL", "DONE"]);
        assert!(rejected() > before);
    }

    #[tokio::test]
    async fn test_panic_in_book_fails_lane() {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (action_tx, mut actions) = mpsc::channel(16);
        let status = Arc::new(LaneStatus::new());
        let book = OrderBook::with_ladder(TradingPair::new("ETH", "EOS"), FaultyLadder(TickLadder::new(1_000)));
        let handle = tokio::spawn(BookLane::new(book, command_rx, action_tx, Arc::clone(&status)).run());

        command_tx.send(BookCommand::Submit(Order::new(1, Side::Buy, 40, 5))).await.unwrap();
        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(status.get(), LaneState::Failed);
        // nothing emitted, not even DONE
        assert!(actions.recv().await.is_none());
        assert!(command_tx.send(BookCommand::Cancel(1)).await.is_err());
    }

    #[test]
    fn test_begin_close_only_once() {
        let status = LaneStatus::new();
        assert!(status.begin_close());
        assert!(!status.begin_close());
        assert_eq!(status.get(), LaneState::Closing);
        status.set(LaneState::Failed);
        status.finish();
        assert_eq!(status.get(), LaneState::Failed);
    }
}
