/// Price-time priority order book for one trading pair.
///
/// The book is a plain single-threaded state machine: every operation runs to
/// completion and returns the actions it produced, in emission order. The
/// execution lane owns the book and forwards those actions downstream.
///
/// ## Matching
/// - BUY takers walk asks upward from `best_ask` while `best_ask <= price`;
///   SELL takers walk bids downward from `best_bid` while `best_bid >= price`.
/// - Within a tick, makers are consumed strictly in arrival order.
/// - Every fill trades at the maker's price.
/// - Residual quantity rests at the taker's own limit.
///
/// ## Cancellation
/// Cancel is logical: the order drops to `amount = 0`, leaves the index, and stays
/// chained until a matching walk pops it. Cursors are not moved by cancel; the next
/// match attempt skips dead makers and advances past drained ticks.
///
/// ## Example
/// ```rust
/// use matching_engine::domain::order::Order;
/// use matching_engine::domain::orderbook::OrderBook;
/// use matching_engine::shared::protocol::{Action, Side, TradingPair};
///
/// let mut book = OrderBook::new(TradingPair::new("ETH", "EOS"), 1_000);
/// book.submit(Order::new(1, Side::Sell, 50, 50)).unwrap();
/// let actions = book.submit(Order::new(2, Side::Buy, 50, 50)).unwrap();
/// assert!(matches!(actions[1], Action::Filled { order_id: 2, from_order_id: 1, amount: 50, price: 50, .. }));
/// assert!(book.is_empty());
/// ```

use crate::domain::order::{Order, OrderArena, SlotId};
use crate::domain::orderbook::btree::BTreeLadder;
use crate::domain::orderbook::tick_based::TickLadder;
use crate::domain::orderbook::traits::PriceLadder;
use crate::domain::validation::OrderValidator;
use crate::shared::error::{EngineError, Result};
use crate::shared::protocol::{Action, OrderStatus, Side, TradingPair};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Actions produced by one request. Most requests emit fewer than eight.
pub type Actions = SmallVec<[Action; 8]>;

/// A live resting order as seen from outside the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestingOrder {
    pub id: u64,
    pub amount: u32,
    pub status: OrderStatus,
}

/// Live orders at one tick, in time priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevelSnapshot {
    pub price: u32,
    pub orders: Vec<RestingOrder>,
}

/// Point-in-time view of a book's live orders.
///
/// Bids are listed best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSnapshot {
    pub pair: TradingPair,
    pub best_bid: u32,
    pub best_ask: u32,
    pub bids: Vec<PriceLevelSnapshot>,
    pub asks: Vec<PriceLevelSnapshot>,
}

pub struct OrderBook<L: PriceLadder = TickLadder> {
    pair: TradingPair,
    ladder: L,
    orders: OrderArena,
    /// Live resting orders by id.
    index: HashMap<u64, SlotId>,
    /// Highest bid tick with a chained FIFO, 0 when none.
    best_bid: u32,
    /// Lowest ask tick with a chained FIFO, `max_price` when none.
    best_ask: u32,
    closed: bool,
}

impl OrderBook<TickLadder> {
    /// Book over a dense tick ladder.
    pub fn new(pair: TradingPair, max_price: u32) -> Self {
        Self::with_ladder(pair, TickLadder::new(max_price))
    }
}

impl OrderBook<BTreeLadder> {
    /// Book over an ordered-map ladder.
    pub fn sparse(pair: TradingPair, max_price: u32) -> Self {
        Self::with_ladder(pair, BTreeLadder::new(max_price))
    }
}

impl<L: PriceLadder> OrderBook<L> {
    pub fn with_ladder(pair: TradingPair, ladder: L) -> Self {
        let best_ask = ladder.max_price();
        Self {
            pair,
            ladder,
            orders: OrderArena::with_capacity(1024),
            index: HashMap::new(),
            best_bid: 0,
            best_ask,
            closed: false,
        }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    #[inline]
    pub fn max_price(&self) -> u32 {
        self.ladder.max_price()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Live resting orders.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Live resting order by id.
    pub fn order(&self, order_id: u64) -> Option<&Order> {
        self.index.get(&order_id).map(|&slot| self.orders.get(slot))
    }

    /// Raw bid cursor; may sit on a tick whose orders were all cancelled.
    pub fn bid_cursor(&self) -> u32 {
        self.best_bid
    }

    /// Raw ask cursor; may sit on a tick whose orders were all cancelled.
    pub fn ask_cursor(&self) -> u32 {
        self.best_ask
    }

    /// Highest price with a live BUY, or 0.
    pub fn best_bid(&self) -> u32 {
        let mut cursor = (self.best_bid > 0).then_some(self.best_bid);
        while let Some(price) = cursor {
            if self.has_live(Side::Buy, price) {
                return price;
            }
            cursor = self.ladder.next_bid_below(price);
        }
        0
    }

    /// Lowest price with a live SELL, or `max_price`.
    pub fn best_ask(&self) -> u32 {
        let max_price = self.max_price();
        let mut cursor = (self.best_ask < max_price).then_some(self.best_ask);
        while let Some(price) = cursor {
            if self.has_live(Side::Sell, price) {
                return price;
            }
            cursor = self.ladder.next_ask_above(price);
        }
        max_price
    }

    fn has_live(&self, side: Side, price: u32) -> bool {
        self.ladder
            .point(side, price)
            .is_some_and(|point| point.live_orders() > 0)
    }

    /// Matches an incoming NEW order and rests whatever is left.
    ///
    /// Emits the BUY/SELL acceptance, then one PARTIAL_FILLED per maker fully
    /// consumed, then FILLED if the taker ran out.
    pub fn submit(&mut self, mut order: Order) -> Result<Actions> {
        if self.closed {
            return Err(EngineError::BookClosed(self.pair.clone()));
        }
        OrderValidator::new(self.max_price()).validate_order(order.price, order.amount)?;
        if order.status != OrderStatus::New {
            return Err(EngineError::InvalidRequest(format!(
                "order {} is {:?}, expected NEW",
                order.id, order.status
            )));
        }
        if self.index.contains_key(&order.id) {
            return Err(EngineError::InvalidRequest(format!(
                "order id {} is already resting on {}",
                order.id, self.pair
            )));
        }

        let mut actions = Actions::new();
        actions.push(Action::accepted(&self.pair, order.side, order.id, order.amount, order.price));

        self.match_incoming(&mut order, &mut actions);
        if order.amount > 0 {
            self.rest(order);
        }
        Ok(actions)
    }

    fn match_incoming(&mut self, taker: &mut Order, actions: &mut Actions) {
        let maker_side = taker.side.opposite();
        while taker.amount > 0 {
            let Some(level) = self.opposing_best(taker.side) else {
                break;
            };
            let crosses = match taker.side {
                Side::Buy => level <= taker.price,
                Side::Sell => level >= taker.price,
            };
            if !crosses {
                break;
            }

            if self.fill_at(level, taker, actions) {
                self.ladder.vacate(maker_side, level);
                self.advance_cursor(maker_side, level);
            }
        }
    }

    #[inline]
    fn opposing_best(&self, taker_side: Side) -> Option<u32> {
        match taker_side {
            Side::Buy => (self.best_ask < self.max_price()).then_some(self.best_ask),
            Side::Sell => (self.best_bid > 0).then_some(self.best_bid),
        }
    }

    /// Consumes makers at `level` until the taker is done or the FIFO is empty.
    /// Returns whether the FIFO drained.
    fn fill_at(&mut self, level: u32, taker: &mut Order, actions: &mut Actions) -> bool {
        let maker_side = taker.side.opposite();
        let Some(point) = self.ladder.point_mut(maker_side, level) else {
            panic!(
                "{} cursor at {} on {} has no price point",
                maker_side.as_str(),
                level,
                self.pair
            );
        };

        while taker.amount > 0 {
            let Some(slot) = point.peek_head() else {
                break;
            };
            let maker = self.orders.get_mut(slot);
            if maker.amount == 0 {
                // logically cancelled
                point.pop_head(&mut self.orders);
                self.orders.remove(slot);
                continue;
            }
            assert!(
                maker.price == level && maker.side == maker_side,
                "order {} chained at {} {} rests at {} {}",
                maker.id,
                maker_side.as_str(),
                level,
                maker.side.as_str(),
                maker.price
            );

            let quantity = maker.amount.min(taker.amount);
            let pair = self.pair.clone();
            actions.push(if quantity == taker.amount {
                Action::Filled {
                    pair,
                    order_id: taker.id,
                    from_order_id: maker.id,
                    amount: quantity,
                    price: maker.price,
                }
            } else {
                Action::PartialFilled {
                    pair,
                    order_id: taker.id,
                    from_order_id: maker.id,
                    amount: quantity,
                    price: maker.price,
                }
            });

            maker.amount -= quantity;
            taker.amount -= quantity;
            taker.transition(if taker.amount == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::PartialFilled
            });

            if maker.amount == 0 {
                maker.transition(OrderStatus::Filled);
                let maker_id = maker.id;
                point.retire_one();
                point.pop_head(&mut self.orders);
                self.orders.remove(slot);
                self.index.remove(&maker_id);
            } else {
                maker.transition(OrderStatus::PartialFilled);
            }
        }

        point.is_empty()
    }

    fn advance_cursor(&mut self, side: Side, drained: u32) {
        match side {
            Side::Buy => self.best_bid = self.ladder.next_bid_below(drained).unwrap_or(0),
            Side::Sell => {
                self.best_ask = self
                    .ladder
                    .next_ask_above(drained)
                    .unwrap_or_else(|| self.ladder.max_price())
            }
        }
    }

    fn rest(&mut self, mut order: Order) {
        if order.status == OrderStatus::New {
            order.transition(OrderStatus::Open);
        }
        let (id, side, price) = (order.id, order.side, order.price);
        let slot = self.orders.insert(order);
        self.ladder.occupy(side, price).append(&mut self.orders, slot);
        match side {
            Side::Buy => self.best_bid = self.best_bid.max(price),
            Side::Sell => self.best_ask = self.best_ask.min(price),
        }
        self.index.insert(id, slot);
    }

    /// Logically cancels a resting order. Unknown and terminal ids are not an
    /// error: CANCEL + CANCELLED is emitted either way.
    pub fn cancel(&mut self, order_id: u64) -> Result<Actions> {
        if self.closed {
            return Err(EngineError::BookClosed(self.pair.clone()));
        }

        let mut actions = Actions::new();
        actions.push(Action::Cancel {
            pair: self.pair.clone(),
            order_id,
        });

        if let Some(slot) = self.index.remove(&order_id) {
            let order = self.orders.get_mut(slot);
            assert!(order.is_live(), "indexed order {} is not live", order_id);
            order.amount = 0;
            order.transition(OrderStatus::Cancelled);
            let (side, price) = (order.side, order.price);
            match self.ladder.point_mut(side, price) {
                Some(point) => point.retire_one(),
                None => panic!("indexed order {} has no price point at {}", order_id, price),
            }
        }

        actions.push(Action::Cancelled {
            pair: self.pair.clone(),
            order_id,
        });
        Ok(actions)
    }

    /// Freezes the book, drops its state and emits DONE.
    pub fn shutdown(&mut self) -> Result<Actions> {
        if self.closed {
            return Err(EngineError::BookClosed(self.pair.clone()));
        }
        self.closed = true;
        self.index.clear();
        self.orders.clear();
        self.ladder.clear();
        self.best_bid = 0;
        self.best_ask = self.ladder.max_price();

        let mut actions = Actions::new();
        actions.push(Action::Done {
            pair: self.pair.clone(),
        });
        Ok(actions)
    }

    pub fn snapshot(&self) -> BookSnapshot {
        let level = |side: Side, price: u32| -> Option<PriceLevelSnapshot> {
            let point = self.ladder.point(side, price)?;
            let orders: Vec<RestingOrder> = point
                .slots(&self.orders)
                .map(|slot| self.orders.get(slot))
                .filter(|order| order.amount > 0)
                .map(|order| RestingOrder {
                    id: order.id,
                    amount: order.amount,
                    status: order.status,
                })
                .collect();
            (!orders.is_empty()).then_some(PriceLevelSnapshot { price, orders })
        };

        BookSnapshot {
            pair: self.pair.clone(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            bids: self
                .ladder
                .occupied(Side::Buy)
                .into_iter()
                .rev()
                .filter_map(|price| level(Side::Buy, price))
                .collect(),
            asks: self
                .ladder
                .occupied(Side::Sell)
                .into_iter()
                .filter_map(|price| level(Side::Sell, price))
                .collect(),
        }
    }

    /// Full structural check: cursors agree with the ladder, every chained order
    /// sits on the right tick and side, the index holds exactly the live orders,
    /// and no live bid crosses a live ask.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let max_price = self.max_price();
        if self.best_bid >= max_price {
            return Err(format!("bid cursor {} out of range", self.best_bid));
        }
        if self.best_ask == 0 || self.best_ask > max_price {
            return Err(format!("ask cursor {} out of range", self.best_ask));
        }
        let highest_bid = self.ladder.highest_bid().unwrap_or(0);
        if highest_bid != self.best_bid {
            return Err(format!(
                "bid cursor {} but highest occupied bid tick is {}",
                self.best_bid, highest_bid
            ));
        }
        let lowest_ask = self.ladder.lowest_ask().unwrap_or(max_price);
        if lowest_ask != self.best_ask {
            return Err(format!(
                "ask cursor {} but lowest occupied ask tick is {}",
                self.best_ask, lowest_ask
            ));
        }

        let mut live = 0usize;
        let mut chained = 0usize;
        for side in [Side::Buy, Side::Sell] {
            for price in self.ladder.occupied(side) {
                let point = self
                    .ladder
                    .point(side, price)
                    .ok_or_else(|| format!("occupied {} tick {} has no point", side.as_str(), price))?;
                if point.is_empty() {
                    return Err(format!("occupied {} tick {} has an empty FIFO", side.as_str(), price));
                }

                let mut level_live = 0u32;
                for slot in point.slots(&self.orders) {
                    chained += 1;
                    let order = self.orders.get(slot);
                    if order.side != side || order.price != price {
                        return Err(format!(
                            "order {} ({} @ {}) chained at {} tick {}",
                            order.id,
                            order.side.as_str(),
                            order.price,
                            side.as_str(),
                            price
                        ));
                    }
                    if order.amount > 0 {
                        if !order.is_live() {
                            return Err(format!("order {} has amount but status {:?}", order.id, order.status));
                        }
                        if self.index.get(&order.id) != Some(&slot) {
                            return Err(format!("live order {} missing from index", order.id));
                        }
                        level_live += 1;
                    } else if order.status != OrderStatus::Cancelled {
                        return Err(format!("dead order {} is {:?}, expected CANCELLED", order.id, order.status));
                    }
                }
                if level_live != point.live_orders() {
                    return Err(format!(
                        "{} tick {} counts {} live orders, found {}",
                        side.as_str(),
                        price,
                        point.live_orders(),
                        level_live
                    ));
                }
                live += level_live as usize;
            }
        }

        if live != self.index.len() {
            return Err(format!("index holds {} ids but {} orders are live", self.index.len(), live));
        }
        if chained != self.orders.len() {
            return Err(format!("arena holds {} orders but {} are chained", self.orders.len(), chained));
        }

        let (bid, ask) = (self.best_bid(), self.best_ask());
        if bid != 0 && ask != max_price && bid >= ask {
            return Err(format!("book crossed: best bid {} >= best ask {}", bid, ask));
        }
        Ok(())
    }
}
