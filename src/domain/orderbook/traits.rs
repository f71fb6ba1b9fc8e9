/// PriceLadder Trait - price point storage behind an order book
///
/// The matching algorithm only needs four things from its price storage: find the
/// FIFO at a tick, create it on first use, drop it once drained, and locate the next
/// occupied tick in the direction a best-price cursor moves. This trait is that
/// surface, so `OrderBook<L>` runs the same matching code over different layouts.
///
/// ## Implementations
/// - `TickLadder`: dense tick-indexed array, pages allocated on first use, per-side
///   occupancy bitmaps. The default.
/// - `BTreeLadder`: ordered map per side, for books whose price range is huge and
///   sparsely populated.
///
/// ## Contract
/// - A tick holds orders of at most one side at a time.
/// - `point`/`point_mut` return `Some` only for ticks occupied on that side.
/// - `occupy` on an already occupied tick returns the existing point.
/// - `vacate` is only called once the FIFO is empty.
///
/// ## Example
/// ```rust
/// use matching_engine::domain::orderbook::{PriceLadder, TickLadder};
/// use matching_engine::shared::protocol::Side;
///
/// let mut ladder = TickLadder::new(1_000);
/// ladder.occupy(Side::Sell, 45);
/// ladder.occupy(Side::Sell, 50);
/// assert_eq!(ladder.lowest_ask(), Some(45));
/// assert_eq!(ladder.next_ask_above(45), Some(50));
/// ```

use crate::domain::orderbook::price_point::PricePoint;
use crate::shared::protocol::Side;

pub trait PriceLadder: Send + 'static {
    /// Exclusive upper bound on storable prices.
    fn max_price(&self) -> u32;

    /// Price point at `price` if that tick is occupied on `side`.
    fn point(&self, side: Side, price: u32) -> Option<&PricePoint>;

    /// Mutable price point at `price` if that tick is occupied on `side`.
    fn point_mut(&mut self, side: Side, price: u32) -> Option<&mut PricePoint>;

    /// Marks the tick occupied on `side`, creating an empty point if needed.
    ///
    /// # Panics
    /// If `price >= max_price()` or the tick is occupied by the other side.
    fn occupy(&mut self, side: Side, price: u32) -> &mut PricePoint;

    /// Releases a drained tick.
    fn vacate(&mut self, side: Side, price: u32);

    /// Highest occupied bid tick strictly below `price`.
    fn next_bid_below(&self, price: u32) -> Option<u32>;

    /// Lowest occupied ask tick strictly above `price`.
    fn next_ask_above(&self, price: u32) -> Option<u32>;

    /// Occupied ticks on `side`, ascending.
    fn occupied(&self, side: Side) -> Vec<u32>;

    /// Drops every price point.
    fn clear(&mut self);

    /// Highest occupied bid tick.
    fn highest_bid(&self) -> Option<u32> {
        self.next_bid_below(self.max_price())
    }

    /// Lowest occupied ask tick.
    fn lowest_ask(&self) -> Option<u32> {
        self.next_ask_above(0)
    }
}
