/// Tick-indexed price ladder
///
/// The price is the slot index: `prices[p]` is the FIFO at tick `p`. The slot
/// array is cut into fixed pages that are only allocated when a tick inside them
/// first receives an order and are released once both sides have left the page,
/// so an empty 10M-tick book costs a page table plus two zero-filled bitmaps.
///
/// Best-price cursors move with the per-side bitmaps, which skip 64 empty ticks
/// per word instead of probing slot by slot.

use crate::domain::orderbook::price_point::PricePoint;
use crate::domain::orderbook::traits::PriceLadder;
use crate::shared::collections::FastBitmap;
use crate::shared::protocol::Side;

const PAGE_BITS: usize = 10;
/// Ticks per lazily allocated page.
pub const PAGE_SIZE: usize = 1 << PAGE_BITS;

type Page = Box<[PricePoint]>;

pub struct TickLadder {
    max_price: u32,
    pages: Vec<Option<Page>>,
    bids: FastBitmap,
    asks: FastBitmap,
}

impl TickLadder {
    /// # Panics
    /// If `max_price < 2`: no tick would satisfy `0 < price < max_price`.
    pub fn new(max_price: u32) -> Self {
        assert!(max_price >= 2, "max_price must leave room for at least one tick");
        let ticks = max_price as usize;
        Self {
            max_price,
            pages: (0..ticks.div_ceil(PAGE_SIZE)).map(|_| None).collect(),
            bids: FastBitmap::new(ticks),
            asks: FastBitmap::new(ticks),
        }
    }

    #[inline]
    fn locate(price: u32) -> (usize, usize) {
        let tick = price as usize;
        (tick >> PAGE_BITS, tick & (PAGE_SIZE - 1))
    }

    #[inline]
    fn bitmap(&self, side: Side) -> &FastBitmap {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    fn bitmap_mut(&mut self, side: Side) -> &mut FastBitmap {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Pages currently backed by memory.
    pub fn allocated_pages(&self) -> usize {
        self.pages.iter().filter(|page| page.is_some()).count()
    }
}

impl PriceLadder for TickLadder {
    #[inline]
    fn max_price(&self) -> u32 {
        self.max_price
    }

    #[inline]
    fn point(&self, side: Side, price: u32) -> Option<&PricePoint> {
        if !self.bitmap(side).contains(price as usize) {
            return None;
        }
        let (page, offset) = Self::locate(price);
        self.pages[page].as_ref().map(|page| &page[offset])
    }

    #[inline]
    fn point_mut(&mut self, side: Side, price: u32) -> Option<&mut PricePoint> {
        if !self.bitmap(side).contains(price as usize) {
            return None;
        }
        let (page, offset) = Self::locate(price);
        self.pages[page].as_mut().map(|page| &mut page[offset])
    }

    fn occupy(&mut self, side: Side, price: u32) -> &mut PricePoint {
        assert!(
            price < self.max_price,
            "tick {} outside ladder of {} ticks",
            price,
            self.max_price
        );
        assert!(
            !self.bitmap(side.opposite()).contains(price as usize),
            "tick {} already holds resting {} orders",
            price,
            side.opposite().as_str()
        );
        self.bitmap_mut(side).insert(price as usize);

        let (page, offset) = Self::locate(price);
        let page = self.pages[page]
            .get_or_insert_with(|| vec![PricePoint::EMPTY; PAGE_SIZE].into_boxed_slice());
        &mut page[offset]
    }

    fn vacate(&mut self, side: Side, price: u32) {
        self.bitmap_mut(side).remove(price as usize);
        let (page_idx, offset) = Self::locate(price);
        if let Some(page) = self.pages[page_idx].as_mut() {
            debug_assert!(page[offset].is_empty(), "vacating non-empty tick {}", price);
            page[offset] = PricePoint::EMPTY;
        }

        let start = page_idx * PAGE_SIZE;
        let end = start + PAGE_SIZE;
        if !self.bids.any_in(start, end) && !self.asks.any_in(start, end) {
            self.pages[page_idx] = None;
        }
    }

    #[inline]
    fn next_bid_below(&self, price: u32) -> Option<u32> {
        self.bids.prev_before(price as usize).map(|tick| tick as u32)
    }

    #[inline]
    fn next_ask_above(&self, price: u32) -> Option<u32> {
        self.asks.next_after(price as usize).map(|tick| tick as u32)
    }

    fn occupied(&self, side: Side) -> Vec<u32> {
        self.bitmap(side).iter().map(|tick| tick as u32).collect()
    }

    fn clear(&mut self) {
        self.pages.iter_mut().for_each(|page| *page = None);
        self.bids.clear();
        self.asks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_allocated_lazily() {
        let mut ladder = TickLadder::new(10_000_000);
        assert_eq!(ladder.allocated_pages(), 0);

        ladder.occupy(Side::Buy, 5);
        ladder.occupy(Side::Buy, 6);
        assert_eq!(ladder.allocated_pages(), 1);

        ladder.occupy(Side::Sell, 9_999_999);
        assert_eq!(ladder.allocated_pages(), 2);
        assert_eq!(ladder.lowest_ask(), Some(9_999_999));
        assert_eq!(ladder.highest_bid(), Some(6));
    }

    #[test]
    fn test_page_released_when_both_sides_leave() {
        let mut ladder = TickLadder::new(4_096);
        ladder.occupy(Side::Buy, 10);
        ladder.occupy(Side::Sell, 20);
        assert_eq!(ladder.allocated_pages(), 1);

        ladder.vacate(Side::Buy, 10);
        assert_eq!(ladder.allocated_pages(), 1);
        ladder.vacate(Side::Sell, 20);
        assert_eq!(ladder.allocated_pages(), 0);
    }

    #[test]
    #[should_panic(expected = "already holds resting")]
    fn test_tick_cannot_hold_both_sides() {
        let mut ladder = TickLadder::new(100);
        ladder.occupy(Side::Buy, 50);
        ladder.occupy(Side::Sell, 50);
    }

    #[test]
    #[should_panic(expected = "outside ladder")]
    fn test_tick_beyond_max_price_panics() {
        let mut ladder = TickLadder::new(100);
        ladder.occupy(Side::Buy, 100);
    }
}
