use crate::domain::orderbook::price_point::PricePoint;
use crate::domain::orderbook::traits::PriceLadder;
use crate::shared::protocol::Side;
use std::collections::BTreeMap;
use std::ops::Bound;

// Ordered map per side; only occupied ticks have an entry. Cursor moves become
// range lookups instead of bitmap scans.
#[derive(Debug, Clone)]
pub struct BTreeLadder {
    max_price: u32,
    // bids, highest is best
    bids: BTreeMap<u32, PricePoint>,
    // asks, lowest is best
    asks: BTreeMap<u32, PricePoint>,
}

impl BTreeLadder {
    pub fn new(max_price: u32) -> Self {
        assert!(max_price >= 2, "max_price must leave room for at least one tick");
        Self {
            max_price,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    fn side(&self, side: Side) -> &BTreeMap<u32, PricePoint> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<u32, PricePoint> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

impl PriceLadder for BTreeLadder {
    fn max_price(&self) -> u32 {
        self.max_price
    }

    fn point(&self, side: Side, price: u32) -> Option<&PricePoint> {
        self.side(side).get(&price)
    }

    fn point_mut(&mut self, side: Side, price: u32) -> Option<&mut PricePoint> {
        self.side_mut(side).get_mut(&price)
    }

    fn occupy(&mut self, side: Side, price: u32) -> &mut PricePoint {
        assert!(
            price < self.max_price,
            "tick {} outside ladder of {} ticks",
            price,
            self.max_price
        );
        assert!(
            !self.side(side.opposite()).contains_key(&price),
            "tick {} already holds resting {} orders",
            price,
            side.opposite().as_str()
        );
        self.side_mut(side).entry(price).or_default()
    }

    fn vacate(&mut self, side: Side, price: u32) {
        if let Some(point) = self.side_mut(side).remove(&price) {
            debug_assert!(point.is_empty(), "vacating non-empty tick {}", price);
        }
    }

    fn next_bid_below(&self, price: u32) -> Option<u32> {
        self.bids.range(..price).next_back().map(|(&tick, _)| tick)
    }

    fn next_ask_above(&self, price: u32) -> Option<u32> {
        self.asks
            .range((Bound::Excluded(price), Bound::Unbounded))
            .next()
            .map(|(&tick, _)| tick)
    }

    fn occupied(&self, side: Side) -> Vec<u32> {
        self.side(side).keys().copied().collect()
    }

    fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }
}
