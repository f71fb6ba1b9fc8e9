/// FIFO of resting orders at one price tick.
///
/// Orders are linked through the arena (`Order::next`); the point only keeps the
/// head and tail slots. Cancelled orders stay chained with `amount == 0` until a
/// matching walk pops them, so `live_orders` counts what is actually tradable.

use crate::domain::order::{OrderArena, SlotId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PricePoint {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    live_orders: u32,
}

impl PricePoint {
    pub const EMPTY: PricePoint = PricePoint {
        head: None,
        tail: None,
        live_orders: 0,
    };

    /// Links `slot` at the tail. The order must be live.
    #[inline]
    pub fn append(&mut self, arena: &mut OrderArena, slot: SlotId) {
        arena.get_mut(slot).next = None;
        match self.tail {
            Some(tail) => arena.get_mut(tail).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.live_orders += 1;
    }

    /// Unlinks the head. The order itself stays in the arena.
    #[inline]
    pub fn pop_head(&mut self, arena: &mut OrderArena) -> Option<SlotId> {
        let head = self.head?;
        let next = arena.get_mut(head).next.take();
        self.head = next;
        if next.is_none() {
            self.tail = None;
        }
        Some(head)
    }

    #[inline]
    pub fn peek_head(&self) -> Option<SlotId> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Chained orders with quantity left.
    #[inline]
    pub fn live_orders(&self) -> u32 {
        self.live_orders
    }

    /// Records that one chained order dropped to zero (filled or cancelled).
    #[inline]
    pub fn retire_one(&mut self) {
        assert!(self.live_orders > 0, "price point has no live order to retire");
        self.live_orders -= 1;
    }

    /// Walks the FIFO from head to tail.
    pub fn slots<'a>(&self, arena: &'a OrderArena) -> impl Iterator<Item = SlotId> + 'a {
        std::iter::successors(self.head, move |&slot| arena.get(slot).next)
    }
}
