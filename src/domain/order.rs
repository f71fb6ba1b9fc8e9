/// Order records and the arena that owns them.
///
/// Resting orders are chained into their price point's FIFO through `next`, an
/// arena slot rather than a pointer. Vacated slots go onto a free list and are
/// reused by later inserts.

use crate::shared::protocol::{OrderStatus, Side};

/// Index of an order inside an [`OrderArena`].
pub type SlotId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    pub price: u32,
    /// Remaining quantity, reduced in place as fills occur.
    pub amount: u32,
    pub status: OrderStatus,
    /// Successor in the price point FIFO.
    pub(crate) next: Option<SlotId>,
}

impl Order {
    pub fn new(id: u64, side: Side, price: u32, amount: u32) -> Self {
        Self {
            id,
            side,
            price,
            amount,
            status: OrderStatus::New,
            next: None,
        }
    }

    /// Reachable from the book: resting with quantity left.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.amount > 0 && matches!(self.status, OrderStatus::Open | OrderStatus::PartialFilled)
    }

    /// Moves the order forward in its lifecycle.
    ///
    /// # Panics
    /// On a backwards or post-terminal transition; that is a book bug.
    #[inline]
    pub(crate) fn transition(&mut self, next: OrderStatus) {
        assert!(
            self.status.can_transition_to(next),
            "order {} cannot move from {:?} to {:?}",
            self.id,
            self.status,
            next
        );
        self.status = next;
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Occupied(Order),
    Vacant { next_free: Option<SlotId> },
}

/// Slab of order records with a free list.
#[derive(Debug, Clone, Default)]
pub struct OrderArena {
    entries: Vec<Entry>,
    free_head: Option<SlotId>,
    len: usize,
}

impl OrderArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Stores an order, reusing a vacated slot when one exists.
    pub fn insert(&mut self, order: Order) -> SlotId {
        self.len += 1;
        match self.free_head {
            Some(slot) => {
                let Entry::Vacant { next_free } = &self.entries[slot] else {
                    panic!("free list points at occupied slot {}", slot);
                };
                self.free_head = *next_free;
                self.entries[slot] = Entry::Occupied(order);
                slot
            }
            None => {
                self.entries.push(Entry::Occupied(order));
                self.entries.len() - 1
            }
        }
    }

    /// # Panics
    /// If the slot is vacant.
    #[inline]
    pub fn get(&self, slot: SlotId) -> &Order {
        match self.entries.get(slot) {
            Some(Entry::Occupied(order)) => order,
            _ => panic!("order slot {} is vacant", slot),
        }
    }

    /// # Panics
    /// If the slot is vacant.
    #[inline]
    pub fn get_mut(&mut self, slot: SlotId) -> &mut Order {
        match self.entries.get_mut(slot) {
            Some(Entry::Occupied(order)) => order,
            _ => panic!("order slot {} is vacant", slot),
        }
    }

    /// Frees a slot and hands back its order.
    pub fn remove(&mut self, slot: SlotId) -> Order {
        let vacant = Entry::Vacant { next_free: self.free_head };
        match std::mem::replace(&mut self.entries[slot], vacant) {
            Entry::Occupied(order) => {
                self.free_head = Some(slot);
                self.len -= 1;
                order
            }
            Entry::Vacant { next_free } => {
                // restore before reporting
                self.entries[slot] = Entry::Vacant { next_free };
                panic!("order slot {} is already vacant", slot);
            }
        }
    }

    /// Occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_head = None;
        self.len = 0;
    }
}
