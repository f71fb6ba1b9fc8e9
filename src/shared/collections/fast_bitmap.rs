/// Occupancy bitmap over price ticks.
///
/// One bit per tick, packed into `u64` blocks. Neighbour searches skip whole
/// empty blocks and use `leading_zeros`/`trailing_zeros` inside a block, so moving
/// a best-price cursor to the next occupied tick costs O(distance / 64).
///
/// Block storage is created with `vec![0; n]`, which the allocator hands out as
/// zeroed pages; a 10M-tick bitmap only touches memory where bits get set.

#[derive(Clone, Debug)]
pub struct FastBitmap {
    blocks: Vec<u64>,
    len: usize,
}

impl FastBitmap {
    pub fn new(len: usize) -> Self {
        Self {
            blocks: vec![0u64; len.div_ceil(64)],
            len,
        }
    }

    #[inline]
    pub fn insert(&mut self, index: usize) {
        debug_assert!(index < self.len, "bit {} out of range {}", index, self.len);
        self.blocks[index / 64] |= 1u64 << (index % 64);
    }

    #[inline]
    pub fn remove(&mut self, index: usize) {
        debug_assert!(index < self.len, "bit {} out of range {}", index, self.len);
        self.blocks[index / 64] &= !(1u64 << (index % 64));
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.blocks[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Lowest set bit.
    pub fn first(&self) -> Option<usize> {
        self.next_at_or_after(0)
    }

    /// Highest set bit.
    pub fn last(&self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.prev_at_or_before(self.len - 1)
    }

    /// Lowest set bit strictly above `index`.
    #[inline]
    pub fn next_after(&self, index: usize) -> Option<usize> {
        self.next_at_or_after(index.checked_add(1)?)
    }

    /// Highest set bit strictly below `index`.
    #[inline]
    pub fn prev_before(&self, index: usize) -> Option<usize> {
        self.prev_at_or_before(index.checked_sub(1)?)
    }

    fn next_at_or_after(&self, start: usize) -> Option<usize> {
        if start >= self.len {
            return None;
        }
        let mut block_idx = start / 64;
        // mask off bits below `start` in its own block
        let mut block = self.blocks[block_idx] & (u64::MAX << (start % 64));
        loop {
            if block != 0 {
                let index = block_idx * 64 + block.trailing_zeros() as usize;
                return (index < self.len).then_some(index);
            }
            block_idx += 1;
            if block_idx >= self.blocks.len() {
                return None;
            }
            block = self.blocks[block_idx];
        }
    }

    fn prev_at_or_before(&self, start: usize) -> Option<usize> {
        let start = start.min(self.len.checked_sub(1)?);
        let mut block_idx = start / 64;
        let keep = start % 64;
        let mut block = self.blocks[block_idx] & (u64::MAX >> (63 - keep));
        loop {
            if block != 0 {
                return Some(block_idx * 64 + 63 - block.leading_zeros() as usize);
            }
            if block_idx == 0 {
                return None;
            }
            block_idx -= 1;
            block = self.blocks[block_idx];
        }
    }

    /// Whether any bit in `[start, end)` is set.
    pub fn any_in(&self, start: usize, end: usize) -> bool {
        let end = end.min(self.len);
        start < end && self.next_at_or_after(start).is_some_and(|i| i < end)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&b| b == 0)
    }

    pub fn count_ones(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.first(), move |&i| self.next_after(i))
    }

    pub fn clear(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_contains() {
        let mut bitmap = FastBitmap::new(130);
        assert!(bitmap.is_empty());
        assert_eq!(bitmap.first(), None);
        assert_eq!(bitmap.last(), None);

        bitmap.insert(0);
        bitmap.insert(63);
        bitmap.insert(64);
        bitmap.insert(129);
        assert!(bitmap.contains(0));
        assert!(bitmap.contains(63));
        assert!(bitmap.contains(64));
        assert!(bitmap.contains(129));
        assert!(!bitmap.contains(1));
        assert!(!bitmap.contains(500));
        assert_eq!(bitmap.first(), Some(0));
        assert_eq!(bitmap.last(), Some(129));

        bitmap.remove(129);
        assert_eq!(bitmap.last(), Some(64));
        assert_eq!(bitmap.count_ones(), 3);
    }

    #[test]
    fn test_neighbour_search() {
        let mut bitmap = FastBitmap::new(200);
        for i in [10, 50, 100, 150] {
            bitmap.insert(i);
        }

        assert_eq!(bitmap.next_after(0), Some(10));
        assert_eq!(bitmap.next_after(10), Some(50));
        assert_eq!(bitmap.next_after(100), Some(150));
        assert_eq!(bitmap.next_after(150), None);
        assert_eq!(bitmap.next_after(199), None);

        assert_eq!(bitmap.prev_before(150), Some(100));
        assert_eq!(bitmap.prev_before(51), Some(50));
        assert_eq!(bitmap.prev_before(10), None);
        assert_eq!(bitmap.prev_before(0), None);

        assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![10, 50, 100, 150]);
    }

    #[test]
    fn test_block_boundaries() {
        let mut bitmap = FastBitmap::new(256);
        bitmap.insert(63);
        bitmap.insert(128);
        assert_eq!(bitmap.next_after(63), Some(128));
        assert_eq!(bitmap.prev_before(128), Some(63));
        assert_eq!(bitmap.prev_before(64), Some(63));
        assert_eq!(bitmap.next_after(62), Some(63));
    }

    #[test]
    fn test_any_in() {
        let mut bitmap = FastBitmap::new(4096);
        bitmap.insert(2048);
        assert!(!bitmap.any_in(0, 1024));
        assert!(!bitmap.any_in(1024, 2048));
        assert!(bitmap.any_in(2048, 3072));
        assert!(!bitmap.any_in(3072, 8192));
    }

    #[test]
    fn test_large_sparse_bitmap() {
        let mut bitmap = FastBitmap::new(10_000_000);
        bitmap.insert(5);
        bitmap.insert(9_999_999);
        assert_eq!(bitmap.first(), Some(5));
        assert_eq!(bitmap.last(), Some(9_999_999));
        assert_eq!(bitmap.next_after(5), Some(9_999_999));
        assert_eq!(bitmap.prev_before(9_999_999), Some(5));
    }
}
