/// Low-level collections used by the order book.
///
/// - FastBitmap: per-side tick occupancy with block-skipping neighbour search

pub mod fast_bitmap;

pub use fast_bitmap::FastBitmap;
