/// Domain Layer - OrderBook Module
///
/// One `OrderBook` per trading pair, generic over where its price points live.
///
/// ## Layouts
/// - `TickLadder`: dense tick-indexed array with lazily allocated pages and
///   per-side occupancy bitmaps. The default.
/// - `BTreeLadder`: ordered map per side, for sparse books over wide ranges.
///
/// Both run the same matching code through the `PriceLadder` trait.

pub mod book;
pub mod btree;
pub mod price_point;
pub mod tick_based;
pub mod traits;

pub use book::{Actions, BookSnapshot, OrderBook, PriceLevelSnapshot, RestingOrder};
pub use btree::BTreeLadder;
pub use price_point::PricePoint;
pub use tick_based::TickLadder;
pub use traits::PriceLadder;
