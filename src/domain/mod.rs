/// Domain Layer - Core Business Logic
///
/// Pure matching logic with no I/O. Everything here runs synchronously on the
/// thread that owns the book and can be tested in isolation.
///
/// ## Modules
/// - `order`: order records and the arena that owns them
/// - `orderbook`: price ladders and the matching book
/// - `validation`: stateless request checks

pub mod order;
pub mod orderbook;
pub mod validation;

pub use order::{Order, OrderArena};
pub use orderbook::{BookSnapshot, OrderBook};
pub use validation::{OrderValidator, ValidationError};
