/// Application Services
///
/// - `book_lane`: the task that owns one order book and applies its requests
/// - `engine`: the dispatcher that registers books and routes requests to them

pub mod book_lane;
pub mod engine;

pub use book_lane::{BookCommand, BookLane, LaneState, LaneStatus};
pub use engine::{BookLayout, EngineConfig, MatchingEngine, QueuePolicy};
