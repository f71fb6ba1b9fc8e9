/// Application Layer - Services
///
/// Runs the domain's order books on tokio tasks and routes requests to them.
/// Depends on the domain layer; knows nothing about how requests arrive.
///
/// ## Modules
/// - `services`: `MatchingEngine` dispatcher and per-book `BookLane`

pub mod services;

pub use services::{EngineConfig, MatchingEngine};
