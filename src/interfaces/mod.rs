/// Interfaces Layer - External Entry Points
///
/// ## Modules
/// - `cli`: command-line replay driver (main.rs logic)

pub mod cli;
