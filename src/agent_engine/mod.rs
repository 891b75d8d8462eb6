pub mod classifier;
pub mod engine;
pub mod heuristics;
pub mod history;
pub mod resolver;
pub mod state;
