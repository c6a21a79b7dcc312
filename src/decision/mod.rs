pub mod engine;
pub mod types;

pub use engine::{filter_stage, ConfluenceThresholds, DecisionEngine, FilterVerdict};
pub use types::{Ack, FinalDecision};
