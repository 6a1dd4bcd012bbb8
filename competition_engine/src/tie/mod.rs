//! Tie aggregation across legs.

pub mod aggregator;

pub use aggregator::{TieAggregator, TieResult, aggregate_legs, decide_winner};
