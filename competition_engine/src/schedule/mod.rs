//! Round-robin fixtures for groups.

pub mod circle;
pub mod scheduler;

pub use circle::{circle_pairings, fixture_count};
pub use scheduler::{RoundRobinScheduler, ScheduleRequest};
