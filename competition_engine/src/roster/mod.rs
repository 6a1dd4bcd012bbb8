//! Team rosters and per-match roster publication.
//!
//! [`RosterRegistry`] answers which players a team has registered, their
//! roles and the captain. [`RosterPublisher`] copies a team's eligible
//! players into a match, leaving out anyone serving a suspension.

pub mod publisher;
pub mod registry;

pub use publisher::{PublishRequest, RosterPublisher};
pub use registry::{RosterRegistry, TeamRoster};
