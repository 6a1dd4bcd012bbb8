//! # Competition Engine
//!
//! Scheduling and result logic for team tournaments: knockout brackets,
//! round-robin groups, multi-leg ties, card discipline and match roster
//! publication.
//!
//! ## Architecture
//!
//! Every component talks to a [`CompetitionStore`], which holds entities
//! keyed by id and applies each composite write atomically. Components
//! validate a request completely before handing the store a finished plan.
//!
//! - [`bracket`]: seeded, random or explicit single-elimination brackets
//! - [`schedule`]: circle-method round-robin fixtures
//! - [`tie`]: aggregate and winner of multi-leg ties
//! - [`discipline`]: card accumulation, suspensions and their service
//! - [`roster`]: rosters, captains and per-match publication
//! - [`matches`]: result reporting that drives the above
//! - [`engine`]: facade serializing operations per tournament
//!
//! Changes are announced through a fire-and-forget [`Notifier`].
//!
//! ## Example
//!
//! ```
//! use competition_engine::{BracketRequest, CompetitionEngine, MemoryStore, NoopNotifier};
//! use competition_engine::models::{DisciplinePolicy, TeamFormat};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let cup = store.add_tournament("Spring Cup", TeamFormat::FiveASide, DisciplinePolicy::default());
//! for seed in 1..=4 {
//!     store.enroll_team(cup.id, &format!("Team {seed}"), Some(seed));
//! }
//!
//! let engine = CompetitionEngine::new(Arc::new(store), Arc::new(NoopNotifier));
//! let ties = engine.generate_bracket(&BracketRequest::seeded(cup.id)).await.unwrap();
//! assert_eq!(ties.len(), 3);
//! # }
//! ```

pub mod bracket;
pub mod db;
pub mod discipline;
pub mod engine;
pub mod errors;
pub mod matches;
pub mod models;
pub mod notify;
pub mod roster;
pub mod schedule;
pub mod tie;

pub use bracket::{BracketGenerator, BracketRequest, TieView};
pub use db::{CompetitionStore, Database, DatabaseConfig, MemoryStore, PgCompetitionStore};
pub use discipline::DisciplineTracker;
pub use engine::{CompetitionEngine, TournamentLocks};
pub use errors::{CompetitionError, CompetitionResult, ErrorKind};
pub use matches::{EventReport, MatchReport, MatchReporter};
pub use notify::{BroadcastNotifier, LogNotifier, NoopNotifier, Notifier};
pub use roster::{PublishRequest, RosterPublisher, RosterRegistry, TeamRoster};
pub use schedule::{RoundRobinScheduler, ScheduleRequest, circle_pairings};
pub use tie::{TieAggregator, TieResult};
