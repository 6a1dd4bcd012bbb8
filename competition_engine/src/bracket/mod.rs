//! Single-elimination bracket generation.
//!
//! A bracket is laid out from the opening stage implied by the team count
//! down to the final:
//! - First-round ties are filled from the chosen pairing mode
//! - Later stages get empty placeholder ties, halving each stage
//! - An optional third-place tie sits in its own round
//!
//! Winners are not advanced into placeholder ties.
//!
//! ## Example
//!
//! ```no_run
//! use competition_engine::bracket::{BracketGenerator, BracketRequest};
//! use competition_engine::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let generator = BracketGenerator::new(Arc::new(db.store()));
//!
//!     let ties = generator
//!         .generate_bracket(&BracketRequest::seeded(1).with_legs(2))
//!         .await?;
//!     println!("Bracket has {} ties", ties.len());
//!
//!     Ok(())
//! }
//! ```

pub mod generator;
pub mod models;

pub use generator::{BracketGenerator, pair_ranked, seeded_order};
pub use models::{BracketRequest, TieView};
