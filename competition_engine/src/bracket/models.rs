//! Bracket request and response types.

use serde::{Deserialize, Serialize};

use crate::models::{BracketMode, Round, Tie, TournamentId, TournamentTeam, TournamentTeamId};

/// Parameters of a bracket generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketRequest {
    pub tournament_id: TournamentId,
    pub mode: BracketMode,
    /// Legs per tie, at least 1
    pub legs: u32,
    pub include_third_place: bool,
    /// Create one match per leg for first-round ties
    pub materialize_matches: bool,
    /// First-round pairs, required in explicit mode
    pub pairs: Option<Vec<(TournamentTeamId, TournamentTeamId)>>,
    /// Replace rounds, ties and matches of the generated stages
    pub reset: bool,
}

impl BracketRequest {
    /// Single-leg seeded bracket with materialized matches
    pub fn seeded(tournament_id: TournamentId) -> Self {
        Self {
            tournament_id,
            mode: BracketMode::Seeded,
            legs: 1,
            include_third_place: false,
            materialize_matches: true,
            pairs: None,
            reset: false,
        }
    }

    pub fn random(tournament_id: TournamentId) -> Self {
        Self {
            mode: BracketMode::Random,
            ..Self::seeded(tournament_id)
        }
    }

    pub fn explicit(
        tournament_id: TournamentId,
        pairs: Vec<(TournamentTeamId, TournamentTeamId)>,
    ) -> Self {
        Self {
            mode: BracketMode::Explicit,
            pairs: Some(pairs),
            ..Self::seeded(tournament_id)
        }
    }

    pub fn with_legs(mut self, legs: u32) -> Self {
        self.legs = legs;
        self
    }

    pub fn with_third_place(mut self, include: bool) -> Self {
        self.include_third_place = include;
        self
    }

    pub fn with_matches(mut self, materialize: bool) -> Self {
        self.materialize_matches = materialize;
        self
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

/// Tie with its round and teams resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieView {
    pub tie: Tie,
    pub round: Round,
    pub side1: Option<TournamentTeam>,
    pub side2: Option<TournamentTeam>,
}
