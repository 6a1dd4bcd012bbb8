//! Bracket generator: validates a request into a plan, then writes it.

use log::{debug, info};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::models::{BracketRequest, TieView};
use crate::db::repository::{BracketPlan, CompetitionStore, NewLeg, NewTie, StagePlan};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{BracketMode, Stage, TournamentId, TournamentTeam, TournamentTeamId};

/// Sort teams by seed ascending, unseeded last, then by name
pub fn seeded_order(teams: &mut [TournamentTeam]) {
    teams.sort_by(|a, b| {
        (a.seed.is_none(), a.seed, &a.name, a.id).cmp(&(b.seed.is_none(), b.seed, &b.name, b.id))
    });
}

/// Pair rank i with rank N+1-i (1 vs N, 2 vs N-1, ...)
pub fn pair_ranked(ranked: &[TournamentTeamId]) -> Vec<(TournamentTeamId, TournamentTeamId)> {
    let n = ranked.len();
    (0..n / 2).map(|i| (ranked[i], ranked[n - 1 - i])).collect()
}

/// Legs of a tie; odd legs are hosted by side1, even legs by side2
fn tie_legs(side1: TournamentTeamId, side2: TournamentTeamId, legs: u32) -> Vec<NewLeg> {
    (1..=legs)
        .map(|leg| {
            let (team1_id, team2_id) = if leg % 2 == 1 {
                (side1, side2)
            } else {
                (side2, side1)
            };
            NewLeg {
                leg,
                team1_id,
                team2_id,
            }
        })
        .collect()
}

fn shuffled(mut ids: Vec<TournamentTeamId>) -> Vec<TournamentTeamId> {
    ids.shuffle(&mut rand::rng());
    ids
}

/// Check explicit pairs against the enrolled teams
fn validate_explicit(
    tournament_id: TournamentId,
    teams: &[TournamentTeam],
    pairs: &[(TournamentTeamId, TournamentTeamId)],
) -> CompetitionResult<()> {
    let enrolled: HashSet<TournamentTeamId> = teams.iter().map(|t| t.id).collect();
    let mut used = HashSet::new();

    for team in pairs.iter().flat_map(|(a, b)| [*a, *b]) {
        if !enrolled.contains(&team) {
            return Err(CompetitionError::UnregisteredTeam {
                team,
                tournament: tournament_id,
            });
        }
        if !used.insert(team) {
            return Err(CompetitionError::DuplicateTeam(team));
        }
    }

    if used.len() != enrolled.len() {
        return Err(CompetitionError::IncompletePairing {
            expected: enrolled.len(),
            actual: used.len(),
        });
    }

    Ok(())
}

/// Lay out every stage from the opening one to the final
fn build_plan(
    request: &BracketRequest,
    pairs: &[(TournamentTeamId, TournamentTeamId)],
) -> CompetitionResult<BracketPlan> {
    let team_count = pairs.len() * 2;
    let start = Stage::for_team_count(team_count)
        .ok_or(CompetitionError::InvalidTeamCount(team_count))?;

    let mut stages = Vec::with_capacity(start.ladder().len());
    let mut tie_count = pairs.len();
    for (idx, stage) in start.ladder().iter().enumerate() {
        let ties = if idx == 0 {
            pairs
                .iter()
                .map(|&(side1, side2)| NewTie {
                    side1: Some(side1),
                    side2: Some(side2),
                    legs: request.legs,
                    matches: if request.materialize_matches {
                        tie_legs(side1, side2, request.legs)
                    } else {
                        Vec::new()
                    },
                })
                .collect()
        } else {
            tie_count /= 2;
            (0..tie_count)
                .map(|_| NewTie::placeholder(request.legs))
                .collect()
        };
        stages.push(StagePlan {
            stage: *stage,
            ties,
        });
    }

    let third_place = (request.include_third_place && start != Stage::Final)
        .then(|| NewTie::placeholder(request.legs));

    Ok(BracketPlan {
        tournament_id: request.tournament_id,
        reset: request.reset,
        stages,
        third_place,
    })
}

/// Knockout bracket generator
#[derive(Clone)]
pub struct BracketGenerator {
    store: Arc<dyn CompetitionStore>,
}

impl BracketGenerator {
    pub fn new(store: Arc<dyn CompetitionStore>) -> Self {
        Self { store }
    }

    /// Generate a bracket and return every tie of the tournament.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before anything is written. A storage
    /// failure while writing leaves the previous bracket in place.
    pub async fn generate_bracket(
        &self,
        request: &BracketRequest,
    ) -> CompetitionResult<Vec<TieView>> {
        let plan = self.plan(request).await?;
        self.store.apply_bracket(&plan).await?;

        info!(
            "Generated {} bracket for tournament {}: {} stages, legs={}, reset={}",
            request.mode,
            request.tournament_id,
            plan.stages.len(),
            request.legs,
            request.reset
        );

        self.tie_views(request.tournament_id).await
    }

    /// Validate a request and turn it into a write plan
    pub async fn plan(&self, request: &BracketRequest) -> CompetitionResult<BracketPlan> {
        if request.legs == 0 {
            return Err(CompetitionError::InvalidLegs);
        }

        self.store
            .tournament(request.tournament_id)
            .await?
            .ok_or(CompetitionError::TournamentNotFound(request.tournament_id))?;

        let mut teams = self.store.tournament_teams(request.tournament_id).await?;
        if Stage::for_team_count(teams.len()).is_none() {
            return Err(CompetitionError::InvalidTeamCount(teams.len()));
        }

        let pairs = match request.mode {
            BracketMode::Seeded => {
                seeded_order(&mut teams);
                pair_ranked(&teams.iter().map(|t| t.id).collect::<Vec<_>>())
            }
            BracketMode::Random => pair_ranked(&shuffled(teams.iter().map(|t| t.id).collect())),
            BracketMode::Explicit => {
                let pairs = request
                    .pairs
                    .as_deref()
                    .ok_or(CompetitionError::MissingPairs)?;
                validate_explicit(request.tournament_id, &teams, pairs)?;
                pairs.to_vec()
            }
        };

        debug!(
            "Bracket pairs for tournament {}: {:?}",
            request.tournament_id, pairs
        );

        build_plan(request, &pairs)
    }

    /// All ties of a tournament with round and teams resolved
    pub async fn tie_views(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<TieView>> {
        let rounds: HashMap<_, _> = self
            .store
            .rounds(tournament_id)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        let teams: HashMap<_, _> = self
            .store
            .tournament_teams(tournament_id)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut views = self
            .store
            .ties(tournament_id)
            .await?
            .into_iter()
            .map(|tie| {
                let round = rounds
                    .get(&tie.round_id)
                    .cloned()
                    .ok_or(CompetitionError::RoundNotFound(tie.round_id))?;
                Ok(TieView {
                    side1: tie.side1.and_then(|id| teams.get(&id).cloned()),
                    side2: tie.side2.and_then(|id| teams.get(&id).cloned()),
                    round,
                    tie,
                })
            })
            .collect::<CompetitionResult<Vec<_>>>()?;

        views.sort_by_key(|v| (v.tie.round_id, v.tie.id));
        Ok(views)
    }
}
