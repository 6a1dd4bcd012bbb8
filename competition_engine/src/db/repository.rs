//! Persistence port for the competition engine.
//!
//! Every write method is one atomic unit: either all of its rows change or
//! none do. Components validate first and hand the store a finished plan.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{
    Aggregate, Group, GroupId, Match, MatchEvent, MatchEventKind, MatchId, MatchParticipant,
    MatchStatus, RosterItem, RosterItemId, RosterRole, Round, RoundId, Stage, Suspension,
    SuspensionId, SuspensionReason, Tie, TieId, Tournament, TournamentId, TournamentTeam,
    TournamentTeamId,
};

/// One leg to create under a new tie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLeg {
    pub leg: u32,
    pub team1_id: TournamentTeamId,
    pub team2_id: TournamentTeamId,
}

/// Tie to create, with its materialized legs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTie {
    pub side1: Option<TournamentTeamId>,
    pub side2: Option<TournamentTeamId>,
    pub legs: u32,
    pub matches: Vec<NewLeg>,
}

impl NewTie {
    pub fn placeholder(legs: u32) -> Self {
        Self {
            side1: None,
            side2: None,
            legs,
            matches: Vec::new(),
        }
    }
}

/// Ties to create under one knockout stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: Stage,
    pub ties: Vec<NewTie>,
}

/// Validated bracket ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketPlan {
    pub tournament_id: TournamentId,
    /// Delete rounds, ties and matches of the planned stages first
    pub reset: bool,
    /// Ladder stages in playing order; rounds are reused when present
    pub stages: Vec<StagePlan>,
    /// Created only when the THIRD_PLACE round holds no tie yet
    pub third_place: Option<NewTie>,
}

impl BracketPlan {
    /// Stages whose rounds this plan touches
    pub fn touched_stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self.stages.iter().map(|s| s.stage).collect();
        if self.third_place.is_some() {
            stages.push(Stage::ThirdPlace);
        }
        stages
    }
}

/// Fixture to insert outside of a bracket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub tournament_id: TournamentId,
    pub round_id: Option<RoundId>,
    pub group_id: Option<GroupId>,
    pub matchday: Option<u32>,
    pub team1_id: TournamentTeamId,
    pub team2_id: TournamentTeamId,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Result/status report for a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchUpdate {
    pub status: MatchStatus,
    pub score1: u32,
    pub score2: u32,
}

impl MatchUpdate {
    /// Largest score a store column can hold
    pub const MAX_SCORE: u32 = i32::MAX as u32;

    pub fn validate(&self) -> CompetitionResult<()> {
        match [self.score1, self.score2].into_iter().find(|s| *s > Self::MAX_SCORE) {
            Some(score) => Err(CompetitionError::ScoreOutOfRange(score)),
            None => Ok(()),
        }
    }
}

/// Outcome of [`CompetitionStore::update_match`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTransition {
    pub previous: MatchStatus,
    pub current: Match,
}

impl MatchTransition {
    /// True only on the transition into FINISHED
    pub fn finished_now(&self) -> bool {
        self.previous != MatchStatus::Finished && self.current.status == MatchStatus::Finished
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatchEvent {
    pub match_id: MatchId,
    pub tournament_team_id: TournamentTeamId,
    pub roster_item_id: RosterItemId,
    pub kind: MatchEventKind,
    pub minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSuspension {
    pub tournament_id: TournamentId,
    pub roster_item_id: RosterItemId,
    pub reason: SuspensionReason,
    pub match_id: MatchId,
    pub starts_after: DateTime<Utc>,
    pub remaining_games: u32,
    pub active: bool,
    pub served_match_ids: BTreeSet<MatchId>,
}

impl NewSuspension {
    /// Same rule as [`Suspension::applies_to`], for bans not yet stored
    pub fn applies_to(&self, fixture: &Match) -> bool {
        self.active
            && self.remaining_games > 0
            && fixture.id != self.match_id
            && fixture.is_after(self.starts_after)
    }

    /// Count `fixture` against the ban once
    pub fn serve(&mut self, fixture: MatchId) -> bool {
        if self.remaining_games == 0 || !self.served_match_ids.insert(fixture) {
            return false;
        }
        self.remaining_games -= 1;
        self.active = self.remaining_games > 0;
        true
    }
}

/// Roster entry to register; matched to existing entries by player
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewRosterItem {
    pub player_id: i64,
    pub number: Option<u32>,
    pub position: Option<String>,
    pub role: RosterRole,
    pub notes: Option<String>,
}

/// Storage operations required by the engine
#[async_trait]
pub trait CompetitionStore: Send + Sync {
    async fn tournament(&self, id: TournamentId) -> CompetitionResult<Option<Tournament>>;

    /// Teams enrolled in a tournament
    async fn tournament_teams(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<TournamentTeam>>;

    async fn tournament_team(
        &self,
        id: TournamentTeamId,
    ) -> CompetitionResult<Option<TournamentTeam>>;

    /// Roster of a team in registration order
    async fn roster(&self, team_id: TournamentTeamId) -> CompetitionResult<Vec<RosterItem>>;

    async fn roster_item(&self, id: RosterItemId) -> CompetitionResult<Option<RosterItem>>;

    /// Rounds of a tournament ordered by id
    async fn rounds(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Round>>;

    async fn round(&self, id: RoundId) -> CompetitionResult<Option<Round>>;

    async fn group(&self, id: GroupId) -> CompetitionResult<Option<Group>>;

    /// Ties of a tournament ordered by round then id
    async fn ties(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Tie>>;

    async fn tie(&self, id: TieId) -> CompetitionResult<Option<Tie>>;

    async fn get_match(&self, id: MatchId) -> CompetitionResult<Option<Match>>;

    /// Matches of a tournament ordered by id
    async fn matches(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Match>>;

    /// Legs of a tie ordered by leg number
    async fn tie_matches(&self, tie_id: TieId) -> CompetitionResult<Vec<Match>>;

    /// All events recorded in a tournament's matches ordered by id
    async fn match_events(&self, tournament_id: TournamentId)
    -> CompetitionResult<Vec<MatchEvent>>;

    async fn suspensions(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Suspension>>;

    /// Published participants of a match in sort order
    async fn participants(&self, match_id: MatchId) -> CompetitionResult<Vec<MatchParticipant>>;

    /// Write a validated bracket, optionally replacing the stages it covers.
    ///
    /// A reset deletes the covered matches together with their events,
    /// suspensions, servings and published participants.
    async fn apply_bracket(&self, plan: &BracketPlan) -> CompetitionResult<()>;

    /// Insert fixtures, returning their ids in input order
    async fn insert_matches(&self, matches: &[NewMatch]) -> CompetitionResult<Vec<MatchId>>;

    /// Apply a status/score report.
    ///
    /// Fails with `InvalidTransition` when the status would move backwards.
    async fn update_match(
        &self,
        id: MatchId,
        update: MatchUpdate,
    ) -> CompetitionResult<MatchTransition>;

    /// Store the cached aggregate and winner of a tie
    async fn save_tie_result(
        &self,
        id: TieId,
        aggregate: Aggregate,
        winner: Option<TournamentTeamId>,
    ) -> CompetitionResult<()>;

    async fn insert_event(&self, event: &NewMatchEvent) -> CompetitionResult<MatchEvent>;

    async fn insert_suspension(&self, suspension: &NewSuspension)
    -> CompetitionResult<Suspension>;

    /// Count `match_id` against each listed suspension once.
    ///
    /// Returns the suspensions that changed; a suspension that already served
    /// this match is left untouched.
    async fn serve_suspensions(
        &self,
        match_id: MatchId,
        suspension_ids: &[SuspensionId],
    ) -> CompetitionResult<Vec<Suspension>>;

    /// Delete every suspension of a tournament and insert the given ones
    async fn replace_suspensions(
        &self,
        tournament_id: TournamentId,
        suspensions: &[NewSuspension],
    ) -> CompetitionResult<Vec<Suspension>>;

    /// Write a team's published roster for a match.
    ///
    /// With `reset` prior entries of the team are replaced, otherwise entries
    /// for roster items already present are skipped.
    async fn replace_participants(
        &self,
        match_id: MatchId,
        team_id: TournamentTeamId,
        entries: &[MatchParticipant],
        reset: bool,
    ) -> CompetitionResult<()>;

    /// Replace a team's roster, keeping ids of players that stay on it
    async fn replace_roster(
        &self,
        team_id: TournamentTeamId,
        items: &[NewRosterItem],
        captain_player_id: Option<i64>,
    ) -> CompetitionResult<Vec<RosterItem>>;

    async fn set_captain(
        &self,
        team_id: TournamentTeamId,
        roster_item_id: Option<RosterItemId>,
    ) -> CompetitionResult<()>;
}
