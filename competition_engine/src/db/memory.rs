//! In-memory arena implementation of [`CompetitionStore`].
//!
//! Entities live in id-keyed maps. Writes run against a copy of the arena
//! which replaces the live one only when the whole operation succeeded.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::repository::{
    BracketPlan, CompetitionStore, MatchTransition, MatchUpdate, NewLeg, NewMatch,
    NewMatchEvent, NewRosterItem, NewSuspension, NewTie,
};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{
    Aggregate, DisciplinePolicy, Group, GroupId, Match, MatchEvent, MatchId, MatchParticipant,
    MatchStatus, RosterItem, RosterItemId, RosterRole, Round, RoundId, RoundKind, Stage,
    Suspension, SuspensionId, TeamFormat, Tie, TieId, Tournament, TournamentId, TournamentTeam,
    TournamentTeamId,
};

#[derive(Debug, Clone, Default)]
struct Arena {
    next_id: i64,
    tournaments: BTreeMap<TournamentId, Tournament>,
    teams: BTreeMap<TournamentTeamId, TournamentTeam>,
    roster: BTreeMap<RosterItemId, RosterItem>,
    rounds: BTreeMap<RoundId, Round>,
    groups: BTreeMap<GroupId, Group>,
    ties: BTreeMap<TieId, Tie>,
    matches: BTreeMap<MatchId, Match>,
    events: BTreeMap<i64, MatchEvent>,
    suspensions: BTreeMap<SuspensionId, Suspension>,
    participants: Vec<MatchParticipant>,
}

impl Arena {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Whether any event, suspension or published lineup refers to the item
    fn has_history(&self, roster_item_id: RosterItemId) -> bool {
        self.events.values().any(|e| e.roster_item_id == roster_item_id)
            || self
                .suspensions
                .values()
                .any(|s| s.roster_item_id == roster_item_id)
            || self
                .participants
                .iter()
                .any(|p| p.roster_item_id == roster_item_id)
    }

    /// Delete matches along with everything recorded against them
    fn remove_matches(&mut self, ids: &BTreeSet<MatchId>) {
        if ids.is_empty() {
            return;
        }
        self.matches.retain(|id, _| !ids.contains(id));
        self.events.retain(|_, e| !ids.contains(&e.match_id));
        self.suspensions.retain(|_, s| !ids.contains(&s.match_id));
        for suspension in self.suspensions.values_mut() {
            suspension.served_match_ids.retain(|m| !ids.contains(m));
        }
        self.participants.retain(|p| !ids.contains(&p.match_id));
    }

    fn find_or_create_round(&mut self, tournament_id: TournamentId, stage: Stage) -> RoundId {
        let existing = self
            .rounds
            .values()
            .find(|r| r.tournament_id == tournament_id && r.stage() == Some(stage))
            .map(|r| r.id);
        if let Some(id) = existing {
            return id;
        }

        let id = self.next_id();
        self.rounds.insert(
            id,
            Round {
                id,
                tournament_id,
                name: stage.display_name().to_string(),
                kind: RoundKind::Elimination(stage),
            },
        );
        id
    }

    fn insert_tie(&mut self, tournament_id: TournamentId, round_id: RoundId, tie: &NewTie) {
        let tie_id = self.next_id();
        self.ties.insert(
            tie_id,
            Tie {
                id: tie_id,
                round_id,
                side1: tie.side1,
                side2: tie.side2,
                legs: tie.legs,
                aggregate: None,
                winner: None,
            },
        );

        for NewLeg {
            leg,
            team1_id,
            team2_id,
        } in &tie.matches
        {
            let match_id = self.next_id();
            self.matches.insert(
                match_id,
                Match {
                    id: match_id,
                    tournament_id,
                    round_id: Some(round_id),
                    group_id: None,
                    tie_id: Some(tie_id),
                    leg: Some(*leg),
                    matchday: None,
                    team1_id: *team1_id,
                    team2_id: *team2_id,
                    scheduled_at: None,
                    status: MatchStatus::Scheduled,
                    score1: 0,
                    score2: 0,
                },
            );
        }
    }

    fn insert_suspension(&mut self, new: &NewSuspension) -> Suspension {
        let id = self.next_id();
        let suspension = Suspension {
            id,
            tournament_id: new.tournament_id,
            roster_item_id: new.roster_item_id,
            reason: new.reason,
            match_id: new.match_id,
            starts_after: new.starts_after,
            remaining_games: new.remaining_games,
            active: new.active,
            served_match_ids: new.served_match_ids.clone(),
        };
        self.suspensions.insert(id, suspension.clone());
        suspension
    }
}

/// Arena-backed store for tests and embedded use
#[derive(Clone, Default)]
pub struct MemoryStore {
    arena: Arc<Mutex<Arena>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write fail at commit time, leaving state untouched
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        // A poisoned arena still holds the last committed state.
        self.arena.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `op` against a copy of the arena and commit it on success
    fn write<T>(
        &self,
        op: impl FnOnce(&mut Arena) -> CompetitionResult<T>,
    ) -> CompetitionResult<T> {
        let mut guard = self.lock();
        let mut draft = guard.clone();
        let out = op(&mut draft)?;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CompetitionError::TransactionFailed(
                "injected commit failure".to_string(),
            ));
        }
        *guard = draft;
        Ok(out)
    }

    fn read<T>(&self, op: impl FnOnce(&Arena) -> T) -> CompetitionResult<T> {
        Ok(op(&self.lock()))
    }

    pub fn add_tournament(
        &self,
        name: &str,
        team_format: TeamFormat,
        discipline: DisciplinePolicy,
    ) -> Tournament {
        let mut arena = self.lock();
        let id = arena.next_id();
        let tournament = Tournament {
            id,
            name: name.to_string(),
            team_format,
            discipline,
        };
        arena.tournaments.insert(id, tournament.clone());
        tournament
    }

    pub fn enroll_team(
        &self,
        tournament_id: TournamentId,
        name: &str,
        seed: Option<u32>,
    ) -> TournamentTeam {
        let mut arena = self.lock();
        let id = arena.next_id();
        let team = TournamentTeam {
            id,
            tournament_id,
            team_id: id,
            name: name.to_string(),
            seed,
            captain_id: None,
        };
        arena.teams.insert(id, team.clone());
        team
    }

    pub fn add_roster_item(
        &self,
        team_id: TournamentTeamId,
        number: u32,
        role: RosterRole,
    ) -> RosterItem {
        let mut arena = self.lock();
        let id = arena.next_id();
        let item = RosterItem {
            id,
            tournament_team_id: team_id,
            player_id: id,
            number: Some(number),
            position: None,
            role,
            notes: None,
        };
        arena.roster.insert(id, item.clone());
        item
    }

    pub fn add_round(&self, tournament_id: TournamentId, name: &str, kind: RoundKind) -> Round {
        let mut arena = self.lock();
        let id = arena.next_id();
        let round = Round {
            id,
            tournament_id,
            name: name.to_string(),
            kind,
        };
        arena.rounds.insert(id, round.clone());
        round
    }

    pub fn add_group(
        &self,
        tournament_id: TournamentId,
        round_id: Option<RoundId>,
        name: &str,
        team_ids: Vec<TournamentTeamId>,
    ) -> Group {
        let mut arena = self.lock();
        let id = arena.next_id();
        let group = Group {
            id,
            tournament_id,
            round_id,
            name: name.to_string(),
            team_ids,
        };
        arena.groups.insert(id, group.clone());
        group
    }
}

#[async_trait]
impl CompetitionStore for MemoryStore {
    async fn tournament(&self, id: TournamentId) -> CompetitionResult<Option<Tournament>> {
        self.read(|a| a.tournaments.get(&id).cloned())
    }

    async fn tournament_teams(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<TournamentTeam>> {
        self.read(|a| {
            a.teams
                .values()
                .filter(|t| t.tournament_id == tournament_id)
                .cloned()
                .collect()
        })
    }

    async fn tournament_team(
        &self,
        id: TournamentTeamId,
    ) -> CompetitionResult<Option<TournamentTeam>> {
        self.read(|a| a.teams.get(&id).cloned())
    }

    async fn roster(&self, team_id: TournamentTeamId) -> CompetitionResult<Vec<RosterItem>> {
        self.read(|a| {
            a.roster
                .values()
                .filter(|r| r.tournament_team_id == team_id)
                .cloned()
                .collect()
        })
    }

    async fn roster_item(&self, id: RosterItemId) -> CompetitionResult<Option<RosterItem>> {
        self.read(|a| a.roster.get(&id).cloned())
    }

    async fn rounds(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Round>> {
        self.read(|a| {
            a.rounds
                .values()
                .filter(|r| r.tournament_id == tournament_id)
                .cloned()
                .collect()
        })
    }

    async fn round(&self, id: RoundId) -> CompetitionResult<Option<Round>> {
        self.read(|a| a.rounds.get(&id).cloned())
    }

    async fn group(&self, id: GroupId) -> CompetitionResult<Option<Group>> {
        self.read(|a| a.groups.get(&id).cloned())
    }

    async fn ties(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Tie>> {
        self.read(|a| {
            let mut ties: Vec<Tie> = a
                .ties
                .values()
                .filter(|t| {
                    a.rounds
                        .get(&t.round_id)
                        .is_some_and(|r| r.tournament_id == tournament_id)
                })
                .cloned()
                .collect();
            ties.sort_by_key(|t| (t.round_id, t.id));
            ties
        })
    }

    async fn tie(&self, id: TieId) -> CompetitionResult<Option<Tie>> {
        self.read(|a| a.ties.get(&id).cloned())
    }

    async fn get_match(&self, id: MatchId) -> CompetitionResult<Option<Match>> {
        self.read(|a| a.matches.get(&id).cloned())
    }

    async fn matches(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Match>> {
        self.read(|a| {
            a.matches
                .values()
                .filter(|m| m.tournament_id == tournament_id)
                .cloned()
                .collect()
        })
    }

    async fn tie_matches(&self, tie_id: TieId) -> CompetitionResult<Vec<Match>> {
        self.read(|a| {
            let mut legs: Vec<Match> = a
                .matches
                .values()
                .filter(|m| m.tie_id == Some(tie_id))
                .cloned()
                .collect();
            legs.sort_by_key(|m| (m.leg, m.id));
            legs
        })
    }

    async fn match_events(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<MatchEvent>> {
        self.read(|a| {
            a.events
                .values()
                .filter(|e| {
                    a.matches
                        .get(&e.match_id)
                        .is_some_and(|m| m.tournament_id == tournament_id)
                })
                .cloned()
                .collect()
        })
    }

    async fn suspensions(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Suspension>> {
        self.read(|a| {
            a.suspensions
                .values()
                .filter(|s| s.tournament_id == tournament_id)
                .cloned()
                .collect()
        })
    }

    async fn participants(&self, match_id: MatchId) -> CompetitionResult<Vec<MatchParticipant>> {
        self.read(|a| {
            let mut entries: Vec<MatchParticipant> = a
                .participants
                .iter()
                .filter(|p| p.match_id == match_id)
                .cloned()
                .collect();
            entries.sort_by_key(|p| (p.tournament_team_id, p.sort_order));
            entries
        })
    }

    async fn apply_bracket(&self, plan: &BracketPlan) -> CompetitionResult<()> {
        self.write(|a| {
            if plan.reset {
                let stages = plan.touched_stages();
                let round_ids: BTreeSet<RoundId> = a
                    .rounds
                    .values()
                    .filter(|r| {
                        r.tournament_id == plan.tournament_id
                            && r.stage().is_some_and(|s| stages.contains(&s))
                    })
                    .map(|r| r.id)
                    .collect();
                let tie_ids: BTreeSet<TieId> = a
                    .ties
                    .values()
                    .filter(|t| round_ids.contains(&t.round_id))
                    .map(|t| t.id)
                    .collect();

                let match_ids: BTreeSet<MatchId> = a
                    .matches
                    .values()
                    .filter(|m| {
                        m.tie_id.is_some_and(|t| tie_ids.contains(&t))
                            || m.round_id.is_some_and(|r| round_ids.contains(&r))
                    })
                    .map(|m| m.id)
                    .collect();
                a.remove_matches(&match_ids);
                for group in a.groups.values_mut() {
                    if group.round_id.is_some_and(|r| round_ids.contains(&r)) {
                        group.round_id = None;
                    }
                }
                a.ties.retain(|id, _| !tie_ids.contains(id));
                a.rounds.retain(|id, _| !round_ids.contains(id));
            }

            for stage_plan in &plan.stages {
                let round_id = a.find_or_create_round(plan.tournament_id, stage_plan.stage);
                for tie in &stage_plan.ties {
                    a.insert_tie(plan.tournament_id, round_id, tie);
                }
            }

            if let Some(tie) = &plan.third_place {
                let round_id = a.find_or_create_round(plan.tournament_id, Stage::ThirdPlace);
                if !a.ties.values().any(|t| t.round_id == round_id) {
                    a.insert_tie(plan.tournament_id, round_id, tie);
                }
            }

            Ok(())
        })
    }

    async fn insert_matches(&self, matches: &[NewMatch]) -> CompetitionResult<Vec<MatchId>> {
        self.write(|a| {
            let mut ids = Vec::with_capacity(matches.len());
            for new in matches {
                let id = a.next_id();
                a.matches.insert(
                    id,
                    Match {
                        id,
                        tournament_id: new.tournament_id,
                        round_id: new.round_id,
                        group_id: new.group_id,
                        tie_id: None,
                        leg: None,
                        matchday: new.matchday,
                        team1_id: new.team1_id,
                        team2_id: new.team2_id,
                        scheduled_at: new.scheduled_at,
                        status: MatchStatus::Scheduled,
                        score1: 0,
                        score2: 0,
                    },
                );
                ids.push(id);
            }
            Ok(ids)
        })
    }

    async fn update_match(
        &self,
        id: MatchId,
        update: MatchUpdate,
    ) -> CompetitionResult<MatchTransition> {
        update.validate()?;
        self.write(|a| {
            let fixture = a
                .matches
                .get_mut(&id)
                .ok_or(CompetitionError::MatchNotFound(id))?;
            let previous = fixture.status;
            if !previous.can_transition_to(update.status) {
                return Err(CompetitionError::InvalidTransition {
                    from: previous,
                    to: update.status,
                });
            }
            fixture.status = update.status;
            fixture.score1 = update.score1;
            fixture.score2 = update.score2;
            Ok(MatchTransition {
                previous,
                current: fixture.clone(),
            })
        })
    }

    async fn save_tie_result(
        &self,
        id: TieId,
        aggregate: Aggregate,
        winner: Option<TournamentTeamId>,
    ) -> CompetitionResult<()> {
        self.write(|a| {
            let tie = a.ties.get_mut(&id).ok_or(CompetitionError::TieNotFound(id))?;
            tie.aggregate = Some(aggregate);
            tie.winner = winner;
            Ok(())
        })
    }

    async fn insert_event(&self, event: &NewMatchEvent) -> CompetitionResult<MatchEvent> {
        self.write(|a| {
            let id = a.next_id();
            let stored = MatchEvent {
                id,
                match_id: event.match_id,
                tournament_team_id: event.tournament_team_id,
                roster_item_id: event.roster_item_id,
                kind: event.kind,
                minute: event.minute,
                created_at: Utc::now(),
            };
            a.events.insert(id, stored.clone());
            Ok(stored)
        })
    }

    async fn insert_suspension(
        &self,
        suspension: &NewSuspension,
    ) -> CompetitionResult<Suspension> {
        self.write(|a| Ok(a.insert_suspension(suspension)))
    }

    async fn serve_suspensions(
        &self,
        match_id: MatchId,
        suspension_ids: &[SuspensionId],
    ) -> CompetitionResult<Vec<Suspension>> {
        self.write(|a| {
            let mut changed = Vec::new();
            for id in suspension_ids {
                let Some(suspension) = a.suspensions.get_mut(id) else {
                    continue;
                };
                if suspension.remaining_games == 0
                    || !suspension.served_match_ids.insert(match_id)
                {
                    continue;
                }
                suspension.remaining_games -= 1;
                if suspension.remaining_games == 0 {
                    suspension.active = false;
                }
                changed.push(suspension.clone());
            }
            Ok(changed)
        })
    }

    async fn replace_suspensions(
        &self,
        tournament_id: TournamentId,
        suspensions: &[NewSuspension],
    ) -> CompetitionResult<Vec<Suspension>> {
        self.write(|a| {
            a.suspensions.retain(|_, s| s.tournament_id != tournament_id);
            Ok(suspensions
                .iter()
                .map(|new| a.insert_suspension(new))
                .collect())
        })
    }

    async fn replace_participants(
        &self,
        match_id: MatchId,
        team_id: TournamentTeamId,
        entries: &[MatchParticipant],
        reset: bool,
    ) -> CompetitionResult<()> {
        self.write(|a| {
            if reset {
                a.participants
                    .retain(|p| !(p.match_id == match_id && p.tournament_team_id == team_id));
            }
            for entry in entries {
                let present = a.participants.iter().any(|p| {
                    p.match_id == match_id && p.roster_item_id == entry.roster_item_id
                });
                if !present {
                    a.participants.push(entry.clone());
                }
            }
            Ok(())
        })
    }

    async fn replace_roster(
        &self,
        team_id: TournamentTeamId,
        items: &[NewRosterItem],
        captain_player_id: Option<i64>,
    ) -> CompetitionResult<Vec<RosterItem>> {
        self.write(|a| {
            if !a.teams.contains_key(&team_id) {
                return Err(CompetitionError::TeamNotFound(team_id));
            }
            let kept: BTreeSet<i64> = items.iter().map(|i| i.player_id).collect();
            let dropped_with_history = a
                .roster
                .values()
                .filter(|r| r.tournament_team_id == team_id && !kept.contains(&r.player_id))
                .find(|r| a.has_history(r.id));
            if let Some(item) = dropped_with_history {
                return Err(CompetitionError::PlayerHasHistory {
                    player: item.player_id,
                    roster_item: item.id,
                });
            }
            a.roster
                .retain(|_, r| r.tournament_team_id != team_id || kept.contains(&r.player_id));

            let mut roster = Vec::with_capacity(items.len());
            for new in items {
                let existing = a
                    .roster
                    .values()
                    .find(|r| r.tournament_team_id == team_id && r.player_id == new.player_id)
                    .map(|r| r.id);
                let id = match existing {
                    Some(id) => id,
                    None => a.next_id(),
                };
                let item = RosterItem {
                    id,
                    tournament_team_id: team_id,
                    player_id: new.player_id,
                    number: new.number,
                    position: new.position.clone(),
                    role: new.role,
                    notes: new.notes.clone(),
                };
                a.roster.insert(id, item.clone());
                roster.push(item);
            }
            roster.sort_by_key(|r| r.id);

            let captain_id = captain_player_id
                .and_then(|player| roster.iter().find(|r| r.player_id == player))
                .map(|r| r.id);
            if let Some(team) = a.teams.get_mut(&team_id) {
                team.captain_id = captain_id;
            }
            Ok(roster)
        })
    }

    async fn set_captain(
        &self,
        team_id: TournamentTeamId,
        roster_item_id: Option<RosterItemId>,
    ) -> CompetitionResult<()> {
        self.write(|a| {
            let team = a
                .teams
                .get_mut(&team_id)
                .ok_or(CompetitionError::TeamNotFound(team_id))?;
            team.captain_id = roster_item_id;
            Ok(())
        })
    }
}
