//! Competition engine facade.
//!
//! Wires every component to one store and notifier and runs each mutating
//! operation under its tournament's lock, so two requests against the same
//! tournament never interleave. Different tournaments proceed in parallel.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::bracket::{BracketGenerator, BracketRequest, TieView};
use crate::db::repository::{CompetitionStore, MatchUpdate, NewMatchEvent, NewRosterItem};
use crate::db::timeouts::{LONG_OPERATION_TIMEOUT, with_deadline};
use crate::discipline::DisciplineTracker;
use crate::errors::{CompetitionError, CompetitionResult};
use crate::matches::{EventReport, MatchReport, MatchReporter};
use crate::models::{
    CardType, GroupId, MatchId, RosterItem, RosterItemId, Suspension, TieId, TournamentId,
    TournamentTeamId,
};
use crate::notify::Notifier;
use crate::roster::{PublishRequest, RosterPublisher, RosterRegistry, TeamRoster};
use crate::schedule::{RoundRobinScheduler, ScheduleRequest};
use crate::tie::{TieAggregator, TieResult};

/// Per-tournament mutual exclusion
#[derive(Default)]
pub struct TournamentLocks {
    locks: RwLock<HashMap<TournamentId, Arc<Mutex<()>>>>,
}

impl TournamentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a tournament
    pub async fn acquire(&self, tournament_id: TournamentId) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(&tournament_id).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => self
                .locks
                .write()
                .await
                .entry(tournament_id)
                .or_default()
                .clone(),
        };
        lock.lock_owned().await
    }
}

/// Entry point for every competition operation
#[derive(Clone)]
pub struct CompetitionEngine {
    store: Arc<dyn CompetitionStore>,
    locks: Arc<TournamentLocks>,
    long_operation_timeout: Duration,
    bracket: BracketGenerator,
    scheduler: RoundRobinScheduler,
    ties: TieAggregator,
    discipline: DisciplineTracker,
    registry: RosterRegistry,
    publisher: RosterPublisher,
    reporter: MatchReporter,
}

impl CompetitionEngine {
    pub fn new(store: Arc<dyn CompetitionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            locks: Arc::new(TournamentLocks::new()),
            long_operation_timeout: LONG_OPERATION_TIMEOUT,
            bracket: BracketGenerator::new(store.clone()),
            scheduler: RoundRobinScheduler::new(store.clone()),
            ties: TieAggregator::new(store.clone(), notifier.clone()),
            discipline: DisciplineTracker::new(store.clone(), notifier.clone()),
            registry: RosterRegistry::new(store.clone()),
            publisher: RosterPublisher::new(store.clone(), notifier.clone()),
            reporter: MatchReporter::new(store.clone(), notifier),
            store,
        }
    }

    /// Bound on discipline recomputation
    pub fn with_long_operation_timeout(mut self, timeout: Duration) -> Self {
        self.long_operation_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn CompetitionStore> {
        &self.store
    }

    pub fn registry(&self) -> &RosterRegistry {
        &self.registry
    }

    pub fn locks(&self) -> &Arc<TournamentLocks> {
        &self.locks
    }

    async fn tournament_of_match(&self, match_id: MatchId) -> CompetitionResult<TournamentId> {
        self.store
            .get_match(match_id)
            .await?
            .map(|m| m.tournament_id)
            .ok_or(CompetitionError::MatchNotFound(match_id))
    }

    async fn tournament_of_group(&self, group_id: GroupId) -> CompetitionResult<TournamentId> {
        self.store
            .group(group_id)
            .await?
            .map(|g| g.tournament_id)
            .ok_or(CompetitionError::GroupNotFound(group_id))
    }

    async fn tournament_of_tie(&self, tie_id: TieId) -> CompetitionResult<TournamentId> {
        let tie = self
            .store
            .tie(tie_id)
            .await?
            .ok_or(CompetitionError::TieNotFound(tie_id))?;
        self.store
            .round(tie.round_id)
            .await?
            .map(|r| r.tournament_id)
            .ok_or(CompetitionError::RoundNotFound(tie.round_id))
    }

    async fn tournament_of_team(&self, team_id: TournamentTeamId) -> CompetitionResult<TournamentId> {
        Ok(self.registry.team(team_id).await?.tournament_id)
    }

    pub async fn generate_bracket(
        &self,
        request: &BracketRequest,
    ) -> CompetitionResult<Vec<TieView>> {
        let _guard = self.locks.acquire(request.tournament_id).await;
        self.bracket.generate_bracket(request).await
    }

    pub async fn tie_views(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<TieView>> {
        self.bracket.tie_views(tournament_id).await
    }

    pub async fn generate_group_schedule(
        &self,
        request: &ScheduleRequest,
    ) -> CompetitionResult<usize> {
        let tournament_id = self.tournament_of_group(request.group_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.scheduler.generate_group_schedule(request).await
    }

    pub async fn recalc_tie(&self, tie_id: TieId) -> CompetitionResult<TieResult> {
        let tournament_id = self.tournament_of_tie(tie_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.ties.recalc_tie(tie_id).await
    }

    pub async fn update_match(
        &self,
        match_id: MatchId,
        update: MatchUpdate,
    ) -> CompetitionResult<MatchReport> {
        let tournament_id = self.tournament_of_match(match_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.reporter.update_match(match_id, update).await
    }

    pub async fn record_event(&self, event: NewMatchEvent) -> CompetitionResult<EventReport> {
        let tournament_id = self.tournament_of_match(event.match_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.reporter.record_event(event).await
    }

    pub async fn record_card_event(
        &self,
        match_id: MatchId,
        roster_item_id: RosterItemId,
        card: CardType,
    ) -> CompetitionResult<Option<Suspension>> {
        let tournament_id = self.tournament_of_match(match_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.discipline
            .record_card_event(match_id, roster_item_id, card)
            .await
    }

    pub async fn serve_suspensions(&self, match_id: MatchId) -> CompetitionResult<Vec<Suspension>> {
        let tournament_id = self.tournament_of_match(match_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.discipline.serve_suspensions(match_id).await
    }

    /// Rebuild a tournament's suspensions; fails with `Timeout` if the
    /// rebuild runs past the long operation bound
    pub async fn recompute_discipline(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<Suspension>> {
        let _guard = self.locks.acquire(tournament_id).await;
        with_deadline(
            self.long_operation_timeout,
            self.discipline.recompute_all(tournament_id),
        )
        .await
    }

    pub async fn suspensions(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Suspension>> {
        self.store.suspensions(tournament_id).await
    }

    /// Suspensions still to be served as of `instant`
    pub async fn active_suspensions(
        &self,
        tournament_id: TournamentId,
        instant: DateTime<Utc>,
    ) -> CompetitionResult<Vec<Suspension>> {
        Ok(self
            .store
            .suspensions(tournament_id)
            .await?
            .into_iter()
            .filter(|s| s.active && s.remaining_games > 0 && s.starts_after <= instant)
            .collect())
    }

    pub async fn publish_roster(
        &self,
        request: &PublishRequest,
    ) -> CompetitionResult<Vec<RosterItemId>> {
        let tournament_id = self.tournament_of_match(request.match_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.publisher.publish_roster(request).await
    }

    pub async fn team_roster(&self, team_id: TournamentTeamId) -> CompetitionResult<TeamRoster> {
        self.registry.team_roster(team_id).await
    }

    pub async fn replace_roster(
        &self,
        team_id: TournamentTeamId,
        items: Vec<NewRosterItem>,
        captain_player_id: Option<i64>,
    ) -> CompetitionResult<Vec<RosterItem>> {
        let tournament_id = self.tournament_of_team(team_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.registry
            .replace_roster(team_id, items, captain_player_id)
            .await
    }

    pub async fn set_captain(
        &self,
        team_id: TournamentTeamId,
        roster_item_id: Option<RosterItemId>,
    ) -> CompetitionResult<()> {
        let tournament_id = self.tournament_of_team(team_id).await?;
        let _guard = self.locks.acquire(tournament_id).await;
        self.registry.set_captain(team_id, roster_item_id).await
    }
}
