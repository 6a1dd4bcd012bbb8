//! Match result reporting and event recording.
//!
//! Reporting drives the match lifecycle forward and fires the follow-up
//! work a finished match implies: the tie aggregate is recalculated and
//! suspensions are served.

use log::info;
use serde::Serialize;
use std::sync::Arc;

use crate::db::repository::{CompetitionStore, MatchUpdate, NewMatchEvent};
use crate::discipline::DisciplineTracker;
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{Match, MatchEvent, MatchId, MatchStatus, Suspension};
use crate::notify::{self, Notifier};
use crate::roster::RosterRegistry;
use crate::tie::{TieAggregator, TieResult};

/// What a match update changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub previous: MatchStatus,
    pub current: Match,
    /// Recalculated tie, when the match is a finished tie leg
    pub tie: Option<TieResult>,
    /// Suspensions served by this match finishing
    pub served: Vec<Suspension>,
}

/// What recording an event changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventReport {
    pub event: MatchEvent,
    /// Suspension issued by a card event
    pub suspension: Option<Suspension>,
}

/// Match reporter
#[derive(Clone)]
pub struct MatchReporter {
    store: Arc<dyn CompetitionStore>,
    notifier: Arc<dyn Notifier>,
    ties: TieAggregator,
    discipline: DisciplineTracker,
    registry: RosterRegistry,
}

impl MatchReporter {
    pub fn new(store: Arc<dyn CompetitionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ties: TieAggregator::new(store.clone(), notifier.clone()),
            discipline: DisciplineTracker::new(store.clone(), notifier.clone()),
            registry: RosterRegistry::new(store.clone()),
            store,
            notifier,
        }
    }

    /// Apply a status and score report.
    ///
    /// Every report of a finished match serves suspensions and recalculates
    /// its tie. Both steps are idempotent, so repeating a report completes
    /// follow-up work an earlier attempt left unfinished.
    pub async fn update_match(
        &self,
        match_id: MatchId,
        update: MatchUpdate,
    ) -> CompetitionResult<MatchReport> {
        update.validate()?;
        let existing = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(CompetitionError::MatchNotFound(match_id))?;
        if !existing.status.can_transition_to(update.status) {
            return Err(CompetitionError::InvalidTransition {
                from: existing.status,
                to: update.status,
            });
        }

        let transition = self.store.update_match(match_id, update).await?;
        let current = transition.current.clone();

        info!(
            "Match {} {} -> {} ({}-{})",
            match_id, transition.previous, current.status, current.score1, current.score2
        );
        notify::publish_json(self.notifier.as_ref(), notify::MATCH_UPDATED, &current);

        if transition.finished_now() {
            info!("Match {} finished", match_id);
        }
        let finished = current.status == MatchStatus::Finished;

        let served = if finished {
            self.discipline.serve_suspensions(match_id).await?
        } else {
            Vec::new()
        };

        let tie = match current.tie_id {
            Some(tie_id) if finished => Some(self.ties.recalc_tie(tie_id).await?),
            _ => None,
        };

        Ok(MatchReport {
            previous: transition.previous,
            current,
            tie,
            served,
        })
    }

    /// Store a match event; card events are checked for suspensions
    pub async fn record_event(&self, event: NewMatchEvent) -> CompetitionResult<EventReport> {
        let fixture = self
            .store
            .get_match(event.match_id)
            .await?
            .ok_or(CompetitionError::MatchNotFound(event.match_id))?;
        if !fixture.involves(event.tournament_team_id) {
            return Err(CompetitionError::TeamNotInMatch {
                team: event.tournament_team_id,
                match_id: fixture.id,
            });
        }
        self.registry
            .ensure_belongs(event.roster_item_id, event.tournament_team_id)
            .await?;

        let stored = self.store.insert_event(&event).await?;

        let suspension = match stored.kind.card() {
            Some(card) => {
                self.discipline
                    .record_card_event(stored.match_id, stored.roster_item_id, card)
                    .await?
            }
            None => None,
        };

        Ok(EventReport {
            event: stored,
            suspension,
        })
    }
}
