//! Aggregate and winner of a multi-leg tie, derived from its finished legs.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::repository::CompetitionStore;
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{Aggregate, Match, MatchStatus, Tie, TieId, TournamentTeamId};
use crate::notify::{self, Notifier};

/// Outcome of a tie recalculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieResult {
    pub tie_id: TieId,
    pub aggregate: Aggregate,
    /// `None` while the aggregate is level
    pub winner: Option<TournamentTeamId>,
}

/// Sum finished legs, crediting goals by team regardless of who hosted
pub fn aggregate_legs(tie: &Tie, legs: &[Match]) -> Aggregate {
    let mut aggregate = Aggregate::default();
    let (Some(side1), Some(side2)) = (tie.side1, tie.side2) else {
        return aggregate;
    };

    for leg in legs.iter().filter(|m| m.status == MatchStatus::Finished) {
        if leg.team1_id == side1 && leg.team2_id == side2 {
            aggregate.side1 = aggregate.side1.saturating_add(leg.score1);
            aggregate.side2 = aggregate.side2.saturating_add(leg.score2);
        } else if leg.team1_id == side2 && leg.team2_id == side1 {
            aggregate.side1 = aggregate.side1.saturating_add(leg.score2);
            aggregate.side2 = aggregate.side2.saturating_add(leg.score1);
        } else {
            warn!(
                "Skipping match {} in tie {}: teams {} v {} do not match the tie",
                leg.id, tie.id, leg.team1_id, leg.team2_id
            );
        }
    }

    aggregate
}

/// Strictly greater aggregate wins; level aggregates have no winner
pub fn decide_winner(tie: &Tie, aggregate: Aggregate) -> Option<TournamentTeamId> {
    match aggregate.side1.cmp(&aggregate.side2) {
        std::cmp::Ordering::Greater => tie.side1,
        std::cmp::Ordering::Less => tie.side2,
        std::cmp::Ordering::Equal => None,
    }
}

/// Recomputes cached tie results
#[derive(Clone)]
pub struct TieAggregator {
    store: Arc<dyn CompetitionStore>,
    notifier: Arc<dyn Notifier>,
}

impl TieAggregator {
    pub fn new(store: Arc<dyn CompetitionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Recompute a tie's aggregate and winner and store them on the tie.
    ///
    /// Match rows are never modified, so repeated calls over unchanged legs
    /// return the same result.
    pub async fn recalc_tie(&self, tie_id: TieId) -> CompetitionResult<TieResult> {
        let mut tie = self
            .store
            .tie(tie_id)
            .await?
            .ok_or(CompetitionError::TieNotFound(tie_id))?;
        let legs = self.store.tie_matches(tie_id).await?;

        let aggregate = aggregate_legs(&tie, &legs);
        let winner = decide_winner(&tie, aggregate);
        self.store.save_tie_result(tie_id, aggregate, winner).await?;

        info!(
            "Tie {} aggregate {}-{}, winner {:?}",
            tie_id, aggregate.side1, aggregate.side2, winner
        );

        tie.aggregate = Some(aggregate);
        tie.winner = winner;
        notify::publish_json(self.notifier.as_ref(), notify::TIE_UPDATED, &tie);

        Ok(TieResult {
            tie_id,
            aggregate,
            winner,
        })
    }
}
