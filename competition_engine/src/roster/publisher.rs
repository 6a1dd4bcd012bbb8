//! Roster publication into a match.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::repository::CompetitionStore;
use crate::discipline::suspended_roster_items;
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{
    MatchId, MatchParticipant, RoleFilter, RosterItemId, RosterRole, TournamentTeamId,
};
use crate::notify::{self, Notifier};

/// Parameters of a roster publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub match_id: MatchId,
    pub team_id: TournamentTeamId,
    pub role_filter: RoleFilter,
    /// Replace the team's earlier publication for this match
    pub reset: bool,
}

/// Copies eligible roster entries into a match
#[derive(Clone)]
pub struct RosterPublisher {
    store: Arc<dyn CompetitionStore>,
    notifier: Arc<dyn Notifier>,
}

impl RosterPublisher {
    pub fn new(store: Arc<dyn CompetitionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Publish a team's roster for a match and return the roster items added.
    ///
    /// Suspended players are left out without an error. Without `reset`,
    /// players already published for the match are not added again.
    pub async fn publish_roster(
        &self,
        request: &PublishRequest,
    ) -> CompetitionResult<Vec<RosterItemId>> {
        let fixture = self
            .store
            .get_match(request.match_id)
            .await?
            .ok_or(CompetitionError::MatchNotFound(request.match_id))?;
        let team = self
            .store
            .tournament_team(request.team_id)
            .await?
            .ok_or(CompetitionError::TeamNotFound(request.team_id))?;
        if !fixture.involves(team.id) {
            return Err(CompetitionError::TeamNotInMatch {
                team: team.id,
                match_id: fixture.id,
            });
        }
        let tournament = self
            .store
            .tournament(fixture.tournament_id)
            .await?
            .ok_or(CompetitionError::TournamentNotFound(fixture.tournament_id))?;

        let suspensions = self.store.suspensions(fixture.tournament_id).await?;
        let suspended = suspended_roster_items(&suspensions, &fixture);

        let candidates: Vec<_> = self
            .store
            .roster(team.id)
            .await?
            .into_iter()
            .filter(|r| request.role_filter.admits(r.role))
            .collect();
        let eligible: Vec<_> = candidates
            .iter()
            .filter(|r| !suspended.contains(&r.id))
            .collect();

        let max = tournament.team_format.max_starters();
        let starters = eligible
            .iter()
            .filter(|r| r.role == RosterRole::Starter)
            .count();
        if starters > max {
            return Err(CompetitionError::TooManyStarters {
                max,
                actual: starters,
            });
        }

        if eligible.len() < candidates.len() {
            debug!(
                "Left {} suspended player(s) of team {} out of match {}",
                candidates.len() - eligible.len(),
                team.id,
                fixture.id
            );
        }

        let already: HashSet<RosterItemId> = if request.reset {
            HashSet::new()
        } else {
            self.store
                .participants(fixture.id)
                .await?
                .iter()
                .map(|p| p.roster_item_id)
                .collect()
        };

        let entries: Vec<MatchParticipant> = eligible
            .iter()
            .enumerate()
            .map(|(order, item)| MatchParticipant {
                match_id: fixture.id,
                tournament_team_id: team.id,
                roster_item_id: item.id,
                role: item.role,
                position: item.position.clone(),
                number: item.number,
                is_captain: team.captain_id == Some(item.id),
                sort_order: order as u32,
            })
            .filter(|p| !already.contains(&p.roster_item_id))
            .collect();

        self.store
            .replace_participants(fixture.id, team.id, &entries, request.reset)
            .await?;

        let published: Vec<RosterItemId> = entries.iter().map(|p| p.roster_item_id).collect();
        info!(
            "Published {} player(s) of team {} for match {} (filter {}, reset={})",
            published.len(),
            team.id,
            fixture.id,
            request.role_filter,
            request.reset
        );
        self.notifier.publish(
            notify::ROSTER_PUBLISHED,
            json!({
                "match_id": fixture.id,
                "team_id": team.id,
                "roster_item_ids": published,
            }),
        );

        Ok(published)
    }
}
