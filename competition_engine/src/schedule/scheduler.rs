//! Group schedule generation on top of [`circle_pairings`].

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::circle::circle_pairings;
use crate::db::repository::{CompetitionStore, NewMatch};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{GroupId, RoundId};

/// Parameters of a group schedule generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub group_id: GroupId,
    pub round_id: RoundId,
    /// 1 for single, 2 for double round-robin
    pub rounds: u8,
    pub start_date: DateTime<Utc>,
    pub match_gap_days: u32,
}

/// Round-robin scheduler
#[derive(Clone)]
pub struct RoundRobinScheduler {
    store: Arc<dyn CompetitionStore>,
}

impl RoundRobinScheduler {
    pub fn new(store: Arc<dyn CompetitionStore>) -> Self {
        Self { store }
    }

    /// Create every fixture of the group's schedule and return how many.
    ///
    /// Existing fixtures are neither checked nor removed, so calling this
    /// twice schedules the group twice.
    pub async fn generate_group_schedule(
        &self,
        request: &ScheduleRequest,
    ) -> CompetitionResult<usize> {
        let fixtures = self.plan(request).await?;
        let ids = self.store.insert_matches(&fixtures).await?;

        info!(
            "Scheduled {} matches for group {} in round {} ({} cycle(s))",
            ids.len(),
            request.group_id,
            request.round_id,
            request.rounds
        );

        Ok(ids.len())
    }

    /// Validate a request and build its fixtures without writing them
    pub async fn plan(&self, request: &ScheduleRequest) -> CompetitionResult<Vec<NewMatch>> {
        if !(1..=2).contains(&request.rounds) {
            return Err(CompetitionError::InvalidCycles(request.rounds));
        }

        let group = self
            .store
            .group(request.group_id)
            .await?
            .ok_or(CompetitionError::GroupNotFound(request.group_id))?;
        let round = self
            .store
            .round(request.round_id)
            .await?
            .ok_or(CompetitionError::RoundNotFound(request.round_id))?;

        if round.tournament_id != group.tournament_id {
            return Err(CompetitionError::RoundTournamentMismatch {
                round: round.id,
                tournament: group.tournament_id,
            });
        }

        if group.team_ids.len() < 2 {
            return Err(CompetitionError::InsufficientTeams {
                needed: 2,
                current: group.team_ids.len(),
            });
        }

        let matchdays = circle_pairings(&group.team_ids);
        let cycle_len = matchdays.len() as u32;
        let out_of_range = || CompetitionError::InvalidGap(request.match_gap_days);
        let gap = Duration::try_days(i64::from(request.match_gap_days)).ok_or_else(out_of_range)?;
        let mut fixtures = Vec::new();

        for (idx, pairs) in matchdays.iter().enumerate() {
            let matchday = idx as u32 + 1;
            let date = i32::try_from(idx)
                .ok()
                .and_then(|k| gap.checked_mul(k))
                .and_then(|offset| request.start_date.checked_add_signed(offset))
                .ok_or_else(out_of_range)?;
            let mirror_date = date.checked_add_signed(gap).ok_or_else(out_of_range)?;

            for &(home, away) in pairs {
                fixtures.push(NewMatch {
                    tournament_id: group.tournament_id,
                    round_id: Some(round.id),
                    group_id: Some(group.id),
                    matchday: Some(matchday),
                    team1_id: home,
                    team2_id: away,
                    scheduled_at: Some(date),
                });

                if request.rounds == 2 {
                    fixtures.push(NewMatch {
                        tournament_id: group.tournament_id,
                        round_id: Some(round.id),
                        group_id: Some(group.id),
                        matchday: Some(matchday + cycle_len),
                        team1_id: away,
                        team2_id: home,
                        scheduled_at: Some(mirror_date),
                    });
                }
            }
        }

        Ok(fixtures)
    }
}
