//! Roster registry.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::repository::{CompetitionStore, NewRosterItem};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{
    RosterItem, RosterItemId, RosterRole, Tournament, TournamentId, TournamentTeam,
    TournamentTeamId,
};

/// A team together with its registered players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub team: TournamentTeam,
    pub items: Vec<RosterItem>,
}

impl TeamRoster {
    pub fn captain(&self) -> Option<&RosterItem> {
        let captain_id = self.team.captain_id?;
        self.items.iter().find(|r| r.id == captain_id)
    }

    pub fn starters(&self) -> impl Iterator<Item = &RosterItem> {
        self.items.iter().filter(|r| r.role == RosterRole::Starter)
    }
}

/// Read access to enrolments and rosters, plus validated roster edits
#[derive(Clone)]
pub struct RosterRegistry {
    store: Arc<dyn CompetitionStore>,
}

impl RosterRegistry {
    pub fn new(store: Arc<dyn CompetitionStore>) -> Self {
        Self { store }
    }

    /// Teams enrolled in a tournament
    pub async fn enrolled_teams(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<TournamentTeam>> {
        self.tournament(tournament_id).await?;
        self.store.tournament_teams(tournament_id).await
    }

    pub async fn team(&self, team_id: TournamentTeamId) -> CompetitionResult<TournamentTeam> {
        self.store
            .tournament_team(team_id)
            .await?
            .ok_or(CompetitionError::TeamNotFound(team_id))
    }

    pub async fn team_roster(&self, team_id: TournamentTeamId) -> CompetitionResult<TeamRoster> {
        let team = self.team(team_id).await?;
        let items = self.store.roster(team_id).await?;
        Ok(TeamRoster { team, items })
    }

    /// Team a roster item is registered with
    pub async fn team_of(&self, roster_item_id: RosterItemId) -> CompetitionResult<TournamentTeamId> {
        self.store
            .roster_item(roster_item_id)
            .await?
            .map(|r| r.tournament_team_id)
            .ok_or(CompetitionError::RosterItemNotFound(roster_item_id))
    }

    /// Fetch a roster item, failing if it is registered with another team
    pub async fn ensure_belongs(
        &self,
        roster_item_id: RosterItemId,
        team_id: TournamentTeamId,
    ) -> CompetitionResult<RosterItem> {
        let item = self
            .store
            .roster_item(roster_item_id)
            .await?
            .ok_or(CompetitionError::RosterItemNotFound(roster_item_id))?;
        if item.tournament_team_id != team_id {
            return Err(CompetitionError::RosterItemTeamMismatch {
                roster_item: roster_item_id,
                team: team_id,
            });
        }
        Ok(item)
    }

    /// Replace a team's roster in one write.
    ///
    /// Players already on the roster keep their roster item id. The captain
    /// is given by player id and must be on the new roster. A player with
    /// recorded events, suspensions or published lineups cannot be dropped.
    pub async fn replace_roster(
        &self,
        team_id: TournamentTeamId,
        items: Vec<NewRosterItem>,
        captain_player_id: Option<i64>,
    ) -> CompetitionResult<Vec<RosterItem>> {
        let team = self.team(team_id).await?;
        let tournament = self.tournament(team.tournament_id).await?;

        let mut players = HashSet::new();
        for item in &items {
            if !players.insert(item.player_id) {
                return Err(CompetitionError::DuplicatePlayer(item.player_id));
            }
        }

        let max = tournament.team_format.max_starters();
        let starters = items
            .iter()
            .filter(|i| i.role == RosterRole::Starter)
            .count();
        if starters > max {
            return Err(CompetitionError::TooManyStarters {
                max,
                actual: starters,
            });
        }

        if let Some(captain) = captain_player_id.filter(|c| !players.contains(c)) {
            return Err(CompetitionError::CaptainNotOnRoster(captain));
        }

        let roster = self
            .store
            .replace_roster(team_id, &items, captain_player_id)
            .await?;

        info!(
            "Replaced roster of team {} ({}): {} players, {} starters",
            team_id,
            team.name,
            roster.len(),
            starters
        );

        Ok(roster)
    }

    /// Set or clear the team captain
    pub async fn set_captain(
        &self,
        team_id: TournamentTeamId,
        roster_item_id: Option<RosterItemId>,
    ) -> CompetitionResult<()> {
        self.team(team_id).await?;
        if let Some(item) = roster_item_id {
            self.ensure_belongs(item, team_id).await?;
        }
        self.store.set_captain(team_id, roster_item_id).await
    }

    async fn tournament(&self, tournament_id: TournamentId) -> CompetitionResult<Tournament> {
        self.store
            .tournament(tournament_id)
            .await?
            .ok_or(CompetitionError::TournamentNotFound(tournament_id))
    }
}
