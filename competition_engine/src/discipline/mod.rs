//! Card accumulation and suspensions.
//!
//! Cards are tallied per player and colour within the tournament's
//! accumulation scope. Reaching a colour's threshold issues one suspension,
//! which is served by finished matches of the player's team played after
//! the ban started.

pub mod tracker;

pub use tracker::DisciplineTracker;

use std::collections::HashSet;

use crate::models::{AccumulationScope, GroupId, Match, RosterItemId, RoundId, Suspension};

/// Boundary a card is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Tournament,
    Round(RoundId),
    Group(GroupId),
}

impl ScopeKey {
    /// Scope of a card shown in `fixture`.
    ///
    /// A match without a round or group falls back to tournament-wide
    /// counting.
    pub fn of(scope: AccumulationScope, fixture: &Match) -> ScopeKey {
        match scope {
            AccumulationScope::Tournament => ScopeKey::Tournament,
            AccumulationScope::Round => fixture
                .round_id
                .map_or(ScopeKey::Tournament, ScopeKey::Round),
            AccumulationScope::Group => fixture
                .group_id
                .map_or(ScopeKey::Tournament, ScopeKey::Group),
        }
    }

    /// Whether a card shown in `fixture` counts toward this scope
    pub fn contains(&self, fixture: &Match) -> bool {
        match self {
            ScopeKey::Tournament => true,
            ScopeKey::Round(round_id) => fixture.round_id == Some(*round_id),
            ScopeKey::Group(group_id) => fixture.group_id == Some(*group_id),
        }
    }
}

/// Roster items banned from `fixture`
pub fn suspended_roster_items(suspensions: &[Suspension], fixture: &Match) -> HashSet<RosterItemId> {
    suspensions
        .iter()
        .filter(|s| s.applies_to(fixture))
        .map(|s| s.roster_item_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchStatus, SuspensionReason};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn fixture(id: i64, round_id: Option<RoundId>, day: Option<u32>) -> Match {
        Match {
            id,
            tournament_id: 1,
            round_id,
            group_id: None,
            tie_id: None,
            leg: None,
            matchday: None,
            team1_id: 1,
            team2_id: 2,
            scheduled_at: day.map(|d| Utc.with_ymd_and_hms(2026, 4, d, 12, 0, 0).unwrap()),
            status: MatchStatus::Scheduled,
            score1: 0,
            score2: 0,
        }
    }

    #[test]
    fn test_scope_falls_back_to_tournament() {
        let with_round = fixture(1, Some(7), None);
        let without_round = fixture(2, None, None);

        assert_eq!(
            ScopeKey::of(AccumulationScope::Round, &with_round),
            ScopeKey::Round(7)
        );
        assert_eq!(
            ScopeKey::of(AccumulationScope::Round, &without_round),
            ScopeKey::Tournament
        );
        assert_eq!(
            ScopeKey::of(AccumulationScope::Group, &with_round),
            ScopeKey::Tournament
        );
        assert!(ScopeKey::Round(7).contains(&with_round));
        assert!(!ScopeKey::Round(7).contains(&without_round));
    }

    #[test]
    fn test_suspended_roster_items_respects_ban_start() {
        let ban = Suspension {
            id: 1,
            tournament_id: 1,
            roster_item_id: 42,
            reason: SuspensionReason::Red,
            match_id: 10,
            starts_after: Utc.with_ymd_and_hms(2026, 4, 5, 12, 0, 0).unwrap(),
            remaining_games: 1,
            active: true,
            served_match_ids: BTreeSet::new(),
        };
        let bans = [ban];

        assert!(suspended_roster_items(&bans, &fixture(11, None, Some(6))).contains(&42));
        assert!(suspended_roster_items(&bans, &fixture(12, None, Some(5))).is_empty());
        assert!(suspended_roster_items(&bans, &fixture(10, None, Some(9))).is_empty());
        assert!(suspended_roster_items(&bans, &fixture(13, None, None)).contains(&42));
    }
}
