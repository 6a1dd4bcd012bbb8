//! Integration tests for card accumulation, suspension service and the
//! discipline rebuild.

use chrono::{DateTime, TimeZone, Utc};
use competition_engine::db::{MatchUpdate, NewMatch, NewMatchEvent};
use competition_engine::models::{
    AccumulationScope, DisciplinePolicy, MatchEventKind, MatchId, MatchStatus, RoleFilter,
    RosterItem, RosterRole, RoundId, RoundKind, Suspension, SuspensionReason, TeamFormat,
    TournamentTeam,
};
use competition_engine::{
    BroadcastNotifier, CompetitionEngine, CompetitionError, CompetitionStore, MemoryStore,
    PublishRequest,
};
use std::sync::Arc;

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, d, 19, 30, 0).unwrap()
}

struct League {
    store: MemoryStore,
    engine: CompetitionEngine,
    tournament_id: i64,
    home: TournamentTeam,
    away: TournamentTeam,
    other: TournamentTeam,
    player: RosterItem,
}

impl League {
    fn new(policy: DisciplinePolicy) -> Self {
        let store = MemoryStore::new();
        let tournament = store.add_tournament("City League", TeamFormat::FiveASide, policy);
        let home = store.enroll_team(tournament.id, "Home", None);
        let away = store.enroll_team(tournament.id, "Away", None);
        let other = store.enroll_team(tournament.id, "Other", None);
        let player = store.add_roster_item(home.id, 8, RosterRole::Starter);
        store.add_roster_item(home.id, 1, RosterRole::Starter);
        let engine = CompetitionEngine::new(
            Arc::new(store.clone()),
            Arc::new(BroadcastNotifier::new(64)),
        );
        Self {
            store,
            engine,
            tournament_id: tournament.id,
            home,
            away,
            other,
            player,
        }
    }

    async fn fixture(
        &self,
        team1: i64,
        team2: i64,
        date: Option<DateTime<Utc>>,
        round_id: Option<RoundId>,
    ) -> MatchId {
        self.store
            .insert_matches(&[NewMatch {
                tournament_id: self.tournament_id,
                round_id,
                group_id: None,
                matchday: None,
                team1_id: team1,
                team2_id: team2,
                scheduled_at: date,
            }])
            .await
            .unwrap()[0]
    }

    async fn home_game(&self, d: u32) -> MatchId {
        self.fixture(self.home.id, self.away.id, Some(day(d)), None)
            .await
    }

    async fn card(&self, match_id: MatchId, kind: MatchEventKind) -> Option<Suspension> {
        self.engine
            .record_event(NewMatchEvent {
                match_id,
                tournament_team_id: self.home.id,
                roster_item_id: self.player.id,
                kind,
                minute: Some(60),
            })
            .await
            .unwrap()
            .suspension
    }

    async fn finish(&self, match_id: MatchId) -> Vec<Suspension> {
        self.engine
            .update_match(
                match_id,
                MatchUpdate {
                    status: MatchStatus::Finished,
                    score1: 1,
                    score2: 1,
                },
            )
            .await
            .unwrap()
            .served
    }

    async fn suspensions(&self) -> Vec<Suspension> {
        self.store.suspensions(self.tournament_id).await.unwrap()
    }
}

#[tokio::test]
async fn test_yellow_threshold_issues_exactly_one_suspension() {
    let league = League::new(DisciplinePolicy::default());
    let first = league.home_game(1).await;
    let second = league.home_game(8).await;
    let third = league.home_game(15).await;

    assert!(league.card(first, MatchEventKind::YellowCard).await.is_none());

    let suspension = league
        .card(second, MatchEventKind::YellowCard)
        .await
        .expect("second yellow suspends");
    assert_eq!(suspension.reason, SuspensionReason::Yellows);
    assert_eq!(suspension.match_id, second);
    assert_eq!(suspension.starts_after, day(8));
    assert_eq!(suspension.remaining_games, 1);

    assert!(league.card(third, MatchEventKind::YellowCard).await.is_none());
    assert_eq!(league.suspensions().await.len(), 1);
}

#[tokio::test]
async fn test_colours_are_counted_independently() {
    let policy = DisciplinePolicy {
        yellow_to_suspend: 3,
        ..DisciplinePolicy::default()
    };
    let league = League::new(policy);
    let game = league.home_game(1).await;

    assert!(league.card(game, MatchEventKind::YellowCard).await.is_none());
    assert!(league.card(game, MatchEventKind::YellowCard).await.is_none());

    let red = league.card(game, MatchEventKind::RedCard).await.unwrap();
    assert_eq!(red.reason, SuspensionReason::Red);
    assert_eq!(league.suspensions().await.len(), 1);
}

#[tokio::test]
async fn test_suspension_served_by_team_matches_only() {
    let policy = DisciplinePolicy {
        suspension_games: 2,
        ..DisciplinePolicy::default()
    };
    let league = League::new(policy);
    let sent_off = league.home_game(1).await;
    let unrelated = league
        .fixture(league.away.id, league.other.id, Some(day(3)), None)
        .await;
    let next = league.home_game(8).await;
    let after = league.home_game(15).await;

    league.card(sent_off, MatchEventKind::RedCard).await.unwrap();

    // the triggering match itself does not count
    assert!(league.finish(sent_off).await.is_empty());
    assert!(league.finish(unrelated).await.is_empty());
    assert_eq!(league.suspensions().await[0].remaining_games, 2);

    let served = league.finish(next).await;
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].remaining_games, 1);
    assert!(served[0].active);

    let served = league.finish(after).await;
    assert_eq!(served[0].remaining_games, 0);
    assert!(!served[0].active);
}

#[tokio::test]
async fn test_serving_twice_for_one_match_counts_once() {
    let policy = DisciplinePolicy {
        suspension_games: 3,
        ..DisciplinePolicy::default()
    };
    let league = League::new(policy);
    let sent_off = league.home_game(1).await;
    let next = league.home_game(8).await;

    league.card(sent_off, MatchEventKind::RedCard).await.unwrap();
    league.finish(next).await;

    assert!(league.engine.serve_suspensions(next).await.unwrap().is_empty());
    assert_eq!(league.suspensions().await[0].remaining_games, 2);
}

#[tokio::test]
async fn test_match_before_ban_start_is_not_served() {
    let league = League::new(DisciplinePolicy::default());
    let earlier = league.home_game(1).await;
    let sent_off = league.home_game(8).await;

    league.card(sent_off, MatchEventKind::RedCard).await.unwrap();
    assert!(league.finish(earlier).await.is_empty());
    assert_eq!(league.suspensions().await[0].remaining_games, 1);
}

#[tokio::test]
async fn test_suspended_player_left_out_of_published_roster() {
    let league = League::new(DisciplinePolicy::default());
    let sent_off = league.home_game(1).await;
    let next = league.home_game(8).await;
    let later = league.home_game(15).await;

    league.card(sent_off, MatchEventKind::RedCard).await.unwrap();

    let request = |match_id| PublishRequest {
        match_id,
        team_id: league.home.id,
        role_filter: RoleFilter::All,
        reset: true,
    };

    let published = league.engine.publish_roster(&request(next)).await.unwrap();
    assert!(!published.contains(&league.player.id));
    assert_eq!(published.len(), 1);

    league.finish(next).await;
    let published = league.engine.publish_roster(&request(later)).await.unwrap();
    assert!(published.contains(&league.player.id));
}

#[tokio::test]
async fn test_round_scope_does_not_carry_over() {
    let policy = DisciplinePolicy {
        scope: AccumulationScope::Round,
        ..DisciplinePolicy::default()
    };
    let league = League::new(policy);
    let group_round = league
        .store
        .add_round(league.tournament_id, "Groups", RoundKind::Matchday(1));
    let knockout_round = league
        .store
        .add_round(league.tournament_id, "Knockouts", RoundKind::Matchday(2));
    let group_game = league
        .fixture(league.home.id, league.away.id, Some(day(1)), Some(group_round.id))
        .await;
    let knockout_game = league
        .fixture(league.home.id, league.away.id, Some(day(8)), Some(knockout_round.id))
        .await;
    let knockout_again = league
        .fixture(league.home.id, league.other.id, Some(day(15)), Some(knockout_round.id))
        .await;

    assert!(league.card(group_game, MatchEventKind::YellowCard).await.is_none());
    assert!(league.card(knockout_game, MatchEventKind::YellowCard).await.is_none());
    assert!(league.card(knockout_again, MatchEventKind::YellowCard).await.is_some());
}

#[tokio::test]
async fn test_recompute_matches_incremental_state() {
    let policy = DisciplinePolicy {
        suspension_games: 2,
        ..DisciplinePolicy::default()
    };
    let league = League::new(policy);
    let games = [
        league.home_game(1).await,
        league.home_game(8).await,
        league.home_game(15).await,
        league.home_game(22).await,
    ];

    league.card(games[0], MatchEventKind::YellowCard).await;
    league.card(games[1], MatchEventKind::YellowCard).await;
    league.finish(games[0]).await;
    league.finish(games[1]).await;
    league.finish(games[2]).await;

    let incremental = league.suspensions().await;
    assert_eq!(incremental.len(), 1);
    assert_eq!(incremental[0].remaining_games, 1);

    let rebuilt = league
        .engine
        .recompute_discipline(league.tournament_id)
        .await
        .unwrap();
    assert_eq!(rebuilt.len(), 1);
    assert_eq!(rebuilt[0].match_id, incremental[0].match_id);
    assert_eq!(rebuilt[0].starts_after, incremental[0].starts_after);
    assert_eq!(rebuilt[0].remaining_games, incremental[0].remaining_games);
    assert_eq!(rebuilt[0].served_match_ids, incremental[0].served_match_ids);
    assert_eq!(league.suspensions().await, rebuilt);

    // rebuilding again changes nothing but ids
    let again = league
        .engine
        .recompute_discipline(league.tournament_id)
        .await
        .unwrap();
    assert_eq!(again[0].remaining_games, 1);
}

#[tokio::test]
async fn test_recompute_replays_in_match_date_order() {
    let league = League::new(DisciplinePolicy::default());
    // created out of date order
    let late = league.home_game(20).await;
    let early = league.home_game(2).await;
    let middle = league.home_game(9).await;

    league.card(late, MatchEventKind::YellowCard).await;
    league.card(early, MatchEventKind::YellowCard).await;
    league.card(middle, MatchEventKind::YellowCard).await;

    let rebuilt = league
        .engine
        .recompute_discipline(league.tournament_id)
        .await
        .unwrap();
    assert_eq!(rebuilt.len(), 1);
    assert_eq!(rebuilt[0].match_id, middle);
    assert_eq!(rebuilt[0].starts_after, day(9));
}

#[tokio::test]
async fn test_failed_recompute_keeps_existing_suspensions() {
    let league = League::new(DisciplinePolicy::default());
    let game = league.home_game(1).await;
    league.card(game, MatchEventKind::RedCard).await.unwrap();
    let before = league.suspensions().await;

    league.store.fail_next_commit();
    let result = league.engine.recompute_discipline(league.tournament_id).await;

    assert!(matches!(result, Err(CompetitionError::TransactionFailed(_))));
    assert_eq!(league.suspensions().await, before);
}

#[tokio::test]
async fn test_undated_trigger_match_still_bans_later_fixtures() {
    let league = League::new(DisciplinePolicy::default());
    let undated = league
        .fixture(league.home.id, league.away.id, None, None)
        .await;
    let next = league
        .fixture(league.home.id, league.other.id, None, None)
        .await;

    league.card(undated, MatchEventKind::RedCard).await.unwrap();

    let served = league.finish(next).await;
    assert_eq!(served.len(), 1);
    assert!(!served[0].active);
}
