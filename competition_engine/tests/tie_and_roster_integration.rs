//! Integration tests for tie aggregation through match reporting, and for
//! roster registration and publication.

use competition_engine::db::{MatchUpdate, NewMatchEvent, NewRosterItem};
use competition_engine::models::{
    Aggregate, DisciplinePolicy, MatchEventKind, MatchStatus, RoleFilter, RosterRole, TeamFormat,
    Tie,
};
use competition_engine::notify::{Notification, TIE_UPDATED};
use competition_engine::{
    BracketRequest, BroadcastNotifier, CompetitionEngine, CompetitionError, CompetitionStore,
    MemoryStore, PublishRequest,
};
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

struct Cup {
    store: MemoryStore,
    engine: CompetitionEngine,
    events: Receiver<Notification>,
    tournament_id: i64,
}

impl Cup {
    fn new(teams: u32) -> Self {
        let store = MemoryStore::new();
        let tournament =
            store.add_tournament("Two-Leg Cup", TeamFormat::ElevenASide, DisciplinePolicy::default());
        for seed in 1..=teams {
            store.enroll_team(tournament.id, &format!("Side {seed}"), Some(seed));
        }
        let notifier = Arc::new(BroadcastNotifier::new(256));
        let events = notifier.subscribe();
        let engine = CompetitionEngine::new(Arc::new(store.clone()), notifier);
        Self {
            store,
            engine,
            events,
            tournament_id: tournament.id,
        }
    }

    async fn first_tie(&self) -> Tie {
        let views = self
            .engine
            .generate_bracket(&BracketRequest::seeded(self.tournament_id).with_legs(2))
            .await
            .unwrap();
        views[0].tie.clone()
    }

    async fn finish_leg(&self, tie: &Tie, leg: usize, home_goals: u32, away_goals: u32) {
        let legs = self.store.tie_matches(tie.id).await.unwrap();
        self.engine
            .update_match(
                legs[leg].id,
                MatchUpdate {
                    status: MatchStatus::Finished,
                    score1: home_goals,
                    score2: away_goals,
                },
            )
            .await
            .unwrap();
    }

    fn drain_topic(&mut self, topic: &str) -> Vec<Notification> {
        let mut found = Vec::new();
        while let Ok(notification) = self.events.try_recv() {
            if notification.topic == topic {
                found.push(notification);
            }
        }
        found
    }
}

#[tokio::test]
async fn test_aggregate_credits_goals_by_team() {
    let mut cup = Cup::new(4);
    let tie = cup.first_tie().await;

    // leg 1 hosted by side1: 2-1, leg 2 hosted by side2: 3-0
    cup.finish_leg(&tie, 0, 2, 1).await;
    cup.finish_leg(&tie, 1, 3, 0).await;

    let stored = cup.store.tie(tie.id).await.unwrap().unwrap();
    assert_eq!(stored.aggregate, Some(Aggregate { side1: 2, side2: 4 }));
    assert_eq!(stored.winner, tie.side2);

    let updates = cup.drain_topic(TIE_UPDATED);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].payload["winner"], tie.side2.unwrap());
}

#[tokio::test]
async fn test_only_finished_legs_count() {
    let cup = Cup::new(4);
    let tie = cup.first_tie().await;
    cup.finish_leg(&tie, 0, 1, 0).await;

    let legs = cup.store.tie_matches(tie.id).await.unwrap();
    cup.engine
        .update_match(
            legs[1].id,
            MatchUpdate {
                status: MatchStatus::Live,
                score1: 4,
                score2: 0,
            },
        )
        .await
        .unwrap();

    let result = cup.engine.recalc_tie(tie.id).await.unwrap();
    assert_eq!(result.aggregate, Aggregate { side1: 1, side2: 0 });
    assert_eq!(result.winner, tie.side1);
}

#[tokio::test]
async fn test_recalc_is_idempotent() {
    let cup = Cup::new(2);
    let tie = cup.first_tie().await;
    cup.finish_leg(&tie, 0, 1, 1).await;
    cup.finish_leg(&tie, 1, 0, 2).await;

    let first = cup.engine.recalc_tie(tie.id).await.unwrap();
    let matches_before = cup.store.matches(cup.tournament_id).await.unwrap();
    let second = cup.engine.recalc_tie(tie.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(cup.store.matches(cup.tournament_id).await.unwrap(), matches_before);
}

#[tokio::test]
async fn test_level_aggregate_leaves_winner_unset() {
    let cup = Cup::new(4);
    let tie = cup.first_tie().await;
    cup.finish_leg(&tie, 0, 2, 0).await;
    cup.finish_leg(&tie, 1, 2, 0).await;

    let result = cup.engine.recalc_tie(tie.id).await.unwrap();
    assert_eq!(result.aggregate, Aggregate { side1: 2, side2: 2 });
    assert_eq!(result.winner, None);
}

#[tokio::test]
async fn test_winner_not_advanced_into_next_round() {
    let cup = Cup::new(4);
    let tie = cup.first_tie().await;
    cup.finish_leg(&tie, 0, 3, 0).await;
    cup.finish_leg(&tie, 1, 0, 0).await;

    let views = cup.engine.tie_views(cup.tournament_id).await.unwrap();
    let final_tie = views.last().unwrap();
    assert!(final_tie.tie.is_placeholder());
}

#[tokio::test]
async fn test_unknown_tie() {
    let cup = Cup::new(2);
    let result = cup.engine.recalc_tie(777).await;
    assert!(matches!(result, Err(CompetitionError::TieNotFound(777))));
    assert!(result.unwrap_err().is_not_found());
}

fn player(player_id: i64, role: RosterRole, position: &str) -> NewRosterItem {
    NewRosterItem {
        player_id,
        number: Some(player_id as u32 % 100),
        position: Some(position.to_string()),
        role,
        notes: None,
    }
}

#[tokio::test]
async fn test_replace_roster_keeps_ids_of_remaining_players() {
    let cup = Cup::new(2);
    let team = cup.store.tournament_teams(cup.tournament_id).await.unwrap()[0].clone();

    let first = cup
        .engine
        .replace_roster(
            team.id,
            vec![
                player(501, RosterRole::Starter, "GK"),
                player(502, RosterRole::Starter, "DF"),
            ],
            Some(501),
        )
        .await
        .unwrap();
    let keeper = first.iter().find(|r| r.player_id == 501).unwrap().id;

    let second = cup
        .engine
        .replace_roster(
            team.id,
            vec![
                player(501, RosterRole::Starter, "GK"),
                player(503, RosterRole::Substitute, "FW"),
            ],
            Some(503),
        )
        .await
        .unwrap();

    assert_eq!(second.len(), 2);
    assert_eq!(second.iter().find(|r| r.player_id == 501).unwrap().id, keeper);
    assert!(second.iter().all(|r| r.player_id != 502));

    let roster = cup.engine.team_roster(team.id).await.unwrap();
    assert_eq!(roster.captain().map(|c| c.player_id), Some(503));
}

#[tokio::test]
async fn test_publish_marks_captain_and_reset_replaces() {
    let cup = Cup::new(2);
    let tie = cup.first_tie().await;
    let team_id = tie.side1.unwrap();
    let match_id = cup.store.tie_matches(tie.id).await.unwrap()[0].id;

    cup.engine
        .replace_roster(
            team_id,
            vec![
                player(1, RosterRole::Starter, "GK"),
                player(9, RosterRole::Starter, "FW"),
                player(12, RosterRole::Substitute, "MF"),
            ],
            Some(9),
        )
        .await
        .unwrap();

    let all = PublishRequest {
        match_id,
        team_id,
        role_filter: RoleFilter::All,
        reset: false,
    };
    assert_eq!(cup.engine.publish_roster(&all).await.unwrap().len(), 3);

    let participants = cup.store.participants(match_id).await.unwrap();
    let captains: Vec<_> = participants.iter().filter(|p| p.is_captain).collect();
    assert_eq!(captains.len(), 1);
    assert_eq!(captains[0].position.as_deref(), Some("FW"));
    assert_eq!(
        participants.iter().map(|p| p.sort_order).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    let starters = PublishRequest {
        role_filter: RoleFilter::StartersOnly,
        reset: true,
        ..all
    };
    assert_eq!(cup.engine.publish_roster(&starters).await.unwrap().len(), 2);
    assert_eq!(cup.store.participants(match_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_roster_replace_changes_nothing() {
    let cup = Cup::new(2);
    let team = cup.store.tournament_teams(cup.tournament_id).await.unwrap()[0].clone();
    cup.engine
        .replace_roster(team.id, vec![player(1, RosterRole::Starter, "GK")], None)
        .await
        .unwrap();
    let before = cup.store.roster(team.id).await.unwrap();

    cup.store.fail_next_commit();
    let result = cup
        .engine
        .replace_roster(team.id, vec![player(2, RosterRole::Starter, "DF")], Some(2))
        .await;

    assert!(matches!(result, Err(CompetitionError::TransactionFailed(_))));
    assert_eq!(cup.store.roster(team.id).await.unwrap(), before);
}

#[tokio::test]
async fn test_player_with_cards_cannot_leave_roster() {
    let cup = Cup::new(2);
    let tie = cup.first_tie().await;
    let team_id = tie.side1.unwrap();
    let match_id = cup.store.tie_matches(tie.id).await.unwrap()[0].id;

    let roster = cup
        .engine
        .replace_roster(
            team_id,
            vec![
                player(7, RosterRole::Starter, "MF"),
                player(8, RosterRole::Starter, "DF"),
            ],
            None,
        )
        .await
        .unwrap();
    let booked = roster.iter().find(|r| r.player_id == 8).unwrap().id;

    cup.engine
        .record_event(NewMatchEvent {
            match_id,
            tournament_team_id: team_id,
            roster_item_id: booked,
            kind: MatchEventKind::YellowCard,
            minute: Some(12),
        })
        .await
        .unwrap();
    let before = cup.store.roster(team_id).await.unwrap();

    let result = cup
        .engine
        .replace_roster(team_id, vec![player(7, RosterRole::Starter, "MF")], None)
        .await;

    assert!(matches!(
        result,
        Err(CompetitionError::PlayerHasHistory { player: 8, roster_item }) if roster_item == booked
    ));
    assert!(result.unwrap_err().is_validation());
    assert_eq!(cup.store.roster(team_id).await.unwrap(), before);

    // updating the booked player in place is still allowed
    let updated = cup
        .engine
        .replace_roster(
            team_id,
            vec![
                player(7, RosterRole::Starter, "MF"),
                player(8, RosterRole::Substitute, "DF"),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.iter().find(|r| r.player_id == 8).unwrap().id, booked);
}
