/// Property-based tests for round-robin scheduling and bracket pairing
///
/// These tests check the circle method and seeded pairing against their
/// combinatorial guarantees for arbitrary team counts.
use chrono::{TimeZone, Utc};
use competition_engine::bracket::pair_ranked;
use competition_engine::models::{DisciplinePolicy, RoundKind, TeamFormat};
use competition_engine::schedule::fixture_count;
use competition_engine::{
    CompetitionStore, MemoryStore, RoundRobinScheduler, ScheduleRequest, circle_pairings,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn unordered(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

proptest! {
    #[test]
    fn test_single_cycle_has_n_minus_one_matchdays(n in 2u32..40) {
        let teams: Vec<u32> = (0..n).collect();
        let days = circle_pairings(&teams);
        let expected_days = if n % 2 == 0 { n - 1 } else { n };
        prop_assert_eq!(days.len() as u32, expected_days);
    }

    #[test]
    fn test_every_pair_meets_exactly_once(n in 2u32..40) {
        let teams: Vec<u32> = (0..n).collect();
        let mut seen = HashSet::new();
        for (home, away) in circle_pairings(&teams).into_iter().flatten() {
            prop_assert_ne!(home, away);
            prop_assert!(seen.insert(unordered(home, away)), "{} v {} repeated", home, away);
        }
        prop_assert_eq!(seen.len(), fixture_count(n as usize, 1));
    }

    #[test]
    fn test_team_plays_at_most_once_per_matchday(n in 2u32..40) {
        let teams: Vec<u32> = (0..n).collect();
        for day in circle_pairings(&teams) {
            let mut playing = HashSet::new();
            for (home, away) in day {
                prop_assert!(playing.insert(home));
                prop_assert!(playing.insert(away));
            }
            // with an even count nobody rests
            if n % 2 == 0 {
                prop_assert_eq!(playing.len() as u32, n);
            } else {
                prop_assert_eq!(playing.len() as u32, n - 1);
            }
        }
    }

    #[test]
    fn test_ranked_pairs_sum_to_n_plus_one(power in 1u32..6) {
        let n = 1u32 << power;
        let ranks: Vec<i64> = (1..=i64::from(n)).collect();
        let pairs = pair_ranked(&ranks);
        prop_assert_eq!(pairs.len() as u32, n / 2);
        for (high, low) in pairs {
            prop_assert_eq!(high + low, i64::from(n) + 1);
            prop_assert!(high < low);
        }
    }

    #[test]
    fn test_double_round_mirrors_every_fixture(n in 2usize..12) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let fixtures = runtime.block_on(async {
            let store = MemoryStore::new();
            let tournament =
                store.add_tournament("League", TeamFormat::ElevenASide, DisciplinePolicy::default());
            let teams = (0..n)
                .map(|i| store.enroll_team(tournament.id, &format!("Team {i}"), None).id)
                .collect();
            let round = store.add_round(tournament.id, "Group stage", RoundKind::Matchday(1));
            let group = store.add_group(tournament.id, Some(round.id), "A", teams);
            let scheduler = RoundRobinScheduler::new(Arc::new(store.clone()));

            let created = scheduler
                .generate_group_schedule(&ScheduleRequest {
                    group_id: group.id,
                    round_id: round.id,
                    rounds: 2,
                    start_date: Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap(),
                    match_gap_days: 3,
                })
                .await
                .unwrap();
            assert_eq!(created, fixture_count(n, 2));

            store.matches(tournament.id).await.unwrap()
        });

        let mut orientations: HashMap<(i64, i64), usize> = HashMap::new();
        for fixture in &fixtures {
            *orientations.entry((fixture.team1_id, fixture.team2_id)).or_default() += 1;
        }
        for (&(home, away), &count) in &orientations {
            prop_assert_eq!(count, 1);
            prop_assert_eq!(orientations.get(&(away, home)), Some(&1));
        }
        prop_assert_eq!(fixtures.len(), n * (n - 1));
    }
}
