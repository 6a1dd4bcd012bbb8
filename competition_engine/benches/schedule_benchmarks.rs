use chrono::{TimeZone, Utc};
use competition_engine::bracket::{pair_ranked, seeded_order};
use competition_engine::models::{DisciplinePolicy, RoundKind, TeamFormat, TournamentTeam};
use competition_engine::{
    BracketRequest, CompetitionEngine, MemoryStore, NoopNotifier, RoundRobinScheduler,
    ScheduleRequest, circle_pairings,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn teams(n: u32) -> Vec<TournamentTeam> {
    (1..=n)
        .rev()
        .map(|i| TournamentTeam {
            id: i64::from(i),
            tournament_id: 1,
            team_id: i64::from(i),
            name: format!("Team {i:02}"),
            seed: if i % 3 == 0 { None } else { Some(i) },
            captain_id: None,
        })
        .collect()
}

fn bench_circle_pairings(c: &mut Criterion) {
    let mut group = c.benchmark_group("circle_pairings");

    for n in [4usize, 7, 16, 33, 64].iter() {
        let ids: Vec<i64> = (0..*n as i64).collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_teams", n)),
            &ids,
            |b, ids| {
                b.iter(|| circle_pairings(black_box(ids)));
            },
        );
    }

    group.finish();
}

fn bench_seeded_pairing(c: &mut Criterion) {
    let mut group = c.benchmark_group("seeded_pairing");

    for n in [8u32, 32].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_teams", n)),
            n,
            |b, &n| {
                b.iter_batched(
                    || teams(n),
                    |mut teams| {
                        seeded_order(&mut teams);
                        let ranked: Vec<i64> = teams.iter().map(|t| t.id).collect();
                        pair_ranked(&ranked)
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_generate_bracket(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("generate_bracket");

    for n in [8u32, 32].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_teams", n)),
            n,
            |b, &n| {
                b.iter_batched(
                    || {
                        let store = MemoryStore::new();
                        let cup = store.add_tournament(
                            "Bench Cup",
                            TeamFormat::ElevenASide,
                            DisciplinePolicy::default(),
                        );
                        for seed in 1..=n {
                            store.enroll_team(cup.id, &format!("Team {seed}"), Some(seed));
                        }
                        let engine =
                            CompetitionEngine::new(Arc::new(store), Arc::new(NoopNotifier));
                        (engine, cup.id)
                    },
                    |(engine, tournament_id)| {
                        rt.block_on(async {
                            engine
                                .generate_bracket(
                                    &BracketRequest::seeded(tournament_id).with_legs(2),
                                )
                                .await
                                .unwrap()
                        })
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_group_schedule(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("group_schedule");

    for n in [6usize, 20].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_teams", n)),
            n,
            |b, &n| {
                b.iter_batched(
                    || {
                        let store = MemoryStore::new();
                        let league = store.add_tournament(
                            "Bench League",
                            TeamFormat::SevenASide,
                            DisciplinePolicy::default(),
                        );
                        let ids = (0..n)
                            .map(|i| store.enroll_team(league.id, &format!("Team {i}"), None).id)
                            .collect();
                        let round = store.add_round(league.id, "Groups", RoundKind::Matchday(1));
                        let group = store.add_group(league.id, Some(round.id), "A", ids);
                        let request = ScheduleRequest {
                            group_id: group.id,
                            round_id: round.id,
                            rounds: 2,
                            start_date: Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).unwrap(),
                            match_gap_days: 7,
                        };
                        (RoundRobinScheduler::new(Arc::new(store)), request)
                    },
                    |(scheduler, request)| {
                        rt.block_on(scheduler.generate_group_schedule(&request))
                            .unwrap()
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(pairing, bench_circle_pairings, bench_seeded_pairing);

criterion_group!(planning, bench_generate_bracket, bench_group_schedule);

criterion_main!(pairing, planning);
