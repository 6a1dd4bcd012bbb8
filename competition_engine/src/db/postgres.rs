//! PostgreSQL implementation of [`CompetitionStore`].
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::repository::{
    BracketPlan, CompetitionStore, MatchTransition, MatchUpdate, NewMatch, NewMatchEvent,
    NewRosterItem, NewSuspension, NewTie,
};
use super::timeouts::{DEFAULT_QUERY_TIMEOUT, with_timeout};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{
    Aggregate, DisciplinePolicy, Group, GroupId, Match, MatchEvent, MatchId, MatchParticipant,
    MatchStatus, RosterItem, RosterItemId, Round, RoundId, RoundKind, Stage, Suspension,
    SuspensionId, Tie, TieId, Tournament, TournamentId, TournamentTeam, TournamentTeamId,
};

const MATCH_COLUMNS: &str = "id, tournament_id, round_id, group_id, tie_id, leg, matchday, \
     team1_id, team2_id, scheduled_at, status, score1, score2";

const SUSPENSION_SELECT: &str = r#"
    SELECT s.id, s.tournament_id, s.roster_item_id, s.reason, s.match_id, s.starts_after,
           s.remaining_games, s.active,
           COALESCE(array_agg(ss.match_id) FILTER (WHERE ss.match_id IS NOT NULL), '{}') AS served
    FROM suspensions s
    LEFT JOIN suspension_servings ss ON ss.suspension_id = s.id
"#;

/// Postgres-backed competition store
#[derive(Clone)]
pub struct PgCompetitionStore {
    pool: Arc<PgPool>,
    query_timeout: Duration,
}

impl PgCompetitionStore {
    /// Create a new store over a connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the timeout applied to read queries
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    async fn find_or_create_round(
        tx: &mut Transaction<'_, Postgres>,
        tournament_id: TournamentId,
        stage: Stage,
    ) -> CompetitionResult<RoundId> {
        let existing = sqlx::query(
            "SELECT id FROM rounds WHERE tournament_id = $1 AND stage = $2 ORDER BY id LIMIT 1",
        )
        .bind(tournament_id)
        .bind(stage.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = existing {
            return Ok(row.get("id"));
        }

        let row = sqlx::query(
            "INSERT INTO rounds (tournament_id, name, stage) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(tournament_id)
        .bind(stage.display_name())
        .bind(stage.as_str())
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }

    async fn insert_tie(
        tx: &mut Transaction<'_, Postgres>,
        tournament_id: TournamentId,
        round_id: RoundId,
        tie: &NewTie,
    ) -> CompetitionResult<TieId> {
        let row = sqlx::query(
            r#"
            INSERT INTO ties (round_id, side1_id, side2_id, legs)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(round_id)
        .bind(tie.side1)
        .bind(tie.side2)
        .bind(tie.legs as i32)
        .fetch_one(&mut **tx)
        .await?;
        let tie_id: TieId = row.get("id");

        for leg in &tie.matches {
            sqlx::query(
                r#"
                INSERT INTO matches (tournament_id, round_id, tie_id, leg, team1_id, team2_id, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(tournament_id)
            .bind(round_id)
            .bind(tie_id)
            .bind(leg.leg as i32)
            .bind(leg.team1_id)
            .bind(leg.team2_id)
            .bind(MatchStatus::Scheduled.as_str())
            .execute(&mut **tx)
            .await?;
        }

        Ok(tie_id)
    }

    async fn insert_suspension_tx(
        tx: &mut Transaction<'_, Postgres>,
        new: &NewSuspension,
    ) -> CompetitionResult<Suspension> {
        let row = sqlx::query(
            r#"
            INSERT INTO suspensions
                (tournament_id, roster_item_id, reason, match_id, starts_after, remaining_games, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(new.tournament_id)
        .bind(new.roster_item_id)
        .bind(new.reason.as_str())
        .bind(new.match_id)
        .bind(new.starts_after.naive_utc())
        .bind(new.remaining_games as i32)
        .bind(new.active)
        .fetch_one(&mut **tx)
        .await?;
        let id: SuspensionId = row.get("id");

        for match_id in &new.served_match_ids {
            sqlx::query("INSERT INTO suspension_servings (suspension_id, match_id) VALUES ($1, $2)")
                .bind(id)
                .bind(match_id)
                .execute(&mut **tx)
                .await?;
        }

        Ok(Suspension {
            id,
            tournament_id: new.tournament_id,
            roster_item_id: new.roster_item_id,
            reason: new.reason,
            match_id: new.match_id,
            starts_after: new.starts_after,
            remaining_games: new.remaining_games,
            active: new.active,
            served_match_ids: new.served_match_ids.clone(),
        })
    }
}

/// Scores are stored in INTEGER columns
fn score_column(value: u32) -> CompetitionResult<i32> {
    i32::try_from(value).map_err(|_| CompetitionError::ScoreOutOfRange(value))
}

fn tournament_from_row(row: &PgRow) -> CompetitionResult<Tournament> {
    Ok(Tournament {
        id: row.get("id"),
        name: row.get("name"),
        team_format: row.get::<String, _>("team_format").parse()?,
        discipline: DisciplinePolicy {
            enabled: row.get("discipline_enabled"),
            scope: row.get::<String, _>("accumulation_scope").parse()?,
            yellow_to_suspend: row.get::<i32, _>("yellow_to_suspend") as u32,
            red_to_suspend: row.get::<i32, _>("red_to_suspend") as u32,
            suspension_games: row.get::<i32, _>("suspension_games") as u32,
        },
    })
}

fn team_from_row(row: &PgRow) -> TournamentTeam {
    TournamentTeam {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        team_id: row.get("team_id"),
        name: row.get("name"),
        seed: row.get::<Option<i32>, _>("seed").map(|s| s as u32),
        captain_id: row.get("captain_id"),
    }
}

fn roster_item_from_row(row: &PgRow) -> CompetitionResult<RosterItem> {
    Ok(RosterItem {
        id: row.get("id"),
        tournament_team_id: row.get("tournament_team_id"),
        player_id: row.get("player_id"),
        number: row.get::<Option<i32>, _>("number").map(|n| n as u32),
        position: row.get("position"),
        role: row.get::<String, _>("role").parse()?,
        notes: row.get("notes"),
    })
}

fn round_from_row(row: &PgRow) -> CompetitionResult<Round> {
    let id: RoundId = row.get("id");
    let stage: Option<String> = row.get("stage");
    let matchday: Option<i32> = row.get("matchday");
    let kind = match (stage, matchday) {
        (Some(stage), _) => RoundKind::Elimination(stage.parse()?),
        (None, Some(day)) => RoundKind::Matchday(day as u32),
        (None, None) => {
            return Err(CompetitionError::TransactionFailed(format!(
                "round {id} has neither stage nor matchday"
            )));
        }
    };

    Ok(Round {
        id,
        tournament_id: row.get("tournament_id"),
        name: row.get("name"),
        kind,
    })
}

fn tie_from_row(row: &PgRow) -> Tie {
    let aggregate1: Option<i32> = row.get("aggregate1");
    let aggregate2: Option<i32> = row.get("aggregate2");
    Tie {
        id: row.get("id"),
        round_id: row.get("round_id"),
        side1: row.get("side1_id"),
        side2: row.get("side2_id"),
        legs: row.get::<i32, _>("legs") as u32,
        aggregate: aggregate1.zip(aggregate2).map(|(a, b)| Aggregate {
            side1: a as u32,
            side2: b as u32,
        }),
        winner: row.get("winner_id"),
    }
}

fn match_from_row(row: &PgRow) -> CompetitionResult<Match> {
    Ok(Match {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        round_id: row.get("round_id"),
        group_id: row.get("group_id"),
        tie_id: row.get("tie_id"),
        leg: row.get::<Option<i32>, _>("leg").map(|l| l as u32),
        matchday: row.get::<Option<i32>, _>("matchday").map(|d| d as u32),
        team1_id: row.get("team1_id"),
        team2_id: row.get("team2_id"),
        scheduled_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("scheduled_at")
            .map(|dt| dt.and_utc()),
        status: row.get::<String, _>("status").parse()?,
        score1: row.get::<i32, _>("score1") as u32,
        score2: row.get::<i32, _>("score2") as u32,
    })
}

fn event_from_row(row: &PgRow) -> CompetitionResult<MatchEvent> {
    Ok(MatchEvent {
        id: row.get("id"),
        match_id: row.get("match_id"),
        tournament_team_id: row.get("tournament_team_id"),
        roster_item_id: row.get("roster_item_id"),
        kind: row.get::<String, _>("kind").parse()?,
        minute: row.get::<Option<i32>, _>("minute").map(|m| m as u32),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

fn suspension_from_row(row: &PgRow) -> CompetitionResult<Suspension> {
    Ok(Suspension {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        roster_item_id: row.get("roster_item_id"),
        reason: row.get::<String, _>("reason").parse()?,
        match_id: row.get("match_id"),
        starts_after: row.get::<chrono::NaiveDateTime, _>("starts_after").and_utc(),
        remaining_games: row.get::<i32, _>("remaining_games") as u32,
        active: row.get("active"),
        served_match_ids: row
            .get::<Vec<i64>, _>("served")
            .into_iter()
            .collect::<BTreeSet<_>>(),
    })
}

fn participant_from_row(row: &PgRow) -> CompetitionResult<MatchParticipant> {
    Ok(MatchParticipant {
        match_id: row.get("match_id"),
        tournament_team_id: row.get("tournament_team_id"),
        roster_item_id: row.get("roster_item_id"),
        role: row.get::<String, _>("role").parse()?,
        position: row.get("position"),
        number: row.get::<Option<i32>, _>("number").map(|n| n as u32),
        is_captain: row.get("is_captain"),
        sort_order: row.get::<i32, _>("sort_order") as u32,
    })
}

#[async_trait]
impl CompetitionStore for PgCompetitionStore {
    async fn tournament(&self, id: TournamentId) -> CompetitionResult<Option<Tournament>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                SELECT id, name, team_format, discipline_enabled, accumulation_scope,
                       yellow_to_suspend, red_to_suspend, suspension_games
                FROM tournaments
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn tournament_teams(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<TournamentTeam>> {
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, tournament_id, team_id, name, seed, captain_id
                 FROM tournament_teams WHERE tournament_id = $1 ORDER BY id",
            )
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows.iter().map(team_from_row).collect())
    }

    async fn tournament_team(
        &self,
        id: TournamentTeamId,
    ) -> CompetitionResult<Option<TournamentTeam>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, tournament_id, team_id, name, seed, captain_id
                 FROM tournament_teams WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.as_ref().map(team_from_row))
    }

    async fn roster(&self, team_id: TournamentTeamId) -> CompetitionResult<Vec<RosterItem>> {
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, tournament_team_id, player_id, number, position, role, notes
                 FROM roster_items WHERE tournament_team_id = $1 ORDER BY id",
            )
            .bind(team_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(roster_item_from_row).collect()
    }

    async fn roster_item(&self, id: RosterItemId) -> CompetitionResult<Option<RosterItem>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, tournament_team_id, player_id, number, position, role, notes
                 FROM roster_items WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(roster_item_from_row).transpose()
    }

    async fn rounds(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Round>> {
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, tournament_id, name, stage, matchday
                 FROM rounds WHERE tournament_id = $1 ORDER BY id",
            )
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(round_from_row).collect()
    }

    async fn round(&self, id: RoundId) -> CompetitionResult<Option<Round>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query("SELECT id, tournament_id, name, stage, matchday FROM rounds WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(round_from_row).transpose()
    }

    async fn group(&self, id: GroupId) -> CompetitionResult<Option<Group>> {
        let Some(row) = with_timeout(
            self.query_timeout,
            sqlx::query("SELECT id, tournament_id, round_id, name FROM groups WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?
        else {
            return Ok(None);
        };

        let members = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT tournament_team_id FROM group_teams WHERE group_id = $1 ORDER BY position",
            )
            .bind(id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(Some(Group {
            id: row.get("id"),
            tournament_id: row.get("tournament_id"),
            round_id: row.get("round_id"),
            name: row.get("name"),
            team_ids: members
                .iter()
                .map(|r| r.get("tournament_team_id"))
                .collect(),
        }))
    }

    async fn ties(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Tie>> {
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                SELECT t.id, t.round_id, t.side1_id, t.side2_id, t.legs,
                       t.aggregate1, t.aggregate2, t.winner_id
                FROM ties t
                JOIN rounds r ON r.id = t.round_id
                WHERE r.tournament_id = $1
                ORDER BY t.round_id, t.id
                "#,
            )
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows.iter().map(tie_from_row).collect())
    }

    async fn tie(&self, id: TieId) -> CompetitionResult<Option<Tie>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT id, round_id, side1_id, side2_id, legs, aggregate1, aggregate2, winner_id
                 FROM ties WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.as_ref().map(tie_from_row))
    }

    async fn get_match(&self, id: MatchId) -> CompetitionResult<Option<Match>> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1");
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(&sql).bind(id).fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn matches(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Match>> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE tournament_id = $1 ORDER BY id");
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(&sql)
                .bind(tournament_id)
                .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    async fn tie_matches(&self, tie_id: TieId) -> CompetitionResult<Vec<Match>> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE tie_id = $1 ORDER BY leg, id");
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(&sql).bind(tie_id).fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    async fn match_events(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<MatchEvent>> {
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                SELECT e.id, e.match_id, e.tournament_team_id, e.roster_item_id, e.kind,
                       e.minute, e.created_at
                FROM match_events e
                JOIN matches m ON m.id = e.match_id
                WHERE m.tournament_id = $1
                ORDER BY e.id
                "#,
            )
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn suspensions(&self, tournament_id: TournamentId) -> CompetitionResult<Vec<Suspension>> {
        let sql = format!("{SUSPENSION_SELECT} WHERE s.tournament_id = $1 GROUP BY s.id ORDER BY s.id");
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(&sql)
                .bind(tournament_id)
                .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(suspension_from_row).collect()
    }

    async fn participants(&self, match_id: MatchId) -> CompetitionResult<Vec<MatchParticipant>> {
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                SELECT match_id, tournament_team_id, roster_item_id, role, position, number,
                       is_captain, sort_order
                FROM match_participants
                WHERE match_id = $1
                ORDER BY tournament_team_id, sort_order
                "#,
            )
            .bind(match_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(participant_from_row).collect()
    }

    async fn apply_bracket(&self, plan: &BracketPlan) -> CompetitionResult<()> {
        let mut tx = self.pool.begin().await?;

        if plan.reset {
            let stages: Vec<String> = plan
                .touched_stages()
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            let round_ids: Vec<RoundId> = sqlx::query(
                "SELECT id FROM rounds WHERE tournament_id = $1 AND stage = ANY($2)",
            )
            .bind(plan.tournament_id)
            .bind(&stages)
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|r| r.get("id"))
            .collect();

            sqlx::query(
                r#"
                DELETE FROM matches
                WHERE round_id = ANY($1)
                   OR tie_id IN (SELECT id FROM ties WHERE round_id = ANY($1))
                "#,
            )
            .bind(&round_ids)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM ties WHERE round_id = ANY($1)")
                .bind(&round_ids)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM rounds WHERE id = ANY($1)")
                .bind(&round_ids)
                .execute(&mut *tx)
                .await?;
        }

        for stage_plan in &plan.stages {
            let round_id =
                Self::find_or_create_round(&mut tx, plan.tournament_id, stage_plan.stage).await?;
            for tie in &stage_plan.ties {
                Self::insert_tie(&mut tx, plan.tournament_id, round_id, tie).await?;
            }
        }

        if let Some(tie) = &plan.third_place {
            let round_id =
                Self::find_or_create_round(&mut tx, plan.tournament_id, Stage::ThirdPlace).await?;
            let present: bool =
                sqlx::query("SELECT EXISTS(SELECT 1 FROM ties WHERE round_id = $1) AS present")
                    .bind(round_id)
                    .fetch_one(&mut *tx)
                    .await?
                    .get("present");
            if !present {
                Self::insert_tie(&mut tx, plan.tournament_id, round_id, tie).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_matches(&self, matches: &[NewMatch]) -> CompetitionResult<Vec<MatchId>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(matches.len());

        for new in matches {
            let row = sqlx::query(
                r#"
                INSERT INTO matches
                    (tournament_id, round_id, group_id, matchday, team1_id, team2_id, scheduled_at, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(new.tournament_id)
            .bind(new.round_id)
            .bind(new.group_id)
            .bind(new.matchday.map(|d| d as i32))
            .bind(new.team1_id)
            .bind(new.team2_id)
            .bind(new.scheduled_at.map(|dt| dt.naive_utc()))
            .bind(MatchStatus::Scheduled.as_str())
            .fetch_one(&mut *tx)
            .await?;
            ids.push(row.get("id"));
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn update_match(
        &self,
        id: MatchId,
        update: MatchUpdate,
    ) -> CompetitionResult<MatchTransition> {
        let mut tx = self.pool.begin().await?;

        // Row lock so two reports cannot both observe the pre-FINISHED status
        let previous: MatchStatus = sqlx::query("SELECT status FROM matches WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CompetitionError::MatchNotFound(id))?
            .get::<String, _>("status")
            .parse()?;

        if !previous.can_transition_to(update.status) {
            return Err(CompetitionError::InvalidTransition {
                from: previous,
                to: update.status,
            });
        }

        let sql = format!(
            "UPDATE matches SET status = $1, score1 = $2, score2 = $3 WHERE id = $4 RETURNING {MATCH_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(update.status.as_str())
            .bind(score_column(update.score1)?)
            .bind(score_column(update.score2)?)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let current = match_from_row(&row)?;

        tx.commit().await?;
        Ok(MatchTransition { previous, current })
    }

    async fn save_tie_result(
        &self,
        id: TieId,
        aggregate: Aggregate,
        winner: Option<TournamentTeamId>,
    ) -> CompetitionResult<()> {
        let result = sqlx::query(
            "UPDATE ties SET aggregate1 = $1, aggregate2 = $2, winner_id = $3 WHERE id = $4",
        )
        .bind(score_column(aggregate.side1)?)
        .bind(score_column(aggregate.side2)?)
        .bind(winner)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CompetitionError::TieNotFound(id));
        }
        Ok(())
    }

    async fn insert_event(&self, event: &NewMatchEvent) -> CompetitionResult<MatchEvent> {
        let row = sqlx::query(
            r#"
            INSERT INTO match_events (match_id, tournament_team_id, roster_item_id, kind, minute)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, match_id, tournament_team_id, roster_item_id, kind, minute, created_at
            "#,
        )
        .bind(event.match_id)
        .bind(event.tournament_team_id)
        .bind(event.roster_item_id)
        .bind(event.kind.as_str())
        .bind(event.minute.map(|m| m as i32))
        .fetch_one(self.pool.as_ref())
        .await?;

        event_from_row(&row)
    }

    async fn insert_suspension(
        &self,
        suspension: &NewSuspension,
    ) -> CompetitionResult<Suspension> {
        let mut tx = self.pool.begin().await?;
        let stored = Self::insert_suspension_tx(&mut tx, suspension).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn serve_suspensions(
        &self,
        match_id: MatchId,
        suspension_ids: &[SuspensionId],
    ) -> CompetitionResult<Vec<Suspension>> {
        let mut tx = self.pool.begin().await?;
        let mut changed: Vec<SuspensionId> = Vec::new();

        for id in suspension_ids {
            // The servings primary key is what makes a match count only once
            let inserted = sqlx::query(
                r#"
                INSERT INTO suspension_servings (suspension_id, match_id)
                SELECT $1, $2
                WHERE EXISTS (SELECT 1 FROM suspensions WHERE id = $1 AND remaining_games > 0)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(match_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 0 {
                continue;
            }

            sqlx::query(
                r#"
                UPDATE suspensions
                SET remaining_games = remaining_games - 1,
                    active = active AND remaining_games - 1 > 0
                WHERE id = $1
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            changed.push(*id);
        }

        let sql = format!("{SUSPENSION_SELECT} WHERE s.id = ANY($1) GROUP BY s.id ORDER BY s.id");
        let rows = sqlx::query(&sql).bind(&changed).fetch_all(&mut *tx).await?;
        let suspensions = rows
            .iter()
            .map(suspension_from_row)
            .collect::<CompetitionResult<Vec<_>>>()?;

        tx.commit().await?;
        Ok(suspensions)
    }

    async fn replace_suspensions(
        &self,
        tournament_id: TournamentId,
        suspensions: &[NewSuspension],
    ) -> CompetitionResult<Vec<Suspension>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM suspensions WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(suspensions.len());
        for new in suspensions {
            stored.push(Self::insert_suspension_tx(&mut tx, new).await?);
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn replace_participants(
        &self,
        match_id: MatchId,
        team_id: TournamentTeamId,
        entries: &[MatchParticipant],
        reset: bool,
    ) -> CompetitionResult<()> {
        let mut tx = self.pool.begin().await?;

        if reset {
            sqlx::query(
                "DELETE FROM match_participants WHERE match_id = $1 AND tournament_team_id = $2",
            )
            .bind(match_id)
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        }

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO match_participants
                    (match_id, tournament_team_id, roster_item_id, role, position, number, is_captain, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (match_id, roster_item_id) DO NOTHING
                "#,
            )
            .bind(entry.match_id)
            .bind(entry.tournament_team_id)
            .bind(entry.roster_item_id)
            .bind(entry.role.as_str())
            .bind(&entry.position)
            .bind(entry.number.map(|n| n as i32))
            .bind(entry.is_captain)
            .bind(entry.sort_order as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_roster(
        &self,
        team_id: TournamentTeamId,
        items: &[NewRosterItem],
        captain_player_id: Option<i64>,
    ) -> CompetitionResult<Vec<RosterItem>> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT id FROM tournament_teams WHERE id = $1 FOR UPDATE")
            .bind(team_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(CompetitionError::TeamNotFound(team_id));
        }

        let kept: Vec<i64> = items.iter().map(|i| i.player_id).collect();
        let with_history = sqlx::query(
            r#"
            SELECT r.id, r.player_id
            FROM roster_items r
            WHERE r.tournament_team_id = $1
              AND NOT (r.player_id = ANY($2))
              AND (
                  EXISTS (SELECT 1 FROM match_events e WHERE e.roster_item_id = r.id)
                  OR EXISTS (SELECT 1 FROM suspensions s WHERE s.roster_item_id = r.id)
                  OR EXISTS (SELECT 1 FROM match_participants p WHERE p.roster_item_id = r.id)
              )
            ORDER BY r.id
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .bind(&kept)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = with_history {
            return Err(CompetitionError::PlayerHasHistory {
                player: row.get("player_id"),
                roster_item: row.get("id"),
            });
        }

        sqlx::query(
            "DELETE FROM roster_items WHERE tournament_team_id = $1 AND NOT (player_id = ANY($2))",
        )
        .bind(team_id)
        .bind(&kept)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO roster_items (tournament_team_id, player_id, number, position, role, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (tournament_team_id, player_id) DO UPDATE
                SET number = EXCLUDED.number,
                    position = EXCLUDED.position,
                    role = EXCLUDED.role,
                    notes = EXCLUDED.notes
                "#,
            )
            .bind(team_id)
            .bind(item.player_id)
            .bind(item.number.map(|n| n as i32))
            .bind(&item.position)
            .bind(item.role.as_str())
            .bind(&item.notes)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE tournament_teams
            SET captain_id = (
                SELECT id FROM roster_items WHERE tournament_team_id = $1 AND player_id = $2
            )
            WHERE id = $1
            "#,
        )
        .bind(team_id)
        .bind(captain_player_id)
        .execute(&mut *tx)
        .await?;

        let rows = sqlx::query(
            "SELECT id, tournament_team_id, player_id, number, position, role, notes
             FROM roster_items WHERE tournament_team_id = $1 ORDER BY id",
        )
        .bind(team_id)
        .fetch_all(&mut *tx)
        .await?;
        let roster = rows
            .iter()
            .map(roster_item_from_row)
            .collect::<CompetitionResult<Vec<_>>>()?;

        tx.commit().await?;
        Ok(roster)
    }

    async fn set_captain(
        &self,
        team_id: TournamentTeamId,
        roster_item_id: Option<RosterItemId>,
    ) -> CompetitionResult<()> {
        let result = sqlx::query("UPDATE tournament_teams SET captain_id = $1 WHERE id = $2")
            .bind(roster_item_id)
            .bind(team_id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CompetitionError::TeamNotFound(team_id));
        }
        Ok(())
    }
}
