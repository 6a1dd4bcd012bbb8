//! Operator command line for the competition engine.
//!
//! Each subcommand connects to Postgres, runs one engine operation and prints
//! its result as JSON on stdout.

mod config;
mod logging;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Error, anyhow, bail};
use chrono::{NaiveDate, Utc};
use competition_engine::{
    BracketRequest, BroadcastNotifier, CompetitionEngine, Database, PublishRequest, ScheduleRequest,
    db::{MatchUpdate, NewMatchEvent, NewRosterItem},
    models::{BracketMode, MatchEventKind, MatchStatus, RoleFilter},
};
use pico_args::Arguments;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use tracing::info;

use config::AdminConfig;

const HELP: &str = "\
Administer tournaments stored in the competition database

USAGE:
  ce_admin [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
  migrate                                  Apply schema migrations
  bracket --tournament ID                  Generate a knockout bracket
      [--mode seeded|random] [--legs N] [--third-place] [--no-matches] [--reset]
  ties --tournament ID                     List bracket ties
  schedule --group ID --round ID --start YYYY-MM-DD
      [--cycles 1|2] [--gap DAYS]          Generate round-robin fixtures
  report --match ID --score H-A            Record a match result
      [--status scheduled|live|finished]
  event --match ID --team ID --player ROSTER_ITEM
      --kind goal|yellow-card|red-card [--minute N]
                                           Record a goal or card
  recalc-tie --tie ID                      Recompute a tie aggregate
  serve-suspensions --match ID             Serve suspensions for a finished match
  recompute-discipline --tournament ID     Rebuild all suspensions
  suspensions --tournament ID [--active]   List suspensions
  roster --team ID                         Show a team roster
  replace-roster --team ID --file PATH     Replace a roster from a JSON array
      [--captain PLAYER]
  set-captain --team ID [--player ROSTER_ITEM]
                                           Designate or clear the captain
  publish-roster --match ID --team ID      Copy a roster onto a match
      [--starters-only] [--reset]

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  DB_MAX_CONNECTIONS       Pool size
  NOTIFY_CHANNEL_CAPACITY  Buffered change notifications per command
  QUERY_TIMEOUT_SECS       Bound on single reads
  LONG_OPERATION_TIMEOUT_SECS
                           Bound on discipline rebuilds
  RUST_LOG                 Log filter [default: info,sqlx=warn]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let Some(command) = pargs.subcommand()? else {
        print!("{HELP}");
        bail!("missing command");
    };

    logging::init();

    let config = AdminConfig::from_env(database_url)?;
    config.validate()?;

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

    if command == "migrate" {
        db.migrate().await.context("Failed to apply migrations")?;
        info!("Migrations applied");
        return Ok(());
    }

    let store = db.store().with_query_timeout(config.query_timeout);
    let notifier = Arc::new(BroadcastNotifier::new(config.notify_channel_capacity));
    let mut notifications = notifier.subscribe();
    let engine = CompetitionEngine::new(Arc::new(store), notifier)
        .with_long_operation_timeout(config.long_operation_timeout);

    let start = Instant::now();
    run(&engine, &command, &mut pargs).await?;
    logging::log_performance(&command, start.elapsed(), None);

    while let Ok(notification) = notifications.try_recv() {
        info!(topic = %notification.topic, "{}", notification.payload);
    }

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        tracing::warn!("Ignored arguments: {:?}", remaining);
    }

    db.close().await;
    Ok(())
}

async fn run(
    engine: &CompetitionEngine,
    command: &str,
    pargs: &mut Arguments,
) -> Result<(), Error> {
    match command {
        "bracket" => {
            let tournament_id = pargs.value_from_str("--tournament")?;
            let mode: BracketMode = pargs
                .opt_value_from_fn("--mode", parse_wire)?
                .unwrap_or(BracketMode::Seeded);
            let mut request = match mode {
                BracketMode::Seeded => BracketRequest::seeded(tournament_id),
                BracketMode::Random => BracketRequest::random(tournament_id),
                BracketMode::Explicit => {
                    bail!("explicit pairs are not supported from the command line")
                }
            };
            request = request
                .with_legs(pargs.opt_value_from_str("--legs")?.unwrap_or(1))
                .with_third_place(pargs.contains("--third-place"))
                .with_matches(!pargs.contains("--no-matches"))
                .with_reset(pargs.contains("--reset"));
            print_json(&engine.generate_bracket(&request).await?)
        }
        "ties" => {
            let tournament_id = pargs.value_from_str("--tournament")?;
            print_json(&engine.tie_views(tournament_id).await?)
        }
        "schedule" => {
            let start: NaiveDate = pargs.value_from_str("--start")?;
            let start_date = start
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow!("invalid start date"))?
                .and_utc();
            let request = ScheduleRequest {
                group_id: pargs.value_from_str("--group")?,
                round_id: pargs.value_from_str("--round")?,
                rounds: pargs.opt_value_from_str("--cycles")?.unwrap_or(1),
                start_date,
                match_gap_days: pargs.opt_value_from_str("--gap")?.unwrap_or(7),
            };
            let created = engine.generate_group_schedule(&request).await?;
            print_json(&serde_json::json!({ "group_id": request.group_id, "created": created }))
        }
        "report" => {
            let match_id = pargs.value_from_str("--match")?;
            let (score1, score2) = pargs.value_from_fn("--score", parse_score)?;
            let status = pargs
                .opt_value_from_fn("--status", parse_wire)?
                .unwrap_or(MatchStatus::Finished);
            let report = engine
                .update_match(
                    match_id,
                    MatchUpdate {
                        status,
                        score1,
                        score2,
                    },
                )
                .await?;
            print_json(&report)
        }
        "event" => {
            let event = NewMatchEvent {
                match_id: pargs.value_from_str("--match")?,
                tournament_team_id: pargs.value_from_str("--team")?,
                roster_item_id: pargs.value_from_str("--player")?,
                kind: pargs.value_from_fn("--kind", parse_wire::<MatchEventKind>)?,
                minute: pargs.opt_value_from_str("--minute")?,
            };
            print_json(&engine.record_event(event).await?)
        }
        "recalc-tie" => {
            let tie_id = pargs.value_from_str("--tie")?;
            print_json(&engine.recalc_tie(tie_id).await?)
        }
        "serve-suspensions" => {
            let match_id = pargs.value_from_str("--match")?;
            print_json(&engine.serve_suspensions(match_id).await?)
        }
        "recompute-discipline" => {
            let tournament_id = pargs.value_from_str("--tournament")?;
            print_json(&engine.recompute_discipline(tournament_id).await?)
        }
        "suspensions" => {
            let tournament_id = pargs.value_from_str("--tournament")?;
            let suspensions = if pargs.contains("--active") {
                engine.active_suspensions(tournament_id, Utc::now()).await?
            } else {
                engine.suspensions(tournament_id).await?
            };
            print_json(&suspensions)
        }
        "roster" => {
            let team_id = pargs.value_from_str("--team")?;
            print_json(&engine.team_roster(team_id).await?)
        }
        "replace-roster" => {
            let team_id = pargs.value_from_str("--team")?;
            let path: String = pargs.value_from_str("--file")?;
            let captain = pargs.opt_value_from_str("--captain")?;
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read roster file {path}"))?;
            let items = parse_roster(&json)?;
            print_json(&engine.replace_roster(team_id, items, captain).await?)
        }
        "set-captain" => {
            let team_id = pargs.value_from_str("--team")?;
            let roster_item_id = pargs.opt_value_from_str("--player")?;
            engine.set_captain(team_id, roster_item_id).await?;
            print_json(&engine.team_roster(team_id).await?)
        }
        "publish-roster" => {
            let request = PublishRequest {
                match_id: pargs.value_from_str("--match")?,
                team_id: pargs.value_from_str("--team")?,
                role_filter: if pargs.contains("--starters-only") {
                    RoleFilter::StartersOnly
                } else {
                    RoleFilter::All
                },
                reset: pargs.contains("--reset"),
            };
            print_json(&engine.publish_roster(&request).await?)
        }
        other => bail!("unknown command {other:?}, see --help"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a lowercase CLI word into an enum using its wire name
fn parse_wire<T>(s: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    s.replace('-', "_")
        .to_uppercase()
        .parse()
        .map_err(|e: T::Err| e.to_string())
}

/// Parse a roster file: a JSON array of entries with `player_id` and `role`
fn parse_roster(json: &str) -> Result<Vec<NewRosterItem>, Error> {
    serde_json::from_str(json).context("Invalid roster JSON")
}

/// Parse a `home-away` score such as `2-1`
fn parse_score(s: &str) -> Result<(u32, u32), String> {
    let (home, away) = s
        .split_once('-')
        .ok_or_else(|| format!("expected HOME-AWAY, got {s:?}"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid score {part:?}: {e}"))
    };
    Ok((parse(home)?, parse(away)?))
}
