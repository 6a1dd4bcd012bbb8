//! Discipline tracker: issues, serves and rebuilds suspensions.

use chrono::Utc;
use log::{debug, info};
use serde_json::json;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::ScopeKey;
use crate::db::repository::{CompetitionStore, NewSuspension};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::models::{
    CardType, Match, MatchId, MatchStatus, RosterItemId, Suspension, Tournament, TournamentId,
    TournamentTeamId,
};
use crate::notify::{self, Notifier};

/// Discipline tracker
#[derive(Clone)]
pub struct DisciplineTracker {
    store: Arc<dyn CompetitionStore>,
    notifier: Arc<dyn Notifier>,
}

impl DisciplineTracker {
    pub fn new(store: Arc<dyn CompetitionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    async fn load_match(&self, match_id: MatchId) -> CompetitionResult<(Match, Tournament)> {
        let fixture = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(CompetitionError::MatchNotFound(match_id))?;
        let tournament = self
            .store
            .tournament(fixture.tournament_id)
            .await?
            .ok_or(CompetitionError::TournamentNotFound(fixture.tournament_id))?;
        Ok((fixture, tournament))
    }

    /// Check a freshly recorded card against the suspension threshold.
    ///
    /// The card event must already be stored. Returns the suspension issued
    /// by this card, or `None` when the count is not exactly at the
    /// threshold or this card already produced one.
    pub async fn record_card_event(
        &self,
        match_id: MatchId,
        roster_item_id: RosterItemId,
        card: CardType,
    ) -> CompetitionResult<Option<Suspension>> {
        let (fixture, tournament) = self.load_match(match_id).await?;
        let policy = &tournament.discipline;
        if !policy.enabled {
            return Ok(None);
        }

        self.store
            .roster_item(roster_item_id)
            .await?
            .ok_or(CompetitionError::RosterItemNotFound(roster_item_id))?;

        let Some(threshold) = policy.threshold(card) else {
            return Ok(None);
        };

        let scope = ScopeKey::of(policy.scope, &fixture);
        let matches: HashMap<MatchId, Match> = self
            .store
            .matches(tournament.id)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let count = self
            .store
            .match_events(tournament.id)
            .await?
            .iter()
            .filter(|e| e.roster_item_id == roster_item_id && e.kind == card.event_kind())
            .filter(|e| matches.get(&e.match_id).is_some_and(|m| scope.contains(m)))
            .count() as u32;

        debug!(
            "Roster item {} has {} {} card(s) in {:?} (threshold {})",
            roster_item_id, count, card, scope, threshold
        );

        if count != threshold {
            return Ok(None);
        }

        let reason = card.reason();
        let already_issued = self
            .store
            .suspensions(tournament.id)
            .await?
            .iter()
            .any(|s| s.roster_item_id == roster_item_id && s.reason == reason && s.match_id == match_id);
        if already_issued {
            debug!(
                "Suspension for roster item {} from match {} already exists",
                roster_item_id, match_id
            );
            return Ok(None);
        }

        let suspension = self
            .store
            .insert_suspension(&NewSuspension {
                tournament_id: tournament.id,
                roster_item_id,
                reason,
                match_id,
                starts_after: fixture.scheduled_at.unwrap_or_else(Utc::now),
                remaining_games: policy.suspension_games,
                active: policy.suspension_games > 0,
                served_match_ids: BTreeSet::new(),
            })
            .await?;

        info!(
            "Suspended roster item {} for {} game(s) ({}) after match {}",
            roster_item_id, suspension.remaining_games, reason, match_id
        );
        notify::publish_json(
            self.notifier.as_ref(),
            notify::SUSPENSION_UPDATED,
            &suspension,
        );

        Ok(Some(suspension))
    }

    /// Count a finished match against the bans of both teams' players.
    ///
    /// A ban is charged at most once per match no matter how often this
    /// runs. Unfinished matches serve nothing.
    pub async fn serve_suspensions(&self, match_id: MatchId) -> CompetitionResult<Vec<Suspension>> {
        let (fixture, tournament) = self.load_match(match_id).await?;
        if !tournament.discipline.enabled {
            return Ok(Vec::new());
        }
        if fixture.status != MatchStatus::Finished {
            debug!("Match {} is not finished; nothing served", match_id);
            return Ok(Vec::new());
        }

        let mut players: HashSet<RosterItemId> = HashSet::new();
        for team_id in [fixture.team1_id, fixture.team2_id] {
            players.extend(self.store.roster(team_id).await?.iter().map(|r| r.id));
        }

        let due: Vec<_> = self
            .store
            .suspensions(tournament.id)
            .await?
            .into_iter()
            .filter(|s| players.contains(&s.roster_item_id))
            .filter(|s| s.applies_to(&fixture) && !s.served_match_ids.contains(&match_id))
            .map(|s| s.id)
            .collect();

        if due.is_empty() {
            return Ok(Vec::new());
        }

        let changed = self.store.serve_suspensions(match_id, &due).await?;
        for suspension in &changed {
            if !suspension.active {
                info!(
                    "Suspension {} of roster item {} fully served",
                    suspension.id, suspension.roster_item_id
                );
            }
            notify::publish_json(
                self.notifier.as_ref(),
                notify::SUSPENSION_UPDATED,
                suspension,
            );
        }

        Ok(changed)
    }

    /// Rebuild every suspension of a tournament from its card history.
    ///
    /// Cards are replayed in match date order; undated matches go last. Each
    /// player gets one suspension per colour and scope, issued when the
    /// running count first reaches the threshold. Finished matches are then
    /// replayed to restore how much of each ban has been served. Old
    /// suspensions are replaced in a single transaction.
    pub async fn recompute_all(
        &self,
        tournament_id: TournamentId,
    ) -> CompetitionResult<Vec<Suspension>> {
        let tournament = self
            .store
            .tournament(tournament_id)
            .await?
            .ok_or(CompetitionError::TournamentNotFound(tournament_id))?;
        let policy = &tournament.discipline;
        if !policy.enabled {
            return Ok(Vec::new());
        }

        let matches: HashMap<MatchId, Match> = self
            .store
            .matches(tournament_id)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut team_of: HashMap<RosterItemId, TournamentTeamId> = HashMap::new();
        for team in self.store.tournament_teams(tournament_id).await? {
            for item in self.store.roster(team.id).await? {
                team_of.insert(item.id, team.id);
            }
        }

        let mut cards: Vec<_> = self
            .store
            .match_events(tournament_id)
            .await?
            .into_iter()
            .filter_map(|e| {
                let card = e.kind.card()?;
                let fixture = matches.get(&e.match_id)?;
                Some((fixture, card, e))
            })
            .collect();
        cards.sort_by_key(|(m, _, e)| {
            (
                m.scheduled_at.is_none(),
                m.scheduled_at,
                m.id,
                e.minute.is_none(),
                e.minute,
                e.id,
            )
        });

        let mut totals: HashMap<(RosterItemId, CardType), u32> = HashMap::new();
        let mut scoped: HashMap<(RosterItemId, CardType, ScopeKey), u32> = HashMap::new();
        let mut issued: HashSet<(RosterItemId, CardType, ScopeKey)> = HashSet::new();
        let mut rebuilt: Vec<NewSuspension> = Vec::new();

        for (fixture, card, event) in &cards {
            let Some(threshold) = policy.threshold(*card) else {
                continue;
            };
            let scope = ScopeKey::of(policy.scope, fixture);

            let total = totals.entry((event.roster_item_id, *card)).or_insert(0);
            *total += 1;
            let in_scope = scoped
                .entry((event.roster_item_id, *card, scope))
                .or_insert(0);
            *in_scope += 1;

            let count = match scope {
                ScopeKey::Tournament => *total,
                _ => *in_scope,
            };
            if count != threshold || !issued.insert((event.roster_item_id, *card, scope)) {
                continue;
            }

            rebuilt.push(NewSuspension {
                tournament_id,
                roster_item_id: event.roster_item_id,
                reason: card.reason(),
                match_id: fixture.id,
                starts_after: fixture.scheduled_at.unwrap_or(event.created_at),
                remaining_games: policy.suspension_games,
                active: policy.suspension_games > 0,
                served_match_ids: BTreeSet::new(),
            });
        }

        let mut finished: Vec<&Match> = matches
            .values()
            .filter(|m| m.status == MatchStatus::Finished)
            .collect();
        finished.sort_by_key(|m| (m.scheduled_at.is_none(), m.scheduled_at, m.id));

        for fixture in finished {
            for ban in rebuilt.iter_mut() {
                let plays = team_of
                    .get(&ban.roster_item_id)
                    .is_some_and(|team| fixture.involves(*team));
                if plays && ban.applies_to(fixture) {
                    ban.serve(fixture.id);
                }
            }
        }

        let stored = self
            .store
            .replace_suspensions(tournament_id, &rebuilt)
            .await?;

        info!(
            "Recomputed discipline for tournament {}: {} card(s) replayed, {} suspension(s)",
            tournament_id,
            cards.len(),
            stored.len()
        );
        self.notifier.publish(
            notify::SUSPENSION_UPDATED,
            json!({ "tournament_id": tournament_id, "suspensions": stored }),
        );

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{NewMatch, NewMatchEvent};
    use crate::db::MemoryStore;
    use crate::models::{DisciplinePolicy, RosterRole, TeamFormat};
    use crate::notify::NoopNotifier;

    async fn one_match(policy: DisciplinePolicy) -> (MemoryStore, MatchId, RosterItemId) {
        let store = MemoryStore::new();
        let tournament = store.add_tournament("Cup", TeamFormat::FiveASide, policy);
        let home = store.enroll_team(tournament.id, "Home", None);
        let away = store.enroll_team(tournament.id, "Away", None);
        let player = store.add_roster_item(home.id, 9, RosterRole::Starter);
        let ids = store
            .insert_matches(&[NewMatch {
                tournament_id: tournament.id,
                round_id: None,
                group_id: None,
                matchday: None,
                team1_id: home.id,
                team2_id: away.id,
                scheduled_at: None,
            }])
            .await
            .unwrap();
        store
            .insert_event(&NewMatchEvent {
                match_id: ids[0],
                tournament_team_id: home.id,
                roster_item_id: player.id,
                kind: CardType::Red.event_kind(),
                minute: Some(30),
            })
            .await
            .unwrap();
        (store, ids[0], player.id)
    }

    #[tokio::test]
    async fn test_red_card_issues_one_suspension_even_on_retry() {
        let (store, match_id, player) = one_match(DisciplinePolicy::default()).await;
        let tracker = DisciplineTracker::new(Arc::new(store), Arc::new(NoopNotifier));

        let first = tracker
            .record_card_event(match_id, player, CardType::Red)
            .await
            .unwrap();
        assert!(first.is_some());

        let retry = tracker
            .record_card_event(match_id, player, CardType::Red)
            .await
            .unwrap();
        assert!(retry.is_none());
    }

    #[tokio::test]
    async fn test_disabled_policy_is_a_no_op() {
        let (store, match_id, player) = one_match(DisciplinePolicy::disabled()).await;
        let tournament_id = store.get_match(match_id).await.unwrap().unwrap().tournament_id;
        let tracker = DisciplineTracker::new(Arc::new(store.clone()), Arc::new(NoopNotifier));

        assert!(
            tracker
                .record_card_event(match_id, player, CardType::Red)
                .await
                .unwrap()
                .is_none()
        );
        assert!(tracker.serve_suspensions(match_id).await.unwrap().is_empty());
        assert!(tracker.recompute_all(tournament_id).await.unwrap().is_empty());
        assert!(store.suspensions(tournament_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_threshold_disables_colour() {
        let policy = DisciplinePolicy {
            red_to_suspend: 0,
            ..DisciplinePolicy::default()
        };
        let (store, match_id, player) = one_match(policy).await;
        let tracker = DisciplineTracker::new(Arc::new(store), Arc::new(NoopNotifier));

        let result = tracker
            .record_card_event(match_id, player, CardType::Red)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_roster_item() {
        let (store, match_id, _) = one_match(DisciplinePolicy::default()).await;
        let tracker = DisciplineTracker::new(Arc::new(store), Arc::new(NoopNotifier));

        let result = tracker.record_card_event(match_id, 999, CardType::Red).await;
        assert!(matches!(result, Err(CompetitionError::RosterItemNotFound(999))));
    }
}
