//! Competition data models shared by every component.
//!
//! Entities reference each other by id only; the store owns the rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Tournament ID type
pub type TournamentId = i64;
/// Enrolment of a team in a tournament
pub type TournamentTeamId = i64;
/// Roster entry (tournament team player) ID type
pub type RosterItemId = i64;
pub type RoundId = i64;
pub type GroupId = i64;
pub type TieId = i64;
pub type MatchId = i64;
pub type MatchEventId = i64;
pub type SuspensionId = i64;

/// Error returned when a wire string does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Implements `Display`/`FromStr` over the SCREAMING_CASE wire names.
macro_rules! wire_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Wire name of this variant
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(ParseEnumError::new($kind, s)),
                }
            }
        }
    };
}

/// Elimination stage of a knockout round
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    RoundOf32,
    RoundOf16,
    QuarterFinal,
    SemiFinal,
    Final,
    ThirdPlace,
}

wire_enum!(Stage, "stage", {
    RoundOf32 => "ROUND_OF_32",
    RoundOf16 => "ROUND_OF_16",
    QuarterFinal => "QUARTER_FINAL",
    SemiFinal => "SEMI_FINAL",
    Final => "FINAL",
    ThirdPlace => "THIRD_PLACE",
});

/// Knockout stages from the widest bracket down to the final.
pub const STAGE_ORDER: [Stage; 5] = [
    Stage::RoundOf32,
    Stage::RoundOf16,
    Stage::QuarterFinal,
    Stage::SemiFinal,
    Stage::Final,
];

impl Stage {
    /// Opening stage for a bracket of `team_count` teams
    pub fn for_team_count(team_count: usize) -> Option<Stage> {
        match team_count {
            32 => Some(Stage::RoundOf32),
            16 => Some(Stage::RoundOf16),
            8 => Some(Stage::QuarterFinal),
            4 => Some(Stage::SemiFinal),
            2 => Some(Stage::Final),
            _ => None,
        }
    }

    /// Stages from `self` through the final, in playing order.
    ///
    /// Empty for `ThirdPlace`, which sits outside the ladder.
    pub fn ladder(self) -> &'static [Stage] {
        match STAGE_ORDER.iter().position(|s| *s == self) {
            Some(idx) => &STAGE_ORDER[idx..],
            None => &[],
        }
    }

    /// Human readable round name
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::RoundOf32 => "Round of 32",
            Stage::RoundOf16 => "Round of 16",
            Stage::QuarterFinal => "Quarter-finals",
            Stage::SemiFinal => "Semi-finals",
            Stage::Final => "Final",
            Stage::ThirdPlace => "Third place",
        }
    }
}

/// What a round represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundKind {
    /// Knockout stage
    Elimination(Stage),
    /// Group matchday number (1-indexed)
    Matchday(u32),
}

impl RoundKind {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RoundKind::Elimination(stage) => Some(*stage),
            RoundKind::Matchday(_) => None,
        }
    }
}

/// Role of a player on a competition roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RosterRole {
    Starter,
    Substitute,
    Reserve,
}

wire_enum!(RosterRole, "roster role", {
    Starter => "STARTER",
    Substitute => "SUBSTITUTE",
    Reserve => "RESERVE",
});

/// Match lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
}

wire_enum!(MatchStatus, "match status", {
    Scheduled => "SCHEDULED",
    Live => "LIVE",
    Finished => "FINISHED",
});

impl MatchStatus {
    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        next >= self
    }
}

/// In-match occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchEventKind {
    Goal,
    PenaltyScored,
    Assist,
    YellowCard,
    RedCard,
}

wire_enum!(MatchEventKind, "match event", {
    Goal => "GOAL",
    PenaltyScored => "PENALTY_SCORED",
    Assist => "ASSIST",
    YellowCard => "YELLOW_CARD",
    RedCard => "RED_CARD",
});

impl MatchEventKind {
    pub fn card(&self) -> Option<CardType> {
        match self {
            MatchEventKind::YellowCard => Some(CardType::Yellow),
            MatchEventKind::RedCard => Some(CardType::Red),
            _ => None,
        }
    }
}

/// Card colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Yellow,
    Red,
}

wire_enum!(CardType, "card type", {
    Yellow => "YELLOW",
    Red => "RED",
});

impl CardType {
    pub fn event_kind(&self) -> MatchEventKind {
        match self {
            CardType::Yellow => MatchEventKind::YellowCard,
            CardType::Red => MatchEventKind::RedCard,
        }
    }

    pub fn reason(&self) -> SuspensionReason {
        match self {
            CardType::Yellow => SuspensionReason::Yellows,
            CardType::Red => SuspensionReason::Red,
        }
    }
}

/// Why a suspension was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspensionReason {
    Yellows,
    Red,
}

wire_enum!(SuspensionReason, "suspension reason", {
    Yellows => "YELLOWS",
    Red => "RED",
});

/// Boundary within which cards are tallied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccumulationScope {
    Tournament,
    Round,
    Group,
}

wire_enum!(AccumulationScope, "accumulation scope", {
    Tournament => "TOURNAMENT",
    Round => "ROUND",
    Group => "GROUP",
});

/// Number of players per side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamFormat {
    FiveASide,
    SevenASide,
    ElevenASide,
}

wire_enum!(TeamFormat, "team format", {
    FiveASide => "FIVE_A_SIDE",
    SevenASide => "SEVEN_A_SIDE",
    ElevenASide => "ELEVEN_A_SIDE",
});

impl TeamFormat {
    /// Maximum number of STARTER roster entries
    pub fn max_starters(&self) -> usize {
        match self {
            TeamFormat::FiveASide => 5,
            TeamFormat::SevenASide => 7,
            TeamFormat::ElevenASide => 11,
        }
    }
}

/// How first-round bracket pairs are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BracketMode {
    /// Rank 1 meets rank N, 2 meets N-1, and so on
    Seeded,
    /// Shuffled order with the seeded pairing rule
    Random,
    /// Caller supplies every pair
    Explicit,
}

wire_enum!(BracketMode, "bracket mode", {
    Seeded => "SEEDED",
    Random => "RANDOM",
    Explicit => "EXPLICIT",
});

/// Which roster entries a publication copies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleFilter {
    #[default]
    All,
    StartersOnly,
}

wire_enum!(RoleFilter, "role filter", {
    All => "ALL",
    StartersOnly => "STARTERS_ONLY",
});

impl RoleFilter {
    pub fn admits(&self, role: RosterRole) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::StartersOnly => role == RosterRole::Starter,
        }
    }
}

/// Card-based suspension policy of a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplinePolicy {
    /// When false every discipline operation is a no-op
    pub enabled: bool,
    /// Where card counts accumulate
    pub scope: AccumulationScope,
    /// Yellow cards that trigger a ban (0 disables)
    pub yellow_to_suspend: u32,
    /// Red cards that trigger a ban (0 disables)
    pub red_to_suspend: u32,
    /// Games a ban lasts
    pub suspension_games: u32,
}

impl DisciplinePolicy {
    /// Threshold configured for a card colour, `None` when disabled
    pub fn threshold(&self, card: CardType) -> Option<u32> {
        let threshold = match card {
            CardType::Yellow => self.yellow_to_suspend,
            CardType::Red => self.red_to_suspend,
        };
        (threshold > 0).then_some(threshold)
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for DisciplinePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: AccumulationScope::Tournament,
            yellow_to_suspend: 2,
            red_to_suspend: 1,
            suspension_games: 1,
        }
    }
}

/// Competition-wide identity and policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub team_format: TeamFormat,
    pub discipline: DisciplinePolicy,
}

/// A team's enrolment in a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentTeam {
    pub id: TournamentTeamId,
    pub tournament_id: TournamentId,
    /// Club-level team identity
    pub team_id: i64,
    pub name: String,
    /// Bracket rank, 1 is strongest
    pub seed: Option<u32>,
    pub captain_id: Option<RosterItemId>,
}

/// One player's entry on a tournament team roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterItem {
    pub id: RosterItemId,
    pub tournament_team_id: TournamentTeamId,
    pub player_id: i64,
    pub number: Option<u32>,
    pub position: Option<String>,
    pub role: RosterRole,
    pub notes: Option<String>,
}

/// Named stage or matchday within a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub tournament_id: TournamentId,
    pub name: String,
    pub kind: RoundKind,
}

impl Round {
    pub fn stage(&self) -> Option<Stage> {
        self.kind.stage()
    }
}

/// Round-robin pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub tournament_id: TournamentId,
    pub round_id: Option<RoundId>,
    pub name: String,
    /// Members in draw order
    pub team_ids: Vec<TournamentTeamId>,
}

/// Score summed across the legs of a tie, attributed by team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub side1: u32,
    pub side2: u32,
}

/// Best-of-N-legs pairing within a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tie {
    pub id: TieId,
    pub round_id: RoundId,
    /// `None` on placeholder ties awaiting qualifiers
    pub side1: Option<TournamentTeamId>,
    pub side2: Option<TournamentTeamId>,
    pub legs: u32,
    pub aggregate: Option<Aggregate>,
    pub winner: Option<TournamentTeamId>,
}

impl Tie {
    pub fn is_placeholder(&self) -> bool {
        self.side1.is_none() || self.side2.is_none()
    }
}

/// Single fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round_id: Option<RoundId>,
    pub group_id: Option<GroupId>,
    pub tie_id: Option<TieId>,
    /// Leg number within the tie (1-indexed)
    pub leg: Option<u32>,
    /// Matchday number within a group schedule (1-indexed)
    pub matchday: Option<u32>,
    pub team1_id: TournamentTeamId,
    pub team2_id: TournamentTeamId,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: MatchStatus,
    pub score1: u32,
    pub score2: u32,
}

impl Match {
    pub fn involves(&self, team_id: TournamentTeamId) -> bool {
        self.team1_id == team_id || self.team2_id == team_id
    }

    /// Whether this match is played strictly after `instant`.
    ///
    /// Undated fixtures count as after every instant.
    pub fn is_after(&self, instant: DateTime<Utc>) -> bool {
        self.scheduled_at.is_none_or(|date| date > instant)
    }
}

/// Timestamped in-match occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: MatchEventId,
    pub match_id: MatchId,
    pub tournament_team_id: TournamentTeamId,
    pub roster_item_id: RosterItemId,
    pub kind: MatchEventKind,
    pub minute: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Disciplinary ban on a roster item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    pub id: SuspensionId,
    pub tournament_id: TournamentId,
    pub roster_item_id: RosterItemId,
    pub reason: SuspensionReason,
    /// Match whose card triggered the ban
    pub match_id: MatchId,
    /// Ban applies to matches played after this instant
    pub starts_after: DateTime<Utc>,
    pub remaining_games: u32,
    pub active: bool,
    /// Matches already counted against this ban
    pub served_match_ids: BTreeSet<MatchId>,
}

impl Suspension {
    /// Whether this ban keeps the player out of `fixture`
    pub fn applies_to(&self, fixture: &Match) -> bool {
        self.active
            && self.remaining_games > 0
            && fixture.id != self.match_id
            && fixture.is_after(self.starts_after)
    }
}

/// Published match roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchParticipant {
    pub match_id: MatchId,
    pub tournament_team_id: TournamentTeamId,
    pub roster_item_id: RosterItemId,
    pub role: RosterRole,
    pub position: Option<String>,
    pub number: Option<u32>,
    pub is_captain: bool,
    pub sort_order: u32,
}
