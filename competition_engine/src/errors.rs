//! Competition engine error types.

use crate::models::{
    GroupId, MatchId, MatchStatus, ParseEnumError, RosterItemId, RoundId, TieId, TournamentId,
    TournamentTeamId,
};
use thiserror::Error;

/// Broad category of a [`CompetitionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input; nothing was written
    Validation,
    /// Referenced entity does not exist
    NotFound,
    /// Storage failed mid-operation; the operation was rolled back
    Transaction,
}

/// Competition errors
#[derive(Debug, Error)]
pub enum CompetitionError {
    #[error("Bracket needs 2, 4, 8, 16 or 32 teams, got {0}")]
    InvalidTeamCount(usize),

    #[error("Team {0} appears more than once in the pairing")]
    DuplicateTeam(TournamentTeamId),

    #[error("Team {team} is not enrolled in tournament {tournament}")]
    UnregisteredTeam {
        team: TournamentTeamId,
        tournament: TournamentId,
    },

    #[error("Pairing must use every enrolled team: expected {expected}, got {actual}")]
    IncompletePairing { expected: usize, actual: usize },

    #[error("Explicit bracket mode requires pairs")]
    MissingPairs,

    #[error("Ties need at least one leg")]
    InvalidLegs,

    #[error("Round-robin supports 1 or 2 cycles, got {0}")]
    InvalidCycles(u8),

    #[error("Match gap of {0} days puts fixtures outside the supported calendar")]
    InvalidGap(u32),

    #[error("Score {0} is out of range")]
    ScoreOutOfRange(u32),

    #[error("Insufficient teams: need {needed}, have {current}")]
    InsufficientTeams { needed: usize, current: usize },

    #[error("Round {round} does not belong to tournament {tournament}")]
    RoundTournamentMismatch {
        round: RoundId,
        tournament: TournamentId,
    },

    #[error("Roster item {roster_item} does not belong to team {team}")]
    RosterItemTeamMismatch {
        roster_item: RosterItemId,
        team: TournamentTeamId,
    },

    #[error("Team {team} does not play in match {match_id}")]
    TeamNotInMatch {
        team: TournamentTeamId,
        match_id: MatchId,
    },

    #[error("Player {0} is listed more than once on the roster")]
    DuplicatePlayer(i64),

    #[error("Captain {0} is not on the roster")]
    CaptainNotOnRoster(i64),

    #[error("Player {player} has match history and cannot leave the roster")]
    PlayerHasHistory {
        player: i64,
        roster_item: RosterItemId,
    },

    #[error("Too many starters: format allows {max}, got {actual}")]
    TooManyStarters { max: usize, actual: usize },

    #[error("Invalid match transition: {from} -> {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("Invalid value: {0}")]
    InvalidValue(#[from] ParseEnumError),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Tournament team not found: {0}")]
    TeamNotFound(TournamentTeamId),

    #[error("Round not found: {0}")]
    RoundNotFound(RoundId),

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Tie not found: {0}")]
    TieNotFound(TieId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Roster item not found: {0}")]
    RosterItemNotFound(RosterItemId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl CompetitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompetitionError::TournamentNotFound(_)
            | CompetitionError::TeamNotFound(_)
            | CompetitionError::RoundNotFound(_)
            | CompetitionError::GroupNotFound(_)
            | CompetitionError::TieNotFound(_)
            | CompetitionError::MatchNotFound(_)
            | CompetitionError::RosterItemNotFound(_) => ErrorKind::NotFound,
            CompetitionError::Database(_)
            | CompetitionError::Timeout(_)
            | CompetitionError::TransactionFailed(_) => ErrorKind::Transaction,
            _ => ErrorKind::Validation,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Get a client-safe error message that doesn't leak storage internals
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transaction => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<crate::db::timeouts::TimeoutError> for CompetitionError {
    fn from(err: crate::db::timeouts::TimeoutError) -> Self {
        match err {
            crate::db::timeouts::TimeoutError::Timeout(duration) => {
                CompetitionError::Timeout(duration)
            }
            crate::db::timeouts::TimeoutError::Database(e) => CompetitionError::Database(e),
        }
    }
}

/// Result type for competition operations
pub type CompetitionResult<T> = Result<T, CompetitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CompetitionError::InvalidTeamCount(6).kind(),
            ErrorKind::Validation
        );
        assert!(CompetitionError::TieNotFound(3).is_not_found());
        assert_eq!(
            CompetitionError::TransactionFailed("boom".to_string()).kind(),
            ErrorKind::Transaction
        );
    }

    #[test]
    fn test_client_message_hides_storage_details() {
        let err = CompetitionError::TransactionFailed("constraint tie_round_fk".to_string());
        assert_eq!(err.client_message(), "Internal server error");

        let err = CompetitionError::InvalidTeamCount(6);
        assert!(err.client_message().contains('6'));
    }
}
