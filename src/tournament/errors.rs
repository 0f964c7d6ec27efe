//! Engine error types.
//!
//! Three classes of failure leave the core:
//! - fatal/configuration errors abort the surrounding transaction and are
//!   surfaced to the operator (missing records, unusable phase config),
//! - business-rule rejections fail the triggering request without mutating
//!   state (insufficient balance, registration closed),
//! - recoverable data-quality noise is logged with `log::warn!` inside the
//!   core and never reaches this enum.

use super::models::{LobbyId, MatchId, RoundId, TournamentId};
use crate::ledger::LedgerError;
use thiserror::Error;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Round not found: {0}")]
    RoundNotFound(RoundId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Lobby not found: {0}")]
    LobbyNotFound(LobbyId),

    #[error("Invalid phase configuration: {0}")]
    InvalidPhaseConfig(String),

    #[error("Tournament {tournament_id} has no phase config at index {phase_index}")]
    MissingPhaseConfig {
        tournament_id: TournamentId,
        phase_index: i32,
    },

    #[error("Tournament {0} has no adjusted prize structure")]
    MissingPrizeStructure(TournamentId),

    #[error("Registration closed for tournament {0}")]
    RegistrationClosed(TournamentId),

    #[error("User {user_id} already registered for tournament {tournament_id}")]
    AlreadyRegistered {
        tournament_id: TournamentId,
        user_id: i64,
    },

    #[error("User {user_id} not registered for tournament {tournament_id}")]
    NotRegistered {
        tournament_id: TournamentId,
        user_id: i64,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether this is a fatal configuration error requiring operator
    /// intervention, as opposed to a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::TournamentNotFound(_)
                | EngineError::RoundNotFound(_)
                | EngineError::MatchNotFound(_)
                | EngineError::LobbyNotFound(_)
                | EngineError::InvalidPhaseConfig(_)
                | EngineError::MissingPhaseConfig { .. }
                | EngineError::MissingPrizeStructure(_)
                | EngineError::Database(_)
                | EngineError::Serialization(_)
        )
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
