//! Ledger error types.

use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient balance
    #[error("Insufficient balance for user {user_id}: available {available}, required {required}")]
    InsufficientBalance {
        user_id: i64,
        available: i64,
        required: i64,
    },

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(i64),

    /// Escrow not found
    #[error("Escrow not found for tournament {0}")]
    EscrowNotFound(i64),

    /// Insufficient escrow balance
    #[error("Insufficient escrow for tournament {tournament_id}: available {available}, required {required}")]
    InsufficientEscrow {
        tournament_id: i64,
        available: i64,
        required: i64,
    },

    /// Duplicate transaction (idempotency key already used)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance overflow
    #[error("Balance overflow")]
    BalanceOverflow,
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
