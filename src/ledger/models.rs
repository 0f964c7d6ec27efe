//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wallet model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tournament escrow model
///
/// Entry fees collected for a tournament are held here until they are paid
/// back out as refunds or prizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentEscrow {
    pub tournament_id: i64,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry model (double-entry ledger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub tournament_id: Option<i64>,
    pub amount: i64,
    pub balance_after: i64,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Entry fee debited when joining a tournament
    EntryFee,
    /// Entry fee returned on withdrawal before round 1
    Refund,
    /// Prize credited at settlement
    Prize,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::EntryFee => write!(f, "entry_fee"),
            EntryType::Refund => write!(f, "refund"),
            EntryType::Prize => write!(f, "prize"),
        }
    }
}
