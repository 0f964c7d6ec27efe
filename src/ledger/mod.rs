//! Ledger module providing wallet and escrow accounting for tournaments.
//!
//! This module implements:
//! - Double-entry ledger for all balance movements
//! - Per-tournament escrow (entry fees held until refund or payout)
//! - Idempotency keys to prevent duplicate transactions
//! - Transaction-scoped operations so ledger writes commit atomically with
//!   the engine transition that caused them

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::LedgerManager;
pub use models::{EntryDirection, EntryType, LedgerEntry, TournamentEscrow, Wallet};
