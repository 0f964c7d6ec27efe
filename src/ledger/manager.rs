//! Ledger manager implementation with double-entry bookkeeping and escrow.
//!
//! Entry fees move from user wallets into a per-tournament escrow on join;
//! refunds and prize payouts move them back. Every movement produces a ledger
//! entry keyed by an idempotency key so a retried request cannot apply twice.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{EntryDirection, EntryType, LedgerEntry, TournamentEscrow, Wallet},
};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// Ledger manager
#[derive(Clone)]
pub struct LedgerManager {
    pool: Arc<PgPool>,
}

impl LedgerManager {
    /// Create a new ledger manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get wallet balance for a user
    pub async fn get_wallet(&self, user_id: i64) -> LedgerResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, currency, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(LedgerError::WalletNotFound(user_id))?;

        Ok(Wallet {
            user_id: row.get("user_id"),
            balance: row.get("balance"),
            currency: row.get("currency"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        })
    }

    /// Get the escrow held for a tournament
    pub async fn get_escrow(&self, tournament_id: i64) -> LedgerResult<TournamentEscrow> {
        let row = sqlx::query(
            r#"
            SELECT tournament_id, balance, created_at, updated_at
            FROM tournament_escrows
            WHERE tournament_id = $1
            "#,
        )
        .bind(tournament_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(LedgerError::EscrowNotFound(tournament_id))?;

        Ok(TournamentEscrow {
            tournament_id: row.get("tournament_id"),
            balance: row.get("balance"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        })
    }

    /// Debit a user's wallet and credit the tournament escrow (entry fee).
    ///
    /// Runs inside the caller's transaction so the debit commits or rolls back
    /// together with the registration it pays for.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientBalance` - Not enough funds
    /// * `LedgerError::DuplicateTransaction` - Idempotency key already used
    pub async fn charge_entry_fee(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        tournament_id: i64,
        amount: i64,
        idempotency_key: String,
    ) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        self.ensure_fresh_key(tx, &idempotency_key).await?;

        // Atomic debit with balance check: the WHERE clause makes the check
        // and the update a single statement, so no race window exists.
        let wallet_result = sqlx::query(
            "UPDATE wallets
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        let new_balance: i64 = match wallet_result {
            Some(row) => row.get("balance"),
            None => {
                // Either the wallet doesn't exist or the balance is short.
                let check = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                match check {
                    Some(row) => {
                        return Err(LedgerError::InsufficientBalance {
                            user_id,
                            available: row.get("balance"),
                            required: amount,
                        });
                    }
                    None => return Err(LedgerError::WalletNotFound(user_id)),
                }
            }
        };

        self.create_entry(
            tx,
            user_id,
            Some(tournament_id),
            -amount,
            new_balance,
            EntryDirection::Debit,
            EntryType::EntryFee,
            idempotency_key,
            Some(format!("Entry fee for tournament {tournament_id}")),
        )
        .await?;

        // Credit the escrow, creating it on first join.
        sqlx::query(
            "INSERT INTO tournament_escrows (tournament_id, balance, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (tournament_id)
             DO UPDATE SET
                balance = tournament_escrows.balance + EXCLUDED.balance,
                updated_at = NOW()",
        )
        .bind(tournament_id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        Ok(new_balance)
    }

    /// Refund an entry fee from escrow back to the user's wallet.
    pub async fn refund_entry_fee(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        tournament_id: i64,
        amount: i64,
        idempotency_key: String,
    ) -> LedgerResult<i64> {
        self.pay_from_escrow(
            tx,
            user_id,
            tournament_id,
            amount,
            EntryType::Refund,
            idempotency_key,
            format!("Entry fee refund for tournament {tournament_id}"),
        )
        .await
    }

    /// Credit a prize from the tournament escrow to the winner's wallet.
    pub async fn credit_prize(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        tournament_id: i64,
        amount: i64,
        idempotency_key: String,
    ) -> LedgerResult<i64> {
        self.pay_from_escrow(
            tx,
            user_id,
            tournament_id,
            amount,
            EntryType::Prize,
            idempotency_key,
            format!("Prize payout for tournament {tournament_id}"),
        )
        .await
    }

    /// Move funds from a tournament escrow into a user wallet.
    async fn pay_from_escrow(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        tournament_id: i64,
        amount: i64,
        entry_type: EntryType,
        idempotency_key: String,
        description: String,
    ) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        self.ensure_fresh_key(tx, &idempotency_key).await?;

        // Atomic escrow debit with balance check.
        let escrow_result = sqlx::query(
            "UPDATE tournament_escrows
             SET balance = balance - $1, updated_at = NOW()
             WHERE tournament_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(tournament_id)
        .fetch_optional(&mut **tx)
        .await?;

        if escrow_result.is_none() {
            let check =
                sqlx::query("SELECT balance FROM tournament_escrows WHERE tournament_id = $1")
                    .bind(tournament_id)
                    .fetch_optional(&mut **tx)
                    .await?;

            match check {
                Some(row) => {
                    return Err(LedgerError::InsufficientEscrow {
                        tournament_id,
                        available: row.get("balance"),
                        required: amount,
                    });
                }
                None => return Err(LedgerError::EscrowNotFound(tournament_id)),
            }
        }

        // Lock the wallet row so the overflow check holds until commit.
        let wallet_row = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(LedgerError::WalletNotFound(user_id))?;

        let current_balance: i64 = wallet_row.get("balance");
        let new_balance = current_balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        sqlx::query("UPDATE wallets SET balance = $1, updated_at = NOW() WHERE user_id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        self.create_entry(
            tx,
            user_id,
            Some(tournament_id),
            amount,
            new_balance,
            EntryDirection::Credit,
            entry_type,
            idempotency_key,
            Some(description),
        )
        .await?;

        Ok(new_balance)
    }

    /// Reject an idempotency key that has already been recorded.
    async fn ensure_fresh_key(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        idempotency_key: &str,
    ) -> LedgerResult<()> {
        let existing = sqlx::query("SELECT id FROM ledger_entries WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&mut **tx)
            .await?;

        if existing.is_some() {
            return Err(LedgerError::DuplicateTransaction(idempotency_key.to_string()));
        }

        Ok(())
    }

    /// Create a ledger entry (double-entry bookkeeping)
    #[allow(clippy::too_many_arguments)]
    async fn create_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        tournament_id: Option<i64>,
        amount: i64,
        balance_after: i64,
        direction: EntryDirection,
        entry_type: EntryType,
        idempotency_key: String,
        description: Option<String>,
    ) -> LedgerResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, tournament_id, amount, balance_after, direction, entry_type, idempotency_key, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(tournament_id)
        .bind(amount)
        .bind(balance_after)
        .bind(direction.to_string())
        .bind(entry_type.to_string())
        .bind(idempotency_key)
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }

    /// Get ledger entries for a user, newest first
    pub async fn get_entries(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, tournament_id, amount, balance_after, direction, entry_type, idempotency_key, description, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| LedgerEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                tournament_id: row.get("tournament_id"),
                amount: row.get("amount"),
                balance_after: row.get("balance_after"),
                direction: match row.get::<String, _>("direction").as_str() {
                    "debit" => EntryDirection::Debit,
                    _ => EntryDirection::Credit,
                },
                entry_type: match row.get::<String, _>("entry_type").as_str() {
                    "entry_fee" => EntryType::EntryFee,
                    "refund" => EntryType::Refund,
                    _ => EntryType::Prize,
                },
                idempotency_key: row.get("idempotency_key"),
                description: row.get("description"),
                created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            })
            .collect();

        Ok(entries)
    }
}
