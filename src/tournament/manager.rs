//! Tournament creation and registration.
//!
//! Phase configurations are validated here, at creation time, so the
//! progression engine never meets a malformed config at resolution time.
//! Joining debits the entry fee into the tournament escrow; withdrawing
//! before round 1 starts refunds it.

use super::{
    errors::{EngineError, EngineResult},
    models::{
        Participant, PhaseConfig, PhaseRules, Tournament, TournamentConfig, TournamentId,
        TournamentStatus,
    },
    store,
};
use crate::ledger::LedgerManager;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    pool: Arc<PgPool>,
    ledger: LedgerManager,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(pool: Arc<PgPool>, ledger: LedgerManager) -> Self {
        Self { pool, ledger }
    }

    /// Create a tournament and its pending round 1.
    pub async fn create_tournament(
        &self,
        config: TournamentConfig,
    ) -> EngineResult<TournamentId> {
        validate_config(&config)?;

        let rounds_total: u32 = config.phases.iter().map(PhaseConfig::rounds_in_phase).sum();
        let phases_json = serde_json::to_value(&config.phases)?;
        let prizes_json = serde_json::to_value(&config.prize_structure)?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO tournaments (organizer_id, name, status, entry_fee, host_fee_percent, prize_structure, phase_configs, rounds_total)
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(config.organizer_id)
        .bind(&config.name)
        .bind(config.entry_fee)
        .bind(config.host_fee_percent)
        .bind(&prizes_json)
        .bind(&phases_json)
        .bind(rounds_total as i32)
        .fetch_one(&mut *tx)
        .await?;
        let tournament_id: TournamentId = row.get("id");

        store::insert_round(
            &mut tx,
            tournament_id,
            1,
            0,
            1,
            config.start_time,
            &config.phases[0],
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "Created tournament {} '{}' with {} phases ({} rounds)",
            tournament_id,
            config.name,
            config.phases.len(),
            rounds_total
        );
        Ok(tournament_id)
    }

    /// Register a user, debiting the entry fee into the tournament escrow.
    ///
    /// `game_id` is the identifier the external result provider reports for
    /// this user.
    ///
    /// # Errors
    ///
    /// * `EngineError::RegistrationClosed` - Round 1 already started
    /// * `EngineError::AlreadyRegistered` - Duplicate join
    /// * `EngineError::Ledger` - Insufficient balance (request rejected, no
    ///   state change)
    pub async fn join_tournament(
        &self,
        tournament_id: TournamentId,
        user_id: i64,
        game_id: String,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        let tournament = store::load_tournament_for_update(&mut tx, tournament_id).await?;
        if tournament.status != TournamentStatus::Pending {
            return Err(EngineError::RegistrationClosed(tournament_id));
        }

        let existing = sqlx::query(
            "SELECT id FROM participants WHERE tournament_id = $1 AND user_id = $2",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(EngineError::AlreadyRegistered {
                tournament_id,
                user_id,
            });
        }

        if tournament.entry_fee > 0 {
            let idempotency_key = format!("entry_{tournament_id}_{user_id}");
            self.ledger
                .charge_entry_fee(
                    &mut tx,
                    user_id,
                    tournament_id,
                    tournament.entry_fee,
                    idempotency_key,
                )
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO participants (tournament_id, user_id, game_id, score_total, eliminated, checkmate_active, paid)
            VALUES ($1, $2, $3, 0, FALSE, FALSE, FALSE)
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(&game_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Withdraw a user before round 1 starts, refunding the entry fee.
    pub async fn withdraw(&self, tournament_id: TournamentId, user_id: i64) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        let tournament = store::load_tournament_for_update(&mut tx, tournament_id).await?;
        if tournament.status != TournamentStatus::Pending {
            return Err(EngineError::RegistrationClosed(tournament_id));
        }

        let deleted = sqlx::query(
            "DELETE FROM participants WHERE tournament_id = $1 AND user_id = $2",
        )
        .bind(tournament_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if deleted.rows_affected() == 0 {
            return Err(EngineError::NotRegistered {
                tournament_id,
                user_id,
            });
        }

        if tournament.entry_fee > 0 {
            let idempotency_key = format!("refund_{tournament_id}_{user_id}");
            self.ledger
                .refund_entry_fee(
                    &mut tx,
                    user_id,
                    tournament_id,
                    tournament.entry_fee,
                    idempotency_key,
                )
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get one tournament.
    pub async fn get_tournament(&self, tournament_id: TournamentId) -> EngineResult<Tournament> {
        let mut tx = self.pool.begin().await?;
        let tournament = store::load_tournament(&mut tx, tournament_id).await?;
        tx.commit().await?;
        Ok(tournament)
    }

    /// All participants of a tournament, by registration order.
    pub async fn get_participants(
        &self,
        tournament_id: TournamentId,
    ) -> EngineResult<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT id, tournament_id, user_id, game_id, score_total, eliminated, checkmate_active, paid
             FROM participants
             WHERE tournament_id = $1
             ORDER BY id ASC",
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(store::participant_from_row).collect())
    }
}

/// Reject configurations the engine cannot run.
fn validate_config(config: &TournamentConfig) -> EngineResult<()> {
    if config.phases.is_empty() {
        return Err(EngineError::InvalidPhaseConfig(
            "tournament needs at least one phase".to_string(),
        ));
    }
    if config.entry_fee < 0 {
        return Err(EngineError::InvalidPhaseConfig(format!(
            "entry fee must be non-negative, got {}",
            config.entry_fee
        )));
    }
    if !(0.0..=1.0).contains(&config.host_fee_percent) {
        return Err(EngineError::InvalidPhaseConfig(format!(
            "host fee percent must be within [0, 1], got {}",
            config.host_fee_percent
        )));
    }
    for (rank, amount) in &config.prize_structure {
        if *rank < 1 || *amount <= 0 {
            return Err(EngineError::InvalidPhaseConfig(format!(
                "prize table entries need rank >= 1 and a positive amount, got rank {rank} -> {amount}"
            )));
        }
    }
    for (index, phase) in config.phases.iter().enumerate() {
        if phase.lobby_size < 2 {
            return Err(EngineError::InvalidPhaseConfig(format!(
                "phase {index}: lobby size must be at least 2"
            )));
        }
        match phase.rules {
            PhaseRules::Elimination { top } | PhaseRules::Points { top, .. } if top < 1 => {
                return Err(EngineError::InvalidPhaseConfig(format!(
                    "phase {index}: advancement top must be at least 1"
                )));
            }
            PhaseRules::Points {
                total_rounds_in_phase: Some(0),
                ..
            } => {
                return Err(EngineError::InvalidPhaseConfig(format!(
                    "phase {index}: total rounds in phase must be at least 1"
                )));
            }
            PhaseRules::Checkmate { points_to_activate } if points_to_activate < 1 => {
                return Err(EngineError::InvalidPhaseConfig(format!(
                    "phase {index}: points to activate must be at least 1"
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::LobbyAssignment;
    use chrono::Utc;

    fn base_config() -> TournamentConfig {
        TournamentConfig {
            name: "Weekly Gauntlet".to_string(),
            organizer_id: 1,
            entry_fee: 100,
            host_fee_percent: 0.1,
            prize_structure: [(1, 600), (2, 300), (3, 200)].into_iter().collect(),
            phases: vec![PhaseConfig {
                lobby_size: 8,
                lobby_assignment: LobbyAssignment::Random,
                rules: PhaseRules::Elimination { top: 4 },
            }],
            start_time: Utc::now(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_empty_phases_rejected() {
        let mut config = base_config();
        config.phases.clear();
        assert!(matches!(
            validate_config(&config),
            Err(EngineError::InvalidPhaseConfig(_))
        ));
    }

    #[test]
    fn test_host_fee_out_of_range_rejected() {
        let mut config = base_config();
        config.host_fee_percent = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_tiny_lobby_rejected() {
        let mut config = base_config();
        config.phases[0].lobby_size = 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_top_rejected() {
        let mut config = base_config();
        config.phases[0].rules = PhaseRules::Elimination { top: 0 };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_round_points_phase_rejected() {
        let mut config = base_config();
        config.phases[0].rules = PhaseRules::Points {
            top: 4,
            total_rounds_in_phase: Some(0),
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unarmed_checkmate_rejected() {
        let mut config = base_config();
        config.phases[0].rules = PhaseRules::Checkmate {
            points_to_activate: 0,
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_prize_amount_rejected() {
        let mut config = base_config();
        config.prize_structure.insert(4, 0);
        assert!(validate_config(&config).is_err());
    }
}
