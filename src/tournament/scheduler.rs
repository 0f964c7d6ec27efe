//! Round scheduler: the time-driven half of the engine.
//!
//! A fixed-interval poll scans for pending rounds whose start time has
//! passed and activates them. Activation is idempotent: the round row is
//! locked and re-checked inside the transaction, so observing the same round
//! on consecutive ticks (or from concurrent schedulers) is a no-op.
//! `playing -> completed` is never driven from here; only result ingestion
//! completes a round.

use super::{
    effects::Effects,
    errors::EngineResult,
    lobby,
    models::{RoundId, RoundStatus, Tournament, TournamentStatus},
    prizes, store,
};
use crate::ports::{tournament_topic, EngineEvent, NotificationPort, ResultFetchQueue};
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Round scheduler
#[derive(Clone)]
pub struct RoundScheduler {
    pool: Arc<PgPool>,
    queue: Arc<dyn ResultFetchQueue>,
    notifier: Arc<dyn NotificationPort>,
}

impl RoundScheduler {
    /// Create a new round scheduler
    pub fn new(
        pool: Arc<PgPool>,
        queue: Arc<dyn ResultFetchQueue>,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            pool,
            queue,
            notifier,
        }
    }

    /// Activate every pending round whose start time has passed.
    ///
    /// Per-round failures are logged and the round is left pending for manual
    /// retry; one broken tournament never blocks the others. Returns how many
    /// rounds were activated.
    pub async fn activate_due_rounds(&self) -> EngineResult<usize> {
        let rows = sqlx::query(
            "SELECT id FROM rounds WHERE status = 'pending' AND start_time <= NOW()
             ORDER BY start_time ASC",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut activated = 0;
        for row in rows {
            let round_id: RoundId = row.get("id");
            match self.activate_round(round_id).await {
                Ok(true) => activated += 1,
                Ok(false) => {}
                Err(e) if e.is_fatal() => {
                    log::error!(
                        "Failed to activate round {}, leaving it pending for manual retry: {}",
                        round_id,
                        e
                    );
                }
                Err(e) => {
                    log::warn!("Round {} not activated: {}", round_id, e);
                }
            }
        }

        Ok(activated)
    }

    /// Activate one round: finalize registration (round 1 only), partition
    /// the active participants into lobbies, and mark the round playing.
    ///
    /// Returns `false` without mutating anything when the round is not
    /// pending or not yet due.
    pub async fn activate_round(&self, round_id: RoundId) -> EngineResult<bool> {
        let mut tx = self.pool.begin().await?;
        let mut effects = Effects::default();

        let round = store::load_round_for_update(&mut tx, round_id).await?;
        if round.status != RoundStatus::Pending {
            return Ok(false);
        }
        if round.start_time > Utc::now() {
            return Ok(false);
        }

        let mut tournament =
            store::load_tournament_for_update(&mut tx, round.tournament_id).await?;

        if round.round_number == 1 && tournament.status == TournamentStatus::Pending {
            self.finalize_registration(&mut tx, &mut tournament).await?;
        }

        let active = store::active_participants(&mut tx, tournament.id).await?;
        if active.is_empty() {
            // Nothing to partition; an operator has to decide what this
            // tournament becomes.
            log::warn!(
                "Round {} (tournament {}) has no active participants, leaving it pending",
                round.id,
                tournament.id
            );
            return Ok(false);
        }

        effects.fetches = lobby::create_lobbies(&mut tx, &round, active).await?;
        store::set_round_status(&mut tx, round.id, RoundStatus::Playing).await?;

        effects.notify(
            tournament_topic(tournament.id),
            EngineEvent::RoundStarted {
                tournament_id: tournament.id,
                round_id: round.id,
                round_number: round.round_number,
            },
        );

        tx.commit().await?;
        effects.dispatch(self.queue.as_ref(), self.notifier.as_ref()).await;

        log::info!(
            "Round {} (tournament {}) is playing",
            round.id,
            round.tournament_id
        );
        Ok(true)
    }

    /// Close registration: count the field, clamp the prize table to the
    /// collected pool, and move the tournament to playing. Happens exactly
    /// once per tournament, guarded by the pending status under row lock.
    async fn finalize_registration(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tournament: &mut Tournament,
    ) -> EngineResult<()> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM participants WHERE tournament_id = $1")
            .bind(tournament.id)
            .fetch_one(&mut **tx)
            .await?;
        let count: i64 = row.get("n");

        let adjusted = prizes::adjust_prize_structure(
            &tournament.prize_structure,
            count,
            tournament.entry_fee,
            tournament.host_fee_percent,
        );
        let adjusted_json = serde_json::to_value(&adjusted.by_rank)?;

        sqlx::query(
            "UPDATE tournaments
             SET actual_participants_count = $1, adjusted_prize_structure = $2, status = 'playing'
             WHERE id = $3",
        )
        .bind(count as i32)
        .bind(&adjusted_json)
        .bind(tournament.id)
        .execute(&mut **tx)
        .await?;

        log::info!(
            "Tournament {}: registration closed with {} participants, prize pool {}",
            tournament.id,
            count,
            adjusted.prize_pool
        );

        tournament.actual_participants_count = Some(count as i32);
        tournament.adjusted_prize_structure = Some(adjusted.by_rank);
        tournament.status = TournamentStatus::Playing;

        Ok(())
    }

    /// Run the fixed-interval polling loop. Never returns; intended to be
    /// spawned as a background task.
    pub async fn run(&self, poll_interval: Duration) {
        let mut ticker = interval(poll_interval);
        log::info!(
            "Round scheduler polling every {}s",
            poll_interval.as_secs()
        );

        loop {
            ticker.tick().await;
            match self.activate_due_rounds().await {
                Ok(0) => {}
                Ok(n) => log::debug!("Scheduler tick activated {} rounds", n),
                Err(e) => log::error!("Scheduler tick failed: {}", e),
            }
        }
    }
}
