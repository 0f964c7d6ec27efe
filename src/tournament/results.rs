//! Match result ingestion.
//!
//! Consumes one raw provider payload per match: updates cumulative scores,
//! upserts per-participant placements, arms and fires checkmate wins, and
//! evaluates round completion inside the same transaction as the writes so
//! two concurrent deliveries can never both advance the round.

use super::{
    effects::Effects,
    errors::EngineResult,
    models::{
        MatchId, MatchResultPayload, Participant, PhaseRules, Round, RoundId, RoundStatus,
        Tournament, TournamentStatus,
    },
    phase::{self, PhaseOutcome},
    settlement::settle_tournament,
    store,
};
use crate::ledger::LedgerManager;
use crate::ports::{NotificationPort, ResultFetchQueue};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// What ingesting one match result led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Other matches in the round are still missing data
    AwaitingOtherMatches,
    /// The round resolved and the next round is playing
    NextRoundCreated(RoundId),
    /// The round resolved and the final winners were paid
    TournamentSettled,
    /// A checkmate-armed participant placed first: instant win, tournament
    /// concluded regardless of remaining scheduled rounds
    TournamentConcluded,
}

/// Match result aggregator
#[derive(Clone)]
pub struct ResultAggregator {
    pool: Arc<PgPool>,
    ledger: LedgerManager,
    queue: Arc<dyn ResultFetchQueue>,
    notifier: Arc<dyn NotificationPort>,
}

impl ResultAggregator {
    /// Create a new result aggregator
    pub fn new(
        pool: Arc<PgPool>,
        ledger: LedgerManager,
        queue: Arc<dyn ResultFetchQueue>,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            pool,
            ledger,
            queue,
            notifier,
        }
    }

    /// Ingest one match's raw result payload.
    ///
    /// Idempotent: re-delivering an identical payload changes nothing, because
    /// per-participant rows are upserted and score totals move by the delta
    /// against what was already recorded. Entries naming a participant the
    /// tournament does not know are logged and skipped; the rest of the
    /// payload is still processed.
    pub async fn ingest_match_result(
        &self,
        match_id: MatchId,
        payload: MatchResultPayload,
    ) -> EngineResult<IngestOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut effects = Effects::default();

        let game_match = store::load_match(&mut tx, match_id).await?;
        let lobby = store::load_lobby(&mut tx, game_match.lobby_id).await?;
        // Lock the round row: concurrent deliveries for sibling matches
        // serialize here, so exactly one observes the round fully fetched.
        let round = store::load_round_for_update(&mut tx, lobby.round_id).await?;
        let tournament = store::load_tournament(&mut tx, round.tournament_id).await?;

        let checkmate_threshold = match round.config.rules {
            PhaseRules::Checkmate { points_to_activate } => Some(points_to_activate),
            _ => None,
        };

        let mut instant_winner: Option<Participant> = None;

        for entry in &payload.results {
            let Some(mut participant) =
                store::find_participant_by_game_id(&mut tx, tournament.id, &entry.game_id).await?
            else {
                log::warn!(
                    "Match {} (tournament {}): result entry for unknown participant '{}', skipping",
                    match_id,
                    tournament.id,
                    entry.game_id
                );
                continue;
            };

            participant.score_total = self
                .record_entry(&mut tx, match_id, &participant, entry.placement, entry.points)
                .await?;

            if let Some(threshold) = checkmate_threshold {
                if !participant.checkmate_active && participant.score_total >= threshold {
                    sqlx::query("UPDATE participants SET checkmate_active = TRUE WHERE id = $1")
                        .bind(participant.id)
                        .execute(&mut *tx)
                        .await?;
                    participant.checkmate_active = true;
                    log::info!(
                        "Participant {} reached {} points, checkmate armed",
                        participant.id,
                        participant.score_total
                    );
                }
            }

            if participant.checkmate_active && entry.placement == 1 && instant_winner.is_none() {
                instant_winner = Some(participant);
            }
        }

        // Persist the raw payload and flag the lobby, whatever happens next.
        let payload_json = serde_json::to_value(&payload)?;
        sqlx::query(
            "UPDATE matches
             SET match_data = $1, fetched_at = NOW(), status = 'resolved',
                 external_match_id = COALESCE($2, external_match_id)
             WHERE id = $3",
        )
        .bind(&payload_json)
        .bind(&payload.external_match_id)
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE lobbies SET fetched_result = TRUE WHERE id = $1")
            .bind(lobby.id)
            .execute(&mut *tx)
            .await?;

        // Status guards make redelivery after conclusion a safe no-op.
        let live = tournament.status == TournamentStatus::Playing
            && round.status == RoundStatus::Playing;

        if live {
            if let Some(winner) = instant_winner {
                let outcome = self
                    .conclude_by_checkmate(&mut tx, &tournament, &round, winner, &mut effects)
                    .await?;
                tx.commit().await?;
                effects.dispatch(self.queue.as_ref(), self.notifier.as_ref()).await;
                return Ok(outcome);
            }

            if store::round_fully_fetched(&mut tx, round.id).await? {
                let outcome = phase::resolve_round(
                    &mut tx,
                    &self.ledger,
                    &tournament,
                    &round,
                    &mut effects,
                )
                .await?;
                store::set_round_status(&mut tx, round.id, RoundStatus::Completed).await?;
                tx.commit().await?;
                effects.dispatch(self.queue.as_ref(), self.notifier.as_ref()).await;
                return Ok(match outcome {
                    PhaseOutcome::NextRound(next) => IngestOutcome::NextRoundCreated(next.id),
                    PhaseOutcome::Settled => IngestOutcome::TournamentSettled,
                });
            }
        }

        tx.commit().await?;
        effects.dispatch(self.queue.as_ref(), self.notifier.as_ref()).await;
        Ok(IngestOutcome::AwaitingOtherMatches)
    }

    /// Upsert one (match, participant) result row and move the cumulative
    /// score by the delta against whatever was recorded before. Returns the
    /// participant's new score total.
    async fn record_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        match_id: MatchId,
        participant: &Participant,
        placement: i32,
        points: i64,
    ) -> EngineResult<i64> {
        let existing = sqlx::query(
            "SELECT points FROM match_results WHERE match_id = $1 AND participant_id = $2",
        )
        .bind(match_id)
        .bind(participant.id)
        .fetch_optional(&mut **tx)
        .await?;

        let previous_points: i64 = existing.map(|row| row.get("points")).unwrap_or(0);
        let delta = points - previous_points;

        sqlx::query(
            r#"
            INSERT INTO match_results (match_id, participant_id, placement, points)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (match_id, participant_id)
            DO UPDATE SET placement = EXCLUDED.placement, points = EXCLUDED.points
            "#,
        )
        .bind(match_id)
        .bind(participant.id)
        .bind(placement)
        .bind(points)
        .execute(&mut **tx)
        .await?;

        if delta == 0 {
            return Ok(participant.score_total);
        }

        let row = sqlx::query(
            "UPDATE participants SET score_total = score_total + $1 WHERE id = $2
             RETURNING score_total",
        )
        .bind(delta)
        .bind(participant.id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("score_total"))
    }

    /// Instant win: the armed winner takes rank 1, the remaining active
    /// participants fill the lower ranks by score. Settles and completes the
    /// round and tournament in the current transaction.
    async fn conclude_by_checkmate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tournament: &Tournament,
        round: &Round,
        winner: Participant,
        effects: &mut Effects,
    ) -> EngineResult<IngestOutcome> {
        log::info!(
            "Participant {} wins tournament {} by checkmate",
            winner.id,
            tournament.id
        );

        let mut winners = vec![winner.clone()];
        winners.extend(
            store::active_participants(tx, tournament.id)
                .await?
                .into_iter()
                .filter(|p| p.id != winner.id),
        );

        settle_tournament(tx, &self.ledger, tournament, &winners, effects).await?;
        store::set_round_status(tx, round.id, RoundStatus::Completed).await?;

        Ok(IngestOutcome::TournamentConcluded)
    }
}
