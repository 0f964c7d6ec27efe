//! Settlement: final prize payout and tournament closure.
//!
//! Runs inside the same transaction as the phase resolution (or instant-win
//! ingestion) that decided the winners, so a crash between "winners decided"
//! and "payout recorded" is impossible.

use super::{
    effects::Effects,
    errors::{EngineError, EngineResult},
    models::{Participant, Tournament, TournamentStatus},
    store,
};
use crate::ledger::{LedgerError, LedgerManager};
use crate::ports::{tournament_topic, user_topic, EngineEvent};
use sqlx::{Postgres, Transaction};

/// Pay out the adjusted prize table to the final winners and close the
/// tournament.
///
/// `winners` is ordered by final standing: index 0 is rank 1. Ranks with no
/// defined amount are skipped with a warning; that is data-quality noise,
/// not an error.
pub(crate) async fn settle_tournament(
    tx: &mut Transaction<'_, Postgres>,
    ledger: &LedgerManager,
    tournament: &Tournament,
    winners: &[Participant],
    effects: &mut Effects,
) -> EngineResult<()> {
    let prizes = tournament
        .adjusted_prize_structure
        .as_ref()
        .ok_or(EngineError::MissingPrizeStructure(tournament.id))?;

    for (index, winner) in winners.iter().enumerate() {
        let rank = index as u32 + 1;
        let Some(&amount) = prizes.get(&rank) else {
            log::warn!(
                "Tournament {}: no prize defined for rank {}, skipping payout to user {}",
                tournament.id,
                rank,
                winner.user_id
            );
            continue;
        };
        if amount <= 0 {
            continue;
        }

        // Deterministic key: a re-settled tournament dedupes at the ledger.
        let idempotency_key = format!("prize_{}_rank_{}", tournament.id, rank);
        match ledger
            .credit_prize(tx, winner.user_id, tournament.id, amount, idempotency_key)
            .await
        {
            Ok(_) => {}
            Err(LedgerError::DuplicateTransaction(key)) => {
                log::warn!(
                    "Tournament {}: prize for rank {} already paid (key {}), skipping",
                    tournament.id,
                    rank,
                    key
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query("UPDATE participants SET paid = TRUE WHERE id = $1")
            .bind(winner.id)
            .execute(&mut **tx)
            .await?;

        effects.notify(
            user_topic(winner.user_id),
            EngineEvent::PrizeCredited {
                tournament_id: tournament.id,
                user_id: winner.user_id,
                rank,
                amount,
            },
        );

        log::info!(
            "Tournament {}: rank {} pays {} to user {}",
            tournament.id,
            rank,
            amount,
            winner.user_id
        );
    }

    store::set_tournament_status(tx, tournament.id, TournamentStatus::Completed).await?;
    effects.notify(
        tournament_topic(tournament.id),
        EngineEvent::TournamentCompleted {
            tournament_id: tournament.id,
        },
    );

    Ok(())
}
