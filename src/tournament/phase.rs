//! Phase resolution: the policy applied once a round is fully resolved.
//!
//! Elimination and points phases cut the field to `top` by cumulative score;
//! checkmate phases eliminate no one at round end (only the instant-win path
//! in result ingestion ends a checkmate tournament early). Either the next
//! round is created and partitioned, or the tournament settles.

use super::{
    effects::Effects,
    errors::{EngineError, EngineResult},
    lobby,
    models::{Participant, PhaseConfig, PhaseRules, Round, RoundStatus, Tournament},
    settlement::settle_tournament,
    store,
};
use crate::ledger::LedgerManager;
use crate::ports::{tournament_topic, EngineEvent};
use chrono::Utc;
use sqlx::{Postgres, Transaction};

/// What phase resolution decided for a completed round.
#[derive(Debug)]
pub enum PhaseOutcome {
    /// Next round created, partitioned and playing
    NextRound(Round),
    /// Final winners paid, tournament closed
    Settled,
}

/// Where the round after `(phase_index, round_in_phase)` sits, or `None` when
/// the configured phases are exhausted.
///
/// A points phase declaring `total_rounds_in_phase` repeats its own config
/// until its phase-relative counter runs out; every other phase occupies one
/// round.
pub fn next_phase_slot(
    phases: &[PhaseConfig],
    phase_index: usize,
    round_in_phase: u32,
) -> Option<(usize, u32)> {
    if let Some(config) = phases.get(phase_index) {
        if let PhaseRules::Points {
            total_rounds_in_phase: Some(n),
            ..
        } = config.rules
        {
            if round_in_phase < n {
                return Some((phase_index, round_in_phase + 1));
            }
        }
    }

    let next = phase_index + 1;
    if next < phases.len() {
        Some((next, 1))
    } else {
        None
    }
}

/// Resolve a fully-fetched round: apply the phase policy, then either settle
/// or create the next round. The caller marks the round completed afterwards
/// and commits.
pub(crate) async fn resolve_round(
    tx: &mut Transaction<'_, Postgres>,
    ledger: &LedgerManager,
    tournament: &Tournament,
    round: &Round,
    effects: &mut Effects,
) -> EngineResult<PhaseOutcome> {
    if tournament.phase(round.phase_index as usize).is_none() {
        return Err(EngineError::MissingPhaseConfig {
            tournament_id: tournament.id,
            phase_index: round.phase_index,
        });
    }

    // Active participants arrive sorted by score descending, stable.
    let active = store::active_participants(tx, tournament.id).await?;

    let survivors = match round.config.rules {
        PhaseRules::Elimination { top } | PhaseRules::Points { top, .. } => {
            cut_to_top(tx, round, active, top as usize).await?
        }
        PhaseRules::Checkmate { .. } => active,
    };

    match next_phase_slot(
        &tournament.phases,
        round.phase_index as usize,
        round.round_in_phase as u32,
    ) {
        Some((phase_index, round_in_phase)) => {
            let next = create_next_round(
                tx,
                tournament,
                round,
                phase_index,
                round_in_phase,
                survivors,
                effects,
            )
            .await?;
            Ok(PhaseOutcome::NextRound(next))
        }
        None => {
            settle_tournament(tx, ledger, tournament, &survivors, effects).await?;
            Ok(PhaseOutcome::Settled)
        }
    }
}

/// Mark everyone beyond rank `top` eliminated; return the survivors in rank
/// order.
async fn cut_to_top(
    tx: &mut Transaction<'_, Postgres>,
    round: &Round,
    mut active: Vec<Participant>,
    top: usize,
) -> EngineResult<Vec<Participant>> {
    if active.len() <= top {
        return Ok(active);
    }

    let eliminated = active.split_off(top);
    let eliminated_ids: Vec<i64> = eliminated.iter().map(|p| p.id).collect();

    sqlx::query("UPDATE participants SET eliminated = TRUE WHERE id = ANY($1)")
        .bind(&eliminated_ids)
        .execute(&mut **tx)
        .await?;

    log::info!(
        "Round {} (tournament {}): eliminated {} participants, {} advance",
        round.id,
        round.tournament_id,
        eliminated_ids.len(),
        active.len()
    );

    Ok(active)
}

/// Create, partition and start the round after `round`.
async fn create_next_round(
    tx: &mut Transaction<'_, Postgres>,
    tournament: &Tournament,
    round: &Round,
    phase_index: usize,
    round_in_phase: u32,
    survivors: Vec<Participant>,
    effects: &mut Effects,
) -> EngineResult<Round> {
    let config = tournament
        .phase(phase_index)
        .ok_or(EngineError::MissingPhaseConfig {
            tournament_id: tournament.id,
            phase_index: phase_index as i32,
        })?;

    let next = store::insert_round(
        tx,
        tournament.id,
        round.round_number + 1,
        phase_index as i32,
        round_in_phase as i32,
        Utc::now(),
        config,
    )
    .await?;

    let fetches = lobby::create_lobbies(tx, &next, survivors).await?;
    effects.fetches.extend(fetches);

    store::set_round_status(tx, next.id, RoundStatus::Playing).await?;

    effects.notify(
        tournament_topic(tournament.id),
        EngineEvent::NextRoundCreated {
            tournament_id: tournament.id,
            round_id: next.id,
            round_number: next.round_number,
        },
    );

    Ok(Round {
        status: RoundStatus::Playing,
        ..next
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::LobbyAssignment;

    fn phase(rules: PhaseRules) -> PhaseConfig {
        PhaseConfig {
            lobby_size: 8,
            lobby_assignment: LobbyAssignment::Random,
            rules,
        }
    }

    #[test]
    fn test_single_round_phases_advance_in_order() {
        let phases = vec![
            phase(PhaseRules::Elimination { top: 8 }),
            phase(PhaseRules::Elimination { top: 4 }),
            phase(PhaseRules::Checkmate {
                points_to_activate: 50,
            }),
        ];

        assert_eq!(next_phase_slot(&phases, 0, 1), Some((1, 1)));
        assert_eq!(next_phase_slot(&phases, 1, 1), Some((2, 1)));
        assert_eq!(next_phase_slot(&phases, 2, 1), None);
    }

    #[test]
    fn test_points_phase_repeats_until_counter_runs_out() {
        let phases = vec![
            phase(PhaseRules::Elimination { top: 16 }),
            phase(PhaseRules::Points {
                top: 8,
                total_rounds_in_phase: Some(3),
            }),
            phase(PhaseRules::Elimination { top: 1 }),
        ];

        // The counter is phase-relative, so a points phase starting at
        // round 2 of the tournament still gets its full three rounds.
        assert_eq!(next_phase_slot(&phases, 1, 1), Some((1, 2)));
        assert_eq!(next_phase_slot(&phases, 1, 2), Some((1, 3)));
        assert_eq!(next_phase_slot(&phases, 1, 3), Some((2, 1)));
    }

    #[test]
    fn test_points_phase_without_counter_takes_one_round() {
        let phases = vec![
            phase(PhaseRules::Points {
                top: 8,
                total_rounds_in_phase: None,
            }),
            phase(PhaseRules::Elimination { top: 1 }),
        ];

        assert_eq!(next_phase_slot(&phases, 0, 1), Some((1, 1)));
    }

    #[test]
    fn test_last_phase_exhausts_to_settlement() {
        let phases = vec![phase(PhaseRules::Points {
            top: 4,
            total_rounds_in_phase: Some(2),
        })];

        assert_eq!(next_phase_slot(&phases, 0, 1), Some((0, 2)));
        assert_eq!(next_phase_slot(&phases, 0, 2), None);
    }
}
