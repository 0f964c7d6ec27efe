//! Lobby partitioning.
//!
//! Splits the active participant list into fixed-size lobbies, creates one
//! match per lobby, and collects a fetch request per match for dispatch after
//! the surrounding transaction commits. Every active participant lands in
//! exactly one lobby; lobby count is `ceil(n / lobby_size)`.

use super::{
    errors::EngineResult,
    models::{LobbyAssignment, Participant, ParticipantId, Round},
};
use crate::ports::FetchRequest;
use rand::seq::SliceRandom;
use sqlx::{Postgres, Row, Transaction};

/// Order participants for lobby assignment.
///
/// `Random` applies a uniform Fisher-Yates shuffle; `Seeded` stable-sorts by
/// cumulative score descending so top scorers cluster in early lobbies, ties
/// keeping their relative order.
pub fn order_for_assignment(
    mut participants: Vec<Participant>,
    assignment: LobbyAssignment,
) -> Vec<Participant> {
    match assignment {
        LobbyAssignment::Random => {
            participants.shuffle(&mut rand::rng());
        }
        LobbyAssignment::Seeded => {
            participants.sort_by(|a, b| b.score_total.cmp(&a.score_total));
        }
    }
    participants
}

/// Partition an ordered id list into consecutive chunks of at most
/// `lobby_size`; the last chunk may be smaller but never empty.
pub fn chunk_into_lobbies(ids: &[ParticipantId], lobby_size: u32) -> Vec<Vec<ParticipantId>> {
    let size = lobby_size.max(1) as usize;
    ids.chunks(size).map(|chunk| chunk.to_vec()).collect()
}

/// Create the round's lobbies and matches from the active participant list.
///
/// Returns the fetch requests to hand to the result-fetch queue once the
/// transaction commits; the partitioner never waits on match data.
pub(crate) async fn create_lobbies(
    tx: &mut Transaction<'_, Postgres>,
    round: &Round,
    participants: Vec<Participant>,
) -> EngineResult<Vec<FetchRequest>> {
    let ordered = order_for_assignment(participants, round.config.lobby_assignment);
    let ids: Vec<ParticipantId> = ordered.iter().map(|p| p.id).collect();
    let groups = chunk_into_lobbies(&ids, round.config.lobby_size);

    let mut fetches = Vec::with_capacity(groups.len());

    for group in groups {
        let lobby_row = sqlx::query(
            r#"
            INSERT INTO lobbies (round_id, participant_ids, fetched_result)
            VALUES ($1, $2, FALSE)
            RETURNING id
            "#,
        )
        .bind(round.id)
        .bind(&group)
        .fetch_one(&mut **tx)
        .await?;
        let lobby_id: i64 = lobby_row.get("id");

        let match_row = sqlx::query(
            r#"
            INSERT INTO matches (lobby_id, status)
            VALUES ($1, 'pending')
            RETURNING id
            "#,
        )
        .bind(lobby_id)
        .fetch_one(&mut **tx)
        .await?;
        let match_id: i64 = match_row.get("id");

        fetches.push(FetchRequest {
            match_id,
            lobby_id,
            external_match_id: None,
            region: None,
        });
    }

    log::info!(
        "Round {} (tournament {}): created {} lobbies for {} participants",
        round.id,
        round.tournament_id,
        fetches.len(),
        ids.len()
    );

    Ok(fetches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: i64, score: i64) -> Participant {
        Participant {
            id,
            tournament_id: 1,
            user_id: id,
            game_id: format!("game-{id}"),
            score_total: score,
            eliminated: false,
            checkmate_active: false,
            paid: false,
        }
    }

    #[test]
    fn test_chunk_17_by_8_gives_8_8_1() {
        let ids: Vec<i64> = (1..=17).collect();
        let groups = chunk_into_lobbies(&ids, 8);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![8, 8, 1]);
    }

    #[test]
    fn test_chunk_exact_multiple() {
        let ids: Vec<i64> = (1..=16).collect();
        let groups = chunk_into_lobbies(&ids, 4);
        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.len() == 4));
    }

    #[test]
    fn test_chunk_preserves_order_and_membership() {
        let ids: Vec<i64> = vec![5, 3, 9, 1, 7];
        let groups = chunk_into_lobbies(&ids, 2);
        let flattened: Vec<i64> = groups.into_iter().flatten().collect();
        assert_eq!(flattened, ids);
    }

    #[test]
    fn test_chunk_empty_list() {
        assert!(chunk_into_lobbies(&[], 8).is_empty());
    }

    #[test]
    fn test_random_order_is_a_permutation() {
        let participants: Vec<Participant> = (1..=20).map(|i| participant(i, i * 10)).collect();
        let ordered = order_for_assignment(participants, LobbyAssignment::Random);

        let mut ids: Vec<i64> = ordered.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=20).collect::<Vec<i64>>());
    }

    #[test]
    fn test_seeded_order_sorts_by_score_descending() {
        let participants = vec![
            participant(1, 30),
            participant(2, 90),
            participant(3, 60),
            participant(4, 90),
        ];
        let ordered = order_for_assignment(participants, LobbyAssignment::Seeded);
        let ids: Vec<i64> = ordered.iter().map(|p| p.id).collect();
        // Stable sort: tied participants 2 and 4 keep their relative order.
        assert_eq!(ids, vec![2, 4, 3, 1]);
    }
}
