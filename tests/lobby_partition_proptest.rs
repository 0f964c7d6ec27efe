/// Property-based tests for lobby partitioning and prize allocation using
/// proptest
///
/// These tests verify the partitioner and prize-calculator invariants across
/// a wide range of randomly generated inputs.
use proptest::prelude::*;
use tourney_engine::tournament::{
    adjust_prize_structure,
    lobby::{chunk_into_lobbies, order_for_assignment},
    LobbyAssignment, Participant, PrizeTable,
};

fn participants_strategy(max: usize) -> impl Strategy<Value = Vec<Participant>> {
    prop::collection::vec(0i64..10_000, 1..=max).prop_map(|scores| {
        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| Participant {
                id: i as i64 + 1,
                tournament_id: 1,
                user_id: i as i64 + 1000,
                game_id: format!("player-{i}"),
                score_total: score,
                eliminated: false,
                checkmate_active: false,
                paid: false,
            })
            .collect()
    })
}

fn prize_table_strategy() -> impl Strategy<Value = PrizeTable> {
    prop::collection::btree_map(1u32..20, 1i64..5_000, 0..8)
}

proptest! {
    #[test]
    fn test_every_participant_lands_in_exactly_one_lobby(
        participants in participants_strategy(60),
        lobby_size in 2u32..12,
    ) {
        let n = participants.len();
        let ordered = order_for_assignment(participants, LobbyAssignment::Random);
        let ids: Vec<i64> = ordered.iter().map(|p| p.id).collect();
        let lobbies = chunk_into_lobbies(&ids, lobby_size);

        let mut seen: Vec<i64> = lobbies.iter().flatten().copied().collect();
        seen.sort_unstable();
        let expected: Vec<i64> = (1..=n as i64).collect();
        prop_assert_eq!(seen, expected, "no participant dropped or duplicated");
    }

    #[test]
    fn test_lobby_count_is_ceiling_division(
        participants in participants_strategy(60),
        lobby_size in 2u32..12,
    ) {
        let n = participants.len();
        let ids: Vec<i64> = participants.iter().map(|p| p.id).collect();
        let lobbies = chunk_into_lobbies(&ids, lobby_size);

        let expected = n.div_ceil(lobby_size as usize);
        prop_assert_eq!(lobbies.len(), expected);
    }

    #[test]
    fn test_last_lobby_size_in_range(
        participants in participants_strategy(60),
        lobby_size in 2u32..12,
    ) {
        let ids: Vec<i64> = participants.iter().map(|p| p.id).collect();
        let lobbies = chunk_into_lobbies(&ids, lobby_size);

        for lobby in &lobbies[..lobbies.len() - 1] {
            prop_assert_eq!(lobby.len(), lobby_size as usize, "only the last lobby may be short");
        }
        let last = lobbies.last().unwrap().len();
        prop_assert!(last >= 1 && last <= lobby_size as usize);
    }

    #[test]
    fn test_seeded_ordering_is_monotone_by_score(participants in participants_strategy(40)) {
        let ordered = order_for_assignment(participants, LobbyAssignment::Seeded);
        for pair in ordered.windows(2) {
            prop_assert!(pair[0].score_total >= pair[1].score_total);
        }
    }

    #[test]
    fn test_allocated_prizes_never_exceed_pool(
        desired in prize_table_strategy(),
        actual_participants in 0i64..500,
        entry_fee in 0i64..1_000,
        host_fee_percent in 0.0f64..=1.0,
    ) {
        let adjusted = adjust_prize_structure(&desired, actual_participants, entry_fee, host_fee_percent);
        let allocated: i64 = adjusted.by_rank.values().sum();

        prop_assert!(allocated <= adjusted.prize_pool.max(0));
        prop_assert!(adjusted.host_fee >= 0);
        prop_assert_eq!(adjusted.total_collected, actual_participants * entry_fee);
    }

    #[test]
    fn test_lower_ranks_paid_before_higher(
        desired in prize_table_strategy(),
        actual_participants in 0i64..500,
        entry_fee in 0i64..1_000,
    ) {
        let adjusted = adjust_prize_structure(&desired, actual_participants, entry_fee, 0.1);

        // Once a rank is unpaid or partially paid, every later rank is unpaid.
        let mut shorted = false;
        for (rank, desired_amount) in &desired {
            match adjusted.by_rank.get(rank) {
                Some(paid) if paid == desired_amount => {
                    prop_assert!(!shorted, "full payment after a shortfall at rank {}", rank);
                }
                Some(_) => shorted = true,
                None => shorted = true,
            }
        }
    }
}
