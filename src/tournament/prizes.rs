//! Prize pool calculation.
//!
//! Pure arithmetic, no side effects: the scheduler runs this once at
//! registration close and persists the result on the tournament.

use super::models::PrizeTable;

/// An achievable prize table, clamped to the actually collected pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustedPrizes {
    /// `actual_participants * entry_fee`
    pub total_collected: i64,
    /// Host cut, floored, never negative
    pub host_fee: i64,
    /// `total_collected - host_fee`
    pub prize_pool: i64,
    /// Allocation per rank; ranks with nothing left are absent
    pub by_rank: PrizeTable,
}

/// Clamp a desired prize table to what the collected pool can cover.
///
/// Ranks are walked in ascending numeric order against a running balance:
/// a rank is paid in full while the balance covers it, the first shortfall
/// rank receives the remainder, and every rank after that receives nothing.
/// The allocated total therefore never exceeds the pool, and numerically
/// lower ranks are always favored.
pub fn adjust_prize_structure(
    desired: &PrizeTable,
    actual_participants: i64,
    entry_fee: i64,
    host_fee_percent: f64,
) -> AdjustedPrizes {
    let total_collected = actual_participants * entry_fee;
    let host_fee = ((total_collected as f64) * host_fee_percent).floor().max(0.0) as i64;
    let prize_pool = total_collected - host_fee;

    let mut remaining = prize_pool;
    let mut by_rank = PrizeTable::new();

    for (&rank, &amount) in desired {
        if remaining <= 0 {
            break;
        }
        if remaining >= amount {
            by_rank.insert(rank, amount);
            remaining -= amount;
        } else {
            // Partial allocation for the first rank the pool cannot cover.
            by_rank.insert(rank, remaining);
            remaining = 0;
            break;
        }
    }

    AdjustedPrizes {
        total_collected,
        host_fee,
        prize_pool,
        by_rank,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(u32, i64)]) -> PrizeTable {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_full_allocation_with_host_fee() {
        // 10 participants, fee 100, host 10%: pool 900 covers 600+300 exactly,
        // rank 3 gets nothing.
        let desired = table(&[(1, 600), (2, 300), (3, 200)]);
        let adjusted = adjust_prize_structure(&desired, 10, 100, 0.1);

        assert_eq!(adjusted.total_collected, 1000);
        assert_eq!(adjusted.host_fee, 100);
        assert_eq!(adjusted.prize_pool, 900);
        assert_eq!(adjusted.by_rank, table(&[(1, 600), (2, 300)]));
    }

    #[test]
    fn test_partial_allocation_for_first_short_rank() {
        // Pool 500: rank 1 paid in full, rank 2 gets the 100 remainder,
        // rank 3 nothing.
        let desired = table(&[(1, 400), (2, 300), (3, 200)]);
        let adjusted = adjust_prize_structure(&desired, 5, 100, 0.0);

        assert_eq!(adjusted.prize_pool, 500);
        assert_eq!(adjusted.by_rank, table(&[(1, 400), (2, 100)]));
    }

    #[test]
    fn test_pool_larger_than_desired_total() {
        let desired = table(&[(1, 100), (2, 50)]);
        let adjusted = adjust_prize_structure(&desired, 100, 10, 0.0);

        assert_eq!(adjusted.prize_pool, 1000);
        assert_eq!(adjusted.by_rank, desired);
    }

    #[test]
    fn test_empty_pool_allocates_nothing() {
        let desired = table(&[(1, 600), (2, 300)]);
        let adjusted = adjust_prize_structure(&desired, 0, 100, 0.1);

        assert_eq!(adjusted.total_collected, 0);
        assert_eq!(adjusted.host_fee, 0);
        assert_eq!(adjusted.prize_pool, 0);
        assert!(adjusted.by_rank.is_empty());
    }

    #[test]
    fn test_host_fee_floors() {
        // 3 * 100 * 0.15 = 45.0; 7 * 99 * 0.33 = 228.69 -> 228
        let desired = table(&[(1, 1000)]);
        assert_eq!(adjust_prize_structure(&desired, 3, 100, 0.15).host_fee, 45);
        assert_eq!(adjust_prize_structure(&desired, 7, 99, 0.33).host_fee, 228);
    }

    #[test]
    fn test_allocated_never_exceeds_pool() {
        let desired = table(&[(1, 700), (2, 500), (3, 300), (4, 100)]);
        for participants in 0..30 {
            let adjusted = adjust_prize_structure(&desired, participants, 75, 0.12);
            let allocated: i64 = adjusted.by_rank.values().sum();
            assert!(allocated <= adjusted.prize_pool);
        }
    }

    #[test]
    fn test_ranks_walked_in_ascending_order() {
        // Sparse ranks still favor numerically lower ones.
        let desired = table(&[(5, 100), (2, 400), (9, 50)]);
        let adjusted = adjust_prize_structure(&desired, 45, 10, 0.0);

        assert_eq!(adjusted.prize_pool, 450);
        assert_eq!(adjusted.by_rank, table(&[(2, 400), (5, 50)]));
    }
}
