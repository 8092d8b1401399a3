//! # Join Implementation
//!
//! Every logical join becomes a `JoinExec` running one of two algorithms:
//!
//! ## Broadcast Hash Join
//!
//! The build side is collected, shipped to every task and loaded into a hash
//! table that the other side probes. Chosen when a side that is allowed to
//! build has an estimated row count below `broadcast_threshold_rows`. When
//! both sides qualify the smaller one builds; ties build on the right.
//!
//! A side may only build when the join does not have to emit its unmatched
//! rows:
//!
//! | join type | buildable sides |
//! |---|---|
//! | Inner, Cross | left, right |
//! | Left, Semi, Anti | right |
//! | Right | left |
//! | Full | none |
//!
//! ## Sort-Merge Join
//!
//! Both sides are sorted on the join keys and merged. This is the fallback
//! whenever no side qualifies, including when statistics are unavailable.

use relopt_core::physical::{BuildSide, JoinStrategy};
use relopt_core::plan::JoinType;

/// Sides of a `join_type` join that may be used as the hash build side.
pub fn buildable_sides(join_type: JoinType) -> &'static [BuildSide] {
    match join_type {
        JoinType::Inner | JoinType::Cross => &[BuildSide::Left, BuildSide::Right],
        JoinType::Left | JoinType::Semi | JoinType::Anti => &[BuildSide::Right],
        JoinType::Right => &[BuildSide::Left],
        JoinType::Full => &[],
    }
}

/// Pick the join algorithm from the estimated input sizes.
pub fn choose_join_strategy(
    join_type: JoinType,
    left_rows: Option<f64>,
    right_rows: Option<f64>,
    broadcast_threshold_rows: f64,
) -> JoinStrategy {
    let qualifying = |side: BuildSide| {
        let rows = match side {
            BuildSide::Left => left_rows,
            BuildSide::Right => right_rows,
        };
        rows.filter(|&r| r < broadcast_threshold_rows).map(|r| (side, r))
    };
    let candidates: Vec<(BuildSide, f64)> = buildable_sides(join_type)
        .iter()
        .filter_map(|&side| qualifying(side))
        .collect();

    let build_side = match candidates.as_slice() {
        [] => return JoinStrategy::SortMerge,
        [(side, _)] => *side,
        [(_, left), (_, right), ..] => {
            if left < right {
                BuildSide::Left
            } else {
                BuildSide::Right
            }
        }
    };
    JoinStrategy::BroadcastHash { build_side }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 10_000.0;

    fn broadcast(build_side: BuildSide) -> JoinStrategy {
        JoinStrategy::BroadcastHash { build_side }
    }

    #[test]
    fn test_smaller_side_builds() {
        let s = choose_join_strategy(JoinType::Inner, Some(50.0), Some(1_000_000.0), THRESHOLD);
        assert_eq!(s, broadcast(BuildSide::Left));
        let s = choose_join_strategy(JoinType::Inner, Some(1_000_000.0), Some(50.0), THRESHOLD);
        assert_eq!(s, broadcast(BuildSide::Right));
    }

    #[test]
    fn test_ties_build_right() {
        let s = choose_join_strategy(JoinType::Inner, Some(10.0), Some(10.0), THRESHOLD);
        assert_eq!(s, broadcast(BuildSide::Right));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let s = choose_join_strategy(JoinType::Inner, Some(THRESHOLD), Some(THRESHOLD), THRESHOLD);
        assert_eq!(s, JoinStrategy::SortMerge);
    }

    #[test]
    fn test_preserved_side_never_builds() {
        let s = choose_join_strategy(JoinType::Left, Some(10.0), Some(1_000_000.0), THRESHOLD);
        assert_eq!(s, JoinStrategy::SortMerge);
        let s = choose_join_strategy(JoinType::Right, Some(10.0), Some(5.0), THRESHOLD);
        assert_eq!(s, broadcast(BuildSide::Left));
        let s = choose_join_strategy(JoinType::Full, Some(1.0), Some(1.0), THRESHOLD);
        assert_eq!(s, JoinStrategy::SortMerge);
    }

    #[test]
    fn test_missing_statistics_fall_back_to_sort_merge() {
        assert_eq!(choose_join_strategy(JoinType::Inner, None, None, THRESHOLD), JoinStrategy::SortMerge);
        let s = choose_join_strategy(JoinType::Inner, None, Some(3.0), THRESHOLD);
        assert_eq!(s, broadcast(BuildSide::Right));
    }
}
