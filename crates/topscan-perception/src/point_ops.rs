//! Ordering, equality and deduplication of point sets.
//!
//! Points are ordered lexicographically on (x, y, z) using IEEE-754 total
//! ordering, so every sequence, including one holding NaN, has exactly one
//! sorted form.  Equality is governed by a [`Tolerance`]; the default is
//! exact comparison.

use std::cmp::Ordering;

use topscan_types::Point;

/// Maximum per-axis difference under which two points count as equal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tolerance {
    epsilon: f32,
}

impl Tolerance {
    /// Exact floating-point equality.
    pub fn exact() -> Self {
        Self::default()
    }

    /// Equality within `epsilon` on every axis.  Negative or non-finite
    /// values fall back to exact comparison.
    pub fn new(epsilon: f32) -> Self {
        if epsilon.is_finite() && epsilon > 0.0 {
            Self { epsilon }
        } else {
            Self::exact()
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// True when `a` and `b` lie within the tolerance on a single axis.
    pub fn axis_eq(&self, a: f32, b: f32) -> bool {
        a == b || (a - b).abs() <= self.epsilon
    }
}

/// Lexicographic total order: x, then y, then z.
///
/// `-0.0` and `0.0` compare equal, matching [`points_equal`].
pub fn order(a: &Point, b: &Point) -> Ordering {
    axis_cmp(a.x, b.x)
        .then_with(|| axis_cmp(a.y, b.y))
        .then_with(|| axis_cmp(a.z, b.z))
}

fn axis_cmp(a: f32, b: f32) -> Ordering {
    // Adding +0.0 turns -0.0 into +0.0 and leaves every other value alone.
    (a + 0.0).total_cmp(&(b + 0.0))
}

/// Strict "comes before" predicate derived from [`order`].
pub fn precedes(a: &Point, b: &Point) -> bool {
    order(a, b) == Ordering::Less
}

/// True when all three coordinates match under `tolerance`.
pub fn points_equal(a: &Point, b: &Point, tolerance: Tolerance) -> bool {
    tolerance.axis_eq(a.x, b.x) && tolerance.axis_eq(a.y, b.y) && tolerance.axis_eq(a.z, b.z)
}

/// Sort `points` under [`order`] and drop every point equal to the last one
/// kept.
///
/// The sort is stable and the compaction is a single forward pass, so with a
/// non-zero tolerance each run collapses onto its first (smallest) member.
/// Applying the function twice gives the same result as applying it once.
pub fn sort_and_dedup(points: &mut Vec<Point>, tolerance: Tolerance) {
    points.sort_by(order);
    points.dedup_by(|current, kept| points_equal(current, kept, tolerance));
}

/// Sorted, deduplicated copy of `points`.
pub fn sorted_unique(points: &[Point], tolerance: Tolerance) -> Vec<Point> {
    let mut out = points.to_vec();
    sort_and_dedup(&mut out, tolerance);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32, z: f32) -> Point {
        Point::new(x, y, z)
    }

    /// Deterministic pseudo-random points on a coarse grid so duplicates are
    /// frequent.
    fn scrambled(n: usize, seed: u64) -> Vec<Point> {
        let mut state = seed;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) % 4) as f32
        };
        (0..n).map(|_| p(next(), next(), next())).collect()
    }

    #[test]
    fn order_is_lexicographic() {
        assert!(precedes(&p(0.0, 9.0, 9.0), &p(1.0, 0.0, 0.0)));
        assert!(precedes(&p(1.0, 0.0, 9.0), &p(1.0, 1.0, 0.0)));
        assert!(precedes(&p(1.0, 1.0, 0.0), &p(1.0, 1.0, 0.5)));
        assert!(!precedes(&p(1.0, 1.0, 1.0), &p(1.0, 1.0, 1.0)));
    }

    #[test]
    fn signed_zeros_sort_together_and_collapse() {
        assert_eq!(order(&p(-0.0, 5.0, 1.0), &p(0.0, 5.0, 1.0)), Ordering::Equal);

        let mut v = vec![p(0.0, 5.0, 1.0), p(-0.0, 5.0, 1.0), p(0.0, 1.0, 1.0)];
        sort_and_dedup(&mut v, Tolerance::exact());
        assert_eq!(v, vec![p(0.0, 1.0, 1.0), p(0.0, 5.0, 1.0)]);
        // The stable sort keeps the first of the two equal points.
        assert!(v[1].x.is_sign_positive());
    }

    #[test]
    fn empty_stays_empty() {
        let mut v: Vec<Point> = Vec::new();
        sort_and_dedup(&mut v, Tolerance::exact());
        assert!(v.is_empty());
    }

    #[test]
    fn single_point_is_unchanged() {
        let mut v = vec![p(3.0, -1.0, 2.0)];
        sort_and_dedup(&mut v, Tolerance::exact());
        assert_eq!(v, vec![p(3.0, -1.0, 2.0)]);
    }

    #[test]
    fn all_equal_collapses_to_one() {
        let mut v = vec![p(1.0, 2.0, 3.0); 7];
        sort_and_dedup(&mut v, Tolerance::exact());
        assert_eq!(v, vec![p(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn adjacent_runs_of_three_or_more_collapse() {
        let mut v = vec![
            p(2.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(0.0, 0.0, 0.0),
        ];
        sort_and_dedup(&mut v, Tolerance::exact());
        assert_eq!(v, vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(2.0, 0.0, 0.0)]);
    }

    #[test]
    fn duplicates_at_both_ends_are_removed() {
        let mut v = vec![
            p(0.0, 0.0, 0.0),
            p(0.0, 0.0, 0.0),
            p(0.0, 0.0, 0.0),
            p(5.0, 5.0, 5.0),
            p(9.0, 9.0, 9.0),
            p(9.0, 9.0, 9.0),
            p(9.0, 9.0, 9.0),
        ];
        sort_and_dedup(&mut v, Tolerance::exact());
        assert_eq!(v, vec![p(0.0, 0.0, 0.0), p(5.0, 5.0, 5.0), p(9.0, 9.0, 9.0)]);
    }

    #[test]
    fn epsilon_merges_noisy_samples() {
        let mut v = vec![p(1.0, 1.0, 1.0), p(1.004, 1.0, 0.998), p(1.0, 1.002, 1.0), p(1.5, 1.0, 1.0)];
        sort_and_dedup(&mut v, Tolerance::new(0.01));
        assert_eq!(v, vec![p(1.0, 1.0, 1.0), p(1.5, 1.0, 1.0)]);
    }

    #[test]
    fn invalid_epsilon_means_exact() {
        assert_eq!(Tolerance::new(-1.0), Tolerance::exact());
        assert_eq!(Tolerance::new(f32::NAN), Tolerance::exact());
        assert_eq!(Tolerance::new(0.5).epsilon(), 0.5);
    }

    #[test]
    fn sort_and_dedup_is_idempotent() {
        for seed in 1..20 {
            for tolerance in [Tolerance::exact(), Tolerance::new(1.0)] {
                let once = sorted_unique(&scrambled(64, seed), tolerance);
                let twice = sorted_unique(&once, tolerance);
                assert_eq!(once, twice, "seed {seed}");
            }
        }
    }

    #[test]
    fn result_is_sorted_subset_without_adjacent_duplicates() {
        for seed in 1..20 {
            let input = scrambled(100, seed);
            let out = sorted_unique(&input, Tolerance::exact());
            assert!(out.iter().all(|q| input.contains(q)));
            assert!(out.windows(2).all(|w| precedes(&w[0], &w[1])));
            // Every distinct input point survives.
            assert!(input.iter().all(|q| out.contains(q)));
        }
    }
}
