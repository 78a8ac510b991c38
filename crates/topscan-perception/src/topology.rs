//! Object topology relative to a reference surface.
//!
//! The reference set is a scan of the bare surface (e.g. the table); the
//! object set is a scan of the same surface with the object standing on it.
//! Both are machine-space height points.  For every object point the engine
//! looks for the reference point underneath it and reports the height above
//! that surface point.  When nothing underneath can be found the object
//! point is kept as-is, so a sparse reference never loses output.
//!
//! # Example
//!
//! ```rust
//! use topscan_perception::point_ops::Tolerance;
//! use topscan_perception::topology::{MatchPolicy, TopologyEngine};
//! use topscan_types::Point;
//!
//! let reference = vec![Point::new(0.0, 0.0, 5.0), Point::new(1.0, 0.0, 5.0)];
//! let object = vec![Point::new(1.0, 0.0, 8.0), Point::new(2.0, 0.0, 9.0)];
//!
//! let topo = TopologyEngine::new(Tolerance::exact(), MatchPolicy::Exact)
//!     .build(&reference, &object);
//! assert_eq!(topo.points, vec![Point::new(1.0, 0.0, 3.0), Point::new(2.0, 0.0, 9.0)]);
//! assert_eq!((topo.matched, topo.unmatched), (1, 1));
//! ```

use topscan_types::Point;
use tracing::info;

use crate::point_ops::{Tolerance, sorted_unique};

/// How an object point finds the reference point beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MatchPolicy {
    /// Same (x, y) under the engine's tolerance.
    #[default]
    Exact,
    /// Closest reference point in the x/y plane, no farther than `radius`.
    Nearest { radius: f32 },
}

/// Result of [`TopologyEngine::build`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    /// One point per distinct object point, in sorted order.
    pub points: Vec<Point>,
    /// Object points that found a reference point.
    pub matched: usize,
    /// Object points kept unchanged for lack of a reference point.
    pub unmatched: usize,
}

/// Derives object topology from a reference scan and an object scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyEngine {
    tolerance: Tolerance,
    policy: MatchPolicy,
}

impl TopologyEngine {
    pub fn new(tolerance: Tolerance, policy: MatchPolicy) -> Self {
        Self { tolerance, policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Build the topology of `object` over `reference`.
    ///
    /// Both inputs are sorted and deduplicated first.  Matched points become
    /// `(x, y, object.z − reference.z)`; unmatched points pass through.
    pub fn build(&self, reference: &[Point], object: &[Point]) -> Topology {
        let reference = sorted_unique(reference, self.tolerance);
        let object = sorted_unique(object, self.tolerance);

        let mut topo = Topology {
            points: Vec::with_capacity(object.len()),
            ..Topology::default()
        };
        for p in &object {
            match self.find_surface(&reference, p) {
                Some(surface) => {
                    topo.matched += 1;
                    topo.points.push(Point::new(p.x, p.y, p.z - surface.z));
                }
                None => {
                    topo.unmatched += 1;
                    topo.points.push(*p);
                }
            }
        }
        info!(
            reference = reference.len(),
            object = object.len(),
            matched = topo.matched,
            unmatched = topo.unmatched,
            "topology built"
        );
        topo
    }

    /// Reference point beneath `p`, if any.  `reference` must be sorted.
    fn find_surface<'a>(&self, reference: &'a [Point], p: &Point) -> Option<&'a Point> {
        let reach = match self.policy {
            MatchPolicy::Exact => self.tolerance.epsilon(),
            MatchPolicy::Nearest { radius } => radius.max(self.tolerance.epsilon()),
        };
        let start = reference.partition_point(|r| r.x < p.x - reach);
        let mut window = reference[start..]
            .iter()
            .take_while(|r| r.x <= p.x + reach);

        match self.policy {
            MatchPolicy::Exact => window
                .find(|r| self.tolerance.axis_eq(r.x, p.x) && self.tolerance.axis_eq(r.y, p.y)),
            MatchPolicy::Nearest { .. } => window
                .map(|r| (r, planar_distance_sq(r, p)))
                .filter(|&(_, d2)| d2 <= reach * reach)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(r, _)| r),
        }
    }
}

fn planar_distance_sq(a: &Point, b: &Point) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32, z: f32) -> Point {
        Point::new(x, y, z)
    }

    fn table(z: f32) -> Vec<Point> {
        let mut pts = Vec::new();
        for x in 0..4 {
            for y in 0..4 {
                pts.push(p(x as f32, y as f32, z));
            }
        }
        pts
    }

    #[test]
    fn empty_inputs_give_empty_topology() {
        let topo = TopologyEngine::default().build(&[], &[]);
        assert!(topo.points.is_empty());
        assert_eq!((topo.matched, topo.unmatched), (0, 0));
    }

    #[test]
    fn empty_reference_passes_object_through_sorted() {
        let object = vec![p(2.0, 0.0, 1.0), p(1.0, 0.0, 1.0), p(2.0, 0.0, 1.0)];
        let topo = TopologyEngine::default().build(&[], &object);
        assert_eq!(topo.points, vec![p(1.0, 0.0, 1.0), p(2.0, 0.0, 1.0)]);
        assert_eq!(topo.unmatched, 2);
    }

    #[test]
    fn exact_match_subtracts_surface_height() {
        let mut object = table(5.0);
        // A 3-unit block occupies (1, 1) and (2, 1).
        for q in object.iter_mut() {
            if q.y == 1.0 && (q.x == 1.0 || q.x == 2.0) {
                q.z = 8.0;
            }
        }
        let topo = TopologyEngine::default().build(&table(5.0), &object);
        assert_eq!(topo.matched, 16);
        assert_eq!(topo.unmatched, 0);
        let raised: Vec<_> = topo.points.iter().filter(|q| q.z > 0.0).collect();
        assert_eq!(raised, vec![&p(1.0, 1.0, 3.0), &p(2.0, 1.0, 3.0)]);
    }

    #[test]
    fn unmatched_points_fall_back_unchanged() {
        let object = vec![p(0.5, 0.5, 7.0), p(1.0, 1.0, 6.0)];
        let topo = TopologyEngine::default().build(&table(5.0), &object);
        assert_eq!(topo.points, vec![p(0.5, 0.5, 7.0), p(1.0, 1.0, 1.0)]);
        assert_eq!((topo.matched, topo.unmatched), (1, 1));
    }

    #[test]
    fn tolerance_widens_exact_match() {
        let object = vec![p(1.004, 0.998, 6.0)];
        let strict = TopologyEngine::default().build(&table(5.0), &object);
        assert_eq!(strict.unmatched, 1);

        let loose = TopologyEngine::new(Tolerance::new(0.01), MatchPolicy::Exact)
            .build(&table(5.0), &object);
        assert_eq!(loose.matched, 1);
        assert!((loose.points[0].z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn nearest_picks_closest_within_radius() {
        let engine = TopologyEngine::new(Tolerance::exact(), MatchPolicy::Nearest { radius: 0.5 });
        let reference = vec![p(0.0, 0.0, 1.0), p(1.0, 0.0, 2.0)];
        let object = vec![p(0.8, 0.1, 10.0), p(5.0, 5.0, 4.0)];
        let topo = engine.build(&reference, &object);
        assert_eq!(topo.points, vec![p(0.8, 0.1, 8.0), p(5.0, 5.0, 4.0)]);
        assert_eq!((topo.matched, topo.unmatched), (1, 1));
    }

    #[test]
    fn nearest_ignores_points_outside_radius_in_x_window() {
        let engine = TopologyEngine::new(Tolerance::exact(), MatchPolicy::Nearest { radius: 0.5 });
        // Same x column but far away in y.
        let reference = vec![p(1.0, 3.0, 1.0)];
        let topo = engine.build(&reference, &[p(1.0, 0.0, 2.0)]);
        assert_eq!(topo.unmatched, 1);
    }
}
