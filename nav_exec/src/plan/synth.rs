//! # Path Synthesizer
//!
//! Converts a [`TourPath`] into the continuous waypoint path that the executive drives. The
//! synthesis runs in four ordered steps, each operating only within independent sub-tours (the
//! stretches between jump discontinuities) so that full coverage is never broken:
//!
//! 1. Raw polyline through the cell centres.
//! 2. Smoothing: collapse colinear-within-tolerance waypoint triples.
//! 3. Shortcutting: replace zig-zag stretches inside a bounded window with a direct segment, if
//!    that segment stays inside the boundary and clear of every no-go zone.
//! 4. Direction optimization: reverse interior sub-tours where that reduces the total
//!    heading-change magnitude at the junctions.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use crate::geom::Polygon;
use crate::map::CoverageMap;

use super::{Path, PlanError, TourPath};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the path synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSynthesizerParams {
    /// Heading deviation below which three consecutive waypoints count as colinear.
    pub colinear_tolerance_rad: f64,

    /// Maximum number of waypoints a shortcut may bridge. Bounds the shortcut search to
    /// O(n * window) rather than O(n^2).
    pub shortcut_window: usize,
}

/// The path synthesizer, a pure transform from tour to plan.
#[derive(Debug, Clone)]
pub struct PathSynthesizer {
    params: PathSynthesizerParams,
}

/// The externally consumed coverage artefact: the full waypoint path plus provenance counts.
///
/// A plan is immutable once produced and is replaced wholesale on replanning.
#[derive(Debug, Clone, Serialize)]
pub struct CoveragePlan {
    /// The waypoint path through the yard.
    pub path: Path,

    /// Number of coverable cells the plan covers.
    pub num_cells: usize,

    /// Number of non-adjacent jumps in the underlying tour.
    pub num_jumps: usize,

    /// Total length of the path.
    pub length_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PathSynthesizerParams {
    fn default() -> Self {
        Self {
            colinear_tolerance_rad: 1e-3,
            shortcut_window: 6,
        }
    }
}

impl PathSynthesizer {
    pub fn new(params: PathSynthesizerParams) -> Self {
        Self { params }
    }

    /// Synthesize a coverage plan from the given tour.
    ///
    /// Fails only if the tour is empty; a non-empty tour always produces a non-empty plan.
    pub fn synthesize(
        &self,
        tour: &TourPath,
        map: &CoverageMap,
        boundary: &Polygon,
        no_go_zones: &[Polygon],
    ) -> Result<CoveragePlan, PlanError> {
        if tour.cells.is_empty() {
            return Err(PlanError::EmptyTour);
        }

        // Step 1: raw polyline through the cell centres, split into sub-tours at the jumps
        let mut sub_tours: Vec<Vec<Vector2<f64>>> = Vec::new();
        let mut current = Vec::new();

        for (i, cell) in tour.cells.iter().enumerate() {
            if tour.jumps.contains(&i) && !current.is_empty() {
                sub_tours.push(current);
                current = Vec::new();
            }
            current.push(map.cell_centre(*cell));
        }
        sub_tours.push(current);

        let raw_len: usize = sub_tours.iter().map(|s| s.len()).sum();

        // Steps 2 and 3 within each sub-tour
        for sub in sub_tours.iter_mut() {
            *sub = self.smooth(sub);
            *sub = self.shortcut(sub, boundary, no_go_zones);
        }

        // Step 4: reverse interior sub-tours where that reduces junction heading change. The
        // first and last sub-tours are pinned so the plan's endpoints stay at the tour's start
        // and end cells.
        self.optimize_directions(&mut sub_tours);

        let points_m: Vec<Vector2<f64>> = sub_tours.into_iter().flatten().collect();

        debug!(
            "Synthesized plan with {} waypoints from {} raw cell centres",
            points_m.len(),
            raw_len
        );

        let path = Path::from_points(points_m);
        let length_m = path.get_length().unwrap_or(0.0);

        Ok(CoveragePlan {
            path,
            num_cells: tour.cells.len(),
            num_jumps: tour.jumps.len(),
            length_m,
        })
    }

    /// Collapse any waypoint whose incoming and outgoing headings agree within tolerance.
    fn smooth(&self, points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
        if points.len() < 3 {
            return points.to_vec();
        }

        let mut out = vec![points[0]];

        for i in 1..points.len() - 1 {
            // The unwrap here is safe as out is never empty
            let prev = *out.last().unwrap();
            let incoming = (points[i] - prev).y.atan2((points[i] - prev).x);
            let outgoing =
                (points[i + 1] - points[i]).y.atan2((points[i + 1] - points[i]).x);

            let deviation = util::maths::get_ang_dist_2pi(
                util::maths::map_pi_to_2pi(incoming),
                util::maths::map_pi_to_2pi(outgoing),
            )
            .abs();

            if deviation > self.params.colinear_tolerance_rad {
                out.push(points[i]);
            }
        }

        out.push(points[points.len() - 1]);
        out
    }

    /// Replace stretches of up to `shortcut_window` waypoints with a direct segment where the
    /// segment stays inside the boundary and clear of every no-go zone.
    fn shortcut(
        &self,
        points: &[Vector2<f64>],
        boundary: &Polygon,
        no_go_zones: &[Polygon],
    ) -> Vec<Vector2<f64>> {
        if points.len() < 3 || self.params.shortcut_window < 2 {
            return points.to_vec();
        }

        let mut out = vec![points[0]];
        let mut i = 0;

        while i < points.len() - 1 {
            // Search from the farthest candidate inwards for a valid direct segment
            let max_j = (i + self.params.shortcut_window).min(points.len() - 1);
            let mut taken = i + 1;

            for j in ((i + 2)..=max_j).rev() {
                if self.segment_is_clear(&points[i], &points[j], boundary, no_go_zones) {
                    taken = j;
                    break;
                }
            }

            out.push(points[taken]);
            i = taken;
        }

        out
    }

    /// A direct segment is clear if it crosses neither the boundary nor any no-go zone edge.
    ///
    /// Both endpoints are known to lie inside the boundary and outside every no-go zone, so for
    /// simple polygons the edge-crossing test alone is sufficient.
    fn segment_is_clear(
        &self,
        a: &Vector2<f64>,
        b: &Vector2<f64>,
        boundary: &Polygon,
        no_go_zones: &[Polygon],
    ) -> bool {
        !boundary.intersects_segment(a, b)
            && !no_go_zones.iter().any(|z| z.intersects_segment(a, b))
    }

    /// Reverse interior sub-tours where the reversal reduces the heading change across the
    /// junctions with the neighbouring sub-tours.
    fn optimize_directions(&self, sub_tours: &mut Vec<Vec<Vector2<f64>>>) {
        if sub_tours.len() < 3 {
            return;
        }

        for i in 1..sub_tours.len() - 1 {
            let entry = *sub_tours[i - 1].last().unwrap();
            let exit = sub_tours[i + 1][0];

            let forward = junction_heading_change(&entry, &sub_tours[i], &exit);

            let reversed: Vec<Vector2<f64>> =
                sub_tours[i].iter().rev().copied().collect();
            let backward = junction_heading_change(&entry, &reversed, &exit);

            if backward < forward {
                sub_tours[i] = reversed;
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Total heading-change magnitude over the sequence `entry -> sub -> exit`.
fn junction_heading_change(
    entry: &Vector2<f64>,
    sub: &[Vector2<f64>],
    exit: &Vector2<f64>,
) -> f64 {
    let mut points = Vec::with_capacity(sub.len() + 2);
    points.push(*entry);
    points.extend_from_slice(sub);
    points.push(*exit);

    let mut total = 0.0;

    for i in 1..points.len() - 1 {
        let a = points[i] - points[i - 1];
        let b = points[i + 1] - points[i];

        if a.norm() <= f64::EPSILON || b.norm() <= f64::EPSILON {
            continue;
        }

        total += util::maths::get_ang_dist_2pi(
            util::maths::map_pi_to_2pi(a.y.atan2(a.x)),
            util::maths::map_pi_to_2pi(b.y.atan2(b.x)),
        )
        .abs();
    }

    total
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::CoverageMapParams;
    use crate::plan::{PlanCtl, TourPlanner, TourPlannerParams};

    fn square_world(side_m: f64) -> (Polygon, CoverageMap) {
        let boundary = Polygon::new(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(side_m, 0.0),
            Vector2::new(side_m, side_m),
            Vector2::new(0.0, side_m),
        ])
        .unwrap();
        let map =
            CoverageMap::decompose(&boundary, &[], &CoverageMapParams::default()).unwrap();

        (boundary, map)
    }

    #[test]
    fn test_synthesis_endpoints_and_smoothing() {
        let (boundary, map) = square_world(10.0);
        let planner = TourPlanner::new(TourPlannerParams::default());
        let synth = PathSynthesizer::new(PathSynthesizerParams::default());

        let (tour, _) = planner
            .plan_tour(&map, &Vector2::new(0.0, 0.0), &PlanCtl::unbounded())
            .unwrap();
        let plan = synth.synthesize(&tour, &map, &boundary, &[]).unwrap();

        assert!(!plan.path.is_empty());
        assert_eq!(plan.num_cells, 100);

        // Endpoints stay within one cell size of the first/last tour cell centres
        let first_centre = map.cell_centre(tour.cells[0]);
        let last_centre = map.cell_centre(*tour.cells.last().unwrap());
        assert!((plan.path.points_m[0] - first_centre).norm() <= map.cell_size_m);
        assert!(
            (plan.path.points_m.last().unwrap() - last_centre).norm() <= map.cell_size_m
        );

        // Smoothing must have collapsed the long straight sweeps well below one waypoint per
        // cell
        assert!(plan.path.get_num_points() < 100);

        // Every waypoint stays inside the boundary
        for p in plan.path.points_m.iter() {
            assert!(boundary.contains_with_margin(p, 1e-9));
        }
    }

    #[test]
    fn test_single_cell_tour() {
        let (boundary, map) = square_world(1.0);
        let synth = PathSynthesizer::new(PathSynthesizerParams::default());

        let tour = TourPath {
            cells: vec![map.cells()[0].index],
            jumps: vec![],
        };
        let plan = synth.synthesize(&tour, &map, &boundary, &[]).unwrap();

        assert_eq!(plan.path.get_num_points(), 1);
        assert_eq!(plan.length_m, 0.0);
    }

    #[test]
    fn test_empty_tour_rejected() {
        let (boundary, map) = square_world(4.0);
        let synth = PathSynthesizer::new(PathSynthesizerParams::default());

        let tour = TourPath {
            cells: vec![],
            jumps: vec![],
        };

        assert!(matches!(
            synth.synthesize(&tour, &map, &boundary, &[]),
            Err(PlanError::EmptyTour)
        ));
    }

    #[test]
    fn test_shortcut_respects_no_go_zones() {
        let boundary = Polygon::new(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(0.0, 10.0),
        ])
        .unwrap();
        let no_go = Polygon::new(vec![
            Vector2::new(4.0, 0.5),
            Vector2::new(6.0, 0.5),
            Vector2::new(6.0, 9.5),
            Vector2::new(4.0, 9.5),
        ])
        .unwrap();

        let synth = PathSynthesizer::new(PathSynthesizerParams {
            colinear_tolerance_rad: 1e-3,
            shortcut_window: 2,
        });

        // A dog-leg around the no-go wall: the shortcut from the first to the last waypoint
        // would cross it and must be rejected
        let a = Vector2::new(2.0, 5.0);
        let b = Vector2::new(5.0, 9.8);
        let c = Vector2::new(8.0, 5.0);

        let out = synth.shortcut(&[a, b, c], &boundary, &[no_go.clone()]);
        assert_eq!(out, vec![a, b, c]);

        // Without the wall the same window takes the direct line
        let out = synth.shortcut(&[a, b, c], &boundary, &[]);
        assert_eq!(out, vec![a, c]);
    }
}
