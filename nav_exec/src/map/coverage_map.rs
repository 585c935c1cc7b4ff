//! # Coverage Map
//!
//! The coverage map is the product of area decomposition. The boundary's bounding box is covered
//! by a regular grid of candidate cells of side `cell_size_m`, and a cell is kept (coverable) only
//! if it is fully enclosed by the boundary and does not touch any no-go zone. Partially enclosed
//! cells at the edge are excluded: the mower must never cut outside the fence, so safety wins over
//! maximal coverage.
//!
//! Coverable cells in maximal row-aligned runs share a merge group id, marking the straight sweeps
//! the synthesized path collapses into single segments, but each cell remains individually
//! addressable in the graph.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

// External
use log::{debug, info};
use nalgebra::Vector2;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// Internal
use crate::geom::{Aabb, GeomError, Polygon};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Integer grid coordinates of a cell, `(column, row)` from the bounding box minimum.
pub type CellIndex = (usize, usize);

/// Adjacency between coverable cells. Each coverable cell maps to its 4-connected coverable
/// neighbours, in deterministic (left, right, below, above) order.
pub type CellGraph = HashMap<CellIndex, Vec<CellIndex>>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters controlling the area decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageMapParams {
    /// Side length of a coverage cell.
    pub cell_size_m: f64,

    /// Tolerance applied when testing cell corners against the boundary, so that cells abutting
    /// the fence from the inside still count as fully enclosed.
    pub enclosure_tolerance_m: f64,
}

/// A single coverable cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Grid coordinates of this cell.
    pub index: CellIndex,

    /// Position of the cell centre.
    pub centre_m: Vector2<f64>,

    /// Id shared by all cells in the same maximal row-aligned run.
    pub merge_group: usize,
}

/// The decomposed coverage area: all coverable cells and their adjacency graph.
///
/// A coverage map is immutable once built, and is recomputed from scratch whenever the boundary
/// or no-go zones change.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageMap {
    /// Side length of each cell.
    pub cell_size_m: f64,

    /// Position of the lower-left corner of cell (0, 0).
    origin_m: Vector2<f64>,

    /// All coverable cells, in row-major order.
    cells: Vec<Cell>,

    /// Lookup from grid coordinates into `cells`.
    #[serde(skip)]
    lookup: HashMap<CellIndex, usize>,

    /// 4-connected adjacency between coverable cells.
    #[serde(skip)]
    graph: CellGraph,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can arise while decomposing the coverage area.
#[derive(Debug, thiserror::Error)]
pub enum CoverageMapError {
    #[error("The boundary polygon is invalid: {0}")]
    InvalidBoundary(#[from] GeomError),

    #[error(
        "No coverable area remains after no-go exclusion: of {num_candidates} candidate cells \
        {num_outside_boundary} are not enclosed by the boundary and {num_in_no_go} intersect one \
        of the {num_no_go_zones} no-go zones"
    )]
    NoCoverableCells {
        num_candidates: usize,
        num_outside_boundary: usize,
        num_in_no_go: usize,
        num_no_go_zones: usize,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CoverageMapParams {
    fn default() -> Self {
        Self {
            cell_size_m: 1.0,
            enclosure_tolerance_m: 0.01,
        }
    }
}

impl CoverageMap {
    /// Decompose the area inside `boundary`, minus the `no_go_zones`, into coverable cells.
    ///
    /// Fails if the boundary is not a simple polygon of non-zero area, or if no coverable cell
    /// remains after exclusion.
    pub fn decompose(
        boundary: &Polygon,
        no_go_zones: &[Polygon],
        params: &CoverageMapParams,
    ) -> Result<Self, CoverageMapError> {
        boundary.validate()?;

        let cell_size_m = params.cell_size_m;
        let bbox = boundary.bounding_box();
        let extent_m = bbox.max_m - bbox.min_m;

        // Number of candidate cells along each axis. The epsilon stops boxes which are an exact
        // multiple of the cell size from gaining a spurious extra row of cells.
        let num_x = ((extent_m.x / cell_size_m) - 1e-9).ceil().max(1.0) as usize;
        let num_y = ((extent_m.y / cell_size_m) - 1e-9).ceil().max(1.0) as usize;

        debug!(
            "Decomposing {:.1}x{:.1} m bounding box into {}x{} candidate cells",
            extent_m.x, extent_m.y, num_x, num_y
        );

        // First pass: mark candidate occupancy
        let mut coverable = Array2::from_elem((num_x, num_y), false);
        let mut num_outside_boundary = 0;
        let mut num_in_no_go = 0;

        for iy in 0..num_y {
            for ix in 0..num_x {
                let cell_min = bbox.min_m
                    + Vector2::new(ix as f64 * cell_size_m, iy as f64 * cell_size_m);
                let cell_aabb = Aabb {
                    min_m: cell_min,
                    max_m: cell_min + Vector2::new(cell_size_m, cell_size_m),
                };
                let centre_m = cell_min + Vector2::new(0.5 * cell_size_m, 0.5 * cell_size_m);

                // The cell must be fully enclosed: centre strictly inside, all four corners
                // inside within tolerance
                let enclosed = boundary.contains(&centre_m)
                    && cell_aabb
                        .corners()
                        .iter()
                        .all(|c| boundary.contains_with_margin(c, params.enclosure_tolerance_m));

                if !enclosed {
                    num_outside_boundary += 1;
                    continue;
                }

                // The cell must not touch any no-go zone
                if no_go_zones.iter().any(|z| z.intersects_aabb(&cell_aabb)) {
                    num_in_no_go += 1;
                    continue;
                }

                coverable[(ix, iy)] = true;
            }
        }

        // Second pass: build cells row-major, assigning one merge group per maximal run of
        // coverable cells in a row
        let mut cells = Vec::new();
        let mut lookup = HashMap::new();
        let mut merge_group = 0;

        for iy in 0..num_y {
            let mut in_run = false;

            for ix in 0..num_x {
                if !coverable[(ix, iy)] {
                    if in_run {
                        merge_group += 1;
                        in_run = false;
                    }
                    continue;
                }

                in_run = true;

                let centre_m = bbox.min_m
                    + Vector2::new(
                        (ix as f64 + 0.5) * cell_size_m,
                        (iy as f64 + 0.5) * cell_size_m,
                    );

                lookup.insert((ix, iy), cells.len());
                cells.push(Cell {
                    index: (ix, iy),
                    centre_m,
                    merge_group,
                });
            }

            if in_run {
                merge_group += 1;
            }
        }

        if cells.is_empty() {
            return Err(CoverageMapError::NoCoverableCells {
                num_candidates: num_x * num_y,
                num_outside_boundary,
                num_in_no_go,
                num_no_go_zones: no_go_zones.len(),
            });
        }

        // Third pass: 4-connected adjacency between coverable cells
        let mut graph = CellGraph::new();
        for cell in cells.iter() {
            let (ix, iy) = cell.index;
            let mut neighbours = Vec::with_capacity(4);

            if ix > 0 && coverable[(ix - 1, iy)] {
                neighbours.push((ix - 1, iy));
            }
            if ix + 1 < num_x && coverable[(ix + 1, iy)] {
                neighbours.push((ix + 1, iy));
            }
            if iy > 0 && coverable[(ix, iy - 1)] {
                neighbours.push((ix, iy - 1));
            }
            if iy + 1 < num_y && coverable[(ix, iy + 1)] {
                neighbours.push((ix, iy + 1));
            }

            graph.insert(cell.index, neighbours);
        }

        info!(
            "Decomposition complete: {} coverable cells in {} merge groups ({} excluded by \
            boundary, {} by no-go zones)",
            cells.len(),
            merge_group,
            num_outside_boundary,
            num_in_no_go
        );

        Ok(Self {
            cell_size_m,
            origin_m: bbox.min_m,
            cells,
            lookup,
            graph,
        })
    }

    /// Get the number of coverable cells.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Get all coverable cells in row-major order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Get the cell at the given grid coordinates, or `None` if it isn't coverable.
    pub fn get(&self, index: CellIndex) -> Option<&Cell> {
        self.lookup.get(&index).map(|i| &self.cells[*i])
    }

    /// Get the coverable neighbours of the given cell.
    pub fn neighbours(&self, index: CellIndex) -> &[CellIndex] {
        match self.graph.get(&index) {
            Some(n) => n.as_slice(),
            None => &[],
        }
    }

    /// Get the full adjacency graph.
    pub fn graph(&self) -> &CellGraph {
        &self.graph
    }

    /// Get the centre position of the cell at the given grid coordinates.
    ///
    /// This works for any grid coordinates, not just coverable cells.
    pub fn cell_centre(&self, index: CellIndex) -> Vector2<f64> {
        self.origin_m
            + Vector2::new(
                (index.0 as f64 + 0.5) * self.cell_size_m,
                (index.1 as f64 + 0.5) * self.cell_size_m,
            )
    }

    /// Get the coverable cell whose centre is nearest the given position.
    ///
    /// Exact distance ties are broken by lowest row then lowest column, for determinism.
    pub fn nearest_cell(&self, position_m: &Vector2<f64>) -> Option<&Cell> {
        self.cells
            .iter()
            .min_by_key(|c| {
                (
                    OrderedFloat((c.centre_m - position_m).norm()),
                    c.index.1,
                    c.index.0,
                )
            })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    fn square_boundary(side_m: f64) -> Polygon {
        Polygon::new(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(side_m, 0.0),
            Vector2::new(side_m, side_m),
            Vector2::new(0.0, side_m),
        ])
        .unwrap()
    }

    /// A regular polygon approximating a circle, used as a no-go zone.
    fn circle_no_go(centre: Vector2<f64>, radius_m: f64, num_verts: usize) -> Polygon {
        let verts = (0..num_verts)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / num_verts as f64;
                centre + Vector2::new(radius_m * angle.cos(), radius_m * angle.sin())
            })
            .collect();
        Polygon::new(verts).unwrap()
    }

    #[test]
    fn test_square_yard_full_decomposition() {
        let boundary = square_boundary(10.0);
        let map =
            CoverageMap::decompose(&boundary, &[], &CoverageMapParams::default()).unwrap();

        // A 10x10 m yard at 1 m cells gives exactly 100 coverable cells
        assert_eq!(map.num_cells(), 100);

        // The graph is fully connected: a flood fill from any cell reaches all of them
        let mut seen = HashSet::new();
        let mut stack = vec![map.cells()[0].index];
        while let Some(index) = stack.pop() {
            if !seen.insert(index) {
                continue;
            }
            for n in map.neighbours(index) {
                stack.push(*n);
            }
        }
        assert_eq!(seen.len(), 100);

        // Corner cells have exactly two neighbours, interior cells four
        assert_eq!(map.neighbours((0, 0)).len(), 2);
        assert_eq!(map.neighbours((5, 5)).len(), 4);
    }

    #[test]
    fn test_no_go_zone_exclusion() {
        let boundary = square_boundary(10.0);
        let no_go = circle_no_go(Vector2::new(5.0, 5.0), 2.0, 16);

        let map = CoverageMap::decompose(
            &boundary,
            &[no_go],
            &CoverageMapParams::default(),
        )
        .unwrap();

        // Strictly fewer cells than the open yard
        assert!(map.num_cells() < 100);
        assert!(map.num_cells() > 0);

        // No coverable cell centre lies within the no-go radius
        for cell in map.cells() {
            let dist = (cell.centre_m - Vector2::new(5.0, 5.0)).norm();
            assert!(
                dist >= 2.0,
                "cell {:?} centre is {} m from the no-go centre",
                cell.index,
                dist
            );
        }
    }

    #[test]
    fn test_merge_groups_are_row_runs() {
        let boundary = square_boundary(4.0);
        let map =
            CoverageMap::decompose(&boundary, &[], &CoverageMapParams::default()).unwrap();

        // With no exclusions each row is a single run
        for cell in map.cells() {
            let row_mate = map.get((0, cell.index.1)).unwrap();
            assert_eq!(cell.merge_group, row_mate.merge_group);
        }

        // But different rows get different groups
        assert_ne!(
            map.get((0, 0)).unwrap().merge_group,
            map.get((0, 1)).unwrap().merge_group
        );
    }

    #[test]
    fn test_invalid_boundary_rejected() {
        let degenerate = Polygon {
            verts_m: vec![Vector2::new(0.0, 0.0), Vector2::new(5.0, 0.0)],
        };

        assert!(matches!(
            CoverageMap::decompose(&degenerate, &[], &CoverageMapParams::default()),
            Err(CoverageMapError::InvalidBoundary(_))
        ));
    }

    #[test]
    fn test_fully_consumed_yard() {
        let boundary = square_boundary(4.0);
        // No-go zone swallowing the whole yard
        let no_go = square_boundary(4.0);

        assert!(matches!(
            CoverageMap::decompose(&boundary, &[no_go], &CoverageMapParams::default()),
            Err(CoverageMapError::NoCoverableCells { .. })
        ));
    }

    #[test]
    fn test_nearest_cell_tie_break() {
        let boundary = square_boundary(4.0);
        let map =
            CoverageMap::decompose(&boundary, &[], &CoverageMapParams::default()).unwrap();

        // The yard centre (2, 2) is equidistant from four cell centres, the tie must resolve to
        // the lowest row then lowest column
        let nearest = map.nearest_cell(&Vector2::new(2.0, 2.0)).unwrap();
        assert_eq!(nearest.index, (1, 1));
    }

    /// The map is dumped to the session as JSON, so it must serialize despite the derived
    /// lookup structures being skipped.
    #[test]
    fn test_map_serializes_to_json() {
        let boundary = square_boundary(4.0);
        let map =
            CoverageMap::decompose(&boundary, &[], &CoverageMapParams::default()).unwrap();

        let json = serde_json::to_string(&map).unwrap();
        assert!(json.contains("cells"));
        assert!(!json.contains("graph"));
    }
}
