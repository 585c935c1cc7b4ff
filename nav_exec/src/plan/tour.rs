//! # Tour Planner
//!
//! Orders the coverable cells of a [`CoverageMap`] into a visiting sequence. The construction is
//! greedy nearest-unvisited-neighbour over the cell graph with backtracking: when the frontier
//! around the current cell is exhausted the planner walks its history stack backwards to the most
//! recent cell which still has unvisited neighbours and resumes from there. If the whole history
//! is exhausted (the remaining cells form a disconnected pocket) the planner jumps to the globally
//! nearest unvisited cell.
//!
//! A worst-case iteration cap guarantees termination: once exceeded, the planner completes the
//! remaining cells with the jump policy alone. The result is always a permutation of all coverable
//! cells, never a partial tour.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashSet;
use std::time::Instant;

// External
use log::{debug, info, warn};
use nalgebra::Vector2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// Internal
use crate::map::{CellIndex, CoverageMap};

use super::{PlanCtl, PlanError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the tour planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourPlannerParams {
    /// Iteration cap as a multiple of the cell count. Once `max_iterations_per_cell * num_cells`
    /// iterations have run, the planner falls back to jump-only completion so that it always
    /// terminates.
    pub max_iterations_per_cell: usize,
}

/// The tour planner.
#[derive(Debug, Clone)]
pub struct TourPlanner {
    params: TourPlannerParams,
}

/// An ordered visiting sequence over all coverable cells.
///
/// Consecutive cells are graph-adjacent except at the indices listed in `jumps`: a jump marks a
/// traversal discontinuity (a backtrack resumption or a disconnected pocket) for which the path
/// synthesizer inserts a direct connecting segment.
#[derive(Debug, Clone, Serialize)]
pub struct TourPath {
    /// The visiting sequence, each coverable cell appearing exactly once.
    pub cells: Vec<CellIndex>,

    /// Indices into `cells` whose edge from the preceding cell is not a graph edge.
    pub jumps: Vec<usize>,
}

/// Diagnostic report on a tour construction, saved to the session for analysis.
#[derive(Debug, Clone, Serialize)]
pub struct TourReport {
    pub num_cells: usize,
    pub num_backtracks: usize,
    pub num_jumps: usize,
    pub num_iterations: usize,
    pub iteration_cap_hit: bool,
    pub duration_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TourPlannerParams {
    fn default() -> Self {
        Self {
            max_iterations_per_cell: 50,
        }
    }
}

impl TourPlanner {
    pub fn new(params: TourPlannerParams) -> Self {
        Self { params }
    }

    /// Plan a tour over all coverable cells of the map, starting from the cell nearest the
    /// charging station.
    ///
    /// Fails with [`PlanError::EmptyGraph`] if the map has no cells, and with
    /// [`PlanError::Timeout`]/[`PlanError::Cancelled`] if the control handle trips before the
    /// tour completes.
    pub fn plan_tour(
        &self,
        map: &CoverageMap,
        charging_station_m: &Vector2<f64>,
        ctl: &PlanCtl,
    ) -> Result<(TourPath, TourReport), PlanError> {
        let plan_start = Instant::now();
        let total = map.num_cells();

        if total == 0 {
            return Err(PlanError::EmptyGraph);
        }

        // Start at the coverable cell nearest the charging station
        let start = map
            .nearest_cell(charging_station_m)
            .map(|c| c.index)
            .ok_or(PlanError::EmptyGraph)?;

        debug!(
            "Tour start cell {:?}, nearest to charging station at ({:.2}, {:.2})",
            start, charging_station_m.x, charging_station_m.y
        );

        // The frontier of cells still to be visited
        let mut unvisited: HashSet<CellIndex> =
            map.cells().iter().map(|c| c.index).collect();
        unvisited.remove(&start);

        // The visiting sequence and the backtrack history stack
        let mut tour = vec![start];
        let mut jumps = Vec::new();
        let mut history = vec![start];
        let mut current = start;

        let max_iterations = self.params.max_iterations_per_cell.saturating_mul(total);
        let mut num_iterations = 0;
        let mut num_backtracks = 0;
        let mut jump_only = false;

        while !unvisited.is_empty() {
            ctl.check(tour.len(), total)?;

            num_iterations += 1;
            if !jump_only && num_iterations > max_iterations {
                warn!(
                    "Tour iteration cap hit after {} iterations ({} of {} cells visited), \
                    completing with jump policy",
                    num_iterations,
                    tour.len(),
                    total
                );
                jump_only = true;
            }

            // Greedy selection: the nearest unvisited graph neighbour of the current cell, with
            // exact ties broken by lowest row then lowest column
            let next = if jump_only {
                None
            } else {
                let current_centre = map.cell_centre(current);
                map.neighbours(current)
                    .iter()
                    .filter(|n| unvisited.contains(*n))
                    .min_by_key(|n| {
                        (
                            OrderedFloat((map.cell_centre(**n) - current_centre).norm()),
                            n.1,
                            n.0,
                        )
                    })
                    .copied()
            };

            if let Some(next) = next {
                self.visit(map, next, &mut tour, &mut jumps, &mut unvisited);
                history.push(next);
                current = next;
                continue;
            }

            // No adjacent unvisited neighbour: backtrack through the history stack to the most
            // recent cell which still has one
            let resume_pos = history.iter().rposition(|c| {
                map.neighbours(*c).iter().any(|n| unvisited.contains(n))
            });

            match resume_pos {
                Some(pos) if !jump_only => {
                    history.truncate(pos + 1);
                    current = history[pos];
                    num_backtracks += 1;
                }
                _ => {
                    // History exhausted (or jump-only mode): jump to the globally nearest
                    // unvisited cell
                    let current_centre = map.cell_centre(current);
                    let next = unvisited
                        .iter()
                        .min_by_key(|n| {
                            (
                                OrderedFloat(
                                    (map.cell_centre(**n) - current_centre).norm(),
                                ),
                                n.1,
                                n.0,
                            )
                        })
                        .copied()
                        .ok_or(PlanError::EmptyGraph)?;

                    self.visit(map, next, &mut tour, &mut jumps, &mut unvisited);
                    history.clear();
                    history.push(next);
                    current = next;
                }
            }
        }

        let report = TourReport {
            num_cells: tour.len(),
            num_backtracks,
            num_jumps: jumps.len(),
            num_iterations,
            iteration_cap_hit: jump_only,
            duration_s: plan_start.elapsed().as_secs_f64(),
        };

        info!(
            "Tour planned over {} cells with {} backtracks and {} jumps in {:.3} s",
            report.num_cells, report.num_backtracks, report.num_jumps, report.duration_s
        );

        Ok((TourPath { cells: tour, jumps }, report))
    }

    /// Append `next` to the tour, recording a jump if it isn't graph-adjacent to the tour's
    /// current tip.
    fn visit(
        &self,
        map: &CoverageMap,
        next: CellIndex,
        tour: &mut Vec<CellIndex>,
        jumps: &mut Vec<usize>,
        unvisited: &mut HashSet<CellIndex>,
    ) {
        // The unwrap is safe since the tour always contains at least the start cell
        let tip = *tour.last().unwrap();
        if !map.neighbours(tip).contains(&next) {
            jumps.push(tour.len());
        }

        tour.push(next);
        unvisited.remove(&next);
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
