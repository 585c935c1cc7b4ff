//! # Planning Module
//!
//! Turns a [`crate::map::CoverageMap`] into a drivable [`CoveragePlan`]: the tour planner orders
//! the coverable cells into a visiting sequence, and the path synthesizer converts that sequence
//! into a continuous waypoint path.
//!
//! Planning is a bounded-effort, on-demand operation (not a control-loop one): it runs under a
//! [`PlanCtl`] which carries the planning budget and a cancellation flag, so an in-flight plan can
//! be abandoned when a newer boundary edit arrives.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod path;
mod synth;
mod tour;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use path::{Path, PathSegment};
pub use synth::{CoveragePlan, PathSynthesizer, PathSynthesizerParams};
pub use tour::{TourPath, TourPlanner, TourPlannerParams, TourReport};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Control handle for an in-flight planning operation.
///
/// Carries the planning deadline and a cancellation flag. The handle is cloned into the planning
/// worker while the issuing side keeps its copy, so a newer request can cancel the older one.
#[derive(Debug, Clone)]
pub struct PlanCtl {
    start: Instant,
    budget_s: Option<f64>,
    cancel: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can arise during planning.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Cannot plan a tour over an empty cell graph")]
    EmptyGraph,

    #[error(
        "Planning budget of {budget_s:.1} s exceeded after visiting {visited} of {total} cells"
    )]
    Timeout {
        budget_s: f64,
        visited: usize,
        total: usize,
    },

    #[error("Planning was cancelled by a newer request")]
    Cancelled,

    #[error("Cannot synthesize a plan from an empty tour")]
    EmptyTour,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PlanCtl {
    /// Create a control handle with the given planning budget in seconds.
    pub fn with_budget(budget_s: f64) -> Self {
        Self {
            start: Instant::now(),
            budget_s: Some(budget_s),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a control handle with no budget, which can still be cancelled.
    pub fn unbounded() -> Self {
        Self {
            start: Instant::now(),
            budget_s: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the operation controlled by this handle.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// True if this operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Check the budget and cancellation state, returning the matching error if either has
    /// tripped. `visited` and `total` are only used to make the timeout error actionable.
    pub fn check(&self, visited: usize, total: usize) -> Result<(), PlanError> {
        if self.is_cancelled() {
            return Err(PlanError::Cancelled);
        }

        if let Some(budget_s) = self.budget_s {
            if self.start.elapsed().as_secs_f64() > budget_s {
                return Err(PlanError::Timeout {
                    budget_s,
                    visited,
                    total,
                });
            }
        }

        Ok(())
    }
}
