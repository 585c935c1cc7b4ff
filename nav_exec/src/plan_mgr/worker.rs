//! Worker thread running the planning pipeline so replans never block the control loop.

// ------------------------------------------------------------------------------------------------
// INCLUDES
// ------------------------------------------------------------------------------------------------

use std::sync::{
    mpsc::{Receiver, Sender},
    Arc,
};

use log::{debug, info, warn};
use nalgebra::Vector2;
use util::session;

use crate::events::NavEvent;
use crate::geom::Polygon;
use crate::map::CoverageMap;
use crate::plan::{PathSynthesizer, PlanCtl, PlanError, TourPlanner, TourReport};

use super::{PlanMgrError, Shared};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub enum WorkerSignal {
    /// The worker should stop its operations
    Stop,

    /// Run the planning pipeline over the given working area and publish the result
    Replan {
        ctl: PlanCtl,
        boundary: Polygon,
        no_go_zones: Vec<Polygon>,
        charging_station_m: Vector2<f64>,
    },

    /// The requested replan completed and the new plan has been published
    Complete(TourReport),

    /// The requested replan failed, any previous plan remains in effect
    Failed(String),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn worker_thread(
    shared: Arc<Shared>,
    main_sender: Sender<WorkerSignal>,
    main_receiver: Receiver<WorkerSignal>,
) -> Result<(), PlanMgrError> {
    // Wait for commands from main
    while let Ok(signal) = main_receiver.recv() {
        match signal {
            WorkerSignal::Stop => break,
            WorkerSignal::Replan {
                ctl,
                boundary,
                no_go_zones,
                charging_station_m,
            } => {
                match replan(&shared, &ctl, &boundary, &no_go_zones, &charging_station_m) {
                    Ok(report) => {
                        shared.events.publish(NavEvent::PlanComputed {
                            num_cells: report.num_cells,
                            num_jumps: report.num_jumps,
                            length_m: plan_length(&shared)?,
                        });
                        main_sender.send(WorkerSignal::Complete(report))?;
                    }
                    // A cancelled replan was superseded, discard it without reporting failure
                    Err(ReplanError::Plan(PlanError::Cancelled)) => {
                        debug!("Replan cancelled, discarding result");
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        warn!("Replan failed: {}", reason);
                        shared.events.publish(NavEvent::PlanningFailed {
                            reason: reason.clone(),
                        });
                        main_sender.send(WorkerSignal::Failed(reason))?;
                    }
                }
            }
            s => warn!("Unexpected signal received by worker: {:?}", s),
        }
    }

    Ok(())
}

/// Run the full pipeline for one replan request. On success the new plan has been published.
fn replan(
    shared: &Arc<Shared>,
    ctl: &PlanCtl,
    boundary: &Polygon,
    no_go_zones: &[Polygon],
    charging_station_m: &Vector2<f64>,
) -> Result<TourReport, ReplanError> {
    let map = CoverageMap::decompose(boundary, no_go_zones, &shared.params.map)?;
    info!("Decomposed working area into {} cells", map.num_cells());

    let planner = TourPlanner::new(shared.params.tour.clone());
    let (tour, report) = planner.plan_tour(&map, charging_station_m, ctl)?;

    let synth = PathSynthesizer::new(shared.params.synth.clone());
    let plan = synth.synthesize(&tour, &map, boundary, no_go_zones)?;

    // A cancellation which landed during synthesis must not publish a stale plan
    if ctl.is_cancelled() {
        return Err(ReplanError::Plan(PlanError::Cancelled));
    }

    info!(
        "Plan complete: {} waypoints over {} cells, {:.1} m, {} jumps",
        plan.path.get_num_points(),
        plan.num_cells,
        plan.length_m,
        plan.num_jumps
    );

    session::save_with_timestamp("plan_mgr/coverage_map.json", map);
    session::save_with_timestamp("plan_mgr/tour_report.json", report.clone());
    session::save_with_timestamp("plan_mgr/coverage_plan.json", plan.clone());

    *shared.current_plan.write().map_err(PlanMgrError::from)? = Some(Arc::new(plan));

    Ok(report)
}

/// Length of the currently published plan, zero if there is none.
fn plan_length(shared: &Arc<Shared>) -> Result<f64, PlanMgrError> {
    Ok(shared
        .current_plan
        .read()?
        .as_ref()
        .map(|p| p.length_m)
        .unwrap_or(0.0))
}

// ------------------------------------------------------------------------------------------------
// ERRORS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum ReplanError {
    #[error("{0}")]
    Decompose(#[from] crate::map::CoverageMapError),

    #[error("{0}")]
    Plan(#[from] PlanError),

    #[error("{0}")]
    Mgr(#[from] PlanMgrError),
}
