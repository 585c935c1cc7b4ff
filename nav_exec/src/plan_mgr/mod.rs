//! # Plan Manager
//!
//! Owns the current [`CoveragePlan`] and runs the planning pipeline (area decomposition, tour
//! planning, path synthesis) on a worker thread, so a replan triggered by a boundary edit never
//! blocks the control loop. The published plan is an immutable snapshot behind an `Arc`: readers
//! take a clone of the handle and can never observe a partially written plan, because a new plan
//! replaces the old one in a single swap.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod worker;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        mpsc::{channel, Receiver, SendError, Sender, TryRecvError},
        Arc, PoisonError, RwLock,
    },
    thread::{self, JoinHandle},
};

// Internal
use crate::events::EventSink;
use crate::geom::Polygon;
use crate::map::CoverageMapParams;
use crate::plan::{CoveragePlan, PathSynthesizerParams, PlanCtl, TourPlannerParams, TourReport};
use util::params::{self, LoadError};

use self::worker::{worker_thread, WorkerSignal};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the plan manager and the planning pipeline it drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMgrParams {
    /// Budget for one complete planning run. If the tour planner exceeds it the replan fails
    /// and the previously published plan stays in effect.
    pub planning_timeout_s: f64,

    pub map: CoverageMapParams,

    pub tour: TourPlannerParams,

    pub synth: PathSynthesizerParams,
}

/// The plan manager.
#[derive(Debug)]
pub struct PlanMgr {
    shared: Arc<Shared>,

    worker_jh: JoinHandle<Result<(), PlanMgrError>>,

    worker_sender: Sender<WorkerSignal>,
    worker_receiver: Receiver<WorkerSignal>,

    /// Control handle of the in-flight replan, kept so a newer request can cancel it.
    active_ctl: Option<PlanCtl>,
}

/// Outcome of a finished replan, drained via [`PlanMgr::poll`].
#[derive(Debug)]
pub enum ReplanOutcome {
    /// The new plan was published, with the tour planner's report.
    Complete(TourReport),

    /// The replan failed. Any previously published plan remains in effect.
    Failed(String),
}

#[derive(Debug)]
struct Shared {
    params: PlanMgrParams,

    current_plan: RwLock<Option<Arc<CoveragePlan>>>,

    events: EventSink,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlanMgrError {
    #[error("Couldn't load parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Sync primitive is poisoned")]
    PoisonError,

    #[error("Failed to send signal {0:?} between threads")]
    SendError(WorkerSignal),

    #[error("The planning worker has stopped")]
    WorkerStopped,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PlanMgrParams {
    fn default() -> Self {
        Self {
            planning_timeout_s: 5.0,
            map: CoverageMapParams::default(),
            tour: TourPlannerParams::default(),
            synth: PathSynthesizerParams::default(),
        }
    }
}

impl PlanMgr {
    /// Create a new plan manager, loading parameters from the given file and spawning the
    /// planning worker.
    pub fn new(params_path: &str, events: EventSink) -> Result<Self, PlanMgrError> {
        let params: PlanMgrParams = params::load(params_path)?;
        Ok(Self::with_params(params, events))
    }

    /// Create a plan manager directly from parameters.
    pub fn with_params(params: PlanMgrParams, events: EventSink) -> Self {
        let shared = Arc::new(Shared {
            params,
            current_plan: RwLock::new(None),
            events,
        });
        let shared_worker = shared.clone();

        let (worker_sender, rx) = channel();
        let (tx, worker_receiver) = channel();

        let worker_jh = thread::Builder::new()
            .name("plan_mgr::worker".into())
            .spawn(move || worker_thread(shared_worker, tx, rx))
            .unwrap();

        Self {
            shared,
            worker_jh,
            worker_sender,
            worker_receiver,
            active_ctl: None,
        }
    }

    /// Request a replan over the given working area.
    ///
    /// Any replan still in flight is cancelled first; its result, if it completes anyway, is
    /// discarded by the worker. The new plan is published when the worker finishes, observable
    /// through [`PlanMgr::poll`] and [`PlanMgr::current_plan`].
    pub fn request_replan(
        &mut self,
        boundary: Polygon,
        no_go_zones: Vec<Polygon>,
        charging_station_m: Vector2<f64>,
    ) -> Result<(), PlanMgrError> {
        if let Some(ctl) = self.active_ctl.take() {
            info!("Cancelling in-flight replan, a newer request has arrived");
            ctl.cancel();
        }

        let ctl = PlanCtl::with_budget(self.shared.params.planning_timeout_s);
        self.active_ctl = Some(ctl.clone());

        self.worker_sender.send(WorkerSignal::Replan {
            ctl,
            boundary,
            no_go_zones,
            charging_station_m,
        })?;

        Ok(())
    }

    /// Drain any finished replan outcome from the worker.
    ///
    /// Returns `Ok(None)` while a replan is still running or none is in flight.
    pub fn poll(&mut self) -> Result<Option<ReplanOutcome>, PlanMgrError> {
        match self.worker_receiver.try_recv() {
            Ok(WorkerSignal::Complete(report)) => {
                self.active_ctl = None;
                Ok(Some(ReplanOutcome::Complete(report)))
            }
            Ok(WorkerSignal::Failed(reason)) => {
                self.active_ctl = None;
                warn!("Replan failed: {}", reason);
                Ok(Some(ReplanOutcome::Failed(reason)))
            }
            Ok(signal) => {
                warn!("Unexpected signal from planning worker: {:?}", signal);
                Ok(None)
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PlanMgrError::WorkerStopped),
        }
    }

    /// True if a replan is currently in flight.
    pub fn is_planning(&self) -> bool {
        self.active_ctl.is_some()
    }

    /// Get a handle to the current published plan, if any.
    ///
    /// The returned snapshot is immutable, a later replan publishes a fresh one rather than
    /// mutating this one.
    pub fn current_plan(&self) -> Result<Option<Arc<CoveragePlan>>, PlanMgrError> {
        Ok(self.shared.current_plan.read()?.clone())
    }

    /// Stop the worker and wait for it to exit.
    pub fn stop(self) -> Result<(), PlanMgrError> {
        if let Some(ctl) = self.active_ctl {
            ctl.cancel();
        }

        self.worker_sender.send(WorkerSignal::Stop)?;

        match self.worker_jh.join() {
            Ok(result) => result,
            Err(_) => Err(PlanMgrError::WorkerStopped),
        }
    }
}

impl<G> From<PoisonError<G>> for PlanMgrError {
    fn from(_: PoisonError<G>) -> Self {
        Self::PoisonError
    }
}

impl From<SendError<WorkerSignal>> for PlanMgrError {
    fn from(e: SendError<WorkerSignal>) -> Self {
        Self::SendError(e.0)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
