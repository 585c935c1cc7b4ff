//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Load the world file given on the command line and request a coverage plan
//!     - Main loop (dry run):
//!         - Advance the simulated position along the active plan
//!         - Navigation control processing (fusion + heading demand)
//!         - Event draining
//!         - Cycle management
//!
//! The dry run drives a simulated robot over the computed plan with no sensor input, which
//! exercises the full planning and navigation pipeline and leaves a session directory of plan
//! dumps for analysis.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use nav_lib::{
    events::{EventSink, NavEvent},
    fusion::SensorBatches,
    nav::{InputData as NavInput, NavCtrl},
    plan_mgr::{PlanMgr, ReplanOutcome},
    world::World,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::Deserialize;
use std::env;
use std::sync::mpsc::channel;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Parameters for the executable's dry-run loop.
#[derive(Debug, Clone, Deserialize)]
struct ExecParams {
    /// Simulated drive speed along the plan.
    drive_speed_ms: f64,

    /// Distance at which a waypoint counts as reached.
    waypoint_capture_dist_m: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    info!("Meadow Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ExecParams =
        util::params::load("exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- LOAD WORLD ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected exactly one argument (the world file), found {}",
            args.len() - 1
        ));
    }

    info!("Loading world from \"{}\"", &args[1]);

    let world = World::load(&args[1]).wrap_err("Failed to load world file")?;

    info!(
        "World loaded: {:.1} m^2 boundary, {} no-go zones\n",
        world.boundary.area_m2(),
        world.no_go_zones.len()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let (event_tx, event_rx) = channel();
    let events = EventSink::new(event_tx);

    let mut plan_mgr =
        PlanMgr::new("plan_mgr.toml", events.clone()).wrap_err("Failed to initialise PlanMgr")?;
    info!("PlanMgr init complete");

    let mut nav_ctrl = NavCtrl::new(events);
    nav_ctrl
        .init("nav.toml", &session)
        .wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- PLAN ----

    plan_mgr
        .request_replan(
            world.boundary.clone(),
            world.no_go_zones.clone(),
            world.charging_station_m,
        )
        .wrap_err("Failed to request a coverage plan")?;

    let plan = loop {
        match plan_mgr.poll().wrap_err("Planning worker failed")? {
            Some(ReplanOutcome::Complete(report)) => {
                info!(
                    "Plan ready: {} cells, {} backtracks, {} jumps, {:.3} s",
                    report.num_cells, report.num_backtracks, report.num_jumps, report.duration_s
                );
                break plan_mgr
                    .current_plan()
                    .wrap_err("Couldn't read the published plan")?
                    .ok_or_else(|| eyre!("Replan completed but no plan was published"))?;
            }
            Some(ReplanOutcome::Failed(reason)) => {
                return Err(eyre!("Planning failed: {}", reason));
            }
            None => thread::sleep(Duration::from_millis(10)),
        }
    };

    // ---- MAIN LOOP ----

    info!(
        "Starting dry run over {} waypoints ({:.1} m)\n",
        plan.path.get_num_points(),
        plan.length_m
    );

    let mut position_m = match plan.path.points_m.first() {
        Some(p) => *p,
        None => return Err(eyre!("Published plan has an empty path")),
    };
    let mut target_index = 0usize;
    let mut num_cycles = 0u64;
    let mut num_consec_cycle_overruns = 0u64;

    while target_index < plan.path.get_num_points() {
        let cycle_start_instant = Instant::now();

        // ---- TARGET MANAGEMENT ----

        let target_m = plan.path.points_m[target_index];

        if (target_m - position_m).norm() < exec_params.waypoint_capture_dist_m {
            target_index += 1;
            continue;
        }

        // ---- NAVIGATION PROCESSING ----

        // No live sensors in a dry run, fuse over empty batches
        let (nav_output, _report) = nav_ctrl.proc(&NavInput {
            position_m,
            target_m,
            batches: SensorBatches::default(),
        })?;

        // Advance the simulated position along the demanded heading
        let step_m = exec_params.drive_speed_ms * CYCLE_PERIOD_S;
        position_m += Vector2::new(
            nav_output.heading_rad.cos() * step_m,
            nav_output.heading_rad.sin() * step_m,
        );

        // ---- EVENT DRAINING ----

        while let Ok(event) = event_rx.try_recv() {
            match event {
                NavEvent::ObstacleBlockingPath { distance_m, .. } => {
                    warn!("Obstacle blocking path at {:.2} m", distance_m)
                }
                e => info!("{:?}", e),
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > 500 {
                    return Err(eyre!("More than 500 consecutive cycle overruns"));
                }
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!(
        "Dry run complete after {} cycles ({:.1} s driven)",
        num_cycles,
        num_cycles as f64 * CYCLE_PERIOD_S
    );

    plan_mgr.stop().wrap_err("Failed to stop PlanMgr")?;

    session.exit();

    info!("End of execution");

    Ok(())
}
