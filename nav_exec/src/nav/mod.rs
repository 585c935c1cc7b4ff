//! # Reactive Navigation Control
//!
//! Cyclic module which turns the current position, the active waypoint target and the tick's
//! sensor batches into a heading demand. Sensor batches are fused exactly once per tick; if any
//! fused obstacle's surface comes within the safety margin the configured avoidance strategy
//! overrides the direct bearing to the target.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod potential;
mod vfh;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use potential::{PotentialField, PotentialFieldParams};
pub use vfh::{SectorHistogram, SectorHistogramParams};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use crate::events::{EventSink, NavEvent};
use crate::fusion::{FusionGrid, FusionParams, Obstacle, SensorBatches};
use util::{module::State, params, session::Session};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Which avoidance strategy the control loop uses when an obstacle blocks the path.
///
/// The choice is made by configuration at init, never dynamically per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavStrategy {
    PotentialField,
    SectorHistogram,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the navigation control module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavParams {
    /// Active avoidance strategy.
    pub strategy: NavStrategy,

    /// Minimum clearance added to an obstacle's radius before it counts as blocking.
    pub safety_margin_m: f64,

    pub potential: PotentialFieldParams,

    pub histogram: SectorHistogramParams,

    pub fusion: FusionParams,
}

/// Navigation control module state.
pub struct NavCtrl {
    params: NavParams,

    fusion: FusionGrid,
    potential: PotentialField,
    histogram: SectorHistogram,

    events: EventSink,

    /// Whether the previous tick was blocked, for edge-triggered event publication.
    blocked: bool,
}

/// Input data for one navigation tick.
#[derive(Debug, Clone)]
pub struct InputData {
    /// Current robot position in the world frame.
    pub position_m: Vector2<f64>,

    /// Current waypoint target from the active coverage plan.
    pub target_m: Vector2<f64>,

    /// The sensor batches which arrived this tick. Any subset may be empty.
    pub batches: SensorBatches,
}

/// Heading demand produced by one navigation tick.
#[derive(Debug, Clone, Serialize)]
pub struct OutputData {
    /// Demanded heading in radians in [0, 2pi).
    pub heading_rad: f64,

    /// True if the avoidance strategy overrode the direct bearing to the target.
    pub overriding: bool,

    /// The fused obstacle list this tick's heading was computed against.
    pub fused_obstacles: Vec<Obstacle>,
}

/// Status report for navigation tick processing.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusReport {
    pub num_fused_obstacles: usize,
    pub obstacle_within_margin: bool,
    pub strategy: NavStrategy,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for NavParams {
    fn default() -> Self {
        Self {
            strategy: NavStrategy::PotentialField,
            safety_margin_m: 0.3,
            potential: PotentialFieldParams::default(),
            histogram: SectorHistogramParams::default(),
            fusion: FusionParams::default(),
        }
    }
}

impl NavCtrl {
    /// Create an uninitialised module publishing into the given sink.
    pub fn new(events: EventSink) -> Self {
        Self::with_params(NavParams::default(), events)
    }

    /// Create a module directly from parameters, bypassing the file load.
    pub fn with_params(params: NavParams, events: EventSink) -> Self {
        Self {
            fusion: FusionGrid::new(params.fusion.clone()),
            potential: PotentialField::new(params.potential.clone()),
            histogram: SectorHistogram::new(params.histogram.clone()),
            params,
            events,
            blocked: false,
        }
    }

    fn reconfigure(&mut self, params: NavParams) {
        self.fusion = FusionGrid::new(params.fusion.clone());
        self.potential = PotentialField::new(params.potential.clone());
        self.histogram = SectorHistogram::new(params.histogram.clone());
        self.params = params;
    }
}

impl State for NavCtrl {
    type InitData = &'static str;
    type InitError = params::LoadError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = std::convert::Infallible;

    /// Initialise the module.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(
        &mut self,
        init_data: Self::InitData,
        _session: &Session,
    ) -> Result<(), Self::InitError> {
        self.reconfigure(params::load(init_data)?);
        Ok(())
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Exactly one fusion per tick, so heading and output always reflect the same list
        let fused = self
            .fusion
            .fuse(&input_data.position_m, &input_data.batches);

        // Find the closest fused obstacle surface
        let closest = fused
            .iter()
            .map(|o| {
                let dist_m = (o.position_m - input_data.position_m).norm();
                (o, dist_m - o.radius_m)
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let blocking = matches!(
            closest,
            Some((_, surface_m)) if surface_m <= self.params.safety_margin_m
        );

        if blocking && !self.blocked {
            if let Some((obstacle, surface_m)) = closest {
                self.events.publish(NavEvent::ObstacleBlockingPath {
                    position_m: obstacle.position_m,
                    distance_m: surface_m.max(0.0),
                });
            }
        }
        self.blocked = blocking;

        let heading_rad = if blocking {
            match self.params.strategy {
                NavStrategy::PotentialField => self.potential.desired_heading(
                    &input_data.position_m,
                    &input_data.target_m,
                    &fused,
                    self.params.safety_margin_m,
                ),
                NavStrategy::SectorHistogram => self.histogram.select_direction(
                    &input_data.position_m,
                    &input_data.target_m,
                    &fused,
                    self.params.safety_margin_m,
                ),
            }
        } else {
            // Clear path, head straight for the target
            let to_target = input_data.target_m - input_data.position_m;
            util::maths::map_pi_to_2pi(to_target.y.atan2(to_target.x))
        };

        trace!(
            "NavCtrl: heading {:.3} rad, {} fused obstacles, blocking: {}",
            heading_rad,
            fused.len(),
            blocking
        );

        let report = StatusReport {
            num_fused_obstacles: fused.len(),
            obstacle_within_margin: blocking,
            strategy: self.params.strategy,
        };

        Ok((
            OutputData {
                heading_rad,
                overriding: blocking,
                fused_obstacles: fused,
            },
            report,
        ))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::fusion::SensorSource;
    use std::sync::mpsc::channel;

    fn lidar_at(x: f64, y: f64) -> Obstacle {
        Obstacle {
            position_m: Vector2::new(x, y),
            radius_m: 0.1,
            confidence: 1.0,
            source: SensorSource::Lidar,
        }
    }

    #[test]
    fn test_clear_path_heads_to_target() {
        let mut ctrl = NavCtrl::with_params(NavParams::default(), EventSink::disconnected());

        let (output, report) = ctrl
            .proc(&InputData {
                position_m: Vector2::new(0.0, 0.0),
                target_m: Vector2::new(5.0, 0.0),
                batches: SensorBatches::default(),
            })
            .unwrap();

        assert!(!output.overriding);
        assert!(output.heading_rad.abs() < 1e-12);
        assert_eq!(report.num_fused_obstacles, 0);
    }

    #[test]
    fn test_blocking_obstacle_overrides_and_raises_event() {
        let (tx, rx) = channel();
        let mut ctrl = NavCtrl::with_params(NavParams::default(), EventSink::new(tx));

        let input = InputData {
            position_m: Vector2::new(0.0, 0.0),
            target_m: Vector2::new(5.0, 0.0),
            batches: SensorBatches {
                lidar: vec![lidar_at(0.3, 0.0)],
                ..Default::default()
            },
        };

        let (output, report) = ctrl.proc(&input).unwrap();

        assert!(output.overriding);
        assert!(report.obstacle_within_margin);
        assert!(matches!(
            rx.try_recv(),
            Ok(NavEvent::ObstacleBlockingPath { .. })
        ));

        // Still blocked on the next tick but the event is edge triggered
        ctrl.proc(&input).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_reraised_after_clearing() {
        let (tx, rx) = channel();
        let mut ctrl = NavCtrl::with_params(NavParams::default(), EventSink::new(tx));

        let blocked_input = InputData {
            position_m: Vector2::new(0.0, 0.0),
            target_m: Vector2::new(5.0, 0.0),
            batches: SensorBatches {
                lidar: vec![lidar_at(0.3, 0.0)],
                ..Default::default()
            },
        };
        let clear_input = InputData {
            batches: SensorBatches::default(),
            ..blocked_input.clone()
        };

        ctrl.proc(&blocked_input).unwrap();
        assert!(rx.try_recv().is_ok());

        ctrl.proc(&clear_input).unwrap();
        assert!(rx.try_recv().is_err());

        ctrl.proc(&blocked_input).unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_histogram_strategy_selected_by_config() {
        let params = NavParams {
            strategy: NavStrategy::SectorHistogram,
            ..Default::default()
        };
        let mut ctrl = NavCtrl::with_params(params, EventSink::disconnected());

        let (output, report) = ctrl
            .proc(&InputData {
                position_m: Vector2::new(0.0, 0.0),
                target_m: Vector2::new(5.0, 0.0),
                batches: SensorBatches {
                    lidar: vec![lidar_at(0.3, 0.0)],
                    ..Default::default()
                },
            })
            .unwrap();

        assert!(output.overriding);
        assert_eq!(report.strategy, NavStrategy::SectorHistogram);
        assert!((0.0..std::f64::consts::TAU).contains(&output.heading_rad));
    }
}
