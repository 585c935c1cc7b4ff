//! # Sensor Fusion
//!
//! Combines per-sensor obstacle detections (camera, proximity, lidar) into one fused obstacle
//! list per control tick, by accumulating source-trust weights on a transient occupancy grid
//! centred on the robot.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod grid;
mod obstacle;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use grid::{FusionGrid, FusionParams};
pub use obstacle::{Obstacle, SensorBatches, SensorSource};
