//! Obstacle detections and the per-tick batches they arrive in.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The sensor a detection originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    /// Vision pipeline detections.
    Camera,

    /// Short-range proximity sensors (ultrasonic or time-of-flight).
    Proximity,

    /// Lidar returns.
    Lidar,

    /// Output of the fusion grid, never an input.
    Fused,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single obstacle detection.
///
/// Obstacles are ephemeral: a fresh list is produced by every fusion cycle and never mutated in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    /// Position of the obstacle centre in the world frame.
    pub position_m: Vector2<f64>,

    /// Physical radius of the obstacle footprint.
    pub radius_m: f64,

    /// Detection confidence in [0, 1].
    pub confidence: f64,

    /// Which sensor produced this detection.
    pub source: SensorSource,
}

/// The detections which arrived from each sensor during one control tick.
///
/// Any subset of the batches may be empty. A slow or dropped sensor simply contributes nothing
/// this tick, fusion never blocks waiting for a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorBatches {
    pub camera: Vec<Obstacle>,
    pub proximity: Vec<Obstacle>,
    pub lidar: Vec<Obstacle>,
}
