//! The weighted occupancy grid used to fuse per-sensor detection batches.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

// Internal
use super::{Obstacle, SensorBatches, SensorSource};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the sensor fusion grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionParams {
    /// Side length of one grid cell.
    pub resolution_m: f64,

    /// Minimum accumulated weight for a cell to emit a fused obstacle.
    pub accept_threshold: f64,

    /// Trust weight for camera detections.
    pub camera_weight: f64,

    /// Trust weight for proximity (ultrasonic/ToF) detections.
    pub proximity_weight: f64,

    /// Trust weight for lidar detections.
    pub lidar_weight: f64,

    /// Half the side length of the square grid, centred on the robot. Detections beyond this
    /// range are out of reactive-navigation concern and dropped.
    pub grid_half_extent_m: f64,
}

/// Fuses per-sensor detection batches into a single obstacle list.
///
/// The grid itself is rebuilt from scratch on every call to [`FusionGrid::fuse`] and holds no
/// state between control ticks, so the fused list for a tick is always the product of exactly
/// one invocation over that tick's batches.
#[derive(Debug, Clone)]
pub struct FusionGrid {
    params: FusionParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            resolution_m: 0.25,
            accept_threshold: 0.6,
            camera_weight: 0.7,
            proximity_weight: 0.5,
            lidar_weight: 0.9,
            grid_half_extent_m: 10.0,
        }
    }
}

impl FusionGrid {
    pub fn new(params: FusionParams) -> Self {
        Self { params }
    }

    /// Fuse one tick's sensor batches into a list of fused obstacles.
    ///
    /// Each detection deposits its source's trust weight into every grid cell its footprint
    /// overlaps; cells whose accumulated weight reaches the accept threshold each emit one
    /// fused [`Obstacle`] at the cell centre. The output order is row-major over the grid, so
    /// identical inputs produce bit-identical output regardless of the order detections appear
    /// within their batches.
    pub fn fuse(&self, robot_position_m: &Vector2<f64>, batches: &SensorBatches) -> Vec<Obstacle> {
        let res_m = self.params.resolution_m;
        let num_cells =
            ((2.0 * self.params.grid_half_extent_m / res_m).ceil() as usize).max(1);
        let origin_m = robot_position_m
            - Vector2::new(self.params.grid_half_extent_m, self.params.grid_half_extent_m);

        let mut weights = Array2::<f64>::zeros((num_cells, num_cells));

        for (batch, weight) in [
            (&batches.camera, self.params.camera_weight),
            (&batches.proximity, self.params.proximity_weight),
            (&batches.lidar, self.params.lidar_weight),
        ]
        .iter()
        {
            for obstacle in batch.iter() {
                self.accumulate(&mut weights, &origin_m, num_cells, obstacle, *weight);
            }
        }

        // Emit fused obstacles in row-major order. The fused radius is the cell's
        // circumradius, so the footprint covers the whole cell.
        let fused_radius_m = res_m * std::f64::consts::FRAC_1_SQRT_2;

        let mut fused = Vec::new();

        for ((row, col), weight) in weights.indexed_iter() {
            if *weight >= self.params.accept_threshold {
                fused.push(Obstacle {
                    position_m: origin_m
                        + Vector2::new(
                            (col as f64 + 0.5) * res_m,
                            (row as f64 + 0.5) * res_m,
                        ),
                    radius_m: fused_radius_m,
                    confidence: weight.min(1.0),
                    source: SensorSource::Fused,
                });
            }
        }

        fused
    }

    /// Deposit `weight` into every cell overlapped by the obstacle's footprint.
    fn accumulate(
        &self,
        weights: &mut Array2<f64>,
        origin_m: &Vector2<f64>,
        num_cells: usize,
        obstacle: &Obstacle,
        weight: f64,
    ) {
        let res_m = self.params.resolution_m;
        let rel_m = obstacle.position_m - origin_m;

        // Cell index range covered by the footprint's bounding box, clamped to the grid
        let min_col = (((rel_m.x - obstacle.radius_m) / res_m).floor().max(0.0)) as usize;
        let min_row = (((rel_m.y - obstacle.radius_m) / res_m).floor().max(0.0)) as usize;
        let max_col = (((rel_m.x + obstacle.radius_m) / res_m).floor().max(0.0) as usize)
            .min(num_cells.saturating_sub(1));
        let max_row = (((rel_m.y + obstacle.radius_m) / res_m).floor().max(0.0) as usize)
            .min(num_cells.saturating_sub(1));

        if min_col >= num_cells || min_row >= num_cells {
            return;
        }

        for row in min_row..=max_row {
            for col in min_col..=max_col {
                // Disc-vs-cell overlap via the closest point of the cell to the disc centre
                let closest_x = rel_m.x.max(col as f64 * res_m).min((col + 1) as f64 * res_m);
                let closest_y = rel_m.y.max(row as f64 * res_m).min((row + 1) as f64 * res_m);

                let dist_m =
                    Vector2::new(rel_m.x - closest_x, rel_m.y - closest_y).norm();

                if dist_m <= obstacle.radius_m {
                    weights[(row, col)] += weight;
                }
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn detection(x: f64, y: f64, source: SensorSource) -> Obstacle {
        Obstacle {
            position_m: Vector2::new(x, y),
            radius_m: 0.1,
            confidence: 1.0,
            source,
        }
    }

    #[test]
    fn test_single_lidar_crosses_default_threshold() {
        let grid = FusionGrid::new(FusionParams::default());

        // A point-like detection well inside one grid cell
        let batches = SensorBatches {
            lidar: vec![Obstacle {
                position_m: Vector2::new(2.1, 1.1),
                radius_m: 0.05,
                confidence: 1.0,
                source: SensorSource::Lidar,
            }],
            ..Default::default()
        };

        let fused = grid.fuse(&Vector2::new(0.0, 0.0), &batches);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].source, SensorSource::Fused);
        assert!((fused[0].confidence - 0.9).abs() < 1e-12);
        assert!((fused[0].position_m - Vector2::new(2.1, 1.1)).norm() < 0.3);
    }

    #[test]
    fn test_single_lidar_below_raised_threshold() {
        let grid = FusionGrid::new(FusionParams {
            accept_threshold: 0.95,
            ..Default::default()
        });

        let batches = SensorBatches {
            lidar: vec![detection(2.0, 1.0, SensorSource::Lidar)],
            ..Default::default()
        };

        assert!(grid.fuse(&Vector2::new(0.0, 0.0), &batches).is_empty());
    }

    #[test]
    fn test_camera_plus_proximity_corroborate() {
        let grid = FusionGrid::new(FusionParams::default());

        // Neither source alone crosses 0.6, together they reach 1.2 (clamped to 1.0)
        let batches = SensorBatches {
            camera: vec![detection(-1.0, 3.0, SensorSource::Camera)],
            proximity: vec![detection(-1.0, 3.0, SensorSource::Proximity)],
            ..Default::default()
        };

        let fused = grid.fuse(&Vector2::new(0.0, 0.0), &batches);

        assert!(!fused.is_empty());
        assert!(fused.iter().all(|o| (o.confidence - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_proximity_alone_insufficient() {
        let grid = FusionGrid::new(FusionParams::default());

        let batches = SensorBatches {
            proximity: vec![detection(-1.0, 3.0, SensorSource::Proximity)],
            ..Default::default()
        };

        assert!(grid.fuse(&Vector2::new(0.0, 0.0), &batches).is_empty());
    }

    #[test]
    fn test_fuse_is_pure_and_deterministic() {
        let grid = FusionGrid::new(FusionParams::default());

        let batches = SensorBatches {
            camera: vec![detection(1.0, 1.0, SensorSource::Camera)],
            proximity: vec![detection(1.0, 1.0, SensorSource::Proximity)],
            lidar: vec![
                detection(-2.0, 0.5, SensorSource::Lidar),
                detection(3.0, -4.0, SensorSource::Lidar),
            ],
        };

        let robot = Vector2::new(0.0, 0.0);
        let first = grid.fuse(&robot, &batches);
        let second = grid.fuse(&robot, &batches);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.position_m, b.position_m);
            assert_eq!(a.confidence, b.confidence);
        }
    }

    #[test]
    fn test_batch_internal_order_irrelevant() {
        let grid = FusionGrid::new(FusionParams::default());

        let forward = SensorBatches {
            lidar: vec![
                detection(-2.0, 0.5, SensorSource::Lidar),
                detection(3.0, -4.0, SensorSource::Lidar),
            ],
            ..Default::default()
        };
        let reversed = SensorBatches {
            lidar: vec![
                detection(3.0, -4.0, SensorSource::Lidar),
                detection(-2.0, 0.5, SensorSource::Lidar),
            ],
            ..Default::default()
        };

        let robot = Vector2::new(0.0, 0.0);
        let a = grid.fuse(&robot, &forward);
        let b = grid.fuse(&robot, &reversed);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.position_m, y.position_m);
        }
    }

    #[test]
    fn test_out_of_grid_detection_dropped() {
        let grid = FusionGrid::new(FusionParams::default());

        let batches = SensorBatches {
            lidar: vec![detection(100.0, 100.0, SensorSource::Lidar)],
            ..Default::default()
        };

        assert!(grid.fuse(&Vector2::new(0.0, 0.0), &batches).is_empty());
    }
}
