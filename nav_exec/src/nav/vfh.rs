//! # Sector-Histogram Navigator
//!
//! A vector-field-histogram style direction selector. The circle around the robot is divided
//! into equal angular sectors, nearby obstacles deposit density into the sector containing
//! their bearing, and the navigator steers down the sector with the lowest combined cost of
//! obstacle density and angular distance from the goal bearing.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use crate::fusion::Obstacle;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the sector-histogram navigator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorHistogramParams {
    /// Number of equal angular sectors in the histogram.
    pub num_sectors: usize,

    /// Weight of the goal-deviation term relative to obstacle density.
    pub goal_weight: f64,

    /// Lower clamp on the surface distance used for density contributions.
    pub min_surface_dist_m: f64,
}

/// The sector-histogram navigator. The histogram is rebuilt from scratch on every call, so the
/// navigator carries no state between ticks.
#[derive(Debug, Clone)]
pub struct SectorHistogram {
    params: SectorHistogramParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SectorHistogramParams {
    fn default() -> Self {
        Self {
            num_sectors: 72,
            goal_weight: 0.5,
            min_surface_dist_m: 0.1,
        }
    }
}

impl SectorHistogram {
    pub fn new(params: SectorHistogramParams) -> Self {
        Self { params }
    }

    /// Select a travel direction at `position_m`, in radians in [0, 2pi).
    ///
    /// Obstacles whose grown footprint (`radius_m + safety_margin_m`) reaches the robot
    /// contribute density `1 / surface_dist` to the sector containing their bearing. Each
    /// sector's cost is its density plus `goal_weight` times its normalised angular distance
    /// from the goal bearing; the returned heading is the centre of the cheapest sector. With
    /// no obstacles in range this reduces to the sector containing the goal bearing.
    pub fn select_direction(
        &self,
        position_m: &Vector2<f64>,
        goal_m: &Vector2<f64>,
        obstacles: &[Obstacle],
        safety_margin_m: f64,
    ) -> f64 {
        let num_sectors = self.params.num_sectors;
        let sector_width_rad = std::f64::consts::TAU / num_sectors as f64;

        let mut density = vec![0f64; num_sectors];

        for obstacle in obstacles.iter() {
            let from_robot = obstacle.position_m - position_m;
            let dist_m = from_robot.norm();

            if dist_m <= f64::EPSILON || dist_m > obstacle.radius_m + safety_margin_m {
                continue;
            }

            let bearing_rad = util::maths::map_pi_to_2pi(from_robot.y.atan2(from_robot.x));
            let sector = ((bearing_rad / sector_width_rad) as usize).min(num_sectors - 1);

            let surface_dist_m =
                (dist_m - obstacle.radius_m).max(self.params.min_surface_dist_m);
            density[sector] += 1.0 / surface_dist_m;
        }

        let to_goal = goal_m - position_m;
        let goal_bearing_rad = util::maths::map_pi_to_2pi(to_goal.y.atan2(to_goal.x));
        let goal_sector = ((goal_bearing_rad / sector_width_rad) as usize).min(num_sectors - 1);

        // Pick the minimum-cost sector, breaking ties toward the goal then the lower index
        let mut best_sector = goal_sector;
        let mut best_cost = f64::INFINITY;
        let mut best_goal_dist = usize::MAX;

        for (sector, sector_density) in density.iter().enumerate() {
            let goal_dist = Self::sector_distance(sector, goal_sector, num_sectors);
            let cost = sector_density
                + self.params.goal_weight * goal_dist as f64 / (num_sectors as f64 / 2.0);

            if cost < best_cost - f64::EPSILON
                || ((cost - best_cost).abs() <= f64::EPSILON && goal_dist < best_goal_dist)
            {
                best_sector = sector;
                best_cost = cost;
                best_goal_dist = goal_dist;
            }
        }

        (best_sector as f64 + 0.5) * sector_width_rad
    }

    /// Angular distance between two sectors in sector counts, the shorter way round.
    fn sector_distance(a: usize, b: usize, num_sectors: usize) -> usize {
        let diff = if a > b { a - b } else { b - a };
        diff.min(num_sectors - diff)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::fusion::SensorSource;

    fn obstacle_at(x: f64, y: f64, radius_m: f64) -> Obstacle {
        Obstacle {
            position_m: Vector2::new(x, y),
            radius_m,
            confidence: 1.0,
            source: SensorSource::Lidar,
        }
    }

    #[test]
    fn test_no_obstacles_selects_goal_sector() {
        let hist = SectorHistogram::new(SectorHistogramParams::default());

        let heading = hist.select_direction(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(0.0, 5.0),
            &[],
            0.3,
        );

        // Goal bearing pi/2 lies within half a sector of the returned centre
        let sector_width = std::f64::consts::TAU / 72.0;
        assert!(
            util::maths::get_ang_dist_2pi(heading, std::f64::consts::FRAC_PI_2).abs()
                <= sector_width / 2.0 + 1e-12
        );
    }

    #[test]
    fn test_avoids_dense_sector() {
        let hist = SectorHistogram::new(SectorHistogramParams::default());

        // A tight cluster straight ahead along the goal bearing, all blocking at margin 0.3
        let obstacles = vec![
            obstacle_at(0.8, 0.0, 0.6),
            obstacle_at(1.0, 0.0, 0.8),
            obstacle_at(1.2, 0.0, 1.0),
        ];

        let heading = hist.select_direction(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(10.0, 0.0),
            &obstacles,
            0.3,
        );

        // Never steers into the occupied sector while zero-density sectors exist. The cluster
        // lies entirely in sector 0, so the selected centre must not be sector 0's.
        let sector_width = std::f64::consts::TAU / 72.0;
        assert!(util::maths::get_ang_dist_2pi(heading, sector_width / 2.0).abs() > 1e-9);
    }

    #[test]
    fn test_out_of_range_obstacles_ignored() {
        let hist = SectorHistogram::new(SectorHistogramParams::default());

        let heading = hist.select_direction(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(10.0, 0.0),
            &[obstacle_at(50.0, 0.0, 0.2)],
            0.3,
        );

        let sector_width = std::f64::consts::TAU / 72.0;
        assert!(util::maths::get_ang_dist_2pi(heading, 0.0).abs() <= sector_width / 2.0 + 1e-12);
    }

    #[test]
    fn test_output_in_range() {
        let hist = SectorHistogram::new(SectorHistogramParams::default());

        let obstacles = vec![obstacle_at(-1.0, -1.0, 1.2), obstacle_at(0.0, 1.5, 1.3)];

        let heading = hist.select_direction(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(-5.0, 0.0),
            &obstacles,
            0.3,
        );

        assert!((0.0..std::f64::consts::TAU).contains(&heading));
    }
}
