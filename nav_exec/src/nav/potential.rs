//! # Potential-Field Navigator
//!
//! Computes the instantaneous desired heading as the direction of the sum of one attractive
//! force toward the goal and one repulsive force per live obstacle. The attractive force has
//! fixed unit strength; each repulsion is inversely proportional to the distance to the
//! obstacle's surface (its radius grown by the safety margin), so obstacles dominate at close
//! range.

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

/// Parameters for the potential-field navigator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialFieldParams {
    /// Strength of the repulsive term relative to the unit attractive term.
    pub repulsion_coeff: f64,

    /// Lower clamp on the surface distance, avoiding the singularity at contact.
    pub min_surface_dist_m: f64,
}

/// The potential-field navigator. The field itself is a function of position, never a
/// materialized grid, and carries no state between ticks.
#[derive(Debug, Clone)]
pub struct PotentialField {
    params: PotentialFieldParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PotentialFieldParams {
    fn default() -> Self {
        Self {
            repulsion_coeff: 2.0,
            min_surface_dist_m: 0.1,
        }
    }
}

impl PotentialField {
    pub fn new(params: PotentialFieldParams) -> Self {
        Self { params }
    }

    /// Compute the desired heading at `position_m`, in radians in [0, 2pi).
    ///
    /// With no obstacles the output is exactly the bearing from position to goal. This function
    /// never fails: degenerate inputs (goal at the current position, an obstacle exactly at the
    /// current position) degrade to a best-effort heading, since a stalled control loop is worse
    /// than a rough one.
    pub fn desired_heading(
        &self,
        position_m: &Vector2<f64>,
        goal_m: &Vector2<f64>,
        obstacles: &[Obstacle],
        safety_margin_m: f64,
    ) -> f64 {
        let to_goal = goal_m - position_m;

        // Unit attractive force toward the goal, or zero if we're exactly there
        let mut total = if to_goal.norm() > f64::EPSILON {
            to_goal / to_goal.norm()
        } else {
            Vector2::new(0.0, 0.0)
        };

        for obstacle in obstacles.iter() {
            let from_obstacle = position_m - obstacle.position_m;
            let dist_m = from_obstacle.norm();

            // An observation exactly at the robot position has no defined direction, skip it
            if dist_m <= f64::EPSILON {
                continue;
            }

            let surface_dist_m = (dist_m - obstacle.radius_m - safety_margin_m)
                .max(self.params.min_surface_dist_m);

            // Repulsion points from the obstacle centre through the robot
            total += from_obstacle / dist_m * (self.params.repulsion_coeff / surface_dist_m);
        }

        util::maths::map_pi_to_2pi(total.y.atan2(total.x))
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
    fn test_no_obstacles_heads_to_goal() {
        let field = PotentialField::new(PotentialFieldParams::default());

        let heading = field.desired_heading(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(3.0, 3.0),
            &[],
            0.3,
        );

        assert!((heading - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_close_obstacle_deflects_heading() {
        let field = PotentialField::new(PotentialFieldParams::default());

        // Goal straight ahead along +x, obstacle directly in the way at 0.5 m
        let heading = field.desired_heading(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(10.0, 0.0),
            &[obstacle_at(0.5, 0.0, 0.0)],
            0.3,
        );

        let goal_bearing = 0.0;
        let deviation = util::maths::get_ang_dist_2pi(heading, goal_bearing).abs();
        assert!(
            deviation > 30f64.to_radians(),
            "deviation {} rad is too small",
            deviation
        );
    }

    #[test]
    fn test_far_obstacle_barely_deflects() {
        let field = PotentialField::new(PotentialFieldParams::default());

        // Obstacle 50 m off to the side
        let heading = field.desired_heading(
            &Vector2::new(0.0, 0.0),
            &Vector2::new(10.0, 0.0),
            &[obstacle_at(25.0, 50.0, 0.2)],
            0.3,
        );

        let deviation = util::maths::get_ang_dist_2pi(heading, 0.0).abs();
        assert!(deviation < 5f64.to_radians());
    }

    #[test]
    fn test_obstacle_at_robot_position_ignored() {
        let field = PotentialField::new(PotentialFieldParams::default());

        let heading = field.desired_heading(
            &Vector2::new(1.0, 1.0),
            &Vector2::new(1.0, 5.0),
            &[obstacle_at(1.0, 1.0, 0.5)],
            0.3,
        );

        // The degenerate observation is skipped and the goal bearing survives
        assert!((heading - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
