//! # Path
//!
//! This module defines the waypoint path type used by the planner and the executive.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path defining the desired trajectory of the mower.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Path {
    pub points_m: Vec<Vector2<f64>>,
}

/// A segment between two path points
#[derive(Default, Serialize, Deserialize, Debug)]
pub struct PathSegment {
    /// The target of the segment
    pub target_m: Vector2<f64>,

    /// The start point of the segment
    pub start_m: Vector2<f64>,

    /// The length of the segment
    pub length_m: f64,

    /// The heading (angle to the +ve x axis) of the segment
    pub heading_rad: f64,

    /// Unit vector pointing in the direction of the segment
    pub direction: Vector2<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new empty path
    pub fn new_empty() -> Self {
        Path {
            points_m: Vec::new(),
        }
    }

    /// Create a path from the given sequence of points.
    pub fn from_points(points_m: Vec<Vector2<f64>>) -> Self {
        Path { points_m }
    }

    /// Returns the path segment connecting the target point and the previous
    /// point.
    ///
    /// If no segment exists (the target is the first point in the sequence or
    /// is beyond the end of the sequence) then `None` will be returned
    pub fn get_segment_to_target(&self, target_index: usize) -> Option<PathSegment> {
        // If the path is invalid (not enough points)
        if self.points_m.len() < 2 {
            return None;
        }

        // Catch invalid targets
        if target_index == 0 || target_index >= self.points_m.len() {
            return None;
        }

        // Empty segment to start with
        let mut seg = PathSegment::default();

        // Set the target and start
        seg.target_m = self.points_m[target_index];
        seg.start_m = self.points_m[target_index - 1];

        // Set the length of the segment
        seg.length_m = (seg.target_m - seg.start_m).norm();

        let dx = seg.target_m[0] - seg.start_m[0];
        let dy = seg.target_m[1] - seg.start_m[1];

        // The heading is the arctan of the slope
        seg.heading_rad = dy.atan2(dx);

        // Direction vector is [dx, dy] normalized by the length
        seg.direction = Vector2::new(dx / seg.length_m, dy / seg.length_m);

        // Return the segment
        Some(seg)
    }

    /// Return the length of the path in meters.
    ///
    /// If the path is empty (not enough points) then `None` is returned.
    pub fn get_length(&self) -> Option<f64> {
        // If the path is invalid (not enough points)
        if self.points_m.len() < 2 {
            return None;
        }

        let mut length_m = 0f64;

        // Length is defined as the sum of the length of all path segments
        for i in 1..self.points_m.len() {
            length_m += (self.points_m[i] - self.points_m[i - 1]).norm();
        }

        Some(length_m)
    }

    /// Get the number of points in the path
    pub fn get_num_points(&self) -> usize {
        self.points_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_m.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_segments_and_length() {
        let path = Path::from_points(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(3.0, 0.0),
            Vector2::new(3.0, 4.0),
        ]);

        assert_eq!(path.get_num_points(), 3);
        assert!((path.get_length().unwrap() - 7.0).abs() < 1e-12);

        let seg = path.get_segment_to_target(2).unwrap();
        assert!((seg.length_m - 4.0).abs() < 1e-12);
        assert!((seg.heading_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        // No segment to the first point, or past the end
        assert!(path.get_segment_to_target(0).is_none());
        assert!(path.get_segment_to_target(3).is_none());
    }

    #[test]
    fn test_empty_path() {
        let path = Path::new_empty();

        assert!(path.is_empty());
        assert!(path.get_length().is_none());
        assert!(path.get_segment_to_target(1).is_none());
    }
}
