//! # Working Area Description
//!
//! The world file describes the yard the robot operates in: the outer boundary fence, any no-go
//! zones inside it, and the charging station position. It is a TOML file loaded the same way as
//! parameter files, and is converted into validated geometry before planning.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Deserialize;

// Internal
use crate::geom::{GeomError, Polygon};
use util::params::{self, LoadError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Raw world description as it appears in the world file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldSpec {
    /// Boundary fence vertices as `[x, y]` pairs, in order around the perimeter.
    pub boundary: Vec<[f64; 2]>,

    /// Zero or more no-go zone polygons, each a list of `[x, y]` pairs.
    #[serde(default)]
    pub no_go_zones: Vec<Vec<[f64; 2]>>,

    /// Charging station position as an `[x, y]` pair.
    pub charging_station: [f64; 2],
}

/// The validated working area.
#[derive(Debug, Clone)]
pub struct World {
    pub boundary: Polygon,
    pub no_go_zones: Vec<Polygon>,
    pub charging_station_m: Vector2<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Couldn't load world file: {0}")]
    LoadError(#[from] LoadError),

    #[error("Invalid boundary polygon: {0}")]
    InvalidBoundary(GeomError),

    #[error("Invalid no-go zone {0}: {1}")]
    InvalidNoGoZone(usize, GeomError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl World {
    /// Load and validate a world file.
    pub fn load(path: &str) -> Result<Self, WorldError> {
        let spec: WorldSpec = params::load(path)?;
        Self::from_spec(spec)
    }

    /// Validate a raw world description.
    pub fn from_spec(spec: WorldSpec) -> Result<Self, WorldError> {
        let boundary = Polygon::new(to_verts(&spec.boundary))
            .map_err(WorldError::InvalidBoundary)?;

        let mut no_go_zones = Vec::with_capacity(spec.no_go_zones.len());
        for (i, zone) in spec.no_go_zones.iter().enumerate() {
            no_go_zones
                .push(Polygon::new(to_verts(zone)).map_err(|e| WorldError::InvalidNoGoZone(i, e))?);
        }

        Ok(Self {
            boundary,
            no_go_zones,
            charging_station_m: Vector2::new(spec.charging_station[0], spec.charging_station[1]),
        })
    }
}

fn to_verts(pairs: &[[f64; 2]]) -> Vec<Vector2<f64>> {
    pairs.iter().map(|p| Vector2::new(p[0], p[1])).collect()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid_spec() {
        let world = World::from_spec(WorldSpec {
            boundary: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
            no_go_zones: vec![vec![[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0]]],
            charging_station: [0.5, 0.5],
        })
        .unwrap();

        assert_eq!(world.no_go_zones.len(), 1);
        assert!((world.boundary.area_m2() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_boundary_rejected() {
        let result = World::from_spec(WorldSpec {
            boundary: vec![[0.0, 0.0], [10.0, 0.0]],
            no_go_zones: vec![],
            charging_station: [0.0, 0.0],
        });

        assert!(matches!(result, Err(WorldError::InvalidBoundary(_))));
    }

    #[test]
    fn test_bad_no_go_zone_named_in_error() {
        let result = World::from_spec(WorldSpec {
            boundary: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
            no_go_zones: vec![
                vec![[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0]],
                vec![[5.0, 5.0], [6.0, 5.0]],
            ],
            charging_station: [0.0, 0.0],
        });

        assert!(matches!(result, Err(WorldError::InvalidNoGoZone(1, _))));
    }
}
