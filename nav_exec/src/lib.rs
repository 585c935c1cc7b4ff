//! # Mower navigation library.
//!
//! This library provides the navigation core of the mower: area decomposition, coverage tour
//! planning, path synthesis, and the reactive obstacle-avoidance pipeline. The binary in this
//! crate wires the core into a cyclic executive.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry primitives - polygons, containment and intersection tests
pub mod geom;

/// Coverage map module - decomposes the boundary into coverable cells and their adjacency graph
pub mod map;

/// Planning module - turns the coverage map into an ordered, drivable coverage plan
pub mod plan;

/// Plan manager - runs planning on a worker thread and publishes plan snapshots
pub mod plan_mgr;

/// Navigation module - computes the commanded heading from the live obstacle picture
pub mod nav;

/// Sensor fusion module - reconciles per-sensor obstacle observations into one list
pub mod fusion;

/// Plan lifecycle events published to the external event bus
pub mod events;

/// World model input file - boundary, no-go zones and charging station
pub mod world;
