//! # Coverage Map Module
//!
//! Provides the area decomposition of the yard: the surveyed boundary and no-go zones are turned
//! into a regular grid of coverable cells plus their adjacency graph.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod coverage_map;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use coverage_map::*;
