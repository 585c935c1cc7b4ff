//! # Geometry
//!
//! Planar geometry primitives used by the decomposer and path synthesizer. All positions are in
//! the local metric frame produced by the upstream geodesy component, in meters.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A simple closed polygon in the local metric frame.
///
/// The vertex sequence is implicitly closed, i.e. the final vertex connects back to the first.
/// Use [`Polygon::new`] to build a validated polygon, which is required for the boundary. No-go
/// zones are validated with the same rules by the decomposer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Polygon {
    pub verts_m: Vec<Vector2<f64>>,
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Aabb {
    pub min_m: Vector2<f64>,
    pub max_m: Vector2<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors produced by polygon validation.
#[derive(Debug, thiserror::Error)]
pub enum GeomError {
    #[error("A polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    #[error("The polygon degenerates to zero area")]
    ZeroArea,

    #[error("The polygon is self-intersecting (edges {0} and {1} cross)")]
    SelfIntersecting(usize, usize),
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Polygons with an area below this value are considered degenerate.
const MIN_POLYGON_AREA_M2: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Polygon {
    /// Build a validated polygon from the given vertices.
    ///
    /// The vertices must describe a simple (non-self-intersecting) polygon of non-zero area.
    pub fn new(verts_m: Vec<Vector2<f64>>) -> Result<Self, GeomError> {
        let poly = Self { verts_m };
        poly.validate()?;
        Ok(poly)
    }

    /// Check this polygon satisfies the rules in [`Polygon::new`].
    pub fn validate(&self) -> Result<(), GeomError> {
        if self.verts_m.len() < 3 {
            return Err(GeomError::TooFewVertices(self.verts_m.len()));
        }

        if self.area_m2() < MIN_POLYGON_AREA_M2 {
            return Err(GeomError::ZeroArea);
        }

        // Check each pair of non-adjacent edges for crossings. Adjacent edges share an endpoint
        // and are skipped.
        let n = self.verts_m.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }

                let (a0, a1) = self.edge(i);
                let (b0, b1) = self.edge(j);

                if segments_intersect(a0, a1, b0, b1) {
                    return Err(GeomError::SelfIntersecting(i, j));
                }
            }
        }

        Ok(())
    }

    /// Get the number of edges (equal to the number of vertices).
    pub fn num_edges(&self) -> usize {
        self.verts_m.len()
    }

    /// Get the `i`th edge of the polygon, with the final edge closing back to the first vertex.
    pub fn edge(&self, i: usize) -> (Vector2<f64>, Vector2<f64>) {
        let n = self.verts_m.len();
        (self.verts_m[i % n], self.verts_m[(i + 1) % n])
    }

    /// Get the unsigned area of the polygon using the shoelace formula.
    pub fn area_m2(&self) -> f64 {
        let mut sum = 0.0;
        for i in 0..self.verts_m.len() {
            let (a, b) = self.edge(i);
            sum += a.x * b.y - b.x * a.y;
        }
        0.5 * sum.abs()
    }

    /// Test if the given point is inside the polygon, using an even-odd ray cast.
    ///
    /// Points exactly on an edge are not reliably classified, use
    /// [`Polygon::contains_with_margin`] where edge-touching points must count as inside.
    pub fn contains(&self, point_m: &Vector2<f64>) -> bool {
        let mut inside = false;

        for i in 0..self.verts_m.len() {
            let (a, b) = self.edge(i);

            if (a.y > point_m.y) != (b.y > point_m.y) {
                let x_cross = a.x + (b.x - a.x) * (point_m.y - a.y) / (b.y - a.y);
                if point_m.x < x_cross {
                    inside = !inside;
                }
            }
        }

        inside
    }

    /// Test if the given point is inside the polygon or within `margin_m` of one of its edges.
    pub fn contains_with_margin(&self, point_m: &Vector2<f64>, margin_m: f64) -> bool {
        self.contains(point_m) || self.distance_to_edges(point_m) <= margin_m
    }

    /// Get the minimum distance between the given point and any edge of the polygon.
    pub fn distance_to_edges(&self, point_m: &Vector2<f64>) -> f64 {
        let mut min_dist = f64::MAX;

        for i in 0..self.verts_m.len() {
            let (a, b) = self.edge(i);
            let dist = point_segment_distance(point_m, &a, &b);
            if dist < min_dist {
                min_dist = dist;
            }
        }

        min_dist
    }

    /// Get the axis-aligned bounding box of the polygon.
    pub fn bounding_box(&self) -> Aabb {
        let mut min_m = Vector2::new(f64::MAX, f64::MAX);
        let mut max_m = Vector2::new(f64::MIN, f64::MIN);

        for v in self.verts_m.iter() {
            min_m.x = min_m.x.min(v.x);
            min_m.y = min_m.y.min(v.y);
            max_m.x = max_m.x.max(v.x);
            max_m.y = max_m.y.max(v.y);
        }

        Aabb { min_m, max_m }
    }

    /// Test if the segment from `a` to `b` crosses any edge of the polygon.
    pub fn intersects_segment(&self, a: &Vector2<f64>, b: &Vector2<f64>) -> bool {
        for i in 0..self.verts_m.len() {
            let (e0, e1) = self.edge(i);
            if segments_intersect(*a, *b, e0, e1) {
                return true;
            }
        }

        false
    }

    /// Test if the polygon overlaps the given axis-aligned box.
    ///
    /// Overlap means any vertex of one shape inside the other, or any pair of crossing edges.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        // Any polygon vertex inside the box
        for v in self.verts_m.iter() {
            if aabb.contains(v) {
                return true;
            }
        }

        // Any box corner inside the polygon
        for corner in aabb.corners().iter() {
            if self.contains(corner) {
                return true;
            }
        }

        // Any box edge crossing any polygon edge
        let corners = aabb.corners();
        for i in 0..4 {
            let c0 = corners[i];
            let c1 = corners[(i + 1) % 4];
            if self.intersects_segment(&c0, &c1) {
                return true;
            }
        }

        false
    }
}

impl Aabb {
    /// Test if the given point lies inside the box (boundary inclusive).
    pub fn contains(&self, point_m: &Vector2<f64>) -> bool {
        point_m.x >= self.min_m.x
            && point_m.x <= self.max_m.x
            && point_m.y >= self.min_m.y
            && point_m.y <= self.max_m.y
    }

    /// Get the four corners of the box in counter-clockwise order.
    pub fn corners(&self) -> [Vector2<f64>; 4] {
        [
            self.min_m,
            Vector2::new(self.max_m.x, self.min_m.y),
            self.max_m,
            Vector2::new(self.min_m.x, self.max_m.y),
        ]
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Test if segments `a0->a1` and `b0->b1` intersect, including touching endpoints and collinear
/// overlap.
pub fn segments_intersect(
    a0: Vector2<f64>,
    a1: Vector2<f64>,
    b0: Vector2<f64>,
    b1: Vector2<f64>,
) -> bool {
    let d1 = orientation(&b0, &b1, &a0);
    let d2 = orientation(&b0, &b1, &a1);
    let d3 = orientation(&a0, &a1, &b0);
    let d4 = orientation(&a0, &a1, &b1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // Collinear cases, check if the collinear point lies on the segment
    (d1 == 0.0 && on_segment(&b0, &b1, &a0))
        || (d2 == 0.0 && on_segment(&b0, &b1, &a1))
        || (d3 == 0.0 && on_segment(&a0, &a1, &b0))
        || (d4 == 0.0 && on_segment(&a0, &a1, &b1))
}

/// Get the distance between a point and the segment `a->b`.
pub fn point_segment_distance(p: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();

    // Degenerate segment, distance to the single point
    if len_sq <= f64::EPSILON {
        return (p - a).norm();
    }

    let t = ((p - a).dot(&ab) / len_sq).max(0.0).min(1.0);
    let closest = a + ab * t;

    (p - closest).norm()
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Signed orientation of `c` relative to the line `a->b`, positive if `c` is to the left.
fn orientation(a: &Vector2<f64>, b: &Vector2<f64>, c: &Vector2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Test if `p`, known to be collinear with segment `a->b`, lies within its extent.
fn on_segment(a: &Vector2<f64>, b: &Vector2<f64>, p: &Vector2<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn unit_square(side_m: f64) -> Polygon {
        Polygon::new(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(side_m, 0.0),
            Vector2::new(side_m, side_m),
            Vector2::new(0.0, side_m),
        ])
        .unwrap()
    }

    #[test]
    fn test_area_and_contains() {
        let square = unit_square(10.0);

        assert!((square.area_m2() - 100.0).abs() < 1e-12);
        assert!(square.contains(&Vector2::new(5.0, 5.0)));
        assert!(square.contains(&Vector2::new(0.5, 9.5)));
        assert!(!square.contains(&Vector2::new(-0.5, 5.0)));
        assert!(!square.contains(&Vector2::new(5.0, 10.5)));
    }

    #[test]
    fn test_contains_with_margin() {
        let square = unit_square(10.0);

        // A point exactly on the edge is within any positive margin
        assert!(square.contains_with_margin(&Vector2::new(0.0, 5.0), 1e-6));
        assert!(square.contains_with_margin(&Vector2::new(10.0, 10.0), 1e-6));

        // A point well outside is not
        assert!(!square.contains_with_margin(&Vector2::new(11.0, 5.0), 0.1));
    }

    #[test]
    fn test_validation() {
        // Too few vertices
        assert!(matches!(
            Polygon::new(vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)]),
            Err(GeomError::TooFewVertices(2))
        ));

        // Zero area (all points collinear)
        assert!(matches!(
            Polygon::new(vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(2.0, 2.0),
            ]),
            Err(GeomError::ZeroArea)
        ));

        // Bowtie self-intersection
        assert!(matches!(
            Polygon::new(vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(0.0, 1.0),
            ]),
            Err(GeomError::SelfIntersecting(_, _))
        ));
    }

    #[test]
    fn test_segments_intersect() {
        let o = Vector2::new(0.0, 0.0);

        // Simple crossing
        assert!(segments_intersect(
            o,
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 0.0)
        ));

        // Parallel, no touch
        assert!(!segments_intersect(
            o,
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 1.0)
        ));

        // Endpoint touch counts as intersection
        assert!(segments_intersect(
            o,
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 1.0)
        ));
    }

    #[test]
    fn test_aabb_intersection() {
        let square = unit_square(10.0);

        // Box fully inside
        assert!(square.intersects_aabb(&Aabb {
            min_m: Vector2::new(4.0, 4.0),
            max_m: Vector2::new(6.0, 6.0),
        }));

        // Box straddling an edge
        assert!(square.intersects_aabb(&Aabb {
            min_m: Vector2::new(9.0, 4.0),
            max_m: Vector2::new(11.0, 6.0),
        }));

        // Box fully outside
        assert!(!square.intersects_aabb(&Aabb {
            min_m: Vector2::new(12.0, 12.0),
            max_m: Vector2::new(14.0, 14.0),
        }));
    }
}
