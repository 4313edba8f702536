//! Points and quadrilaterals

use serde::{Deserialize, Serialize};

/// Number of vertices of a quadrilateral
pub const NUM_VERTICES: usize = 4;

/// A point in the plane
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// x coordinate
    pub x: f32,
    /// y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    fn cross(&self, a: &Point, b: &Point) -> f32 {
        (a.x - self.x) * (b.y - self.y) - (a.y - self.y) * (b.x - self.x)
    }
}

/// A quadrilateral given by its vertices in cyclic order
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    vertices: [Point; NUM_VERTICES],
}

impl Quad {
    /// Create from four vertices
    pub fn new(vertices: [Point; NUM_VERTICES]) -> Self {
        Quad { vertices }
    }

    /// Create from `(x, y)` pairs
    pub fn from_coords(coords: [(f32, f32); NUM_VERTICES]) -> Self {
        Quad::new(coords.map(|(x, y)| Point::new(x, y)))
    }

    /// Vertex `i` (taken modulo 4)
    pub fn vertex(&self, i: usize) -> Point {
        self.vertices[i % NUM_VERTICES]
    }

    /// All vertices
    pub fn vertices(&self) -> &[Point; NUM_VERTICES] {
        &self.vertices
    }

    /// The same quadrilateral labelled from vertex `k` onwards
    pub fn rotated(&self, k: usize) -> Self {
        Quad::new(std::array::from_fn(|i| self.vertex(i + k)))
    }

    /// All cyclic relabellings, starting with the identity
    pub fn rotations(&self) -> [Quad; NUM_VERTICES] {
        std::array::from_fn(|k| self.rotated(k))
    }

    /// Edges as `(start, end)` pairs in vertex order
    pub fn edges(&self) -> [(Point, Point); NUM_VERTICES] {
        std::array::from_fn(|i| (self.vertex(i), self.vertex(i + 1)))
    }

    /// Shoelace area, positive for counter-clockwise vertex order
    pub fn signed_area(&self) -> f32 {
        let twice: f32 = self
            .edges()
            .iter()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum();
        twice / 2.0
    }

    /// Unsigned area
    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    /// Translate every vertex
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Quad::new(self.vertices.map(|p| Point::new(p.x + dx, p.y + dy)))
    }

    /// Even-odd point-in-polygon test
    pub fn contains(&self, p: &Point) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Whether `other` lies entirely inside `self`
    pub fn contains_quad(&self, other: &Quad) -> bool {
        if !other.vertices.iter().all(|v| self.contains(v)) {
            return false;
        }

        // all vertices inside a non-convex quad still allows an edge to leave it
        for (a, b) in self.edges() {
            for (c, d) in other.edges() {
                if segments_cross(&a, &b, &c, &d) {
                    return false;
                }
            }
        }
        true
    }
}

/// Proper crossing of segments `ab` and `cd`
fn segments_cross(a: &Point, b: &Point, c: &Point, d: &Point) -> bool {
    let d1 = c.cross(d, a);
    let d2 = c.cross(d, b);
    let d3 = a.cross(b, c);
    let d4 = a.cross(b, d);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Quad {
        Quad::from_coords([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
    }

    #[test]
    fn test_area_is_rotation_invariant() {
        let quad = Quad::from_coords([(0.0, 0.0), (4.0, 0.0), (3.0, 2.0), (0.5, 3.0)]);
        let area = quad.area();
        for r in quad.rotations() {
            assert!((r.area() - area).abs() < 1e-6);
        }
    }

    #[test]
    fn test_signed_area_orientation() {
        let square = unit_square();
        assert_eq!(square.signed_area(), 1.0);

        let clockwise = Quad::new([
            square.vertex(0),
            square.vertex(3),
            square.vertex(2),
            square.vertex(1),
        ]);
        assert_eq!(clockwise.signed_area(), -1.0);
        assert_eq!(clockwise.area(), 1.0);
    }

    #[test]
    fn test_rotated_wraps_around() {
        let square = unit_square();
        assert_eq!(square.rotated(1).vertex(0), Point::new(1.0, 0.0));
        assert_eq!(square.rotated(3).vertex(0), Point::new(0.0, 1.0));
        assert_eq!(square.rotated(4), square);
    }

    #[test]
    fn test_contains() {
        let square = unit_square();
        assert!(square.contains(&Point::new(0.5, 0.5)));
        assert!(!square.contains(&Point::new(1.5, 0.5)));
        assert!(!square.contains(&Point::new(-0.1, 0.9)));
    }

    #[test]
    fn test_contains_quad() {
        let outer = Quad::from_coords([(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        let inner = Quad::from_coords([(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)]);
        assert!(outer.contains_quad(&inner));
        assert!(!inner.contains_quad(&outer));

        // arrowhead: every vertex of the square is inside, but the notch cuts it
        let arrow = Quad::from_coords([(0.0, 0.0), (4.0, 2.0), (0.0, 4.0), (3.0, 2.0)]);
        let probe = Quad::from_coords([(1.75, 1.0), (3.5, 2.0), (1.75, 3.0), (1.7, 2.9)]);
        assert!(probe.vertices().iter().all(|v| arrow.contains(v)));
        assert!(!arrow.contains_quad(&probe));
    }
}
