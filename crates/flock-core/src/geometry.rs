//! Obstacle shapes and the geometric queries the rest of the workspace needs.
//!
//! Shapes are solid: a point inside a shape has itself as closest point.

use crate::types::Vec2;
use serde::{Deserialize, Serialize};

/// A static obstacle in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Circle {
        center: Vec2,
        radius: f64,
    },
    /// Oriented rectangle. `rotation` is in radians, counter-clockwise.
    Rect {
        center: Vec2,
        half_extents: Vec2,
        rotation: f64,
    },
}

impl Shape {
    pub fn circle(center: Vec2, radius: f64) -> Self {
        Shape::Circle { center, radius }
    }

    /// Axis-aligned rectangle of the given full width and height.
    pub fn rect(center: Vec2, width: f64, height: f64) -> Self {
        Shape::Rect {
            center,
            half_extents: Vec2::new(width / 2.0, height / 2.0),
            rotation: 0.0,
        }
    }

    pub fn rotated_rect(center: Vec2, width: f64, height: f64, rotation: f64) -> Self {
        Shape::Rect {
            center,
            half_extents: Vec2::new(width / 2.0, height / 2.0),
            rotation,
        }
    }

    pub fn center(&self) -> Vec2 {
        match self {
            Shape::Circle { center, .. } | Shape::Rect { center, .. } => *center,
        }
    }

    /// Radius of the smallest circle around `center()` that covers the shape.
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Shape::Circle { radius, .. } => *radius,
            Shape::Rect { half_extents, .. } => half_extents.length(),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        match self {
            Shape::Circle { center, radius } => p.distance_to(*center) <= *radius,
            Shape::Rect {
                center,
                half_extents,
                rotation,
            } => {
                let local = (p - *center).rotated(-rotation);
                local.x.abs() <= half_extents.x && local.y.abs() <= half_extents.y
            }
        }
    }

    /// Closest point of the solid shape to `p`. Returns `p` when inside.
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        match self {
            Shape::Circle { center, radius } => {
                let delta = p - *center;
                let dist = delta.length();
                if dist <= *radius {
                    p
                } else {
                    *center + delta * (*radius / dist)
                }
            }
            Shape::Rect {
                center,
                half_extents,
                rotation,
            } => {
                let local = (p - *center).rotated(-rotation);
                let clamped = Vec2::new(
                    local.x.clamp(-half_extents.x, half_extents.x),
                    local.y.clamp(-half_extents.y, half_extents.y),
                );
                *center + clamped.rotated(*rotation)
            }
        }
    }

    /// Distance from `p` to the shape; zero when `p` is inside.
    pub fn distance_to(&self, p: Vec2) -> f64 {
        self.closest_point(p).distance_to(p)
    }

    /// Whether a disc of `radius` around `center` touches the shape.
    pub fn overlaps_circle(&self, center: Vec2, radius: f64) -> bool {
        self.distance_to(center) <= radius
    }

    /// Whether the segment `a → b` touches the shape.
    pub fn intersects_segment(&self, a: Vec2, b: Vec2) -> bool {
        match self {
            Shape::Circle { center, radius } => {
                point_segment_distance(*center, a, b) <= *radius
            }
            Shape::Rect {
                center,
                half_extents,
                rotation,
            } => {
                let la = (a - *center).rotated(-rotation);
                let lb = (b - *center).rotated(-rotation);
                segment_hits_box(la, lb, *half_extents)
            }
        }
    }
}

/// Shortest distance from `p` to the segment `a → b`.
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_to(a + ab * t)
}

// Liang-Barsky clip against the box [-h.x, h.x] × [-h.y, h.y].
fn segment_hits_box(a: Vec2, b: Vec2, h: Vec2) -> bool {
    let d = b - a;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;

    let checks = [
        (-d.x, a.x + h.x),
        (d.x, h.x - a.x),
        (-d.y, a.y + h.y),
        (d.y, h.y - a.y),
    ];

    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return false;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return false;
            }
            t1 = t1.min(r);
        }
    }
    t0 <= t1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_closest_point_on_rim() {
        let c = Shape::circle(Vec2::new(0.0, 0.0), 2.0);
        let p = c.closest_point(Vec2::new(5.0, 0.0));
        assert!((p.x - 2.0).abs() < 1e-12);
        assert!((c.distance_to(Vec2::new(5.0, 0.0)) - 3.0).abs() < 1e-12);
        assert_eq!(c.distance_to(Vec2::new(1.0, 0.0)), 0.0);
    }

    #[test]
    fn rect_closest_point_axis_aligned() {
        let r = Shape::rect(Vec2::new(10.0, 10.0), 4.0, 2.0);
        let p = r.closest_point(Vec2::new(20.0, 10.5));
        assert!((p.x - 12.0).abs() < 1e-12);
        assert!((p.y - 10.5).abs() < 1e-12);
        assert!(r.contains(Vec2::new(11.9, 10.9)));
        assert!(!r.contains(Vec2::new(12.1, 10.0)));
    }

    #[test]
    fn rotated_rect_contains() {
        // A 4x2 rect rotated 90 degrees is 2 wide and 4 tall.
        let r = Shape::rotated_rect(Vec2::ZERO, 4.0, 2.0, std::f64::consts::FRAC_PI_2);
        assert!(r.contains(Vec2::new(0.0, 1.9)));
        assert!(!r.contains(Vec2::new(1.9, 0.0)));
    }

    #[test]
    fn segment_intersection() {
        let r = Shape::rect(Vec2::new(10.0, 10.0), 2.0, 2.0);
        assert!(r.intersects_segment(Vec2::new(0.0, 10.0), Vec2::new(20.0, 10.0)));
        assert!(!r.intersects_segment(Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0)));
        // Segment ending before the box.
        assert!(!r.intersects_segment(Vec2::new(0.0, 10.0), Vec2::new(8.0, 10.0)));

        let c = Shape::circle(Vec2::new(5.0, 5.0), 1.0);
        assert!(c.intersects_segment(Vec2::new(0.0, 5.5), Vec2::new(10.0, 5.5)));
        assert!(!c.intersects_segment(Vec2::new(0.0, 7.0), Vec2::new(10.0, 7.0)));
    }

    #[test]
    fn overlaps_circle_uses_surface_distance() {
        let r = Shape::rect(Vec2::new(0.0, 0.0), 2.0, 2.0);
        assert!(r.overlaps_circle(Vec2::new(1.5, 0.0), 0.5));
        assert!(!r.overlaps_circle(Vec2::new(1.6, 0.0), 0.5));
    }
}
