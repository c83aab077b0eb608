//! Overlap tests for the handful of shapes the simulation uses
//!
//! Vehicles are axis-aligned boxes, pedestrians and debris are circles.
//! There is no collision response here, only "do these touch" and
//! "how close are they".

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned box stored as center + half extents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec2,
    pub half: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, half: Vec2) -> Self {
        Self {
            center,
            half: half.abs(),
        }
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        self.center - self.half
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.center + self.half
    }

    /// Closest point on (or inside) the box to `p`
    #[inline]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min(), self.max())
    }
}

/// Result of a box/circle overlap check
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    /// Whether the shapes overlap
    pub hit: bool,
    /// Closest point on the box to the circle center
    pub point: Vec2,
    /// Distance from that point to the circle center (0 when the center is inside)
    pub distance: f32,
}

/// Box vs circle: clamp the circle center onto the box and compare with the radius
pub fn aabb_circle_contact(aabb: &Aabb, center: Vec2, radius: f32) -> Contact {
    let point = aabb.closest_point(center);
    let distance = (center - point).length();
    Contact {
        hit: distance <= radius,
        point,
        distance,
    }
}

#[inline]
pub fn aabb_circle_overlap(aabb: &Aabb, center: Vec2, radius: f32) -> bool {
    aabb_circle_contact(aabb, center, radius).hit
}

#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let r = ra + rb;
    a.distance_squared(b) <= r * r
}

/// Is `p` outside the world rectangle grown by `margin` on every side?
#[inline]
pub fn outside_world(p: Vec2, width: f32, height: f32, margin: f32) -> bool {
    p.x < -margin || p.x > width + margin || p.y < -margin || p.y > height + margin
}
