use serde::{Deserialize, Serialize};

use crate::heading::Heading;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Moves `distance` units along `heading`.
    pub fn advanced(self, heading: Heading, distance: f64) -> Point {
        let (dx, dy) = heading.unit();
        Point::new(self.x + dx * distance, self.y + dy * distance)
    }

    /// The point `distance` units from `self` on the ray through `towards`.
    ///
    /// Returns `self` unchanged when the two points coincide.
    pub fn toward(self, towards: Point, distance: f64) -> Point {
        let span = self.distance(towards);
        if span <= f64::EPSILON {
            return self;
        }
        let scale = distance / span;
        Point::new(
            self.x + (towards.x - self.x) * scale,
            self.y + (towards.y - self.y) * scale,
        )
    }

    pub fn clamped(self, width: f64, height: f64) -> Point {
        Point::new(self.x.clamp(0.0, width.max(0.0)), self.y.clamp(0.0, height.max(0.0)))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Anything with a map position.
pub trait Positioned {
    fn position(&self) -> Point;
}

impl Positioned for Point {
    fn position(&self) -> Point {
        *self
    }
}

pub fn distance<A: Positioned + ?Sized, B: Positioned + ?Sized>(a: &A, b: &B) -> f64 {
    a.position().distance(b.position())
}

/// Cardinal heading along the axis with the larger delta.
///
/// Equal deltas resolve to the vertical axis.
pub fn direction_to(from: Point, to: Point) -> Heading {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx.abs() > dy.abs() {
        if dx > 0.0 {
            Heading::East
        } else {
            Heading::West
        }
    } else if dy > 0.0 {
        Heading::South
    } else {
        Heading::North
    }
}

/// Travel before a full stop under unit deceleration.
pub fn stopping_distance(speed: f64) -> f64 {
    if speed <= 0.0 {
        0.0
    } else {
        speed * speed / 2.0
    }
}

/// Aim point for a shot at a target moving along `heading` at `speed`.
///
/// Travel time is estimated as `distance / projectile_speed`; the result is
/// clamped to the map.
pub fn lead_aim(
    shooter: Point,
    target: Point,
    heading: Heading,
    speed: f64,
    projectile_speed: f64,
    bounds: (f64, f64),
) -> Point {
    let travel_ticks = if projectile_speed > 0.0 {
        shooter.distance(target) / projectile_speed
    } else {
        0.0
    };
    target
        .advanced(heading, speed.max(0.0) * travel_ticks)
        .clamped(bounds.0, bounds.1)
}
