use crate::constants::HULL_MARGIN_PER_SIZE;
use crate::error::EngineError;
use crate::geometry::Point;
use crate::heading::Heading;
use crate::snapshot::{DangerZone, MapSnapshot};

/// Clearance a hull of `size` needs from the map edge. Unknown sizes count as
/// the smallest hull.
pub fn hull_margin(size: Option<u32>) -> f64 {
    size.unwrap_or(1).max(1) as f64 * HULL_MARGIN_PER_SIZE
}

/// Static map knowledge plus the current danger zone.
///
/// Obstacles are flattened into one occupancy grid at construction and never
/// change afterwards; only the zone is refreshed per tick.
#[derive(Clone, Debug)]
pub struct WorldModel {
    width: u32,
    height: u32,
    blocked: Vec<bool>,
    blocked_count: usize,
    zone: Option<DangerZone>,
    zone_tick: Option<u64>,
}

impl WorldModel {
    pub fn new(map: &MapSnapshot) -> Result<Self, EngineError> {
        let (width, height) = (map.width(), map.height());
        if width == 0 || height == 0 {
            return Err(EngineError::EmptyMap { width, height });
        }

        let mut blocked = vec![false; width as usize * height as usize];
        let mut blocked_count = 0;
        for obstacle in &map.obstacles {
            for (x, y) in obstacle.blocked_cells() {
                // Cells hanging off the map are dropped.
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    continue;
                }
                let slot = &mut blocked[y as usize * width as usize + x as usize];
                if !*slot {
                    *slot = true;
                    blocked_count += 1;
                }
            }
        }

        Ok(Self {
            width,
            height,
            blocked,
            blocked_count,
            zone: None,
            zone_tick: None,
        })
    }

    pub fn width(&self) -> f64 {
        self.width as f64
    }

    pub fn height(&self) -> f64 {
        self.height as f64
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.width(), self.height())
    }

    pub fn center(&self) -> Point {
        Point::new(self.width() / 2.0, self.height() / 2.0)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked_count
    }

    /// Whether the cell containing `(x, y)` is an obstacle. Off-map points are
    /// not blocked; use [`Self::is_out_of_bounds`] for those.
    pub fn is_blocked(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return false;
        }
        let (cx, cy) = (x.floor() as u64, y.floor() as u64);
        if cx >= self.width as u64 || cy >= self.height as u64 {
            return false;
        }
        self.blocked[cy as usize * self.width as usize + cx as usize]
    }

    /// Whether `(x, y)` lies within `margin` of an edge or beyond it. Pass
    /// [`hull_margin`] for a ship.
    pub fn is_out_of_bounds(&self, x: f64, y: f64, margin: f64) -> bool {
        x < margin || y < margin || x > self.width() - margin || y > self.height() - margin
    }

    /// Distance along `heading` to the first blocked cell, if one lies within
    /// `max_distance`.
    pub fn first_obstacle_along(
        &self,
        from: Point,
        heading: Heading,
        max_distance: f64,
        step: f64,
    ) -> Option<(f64, Point)> {
        if max_distance <= 0.0 || step <= 0.0 {
            return None;
        }
        let mut travelled = step;
        while travelled <= max_distance + f64::EPSILON {
            let probe = from.advanced(heading, travelled);
            if self.is_blocked(probe.x, probe.y) {
                let cell = Point::new(probe.x.floor() + 0.5, probe.y.floor() + 0.5);
                return Some((travelled, cell));
            }
            travelled += step;
        }
        None
    }

    /// Whether the straight segment between two points crosses an obstacle.
    pub fn line_of_sight(&self, from: Point, to: Point) -> bool {
        let span = from.distance(to);
        let samples = span.ceil() as usize;
        (1..samples).all(|i| {
            let probe = from.toward(to, i as f64);
            !self.is_blocked(probe.x, probe.y)
        })
    }

    pub fn update_danger_zone(&mut self, zone: Option<DangerZone>, tick: u64) {
        self.zone = zone.filter(|zone| zone.radius.is_finite() && zone.center().is_finite());
        self.zone_tick = Some(tick);
    }

    pub fn danger_zone(&self) -> Option<&DangerZone> {
        self.zone.as_ref()
    }

    pub fn zone_tick(&self) -> Option<u64> {
        self.zone_tick
    }

    /// A point is in danger when it lies outside the zone circle. Without a
    /// zone nothing is in danger.
    pub fn is_outside_danger_zone(&self, point: Point) -> bool {
        self.zone.map_or(false, |zone| !zone.contains(point))
    }
}
