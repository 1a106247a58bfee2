//! Engine boundary types, shaped after the game's JSON payloads.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::constants::{ARRIVAL_RADIUS, ZONE_SAFE_RADIUS_FRACTION, ZONE_WARNING_MARGIN};
use crate::geometry::{Point, Positioned};
use crate::heading::{Heading, Rotation};

/// Opaque ship identifier. The game sends either strings or integers.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ShipId(pub String);

impl ShipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ShipId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ShipId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Int(value) => Self(value.to_string()),
            RawId::Float(value) => Self(value.to_string()),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipSnapshot {
    pub id: ShipId,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, alias = "heading")]
    pub direction: Heading,
    #[serde(default)]
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(default)]
    pub cannon_cooldown_left: i32,
    #[serde(default)]
    pub cannon_radius: f64,
    #[serde(default)]
    pub scan_radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl ShipSnapshot {
    /// Ships without a reported hp are treated as alive.
    pub fn is_alive(&self) -> bool {
        self.hp.map_or(true, |hp| hp > 0)
    }

    pub fn cannon_ready(&self) -> bool {
        self.cannon_cooldown_left == 0
    }
}

impl Positioned for ShipSnapshot {
    fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// The shrinking safe circle. Ships outside `radius` take storm damage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DangerZone {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl DangerZone {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn contains(&self, point: Point) -> bool {
        self.center().distance(point) <= self.radius
    }

    /// Radius ships fall back to and patrol on. It stays one arrival ring
    /// inside the warning band, so small zones pull it toward the centre.
    pub fn safe_radius(&self) -> f64 {
        (self.radius * ZONE_SAFE_RADIUS_FRACTION)
            .min(self.radius - ZONE_WARNING_MARGIN - ARRIVAL_RADIUS)
            .max(0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    #[serde(default)]
    pub tick: u64,
    #[serde(default)]
    pub my_ships: Vec<ShipSnapshot>,
    #[serde(default)]
    pub enemy_ships: Vec<ShipSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<DangerZone>,
}

impl ScanSnapshot {
    pub fn living_ships(&self) -> impl Iterator<Item = &ShipSnapshot> {
        self.my_ships.iter().filter(|ship| ship.is_alive())
    }
}

/// Obstacle placement: `start` is the map cell of `map[0][0]`, rows run along y.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    #[serde(rename = "start")]
    pub origin: [i64; 2],
    #[serde(rename = "map", default)]
    pub mask: Vec<Vec<u8>>,
}

impl Obstacle {
    /// Absolute coordinates of every blocked cell.
    pub fn blocked_cells(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        let [ox, oy] = self.origin;
        self.mask.iter().enumerate().flat_map(move |(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| **cell == 1)
                .map(move |(col, _)| (ox + col as i64, oy + row as i64))
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSnapshot {
    #[serde(rename = "map")]
    pub size: [u32; 2],
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
}

impl MapSnapshot {
    pub fn new(width: u32, height: u32, obstacles: Vec<Obstacle>) -> Self {
        Self {
            size: [width, height],
            obstacles,
        }
    }

    pub fn width(&self) -> u32 {
        self.size[0]
    }

    pub fn height(&self) -> u32 {
        self.size[1]
    }
}

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Throttle {
    Brake,
    #[default]
    Hold,
    Accelerate,
}

impl Throttle {
    pub fn value(self) -> i8 {
        match self {
            Self::Brake => -1,
            Self::Hold => 0,
            Self::Accelerate => 1,
        }
    }
}

impl From<Throttle> for i8 {
    fn from(value: Throttle) -> Self {
        value.value()
    }
}

impl TryFrom<i8> for Throttle {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Brake),
            0 => Ok(Self::Hold),
            1 => Ok(Self::Accelerate),
            other => Err(format!("acceleration must be -1, 0 or 1, got {other}")),
        }
    }
}

/// Integer map cell the cannon is aimed at.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirePoint {
    pub x: i64,
    pub y: i64,
}

impl From<Point> for FirePoint {
    fn from(value: Point) -> Self {
        Self {
            x: value.x.round() as i64,
            y: value.y.round() as i64,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipCommand {
    pub id: ShipId,
    pub acceleration: Throttle,
    pub rotate: Rotation,
    pub cannon_shoot: Option<FirePoint>,
}

impl ShipCommand {
    /// Zero throttle, no turn, no shot.
    pub fn idle(id: ShipId) -> Self {
        Self {
            id,
            acceleration: Throttle::Hold,
            rotate: Rotation::None,
            cannon_shoot: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.acceleration == Throttle::Hold
            && self.rotate == Rotation::None
            && self.cannon_shoot.is_none()
    }
}

/// Submit payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    pub ships: Vec<ShipCommand>,
}
