use serde::{Deserialize, Serialize};
use std::fmt;

/// Cardinal heading. Ring order is clockwise: north, east, south, west.
///
/// Map coordinates grow east on x and south on y.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    #[default]
    North,
    East,
    South,
    West,
}

/// A single relative turn request.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum Rotation {
    #[default]
    None,
    Clockwise,
    CounterClockwise,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Self::North, Self::East, Self::South, Self::West];

    pub fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn clockwise(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn counter_clockwise(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Unit vector `(dx, dy)` in map coordinates.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Self::North => (0.0, -1.0),
            Self::East => (1.0, 0.0),
            Self::South => (0.0, 1.0),
            Self::West => (-1.0, 0.0),
        }
    }

    /// Number of quarter turns between two headings, in `0..=2`.
    pub fn ring_distance(self, other: Self) -> usize {
        let delta = (other.index() + 4 - self.index()) % 4;
        delta.min(4 - delta)
    }

    /// Single-step turn towards `desired`.
    ///
    /// Opposite headings always resolve clockwise.
    pub fn rotation_to(self, desired: Self) -> Rotation {
        match (desired.index() + 4 - self.index()) % 4 {
            0 => Rotation::None,
            1 | 2 => Rotation::Clockwise,
            _ => Rotation::CounterClockwise,
        }
    }

    pub fn rotated(self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::None => self,
            Rotation::Clockwise => self.clockwise(),
            Rotation::CounterClockwise => self.counter_clockwise(),
        }
    }

    /// The headings reachable this tick, the current one first.
    pub fn reachable(self) -> [Heading; 3] {
        [self, self.clockwise(), self.counter_clockwise()]
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        };
        write!(f, "{text}")
    }
}

impl Rotation {
    pub fn degrees(self) -> i16 {
        match self {
            Self::None => 0,
            Self::Clockwise => 90,
            Self::CounterClockwise => -90,
        }
    }

    pub fn is_turn(self) -> bool {
        self != Self::None
    }
}

impl From<Rotation> for i16 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

impl TryFrom<i16> for Rotation {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            90 => Ok(Self::Clockwise),
            -90 => Ok(Self::CounterClockwise),
            other => Err(format!("rotation must be -90, 0 or 90, got {other}")),
        }
    }
}

/// Free-function form of [`Heading::rotation_to`].
pub fn rotation_to(current: Heading, desired: Heading) -> Rotation {
    current.rotation_to(desired)
}
