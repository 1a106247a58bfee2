use std::fmt;

use crate::snapshot::ShipId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShipField {
    X,
    Y,
    Speed,
    CannonRadius,
    ScanRadius,
}

impl fmt::Display for ShipField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
            Self::Speed => write!(f, "speed"),
            Self::CannonRadius => write!(f, "cannonRadius"),
            Self::ScanRadius => write!(f, "scanRadius"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    InvalidShip { id: ShipId, field: ShipField, value: f64 },
    EmptyMap { width: u32, height: u32 },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidShip { id, field, value } => {
                write!(f, "ship {id} has invalid {field}: {value}")
            }
            Self::EmptyMap { width, height } => {
                write!(f, "map has no playable area: {width}x{height}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
