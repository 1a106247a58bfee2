//! Per-tick decision engine for a fleet of ships in a polling arena game.
//!
//! The caller builds an [`Engine`] once from the map payload, then feeds it one
//! [`ScanSnapshot`] per tick and receives one [`ShipCommand`] per living ship.

pub mod cascade;
pub mod constants;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod heading;
pub mod risk;
pub mod roles;
pub mod snapshot;
pub mod targeting;
pub mod world;

pub use engine::{Engine, EngineConfig, ShipDecision};
pub use error::EngineError;
pub use heading::{Heading, Rotation};
pub use snapshot::{
    CommandBatch, DangerZone, FirePoint, MapSnapshot, Obstacle, ScanSnapshot, ShipCommand,
    ShipId, ShipSnapshot, Throttle,
};
