//! Size-derived roles and the patrol waypoint each role follows when there
//! is nothing to shoot.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ARRIVAL_RADIUS, ATTACKER_MIN_SIZE, AUCTION_BONUS_ATTACKER, AUCTION_BONUS_SCOUT,
    AUCTION_BONUS_SUPPORT, BORDER_SAFETY_MARGIN, ORBIT_PHASE_STEP_DEGREES, SUPPORT_SIZE,
    WANDER_MAX_DISTANCE, WANDER_MIN_DISTANCE, WANDER_PHASE_STEP_DEGREES, WANDER_REFRESH_TICKS,
};
use crate::geometry::Point;
use crate::snapshot::ShipId;
use crate::world::WorldModel;

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Attacker,
    Support,
    /// Also the role of any ship whose size cannot be resolved.
    #[default]
    Scout,
}

impl Role {
    pub fn from_size(size: Option<u32>) -> Self {
        match size {
            Some(size) if size >= ATTACKER_MIN_SIZE => Self::Attacker,
            Some(SUPPORT_SIZE) => Self::Support,
            _ => Self::Scout,
        }
    }

    pub fn auction_bonus(self) -> f64 {
        match self {
            Self::Attacker => AUCTION_BONUS_ATTACKER,
            Self::Support => AUCTION_BONUS_SUPPORT,
            Self::Scout => AUCTION_BONUS_SCOUT,
        }
    }

    pub fn behavior(self) -> Behavior {
        match self {
            Self::Attacker => Behavior::Hunt,
            Self::Support => Behavior::Escort,
            Self::Scout => Behavior::Orbit,
        }
    }
}

/// What a ship does on patrol.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Close on the top-ranked enemy, the zone centre, or wander the middle.
    Hunt,
    /// Shadow the nearest friendly attacker.
    Escort,
    /// Circle the zone centre.
    Orbit,
}

/// Position and role of a living friendly ship this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct FleetMember {
    pub id: ShipId,
    pub role: Role,
    pub position: Point,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WanderPoint {
    pub point: Point,
    pub chosen_tick: u64,
}

/// Patrol state carried between ticks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatrolMemory {
    pub wander: Option<WanderPoint>,
}

/// Everything a behavior needs to pick a waypoint.
pub struct PatrolContext<'a> {
    pub tick: u64,
    /// Position of the ship within this tick's fleet list.
    pub index: usize,
    pub id: &'a ShipId,
    pub position: Point,
    pub world: &'a WorldModel,
    pub fleet: &'a [FleetMember],
    pub top_target: Option<Point>,
}

impl Behavior {
    pub fn waypoint(self, ctx: &PatrolContext<'_>, memory: &mut PatrolMemory) -> Point {
        let point = match self {
            Self::Hunt => hunt(ctx, memory),
            Self::Escort => escort(ctx),
            Self::Orbit => orbit(ctx),
        };
        inset(point, ctx.world)
    }
}

fn hunt(ctx: &PatrolContext<'_>, memory: &mut PatrolMemory) -> Point {
    if let Some(target) = ctx.top_target {
        memory.wander = None;
        return target;
    }
    if let Some(zone) = ctx.world.danger_zone() {
        memory.wander = None;
        return zone.center();
    }

    let center = ctx.world.center();
    if let Some(wander) = memory.wander {
        let age = ctx.tick.checked_sub(wander.chosen_tick);
        if age.map_or(false, |age| age < WANDER_REFRESH_TICKS) {
            return wander.point;
        }
    } else if ctx.position.distance(center) > ARRIVAL_RADIUS {
        return center;
    }

    let point = wander_point(center, ctx.tick, ctx.index);
    memory.wander = Some(WanderPoint {
        point,
        chosen_tick: ctx.tick,
    });
    point
}

/// Deterministic search point around `center`: the bearing steps with the
/// tick and fleet index, the range sweeps 100..=300.
fn wander_point(center: Point, tick: u64, index: usize) -> Point {
    let degrees = (tick + index as u64 * WANDER_PHASE_STEP_DEGREES) % 360;
    let span = (WANDER_MAX_DISTANCE - WANDER_MIN_DISTANCE) as u64 + 1;
    let sweep = (tick / WANDER_REFRESH_TICKS + index as u64 * 7) * 37 % span;
    let range = WANDER_MIN_DISTANCE + sweep as f64;
    polar(center, degrees, range)
}

fn escort(ctx: &PatrolContext<'_>) -> Point {
    ctx.fleet
        .iter()
        .filter(|member| member.role == Role::Attacker && &member.id != ctx.id)
        .filter(|member| member.position.is_finite())
        .min_by(|a, b| {
            a.position
                .distance(ctx.position)
                .total_cmp(&b.position.distance(ctx.position))
        })
        .map(|attacker| attacker.position)
        .or_else(|| ctx.world.danger_zone().map(|zone| zone.center()))
        .unwrap_or_else(|| ctx.world.center())
}

fn orbit(ctx: &PatrolContext<'_>) -> Point {
    let (center, radius) = match ctx.world.danger_zone() {
        Some(zone) => (zone.center(), zone.safe_radius()),
        None => {
            let (width, height) = ctx.world.bounds();
            (ctx.world.center(), width.min(height) / 4.0)
        }
    };
    let degrees = (ctx.tick + ctx.index as u64 * ORBIT_PHASE_STEP_DEGREES) % 360;
    polar(center, degrees, radius)
}

fn polar(center: Point, degrees: u64, range: f64) -> Point {
    let radians = (degrees as f64).to_radians();
    Point::new(
        center.x + radians.cos() * range,
        center.y + radians.sin() * range,
    )
}

/// Keeps waypoints clear of the border band when the map is large enough.
fn inset(point: Point, world: &WorldModel) -> Point {
    let (width, height) = world.bounds();
    let clamp_axis = |value: f64, limit: f64| {
        if limit > 2.0 * BORDER_SAFETY_MARGIN {
            value.clamp(BORDER_SAFETY_MARGIN, limit - BORDER_SAFETY_MARGIN)
        } else {
            value.clamp(0.0, limit)
        }
    };
    Point::new(clamp_axis(point.x, width), clamp_axis(point.y, height))
}
