//! The per-ship decision cascade.
//!
//! States are tried in strict priority order and the first that applies
//! produces the ship's command:
//!
//! 1. storm retreat (ship is outside the zone)
//! 2. collision avoidance (border, obstacle or turn-speed risk)
//! 3. storm avoidance (projected position nears the zone edge)
//! 4. engage the assigned target
//! 5. engage the nearest visible enemy
//! 6. role patrol
//!
//! Snap fire may add a shot to the outcome of states 1, 2, 3 and 6.

use serde::Serialize;

use crate::constants::{
    ARRIVAL_RADIUS, ARRIVAL_SPEED, CRUISE_SPEED, ENGAGE_CLOSE_FRACTION, ENGAGE_RETREAT_FRACTION,
    TURN_COOLDOWN_ENGAGE, TURN_COOLDOWN_MANEUVER, TURN_SPEED_LIMIT, ZONE_LOOKAHEAD_TICKS,
    ZONE_WARNING_MARGIN,
};
use crate::engine::{EngineConfig, ShipState};
use crate::error::{EngineError, ShipField};
use crate::geometry::{direction_to, lead_aim, Point, Positioned};
use crate::heading::{Heading, Rotation};
use crate::risk::{RiskAssessor, RiskLevel};
use crate::roles::{Behavior, FleetMember, PatrolContext};
use crate::snapshot::{FirePoint, ShipCommand, ShipSnapshot, Throttle};
use crate::targeting::TargetAllocator;
use crate::world::{hull_margin, WorldModel};

/// Which cascade state produced a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum Decision {
    StormRetreat,
    CollisionAvoidance(RiskLevel),
    StormAvoidance,
    EngageAssigned,
    EngageOpportunistic,
    Patrol(Behavior),
}

impl Decision {
    pub fn name(self) -> &'static str {
        match self {
            Self::StormRetreat => "storm_retreat",
            Self::CollisionAvoidance(_) => "collision_avoidance",
            Self::StormAvoidance => "storm_avoidance",
            Self::EngageAssigned => "engage_assigned",
            Self::EngageOpportunistic => "engage_opportunistic",
            Self::Patrol(_) => "patrol",
        }
    }

    fn allows_snap_fire(self) -> bool {
        !matches!(self, Self::EngageAssigned | Self::EngageOpportunistic)
    }
}

/// Shared, read-only fleet context for one tick.
pub struct FleetView<'a> {
    pub tick: u64,
    pub world: &'a WorldModel,
    pub allocator: &'a TargetAllocator,
    /// Living enemies visible this tick.
    pub enemies: &'a [ShipSnapshot],
    pub fleet: &'a [FleetMember],
    pub config: &'a EngineConfig,
}

/// Runs the cascade for one ship. `index` is the ship's position in this
/// tick's fleet list.
pub fn decide(
    ship: &ShipSnapshot,
    index: usize,
    state: &mut ShipState,
    view: &FleetView<'_>,
) -> Result<(ShipCommand, Decision), EngineError> {
    validate(ship)?;

    let mut helm = Helm {
        ship,
        position: ship.position(),
        index,
        state,
        view,
        risk: RiskAssessor::new(view.world)
            .with_hull_margin(hull_margin(view.config.size_heuristic.estimate(ship))),
        command: ShipCommand::idle(ship.id.clone()),
    };
    let decision = helm.run();
    if view.config.snap_fire && decision.allows_snap_fire() {
        helm.snap_fire();
    }
    Ok((helm.command, decision))
}

fn validate(ship: &ShipSnapshot) -> Result<(), EngineError> {
    let fields = [
        (ShipField::X, ship.x),
        (ShipField::Y, ship.y),
        (ShipField::Speed, ship.speed),
        (ShipField::CannonRadius, ship.cannon_radius),
        (ShipField::ScanRadius, ship.scan_radius),
    ];
    match fields.into_iter().find(|(_, value)| !value.is_finite()) {
        Some((field, value)) => Err(EngineError::InvalidShip {
            id: ship.id.clone(),
            field,
            value,
        }),
        None => Ok(()),
    }
}

/// Whether a turn taken at `last` has cooled down by `now`. No recorded turn,
/// or one recorded in the future, counts as cooled down.
pub fn turn_cooled_down(last: Option<u64>, now: u64, cooldown: u64) -> bool {
    match last {
        Some(last) if last <= now => now - last >= cooldown,
        _ => true,
    }
}

/// Throttle that keeps a turning ship at or below the turn speed limit.
fn turning_throttle(speed: f64) -> Throttle {
    if speed + 1.0 <= TURN_SPEED_LIMIT {
        Throttle::Accelerate
    } else {
        Throttle::Hold
    }
}

struct Helm<'s, 'v> {
    ship: &'s ShipSnapshot,
    position: Point,
    index: usize,
    state: &'s mut ShipState,
    view: &'s FleetView<'v>,
    risk: RiskAssessor<'v>,
    command: ShipCommand,
}

impl<'s, 'v> Helm<'s, 'v> {
    fn run(&mut self) -> Decision {
        if self.storm_retreat() {
            return Decision::StormRetreat;
        }
        if let Some(level) = self.avoid_collision() {
            return Decision::CollisionAvoidance(level);
        }
        if self.avoid_storm() {
            return Decision::StormAvoidance;
        }
        if self.engage_assigned() {
            return Decision::EngageAssigned;
        }
        if self.engage_opportunistic() {
            return Decision::EngageOpportunistic;
        }
        Decision::Patrol(self.patrol())
    }

    fn heading(&self) -> Heading {
        self.ship.direction
    }

    fn speed(&self) -> f64 {
        self.ship.speed
    }

    fn storm_retreat(&mut self) -> bool {
        let zone = match self.view.world.danger_zone() {
            Some(zone) if !zone.contains(self.position) => *zone,
            _ => {
                if self.state.retreating {
                    tracing::debug!(
                        tick = self.view.tick,
                        ship = %self.ship.id,
                        "back inside the zone"
                    );
                }
                self.state.retreating = false;
                self.state.retreat_started_tick = None;
                return false;
            }
        };

        if !self.state.retreating {
            self.state.retreating = true;
            self.state.retreat_started_tick = Some(self.view.tick);
            tracing::debug!(
                tick = self.view.tick,
                ship = %self.ship.id,
                "caught by the storm, retreating"
            );
        }

        let desired = direction_to(self.position, zone.center());
        if desired == self.heading() {
            let ahead = self
                .risk
                .assess_path(self.position, desired, self.speed() + 1.0)
                .level;
            self.command.acceleration = match ahead {
                RiskLevel::Critical => Throttle::Brake,
                RiskLevel::High => Throttle::Hold,
                _ => Throttle::Accelerate,
            };
        } else if self.speed() > TURN_SPEED_LIMIT {
            self.command.acceleration = Throttle::Brake;
        } else if self.turn_toward(desired, TURN_COOLDOWN_MANEUVER) {
            self.command.acceleration = turning_throttle(self.speed());
            self.guard_acceleration();
        } else {
            // Still pointing away from the zone.
            self.command.acceleration = Throttle::Hold;
        }
        true
    }

    fn avoid_collision(&mut self) -> Option<RiskLevel> {
        let assessment = self
            .risk
            .assess(self.position, self.heading(), self.speed());
        match assessment.level {
            RiskLevel::None => return None,
            RiskLevel::Critical | RiskLevel::Moderate => {
                self.command.acceleration = Throttle::Brake;
            }
            RiskLevel::High => {
                self.command.acceleration = Throttle::Brake;
                let turned = assessment
                    .evasive
                    .map_or(false, |escape| self.turn_toward(escape, TURN_COOLDOWN_MANEUVER));
                if !turned {
                    self.swing_to_safest(TURN_COOLDOWN_MANEUVER);
                }
            }
        }
        tracing::debug!(
            tick = self.view.tick,
            ship = %self.ship.id,
            level = ?assessment.level,
            source = ?assessment.source,
            margin = assessment.margin,
            "collision risk"
        );
        Some(assessment.level)
    }

    fn avoid_storm(&mut self) -> bool {
        let Some(zone) = self.view.world.danger_zone().copied() else {
            return false;
        };
        let projected = self
            .position
            .advanced(self.heading(), self.speed() * ZONE_LOOKAHEAD_TICKS);
        let projected_distance = zone.center().distance(projected);
        if projected_distance < zone.radius - ZONE_WARNING_MARGIN {
            return false;
        }
        let haven_radius = zone.safe_radius();
        let distance = zone.center().distance(self.position);
        if projected_distance <= distance && distance <= haven_radius + ARRIVAL_RADIUS {
            // Already at the haven and not drifting outward.
            return false;
        }
        let haven = zone.center().toward(self.position, haven_radius);
        self.steer_toward(haven, TURN_COOLDOWN_MANEUVER);
        true
    }

    /// An enemy may be engaged when it is inside the zone and the way
    /// towards it is passable.
    fn can_engage(&self, target: &ShipSnapshot) -> bool {
        let at = target.position();
        if !at.is_finite() || self.view.world.is_outside_danger_zone(at) {
            return false;
        }
        self.risk
            .heading_risk(self.position, direction_to(self.position, at), self.speed())
            .is_passable()
    }

    fn engage_assigned(&mut self) -> bool {
        let Some(target) = self.state.target.clone() else {
            return false;
        };
        if self.view.allocator.is_stale(&target.id, self.view.tick) || !self.can_engage(&target) {
            return false;
        }
        self.engage(&target);
        true
    }

    fn engage_opportunistic(&mut self) -> bool {
        let scan_radius = self.ship.scan_radius;
        let target = self
            .view
            .enemies
            .iter()
            .filter(|enemy| self.position.distance(enemy.position()) <= scan_radius)
            .filter(|enemy| self.view.world.line_of_sight(self.position, enemy.position()))
            .filter(|enemy| self.can_engage(enemy))
            .min_by(|a, b| {
                self.position
                    .distance(a.position())
                    .total_cmp(&self.position.distance(b.position()))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned();
        match target {
            Some(target) => {
                self.engage(&target);
                true
            }
            None => false,
        }
    }

    fn engage(&mut self, target: &ShipSnapshot) {
        let at = target.position();
        let distance = self.position.distance(at);
        let range = self.ship.cannon_radius;

        if self.ship.cannon_ready() && distance <= range {
            self.fire_at(target);
        }

        self.command.acceleration = if distance > ENGAGE_CLOSE_FRACTION * range {
            Throttle::Accelerate
        } else if distance < ENGAGE_RETREAT_FRACTION * range {
            Throttle::Brake
        } else {
            Throttle::Hold
        };

        let desired = direction_to(self.position, at);
        if desired != self.heading() {
            if self.speed() > TURN_SPEED_LIMIT {
                self.command.acceleration = Throttle::Brake;
            } else {
                self.turn_toward(desired, TURN_COOLDOWN_ENGAGE);
            }
        }
        self.guard_acceleration();
    }

    fn patrol(&mut self) -> Behavior {
        let behavior = self.state.role.behavior();
        let context = PatrolContext {
            tick: self.view.tick,
            index: self.index,
            id: &self.ship.id,
            position: self.position,
            world: self.view.world,
            fleet: self.view.fleet,
            top_target: self
                .view
                .allocator
                .top_target(self.view.tick)
                .map(|enemy| enemy.position()),
        };
        let waypoint = behavior.waypoint(&context, &mut self.state.patrol);
        self.steer_toward(waypoint, TURN_COOLDOWN_MANEUVER);
        behavior
    }

    /// Cruise toward `waypoint`, slowing on arrival, turning when allowed.
    fn steer_toward(&mut self, waypoint: Point, cooldown: u64) {
        let distance = self.position.distance(waypoint);
        let cruise = if distance <= ARRIVAL_RADIUS {
            ARRIVAL_SPEED
        } else {
            CRUISE_SPEED
        };
        self.command.acceleration = if self.speed() < cruise {
            Throttle::Accelerate
        } else if self.speed() > cruise {
            Throttle::Brake
        } else {
            Throttle::Hold
        };

        let desired = direction_to(self.position, waypoint);
        let mut turned = false;
        if distance > f64::EPSILON && desired != self.heading() {
            if self.speed() > TURN_SPEED_LIMIT {
                self.command.acceleration = Throttle::Brake;
            } else {
                turned = self.turn_toward(desired, cooldown);
            }
        }

        if !turned && !self.risk.is_heading_safe(self.position, self.heading(), self.speed()) {
            self.swing_to_safest(cooldown);
        }
        self.guard_acceleration();
    }

    /// Steps toward the least risky of the four headings when it beats the
    /// current one. If no safe step exists the least risky step is taken
    /// anyway. Returns whether a rotation was issued.
    fn swing_to_safest(&mut self, cooldown: u64) -> bool {
        let heading = self.heading();
        let [_, clockwise, counter_clockwise] = heading.reachable();
        let candidates = [heading, clockwise, counter_clockwise, heading.opposite()];
        let escape = self
            .risk
            .safest_heading(self.position, self.speed(), &candidates);
        if escape == heading {
            return false;
        }
        if self.turn_toward(escape, cooldown) {
            return true;
        }
        if self.speed() > TURN_SPEED_LIMIT
            || !turn_cooled_down(self.state.last_turn_tick, self.view.tick, cooldown)
        {
            return false;
        }

        let step = if escape == heading.opposite() {
            self.risk
                .safest_heading(self.position, self.speed(), &[clockwise, counter_clockwise])
        } else {
            escape
        };
        self.rotate(heading.rotation_to(step));
        true
    }

    /// Requests a single 90 degree step toward `desired`.
    ///
    /// The step is only taken at turnable speed, after the cooldown, and when
    /// the heading it lands on is safe. Otherwise the other reachable heading
    /// is tried. Returns whether a rotation was issued.
    fn turn_toward(&mut self, desired: Heading, cooldown: u64) -> bool {
        let heading = self.heading();
        if desired == heading
            || self.speed() > TURN_SPEED_LIMIT
            || !turn_cooled_down(self.state.last_turn_tick, self.view.tick, cooldown)
        {
            return false;
        }

        let preferred = heading.rotation_to(desired);
        let alternate = match preferred {
            Rotation::Clockwise => Rotation::CounterClockwise,
            _ => Rotation::Clockwise,
        };
        let rotation = [preferred, alternate].into_iter().find(|rotation| {
            self.risk
                .is_heading_safe(self.position, heading.rotated(*rotation), self.speed())
        });

        match rotation {
            Some(rotation) => {
                self.rotate(rotation);
                true
            }
            None => false,
        }
    }

    fn rotate(&mut self, rotation: Rotation) {
        self.command.rotate = rotation;
        self.state.last_turn_tick = Some(self.view.tick);
        if self.command.acceleration == Throttle::Accelerate {
            self.command.acceleration = turning_throttle(self.speed());
        }
    }

    /// Downgrades acceleration that would make the path ahead impassable.
    fn guard_acceleration(&mut self) {
        if self.command.acceleration != Throttle::Accelerate {
            return;
        }
        let heading = self.heading().rotated(self.command.rotate);
        let ahead = self
            .risk
            .assess_path(self.position, heading, self.speed() + 1.0)
            .level;
        if !ahead.is_passable() {
            self.command.acceleration = Throttle::Hold;
        }
    }

    fn fire_at(&mut self, target: &ShipSnapshot) {
        let aim = lead_aim(
            self.position,
            target.position(),
            target.direction,
            target.speed,
            self.view.config.projectile_speed,
            self.view.world.bounds(),
        );
        self.command.cannon_shoot = Some(FirePoint::from(aim));
    }

    /// Shoots whatever is in range when the cascade chose not to engage.
    /// The assigned target is preferred, then the nearest enemy.
    fn snap_fire(&mut self) {
        if self.command.cannon_shoot.is_some() || !self.ship.cannon_ready() {
            return;
        }
        let range = self.ship.cannon_radius;
        let in_range = |enemy: &&ShipSnapshot| {
            self.position.distance(enemy.position()) <= range
                && !self.view.allocator.is_stale(&enemy.id, self.view.tick)
        };

        let assigned = self.state.target.as_ref().filter(in_range);
        let target = assigned
            .or_else(|| {
                self.view.enemies.iter().filter(in_range).min_by(|a, b| {
                    self.position
                        .distance(a.position())
                        .total_cmp(&self.position.distance(b.position()))
                        .then_with(|| a.id.cmp(&b.id))
                })
            })
            .cloned();
        if let Some(target) = target {
            self.fire_at(&target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::snapshot::{DangerZone, MapSnapshot, ShipId};

    struct Fixture {
        world: WorldModel,
        allocator: TargetAllocator,
        config: EngineConfig,
        enemies: Vec<ShipSnapshot>,
        fleet: Vec<FleetMember>,
        tick: u64,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                world: WorldModel::new(&MapSnapshot::new(2000, 2000, Vec::new())).unwrap(),
                allocator: TargetAllocator::new(10, 20, Default::default()),
                config: EngineConfig::default(),
                enemies: Vec::new(),
                fleet: Vec::new(),
                tick: 1,
            }
        }

        fn zone(mut self, x: f64, y: f64, radius: f64) -> Self {
            self.world
                .update_danger_zone(Some(DangerZone { x, y, radius }), self.tick);
            self
        }

        fn enemy(mut self, enemy: ShipSnapshot) -> Self {
            self.enemies.push(enemy);
            self
        }

        fn decide(&mut self, ship: &ShipSnapshot, state: &mut ShipState) -> (ShipCommand, Decision) {
            self.allocator
                .update(self.tick, &self.enemies, &self.fleet, &self.world);
            let view = FleetView {
                tick: self.tick,
                world: &self.world,
                allocator: &self.allocator,
                enemies: &self.enemies,
                fleet: &self.fleet,
                config: &self.config,
            };
            decide(ship, 0, state, &view).unwrap()
        }
    }

    fn ship(id: &str, x: f64, y: f64, direction: Heading, speed: f64) -> ShipSnapshot {
        ShipSnapshot {
            id: ShipId::new(id),
            x,
            y,
            direction,
            speed,
            hp: Some(10),
            cannon_radius: 150.0,
            scan_radius: 300.0,
            ..ShipSnapshot::default()
        }
    }

    #[test]
    fn cooldown_treats_missing_and_future_turns_as_elapsed() {
        assert!(turn_cooled_down(None, 3, 5));
        assert!(turn_cooled_down(Some(10), 3, 5));
        assert!(!turn_cooled_down(Some(1), 5, 5));
        assert!(turn_cooled_down(Some(0), 5, 5));
    }

    #[test]
    fn invalid_fields_are_reported() {
        let fixture = Fixture::new();
        let mut broken = ship("x", 10.0, 10.0, Heading::North, 0.0);
        broken.speed = f64::INFINITY;
        let view = FleetView {
            tick: 0,
            world: &fixture.world,
            allocator: &fixture.allocator,
            enemies: &fixture.enemies,
            fleet: &fixture.fleet,
            config: &fixture.config,
        };
        let err = decide(&broken, 0, &mut ShipState::default(), &view).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidShip {
                field: ShipField::Speed,
                ..
            }
        ));
    }

    #[test]
    fn outside_the_zone_retreats_first() {
        let mut fixture = Fixture::new()
            .zone(1000.0, 1000.0, 300.0)
            .enemy(ship("e", 1550.0, 1000.0, Heading::North, 0.0));
        let me = ship("me", 1500.0, 1000.0, Heading::West, 1.0);
        let mut state = ShipState::default();
        let (command, decision) = fixture.decide(&me, &mut state);
        assert_eq!(decision, Decision::StormRetreat);
        assert_eq!(command.acceleration, Throttle::Accelerate);
        assert_eq!(command.rotate, Rotation::None);
        assert!(state.retreating);
        assert_eq!(state.retreat_started_tick, Some(1));
        // Snap fire still takes the shot.
        assert_eq!(command.cannon_shoot, Some(FirePoint { x: 1550, y: 1000 }));
    }

    #[test]
    fn retreat_flag_clears_inside_the_zone() {
        let mut fixture = Fixture::new().zone(1000.0, 1000.0, 300.0);
        let mut state = ShipState {
            retreating: true,
            retreat_started_tick: Some(0),
            ..ShipState::default()
        };
        let me = ship("me", 1000.0, 1000.0, Heading::North, 0.0);
        let (_, decision) = fixture.decide(&me, &mut state);
        assert_ne!(decision, Decision::StormRetreat);
        assert!(!state.retreating);
        assert_eq!(state.retreat_started_tick, None);
    }

    #[test]
    fn critical_border_risk_brakes_without_turning() {
        let mut fixture = Fixture::new();
        let me = ship("me", 1999.0, 1000.0, Heading::East, 2.0);
        let (command, decision) = fixture.decide(&me, &mut ShipState::default());
        assert_eq!(decision, Decision::CollisionAvoidance(RiskLevel::Critical));
        assert_eq!(command.acceleration, Throttle::Brake);
        assert_eq!(command.rotate, Rotation::None);
    }

    #[test]
    fn high_risk_turns_toward_a_safe_heading() {
        let mut fixture = Fixture::new();
        // stop = 2, margin 3.5 to the southern edge: within 2 * stop.
        let me = ship("me", 1000.0, 1996.5, Heading::South, 2.0);
        let mut state = ShipState::default();
        let (command, decision) = fixture.decide(&me, &mut state);
        assert_eq!(decision, Decision::CollisionAvoidance(RiskLevel::High));
        assert_eq!(command.acceleration, Throttle::Brake);
        // North is two steps away; the first step must land on a safe heading.
        assert!(command.rotate.is_turn());
        assert_eq!(state.last_turn_tick, Some(1));
    }

    #[test]
    fn storm_edge_steers_back_inside() {
        let mut fixture = Fixture::new().zone(1000.0, 1000.0, 400.0);
        // 5 ticks at speed 2 east lands 10 units from the edge.
        let me = ship("me", 1380.0, 1000.0, Heading::East, 2.0);
        let (command, decision) = fixture.decide(&me, &mut ShipState::default());
        assert_eq!(decision, Decision::StormAvoidance);
        assert_eq!(command.rotate, Rotation::Clockwise);
    }

    #[test]
    fn small_zone_haven_clears_the_warning_band() {
        let mut fixture = Fixture::new().zone(1000.0, 1000.0, 150.0);
        // 120 from the centre: inside the band, short of the haven at 60.
        let me = ship("me", 1120.0, 1000.0, Heading::West, 0.0);
        let (command, decision) = fixture.decide(&me, &mut ShipState::default());
        assert_eq!(decision, Decision::StormAvoidance);
        assert_eq!(command.acceleration, Throttle::Accelerate);
        assert_eq!(command.rotate, Rotation::None);

        // Parked on the arrival ring of the haven: storm avoidance lets go.
        let parked = ship("me", 1100.0, 1000.0, Heading::North, 0.0);
        let (_, decision) = fixture.decide(&parked, &mut ShipState::default());
        assert!(matches!(decision, Decision::Patrol(_)));

        // Drifting outward from the same spot is still caught.
        let drifting = ship("me", 1100.0, 1000.0, Heading::East, 1.0);
        let (_, decision) = fixture.decide(&drifting, &mut ShipState::default());
        assert_eq!(decision, Decision::StormAvoidance);
    }

    #[test]
    fn blocked_retreat_turn_holds_speed() {
        let mut fixture = Fixture::new().zone(1000.0, 1000.0, 300.0);
        fixture.tick = 10;
        let mut state = ShipState {
            last_turn_tick: Some(9),
            ..ShipState::default()
        };
        // Zone is due west, the ship points east and cannot turn yet.
        let me = ship("me", 1400.0, 1000.0, Heading::East, 1.0);
        let (command, decision) = fixture.decide(&me, &mut state);
        assert_eq!(decision, Decision::StormRetreat);
        assert_eq!(command.rotate, Rotation::None);
        assert_eq!(command.acceleration, Throttle::Hold);

        fixture.tick = 12;
        let (command, _) = fixture.decide(&me, &mut state);
        assert!(command.rotate.is_turn());
        assert_eq!(command.acceleration, Throttle::Accelerate);
    }

    #[test]
    fn assigned_target_is_engaged_and_shot() {
        let mut fixture =
            Fixture::new().enemy(ship("e", 1000.0, 1100.0, Heading::East, 3.0));
        let me = ship("me", 1000.0, 1000.0, Heading::East, 1.0);
        let mut state = ShipState {
            role: Role::Attacker,
            ..ShipState::default()
        };
        fixture.fleet.push(FleetMember {
            id: me.id.clone(),
            role: Role::Attacker,
            position: me.position(),
        });
        fixture
            .allocator
            .update(fixture.tick, &fixture.enemies, &fixture.fleet, &fixture.world);
        state.target = fixture
            .allocator
            .assigned_target(&me.id)
            .map(|(target, _)| target.clone());
        assert!(state.target.is_some());

        let (command, decision) = fixture.decide(&me, &mut state);
        assert_eq!(decision, Decision::EngageAssigned);
        assert_eq!(command.rotate, Rotation::Clockwise);
        // 100 units at 30 per tick, 3.33 ticks of lead at speed 3.
        assert_eq!(command.cannon_shoot, Some(FirePoint { x: 1010, y: 1100 }));
        // 100 is inside 0.8 * 150 and outside 0.6 * 150.
        assert_eq!(command.acceleration, Throttle::Hold);
    }

    #[test]
    fn stale_assignment_falls_through_to_opportunistic() {
        let mut fixture = Fixture::new().enemy(ship("near", 1060.0, 1000.0, Heading::North, 0.0));
        fixture.tick = 50;
        let mut state = ShipState {
            target: Some(ship("ghost", 1200.0, 1000.0, Heading::North, 0.0)),
            ..ShipState::default()
        };
        let me = ship("me", 1000.0, 1000.0, Heading::East, 1.0);
        let (command, decision) = fixture.decide(&me, &mut state);
        assert_eq!(decision, Decision::EngageOpportunistic);
        assert_eq!(command.cannon_shoot, Some(FirePoint { x: 1060, y: 1000 }));
        // 60 is inside 0.6 * 150: back off.
        assert_eq!(command.acceleration, Throttle::Brake);
    }

    #[test]
    fn enemies_outside_the_zone_are_not_chased() {
        let mut fixture = Fixture::new()
            .zone(1000.0, 1000.0, 200.0)
            .enemy(ship("out", 1000.0, 1250.0, Heading::North, 0.0));
        let me = ship("me", 1000.0, 1000.0, Heading::North, 0.0);
        let (_, decision) = fixture.decide(&me, &mut ShipState::default());
        assert!(matches!(decision, Decision::Patrol(_)));
    }

    #[test]
    fn patrol_never_turns_above_turn_speed() {
        let mut fixture = Fixture::new();
        let me = ship("me", 200.0, 1000.0, Heading::West, 2.5);
        let (command, decision) = fixture.decide(&me, &mut ShipState::default());
        // Turn risk claims the ship first and it brakes in a straight line.
        assert_eq!(decision, Decision::CollisionAvoidance(RiskLevel::Moderate));
        assert_eq!(command.rotate, Rotation::None);
        assert_eq!(command.acceleration, Throttle::Brake);
    }

    #[test]
    fn turn_cooldown_holds_course() {
        let mut fixture = Fixture::new();
        fixture.tick = 10;
        let mut state = ShipState {
            role: Role::Attacker,
            last_turn_tick: Some(9),
            ..ShipState::default()
        };
        // Map centre is due south.
        let me = ship("me", 1000.0, 400.0, Heading::East, 1.0);
        let (command, decision) = fixture.decide(&me, &mut state);
        assert_eq!(decision, Decision::Patrol(Behavior::Hunt));
        assert_eq!(command.rotate, Rotation::None);
        assert_eq!(state.last_turn_tick, Some(9));

        fixture.tick = 12;
        let (command, _) = fixture.decide(&me, &mut state);
        assert_eq!(command.rotate, Rotation::Clockwise);
        assert_eq!(state.last_turn_tick, Some(12));
    }
}
