//! Deterministic local arena: a small stand-in for the game server that
//! speaks the same snapshot and command types.

use anyhow::{bail, Result};
use fleet_core::geometry::{direction_to, Point, Positioned};
use fleet_core::world::{hull_margin, WorldModel};
use fleet_core::{
    CommandBatch, DangerZone, EngineConfig, FirePoint, MapSnapshot, Obstacle,
    ScanSnapshot, ShipCommand, ShipId, ShipSnapshot, Throttle,
};
use serde::{Deserialize, Serialize};

use crate::rng::SeededRng;
use crate::runner::{run_loop, RunMetrics, RunOptions};
use crate::transport::Transport;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: u32,
    pub height: u32,
    pub own_ships: usize,
    pub enemy_ships: usize,
    pub obstacle_blocks: usize,
    pub max_ticks: u64,
    pub max_speed: f64,
    pub ship_hp: i32,
    pub cannon_damage: i32,
    pub cannon_radius: f64,
    pub scan_radius: f64,
    pub cannon_cooldown: i32,
    /// Shots land on ships within this distance of the aim point.
    pub hit_radius: f64,
    pub zone_start_tick: u64,
    pub zone_shrink_per_tick: f64,
    pub zone_min_radius: f64,
    pub storm_damage: i32,
    /// Ticks a ship may spend outside the zone before the storm bites.
    pub storm_grace_ticks: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            own_ships: 5,
            enemy_ships: 5,
            obstacle_blocks: 8,
            max_ticks: 600,
            max_speed: 5.0,
            ship_hp: 100,
            cannon_damage: 20,
            cannon_radius: 120.0,
            scan_radius: 250.0,
            cannon_cooldown: 3,
            hit_radius: 6.0,
            zone_start_tick: 60,
            zone_shrink_per_tick: 0.75,
            zone_min_radius: 120.0,
            storm_damage: 5,
            storm_grace_ticks: 5,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStats {
    pub shots_fired: u64,
    pub hits: u64,
    pub kills: u64,
    pub losses: u64,
    pub collisions: u64,
    pub storm_deaths: u64,
    pub enemy_shots: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaSummary {
    pub seed: u32,
    pub ticks: u64,
    pub own_total: usize,
    pub own_alive: usize,
    pub enemies_total: usize,
    pub enemies_alive: usize,
    pub won: bool,
    pub stats: ArenaStats,
}

#[derive(Clone, Debug)]
struct ArenaShip {
    snapshot: ShipSnapshot,
    storm_ticks: u32,
}

impl ArenaShip {
    fn alive(&self) -> bool {
        self.snapshot.is_alive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Own,
    Enemy,
}

#[derive(Clone, Copy, Debug)]
struct Shot {
    side: Side,
    at: Point,
}

/// Seeded match simulator. Implements [`Transport`] so the runner can drive
/// it exactly like a live game.
pub struct Arena {
    seed: u32,
    config: ArenaConfig,
    rng: SeededRng,
    map: MapSnapshot,
    world: WorldModel,
    tick: u64,
    own: Vec<ArenaShip>,
    enemies: Vec<ArenaShip>,
    zone: Option<DangerZone>,
    stats: ArenaStats,
}

impl Arena {
    pub fn new(seed: u32, config: ArenaConfig) -> Result<Self> {
        if config.width < 200 || config.height < 200 {
            bail!("arena must be at least 200x200, got {}x{}", config.width, config.height);
        }
        let mut rng = SeededRng::new(seed);
        let map = generate_map(&mut rng, &config);
        let world = WorldModel::new(&map)?;

        let mut arena = Self {
            seed,
            config,
            rng,
            map,
            world,
            tick: 0,
            own: Vec::new(),
            enemies: Vec::new(),
            zone: None,
            stats: ArenaStats::default(),
        };
        arena.own = (0..arena.config.own_ships)
            .map(|i| arena.spawn(format!("ally-{}", i + 1), Some(1 + (i % 5) as u32), Side::Own))
            .collect();
        arena.enemies = (0..arena.config.enemy_ships)
            .map(|i| arena.spawn(format!("enemy-{}", i + 1), None, Side::Enemy))
            .collect();
        Ok(arena)
    }

    pub fn map(&self) -> &MapSnapshot {
        &self.map
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_over(&self) -> bool {
        self.tick >= self.config.max_ticks
            || !self.own.iter().any(ArenaShip::alive)
            || !self.enemies.iter().any(ArenaShip::alive)
    }

    pub fn summary(&self) -> ArenaSummary {
        let own_alive = self.own.iter().filter(|ship| ship.alive()).count();
        let enemies_alive = self.enemies.iter().filter(|ship| ship.alive()).count();
        ArenaSummary {
            seed: self.seed,
            ticks: self.tick,
            own_total: self.own.len(),
            own_alive,
            enemies_total: self.enemies.len(),
            enemies_alive,
            won: own_alive > 0 && enemies_alive == 0,
            stats: self.stats.clone(),
        }
    }

    /// Own ships spawn in the western third, enemies in the eastern third.
    fn spawn(&mut self, id: String, size: Option<u32>, side: Side) -> ArenaShip {
        let (width, height) = self.world.bounds();
        let (min_x, max_x) = match side {
            Side::Own => (60.0, width / 3.0),
            Side::Enemy => (width * 2.0 / 3.0, width - 60.0),
        };
        let mut at = Point::new(min_x, height / 2.0);
        for _ in 0..64 {
            let candidate = Point::new(
                self.rng.between(min_x, max_x).floor() + 0.5,
                self.rng.between(60.0, height - 60.0).floor() + 0.5,
            );
            if !self.world.is_blocked(candidate.x, candidate.y) {
                at = candidate;
                break;
            }
        }
        ArenaShip {
            snapshot: ShipSnapshot {
                id: ShipId::new(id),
                x: at.x,
                y: at.y,
                direction: self.rng.heading(),
                speed: 0.0,
                hp: Some(self.config.ship_hp),
                cannon_cooldown_left: 0,
                cannon_radius: self.config.cannon_radius,
                scan_radius: self.config.scan_radius,
                size,
            },
            storm_ticks: 0,
        }
    }

    fn scan(&self) -> ScanSnapshot {
        let my_ships: Vec<ShipSnapshot> = self
            .own
            .iter()
            .filter(|ship| ship.alive())
            .map(|ship| ship.snapshot.clone())
            .collect();
        let enemy_ships = self
            .enemies
            .iter()
            .filter(|enemy| enemy.alive())
            .filter(|enemy| {
                my_ships.iter().any(|mine| {
                    mine.position().distance(enemy.snapshot.position()) <= mine.scan_radius
                })
            })
            .map(|enemy| enemy.snapshot.clone())
            .collect();
        ScanSnapshot {
            tick: self.tick,
            my_ships,
            enemy_ships,
            zone: self.zone,
        }
    }

    /// Advances the match by one tick using `commands` for the own fleet.
    pub fn step(&mut self, commands: &[ShipCommand]) {
        let mut shots = Vec::new();

        for command in commands {
            let Some(ship) = self
                .own
                .iter_mut()
                .find(|ship| ship.alive() && ship.snapshot.id == command.id)
            else {
                continue;
            };
            apply_command(&mut ship.snapshot, command, self.config.max_speed);
            if let Some(target) = command.cannon_shoot {
                if let Some(shot) = fire(&mut ship.snapshot, target, self.config.cannon_cooldown) {
                    shots.push(Shot {
                        side: Side::Own,
                        at: shot,
                    });
                    self.stats.shots_fired += 1;
                }
            }
        }

        self.steer_enemies(&mut shots);
        self.move_ships();
        self.resolve_shots(&shots);
        self.update_zone();
        self.apply_storm();

        for ship in self.own.iter_mut().chain(self.enemies.iter_mut()) {
            let cooldown = &mut ship.snapshot.cannon_cooldown_left;
            *cooldown = (*cooldown - 1).max(0);
        }
        self.tick += 1;
    }

    /// Enemies cruise, turn toward the nearest visible own ship now and then,
    /// and shoot straight at it when in range.
    fn steer_enemies(&mut self, shots: &mut Vec<Shot>) {
        let targets: Vec<Point> = self
            .own
            .iter()
            .filter(|ship| ship.alive())
            .map(|ship| ship.snapshot.position())
            .collect();
        let cooldown = self.config.cannon_cooldown;

        for enemy in self.enemies.iter_mut().filter(|enemy| enemy.alive()) {
            let ship = &mut enemy.snapshot;
            let position = ship.position();
            let nearest = targets.iter().copied().min_by(|a, b| {
                a.distance(position).total_cmp(&b.distance(position))
            });

            let mut command = ShipCommand::idle(ship.id.clone());
            command.acceleration = if ship.speed < 1.0 {
                Throttle::Accelerate
            } else if ship.speed > 2.0 {
                Throttle::Brake
            } else {
                Throttle::Hold
            };
            if ship.speed <= 2.0 && self.rng.chance(0.2) {
                let desired = match nearest {
                    Some(target) if target.distance(position) <= ship.scan_radius => {
                        direction_to(position, target)
                    }
                    _ => self.rng.heading(),
                };
                command.rotate = ship.direction.rotation_to(desired);
            }
            let edge_ahead = position.advanced(ship.direction, 40.0);
            if self.world.is_out_of_bounds(edge_ahead.x, edge_ahead.y, 0.0) {
                command.acceleration = Throttle::Brake;
                if ship.speed <= 2.0 {
                    command.rotate = ship.direction.rotation_to(ship.direction.opposite());
                }
            }
            apply_command(ship, &command, self.config.max_speed);

            let in_range = nearest.filter(|target| target.distance(position) <= ship.cannon_radius);
            if let Some(target) = in_range {
                if let Some(at) = fire(ship, FirePoint::from(target), cooldown) {
                    shots.push(Shot {
                        side: Side::Enemy,
                        at,
                    });
                    self.stats.enemy_shots += 1;
                }
            }
        }
    }

    fn move_ships(&mut self) {
        let world = &self.world;
        let stats = &mut self.stats;
        for (side, fleet) in [(Side::Own, &mut self.own), (Side::Enemy, &mut self.enemies)] {
            for ship in fleet.iter_mut().filter(|ship| ship.alive()) {
                let snapshot = &mut ship.snapshot;
                let next = snapshot.position().advanced(snapshot.direction, snapshot.speed);
                snapshot.x = next.x;
                snapshot.y = next.y;
                let margin = hull_margin(snapshot.size);
                if world.is_out_of_bounds(next.x, next.y, margin) || world.is_blocked(next.x, next.y) {
                    snapshot.hp = Some(0);
                    snapshot.speed = 0.0;
                    stats.collisions += 1;
                    tracing::debug!(ship = %snapshot.id, ?side, "ran aground");
                    match side {
                        Side::Own => stats.losses += 1,
                        Side::Enemy => stats.kills += 1,
                    }
                }
            }
        }
    }

    fn resolve_shots(&mut self, shots: &[Shot]) {
        let damage = self.config.cannon_damage;
        let radius = self.config.hit_radius;
        for shot in shots {
            let (victims, hits_enemy) = match shot.side {
                Side::Own => (&mut self.enemies, true),
                Side::Enemy => (&mut self.own, false),
            };
            for victim in victims.iter_mut().filter(|ship| ship.alive()) {
                if victim.snapshot.position().distance(shot.at) > radius {
                    continue;
                }
                let hp = victim.snapshot.hp.unwrap_or(0) - damage;
                victim.snapshot.hp = Some(hp.max(0));
                if hits_enemy {
                    self.stats.hits += 1;
                }
                if hp <= 0 {
                    if hits_enemy {
                        self.stats.kills += 1;
                    } else {
                        self.stats.losses += 1;
                    }
                }
            }
        }
    }

    fn update_zone(&mut self) {
        if self.tick < self.config.zone_start_tick {
            return;
        }
        let (width, height) = self.world.bounds();
        let initial = width.min(height) / 2.0 + 100.0;
        let elapsed = (self.tick - self.config.zone_start_tick) as f64;
        let radius = (initial - elapsed * self.config.zone_shrink_per_tick)
            .max(self.config.zone_min_radius);
        self.zone = Some(DangerZone {
            x: width / 2.0,
            y: height / 2.0,
            radius,
        });
    }

    fn apply_storm(&mut self) {
        let Some(zone) = self.zone else {
            return;
        };
        for (side, fleet) in [(Side::Own, &mut self.own), (Side::Enemy, &mut self.enemies)] {
            for ship in fleet.iter_mut().filter(|ship| ship.alive()) {
                if zone.contains(ship.snapshot.position()) {
                    ship.storm_ticks = 0;
                    continue;
                }
                ship.storm_ticks += 1;
                if ship.storm_ticks <= self.config.storm_grace_ticks {
                    continue;
                }
                let hp = ship.snapshot.hp.unwrap_or(0) - self.config.storm_damage;
                ship.snapshot.hp = Some(hp.max(0));
                if hp <= 0 {
                    self.stats.storm_deaths += 1;
                    match side {
                        Side::Own => self.stats.losses += 1,
                        Side::Enemy => self.stats.kills += 1,
                    }
                }
            }
        }
    }
}

impl Transport for Arena {
    fn fetch_map(&mut self) -> Result<MapSnapshot> {
        Ok(self.map.clone())
    }

    fn fetch_scan(&mut self) -> Result<Option<ScanSnapshot>> {
        if self.is_over() {
            return Ok(None);
        }
        Ok(Some(self.scan()))
    }

    fn submit(&mut self, batch: &CommandBatch) -> Result<()> {
        self.step(&batch.ships);
        Ok(())
    }
}

fn apply_command(ship: &mut ShipSnapshot, command: &ShipCommand, max_speed: f64) {
    ship.direction = ship.direction.rotated(command.rotate);
    ship.speed = (ship.speed + f64::from(command.acceleration.value())).clamp(0.0, max_speed);
}

/// Fires if the cannon is ready and the target within range. Returns the
/// landing point.
fn fire(ship: &mut ShipSnapshot, target: FirePoint, cooldown: i32) -> Option<Point> {
    let at = Point::new(target.x as f64, target.y as f64);
    if !ship.cannon_ready() || ship.position().distance(at) > ship.cannon_radius {
        return None;
    }
    ship.cannon_cooldown_left = cooldown;
    Some(at)
}

/// Rectangular islands scattered through the middle of the map, clear of
/// both spawn bands.
fn generate_map(rng: &mut SeededRng, config: &ArenaConfig) -> MapSnapshot {
    let (width, height) = (config.width as f64, config.height as f64);
    let obstacles = (0..config.obstacle_blocks)
        .map(|_| {
            let cols = 10 + rng.below(30) as usize;
            let rows = 10 + rng.below(30) as usize;
            let x = rng.between(width / 3.0 + 20.0, width * 2.0 / 3.0 - 60.0) as i64;
            let y = rng.between(40.0, height - 80.0) as i64;
            Obstacle {
                origin: [x, y],
                mask: vec![vec![1; cols]; rows],
            }
        })
        .collect();
    MapSnapshot::new(config.width, config.height, obstacles)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub arena: ArenaSummary,
    pub run: RunMetrics,
}

/// Plays one full arena match with a fresh engine.
pub fn play_match(seed: u32, arena: &ArenaConfig, engine: &EngineConfig) -> Result<MatchOutcome> {
    let mut transport = Arena::new(seed, arena.clone())?;
    let options = RunOptions {
        max_ticks: arena.max_ticks,
        poll_interval: None,
        engine: engine.clone(),
    };
    let run = run_loop(&mut transport, &options)?;
    let summary = transport.summary();
    tracing::info!(
        seed,
        ticks = summary.ticks,
        survivors = summary.own_alive,
        kills = summary.stats.kills,
        won = summary.won,
        "match finished"
    );
    Ok(MatchOutcome {
        arena: summary,
        run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Heading;

    #[test]
    fn arena_setup_is_seeded() {
        let a = Arena::new(9, ArenaConfig::default()).unwrap();
        let b = Arena::new(9, ArenaConfig::default()).unwrap();
        let c = Arena::new(10, ArenaConfig::default()).unwrap();
        assert_eq!(a.map(), b.map());
        assert_ne!(a.map(), c.map());
        assert_eq!(a.scan(), b.scan());
        assert_eq!(a.scan().my_ships.len(), 5);
    }

    #[test]
    fn spawns_keep_clear_of_islands() {
        let arena = Arena::new(3, ArenaConfig::default()).unwrap();
        for ship in arena.own.iter().chain(arena.enemies.iter()) {
            assert!(!arena.world.is_blocked(ship.snapshot.x, ship.snapshot.y));
        }
    }

    #[test]
    fn shots_need_range_and_a_ready_cannon() {
        let mut ship = ShipSnapshot {
            x: 100.0,
            y: 100.0,
            cannon_radius: 50.0,
            ..ShipSnapshot::default()
        };
        assert!(fire(&mut ship, FirePoint { x: 300, y: 100 }, 3).is_none());
        assert_eq!(
            fire(&mut ship, FirePoint { x: 130, y: 100 }, 3),
            Some(Point::new(130.0, 100.0))
        );
        assert_eq!(ship.cannon_cooldown_left, 3);
        assert!(fire(&mut ship, FirePoint { x: 130, y: 100 }, 3).is_none());
    }

    #[test]
    fn sailing_off_the_map_sinks_the_ship() {
        let mut arena = Arena::new(5, ArenaConfig::default()).unwrap();
        let ship = &mut arena.own[0].snapshot;
        ship.x = 2.0;
        ship.y = 500.0;
        ship.direction = Heading::West;
        ship.speed = 3.0;
        arena.move_ships();
        assert!(!arena.own[0].alive());
        assert_eq!(arena.stats.collisions, 1);
        assert_eq!(arena.stats.losses, 1);
    }

    #[test]
    fn storm_bites_after_the_grace_period() {
        let config = ArenaConfig {
            zone_start_tick: 0,
            storm_grace_ticks: 2,
            ..ArenaConfig::default()
        };
        let mut arena = Arena::new(5, config).unwrap();
        arena.update_zone();
        let ship = &mut arena.own[0];
        ship.snapshot.x = 5.0;
        ship.snapshot.y = 5.0;
        for _ in 0..3 {
            arena.apply_storm();
        }
        assert_eq!(arena.own[0].snapshot.hp, Some(95));
    }
}
