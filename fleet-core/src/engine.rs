use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cascade::{self, Decision, FleetView};
use crate::constants::{PROJECTILE_SPEED, TARGET_RERANK_INTERVAL_TICKS, TARGET_STALE_TICKS};
use crate::error::EngineError;
use crate::geometry::{Point, Positioned};
use crate::roles::{FleetMember, PatrolMemory, Role};
use crate::snapshot::{MapSnapshot, ScanSnapshot, ShipCommand, ShipId, ShipSnapshot};
use crate::targeting::{SizeHeuristic, TargetAllocator};
use crate::world::WorldModel;

/// Tunables for one engine instance. Every field has a default, so a partial
/// JSON file is enough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub size_heuristic: SizeHeuristic,
    /// Fire at anything in range even while retreating, evading or patrolling.
    pub snap_fire: bool,
    pub projectile_speed: f64,
    pub rerank_interval_ticks: u64,
    pub stale_target_ticks: u64,
    /// Evaluate ships on the rayon pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            size_heuristic: SizeHeuristic::default(),
            snap_fire: true,
            projectile_speed: PROJECTILE_SPEED,
            rerank_interval_ticks: TARGET_RERANK_INTERVAL_TICKS,
            stale_target_ticks: TARGET_STALE_TICKS,
            parallel: true,
        }
    }
}

/// Memory the engine keeps for one friendly ship between ticks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShipState {
    pub role: Role,
    pub retreating: bool,
    pub retreat_started_tick: Option<u64>,
    pub last_turn_tick: Option<u64>,
    /// Assigned enemy at its latest known position.
    pub target: Option<ShipSnapshot>,
    pub target_priority: f64,
    pub last_position: Point,
    pub last_seen_tick: u64,
    pub patrol: PatrolMemory,
}

impl ShipState {
    pub fn new(role: Role, position: Point, tick: u64) -> Self {
        Self {
            role,
            last_position: position,
            last_seen_tick: tick,
            ..Self::default()
        }
    }
}

/// A command plus the cascade state that produced it. `decision` is `None`
/// when the ship could not be evaluated and was left idle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShipDecision {
    pub command: ShipCommand,
    pub decision: Option<Decision>,
}

pub struct Engine {
    config: EngineConfig,
    world: WorldModel,
    allocator: TargetAllocator,
    states: HashMap<ShipId, ShipState>,
}

struct ShipWork<'a> {
    index: usize,
    ship: &'a ShipSnapshot,
    state: ShipState,
}

impl Engine {
    pub fn new(map: &MapSnapshot, config: EngineConfig) -> Result<Self, EngineError> {
        let world = WorldModel::new(map)?;
        let allocator = TargetAllocator::new(
            config.rerank_interval_ticks,
            config.stale_target_ticks,
            config.size_heuristic,
        );
        tracing::info!(
            width = map.width(),
            height = map.height(),
            obstacles = map.obstacles.len(),
            blocked_cells = world.blocked_count(),
            "engine ready"
        );
        Ok(Self {
            config,
            world,
            allocator,
            states: HashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    pub fn allocator(&self) -> &TargetAllocator {
        &self.allocator
    }

    pub fn ship_state(&self, id: &ShipId) -> Option<&ShipState> {
        self.states.get(id)
    }

    /// Forgets every ship, sighting and assignment. The map is kept.
    pub fn reset(&mut self) {
        self.states.clear();
        self.allocator.reset();
        self.world.update_danger_zone(None, 0);
    }

    pub fn tick(&mut self, scan: &ScanSnapshot) -> Vec<ShipCommand> {
        self.tick_detailed(scan)
            .into_iter()
            .map(|decision| decision.command)
            .collect()
    }

    /// One command per living ship, in scan order.
    pub fn tick_detailed(&mut self, scan: &ScanSnapshot) -> Vec<ShipDecision> {
        let tick = scan.tick;
        self.world.update_danger_zone(scan.zone, tick);

        let living: Vec<&ShipSnapshot> = scan.living_ships().collect();
        let fleet: Vec<FleetMember> = living
            .iter()
            .map(|ship| self.observe(ship, tick))
            .collect();
        let enemies: Vec<ShipSnapshot> = scan
            .enemy_ships
            .iter()
            .filter(|enemy| enemy.is_alive())
            .cloned()
            .collect();

        if self
            .allocator
            .update(tick, &scan.enemy_ships, &fleet, &self.world)
        {
            for (id, assignment) in self.allocator.assignments() {
                tracing::debug!(
                    tick,
                    ship = %id,
                    target = %assignment.target,
                    priority = assignment.priority,
                    "assigned"
                );
            }
        }

        let mut work: Vec<ShipWork<'_>> = living
            .iter()
            .enumerate()
            .map(|(index, &ship)| {
                let mut state = self.states.remove(&ship.id).unwrap_or_default();
                match self.allocator.assigned_target(&ship.id) {
                    Some((target, priority)) => {
                        state.target = Some(target.clone());
                        state.target_priority = priority;
                    }
                    None => {
                        state.target = None;
                        state.target_priority = 0.0;
                    }
                }
                ShipWork {
                    index,
                    ship,
                    state,
                }
            })
            .collect();

        let view = FleetView {
            tick,
            world: &self.world,
            allocator: &self.allocator,
            enemies: &enemies,
            fleet: &fleet,
            config: &self.config,
        };
        let decisions: Vec<ShipDecision> = if self.config.parallel {
            work.par_iter_mut()
                .map(|item| evaluate(&view, item))
                .collect()
        } else {
            work.iter_mut().map(|item| evaluate(&view, item)).collect()
        };

        for item in work {
            self.states.insert(item.ship.id.clone(), item.state);
        }

        tracing::debug!(
            tick,
            ships = decisions.len(),
            enemies = enemies.len(),
            zone = self.world.danger_zone().is_some(),
            "tick evaluated"
        );
        decisions
    }

    /// Refreshes (or creates) the ship's state and returns its roster entry.
    ///
    /// The role is derived when the state is created and kept from then on.
    fn observe(&mut self, ship: &ShipSnapshot, tick: u64) -> FleetMember {
        let heuristic = self.config.size_heuristic;
        let position = ship.position();
        let fresh = || ShipState::new(Role::from_size(heuristic.estimate(ship)), position, tick);
        let state = self.states.entry(ship.id.clone()).or_insert_with(fresh);
        if state.last_seen_tick > tick {
            // A tick from before our last sighting means a new match.
            *state = fresh();
        }
        state.last_position = position;
        state.last_seen_tick = tick;

        FleetMember {
            id: ship.id.clone(),
            role: state.role,
            position,
        }
    }
}

fn evaluate(view: &FleetView<'_>, item: &mut ShipWork<'_>) -> ShipDecision {
    match cascade::decide(item.ship, item.index, &mut item.state, view) {
        Ok((command, decision)) => {
            tracing::trace!(tick = view.tick, ship = %item.ship.id, ?decision, ?command, "decided");
            ShipDecision {
                command,
                decision: Some(decision),
            }
        }
        Err(err) => {
            tracing::warn!(tick = view.tick, ship = %item.ship.id, "ship left idle: {err}");
            ShipDecision {
                command: ShipCommand::idle(item.ship.id.clone()),
                decision: None,
            }
        }
    }
}
