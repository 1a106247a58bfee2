//! Fleet-wide target ranking and the greedy one-target-per-ship auction.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::constants::{
    AUCTION_BASE_SCORE, AUCTION_REASSIGN_PENALTY, MAX_SHIP_SIZE, PROXIMITY_BONUS_FALLOFF,
    PROXIMITY_BONUS_MAX, SIZE_PRIORITY_WEIGHT,
};
use crate::geometry::{Point, Positioned};
use crate::roles::FleetMember;
use crate::snapshot::{ShipId, ShipSnapshot};
use crate::world::WorldModel;

/// How to infer a hull size when the payload does not report one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeHeuristic {
    /// Trailing decimal digit of the id, folded into `1..=5`.
    #[default]
    IdSuffix,
    /// Slower hulls are larger: `6 - ceil(speed)`, clamped to `1..=5`.
    Speed,
}

impl SizeHeuristic {
    /// Reported size if present, otherwise this heuristic's guess.
    pub fn estimate(self, ship: &ShipSnapshot) -> Option<u32> {
        if let Some(size) = ship.size {
            return Some(size);
        }
        match self {
            Self::IdSuffix => size_from_id_suffix(&ship.id),
            Self::Speed => size_from_speed(ship.speed),
        }
    }
}

fn size_from_id_suffix(id: &ShipId) -> Option<u32> {
    let digit = id.as_str().chars().last()?.to_digit(10)?;
    Some(1 + digit % MAX_SHIP_SIZE)
}

fn size_from_speed(speed: f64) -> Option<u32> {
    if !speed.is_finite() {
        return None;
    }
    let size = (6.0 - speed.max(0.0).ceil()).clamp(1.0, MAX_SHIP_SIZE as f64);
    Some(size as u32)
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankedEnemy {
    pub enemy: ShipSnapshot,
    pub priority: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub target: ShipId,
    pub priority: f64,
    pub assigned_tick: u64,
}

#[derive(Clone, Debug)]
struct Sighting {
    tick: u64,
    snapshot: ShipSnapshot,
}

/// Ranks enemies and assigns at most one per ship, re-running the auction
/// every `rerank_interval` ticks.
#[derive(Clone, Debug)]
pub struct TargetAllocator {
    rerank_interval: u64,
    stale_ticks: u64,
    heuristic: SizeHeuristic,
    ranked: Vec<RankedEnemy>,
    assignments: BTreeMap<ShipId, Assignment>,
    sightings: HashMap<ShipId, Sighting>,
    last_rank_tick: Option<u64>,
}

impl TargetAllocator {
    pub fn new(rerank_interval: u64, stale_ticks: u64, heuristic: SizeHeuristic) -> Self {
        Self {
            rerank_interval: rerank_interval.max(1),
            stale_ticks,
            heuristic,
            ranked: Vec::new(),
            assignments: BTreeMap::new(),
            sightings: HashMap::new(),
            last_rank_tick: None,
        }
    }

    pub fn reset(&mut self) {
        self.ranked.clear();
        self.assignments.clear();
        self.sightings.clear();
        self.last_rank_tick = None;
    }

    /// Records sightings, then re-ranks and re-auctions when due.
    ///
    /// `enemies` is the full scan list. Enemies reported with no hit points
    /// are forgotten at once, together with any assignment on them.
    ///
    /// Returns whether a new auction ran this tick.
    pub fn update(
        &mut self,
        tick: u64,
        enemies: &[ShipSnapshot],
        fleet: &[FleetMember],
        world: &WorldModel,
    ) -> bool {
        if self.last_rank_tick.map_or(false, |last| tick < last) {
            // Tick went backwards: a new match.
            self.reset();
        }

        for enemy in enemies {
            if enemy.is_alive() {
                self.sightings.insert(
                    enemy.id.clone(),
                    Sighting {
                        tick,
                        snapshot: enemy.clone(),
                    },
                );
            } else if self.sightings.remove(&enemy.id).is_some() {
                tracing::debug!(tick, enemy = %enemy.id, "enemy destroyed");
            }
        }
        // Assignments never outlive the sighting of their target.
        let sightings = &self.sightings;
        self.assignments
            .retain(|_, assignment| sightings.contains_key(&assignment.target));

        let due = self
            .last_rank_tick
            .map_or(true, |last| tick - last >= self.rerank_interval);
        if !due {
            self.assignments
                .retain(|ship, _| fleet.iter().any(|member| &member.id == ship));
            return false;
        }

        self.ranked = rank_enemies(enemies, fleet, self.heuristic);
        let previous = std::mem::take(&mut self.assignments);
        self.assignments = auction(&self.ranked, fleet, world, &previous, tick);
        self.last_rank_tick = Some(tick);

        tracing::debug!(
            tick,
            ranked = self.ranked.len(),
            assigned = self.assignments.len(),
            "target auction"
        );
        true
    }

    pub fn ranked(&self) -> &[RankedEnemy] {
        &self.ranked
    }

    pub fn assignments(&self) -> &BTreeMap<ShipId, Assignment> {
        &self.assignments
    }

    pub fn assignment(&self, ship: &ShipId) -> Option<&Assignment> {
        self.assignments.get(ship)
    }

    /// Latest known snapshot of the ship's assigned enemy.
    pub fn assigned_target(&self, ship: &ShipId) -> Option<(&ShipSnapshot, f64)> {
        let assignment = self.assignments.get(ship)?;
        let sighting = self.sightings.get(&assignment.target)?;
        Some((&sighting.snapshot, assignment.priority))
    }

    pub fn last_seen_tick(&self, enemy: &ShipId) -> Option<u64> {
        self.sightings.get(enemy).map(|sighting| sighting.tick)
    }

    /// Unknown enemies are stale. A future sighting tick counts as fresh.
    pub fn is_stale(&self, enemy: &ShipId, tick: u64) -> bool {
        match self.last_seen_tick(enemy) {
            Some(seen) => tick.saturating_sub(seen) >= self.stale_ticks,
            None => true,
        }
    }

    /// Highest ranked enemy that is still fresh, at its latest known position.
    pub fn top_target(&self, tick: u64) -> Option<&ShipSnapshot> {
        self.ranked
            .iter()
            .filter(|ranked| !self.is_stale(&ranked.enemy.id, tick))
            .find_map(|ranked| self.sightings.get(&ranked.enemy.id))
            .map(|sighting| &sighting.snapshot)
    }
}

/// Priority of one enemy: hull-size weight plus a proximity bonus summed over
/// the fleet.
pub fn enemy_priority(
    enemy: &ShipSnapshot,
    fleet: &[FleetMember],
    heuristic: SizeHeuristic,
) -> f64 {
    let size = heuristic.estimate(enemy).unwrap_or(1) as f64;
    let position = enemy.position();
    let proximity: f64 = fleet
        .iter()
        .map(|member| {
            (PROXIMITY_BONUS_MAX - member.position.distance(position) / PROXIMITY_BONUS_FALLOFF)
                .max(0.0)
        })
        .sum();
    size * SIZE_PRIORITY_WEIGHT + proximity
}

pub fn rank_enemies(
    enemies: &[ShipSnapshot],
    fleet: &[FleetMember],
    heuristic: SizeHeuristic,
) -> Vec<RankedEnemy> {
    let mut ranked: Vec<RankedEnemy> = enemies
        .iter()
        .filter(|enemy| enemy.is_alive())
        .map(|enemy| RankedEnemy {
            priority: enemy_priority(enemy, fleet, heuristic),
            enemy: enemy.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.enemy.id.cmp(&b.enemy.id))
    });
    ranked
}

fn bid(
    member: &FleetMember,
    target: Point,
    target_id: &ShipId,
    previous: &BTreeMap<ShipId, Assignment>,
) -> f64 {
    let mut score =
        AUCTION_BASE_SCORE - member.position.distance(target) + member.role.auction_bonus();
    if previous
        .get(&member.id)
        .map_or(false, |held| &held.target != target_id)
    {
        score -= AUCTION_REASSIGN_PENALTY;
    }
    score
}

/// Greedy auction: each enemy, best first, goes to the highest bidder among
/// the ships still free. Enemies outside the danger zone are skipped.
pub fn auction(
    ranked: &[RankedEnemy],
    fleet: &[FleetMember],
    world: &WorldModel,
    previous: &BTreeMap<ShipId, Assignment>,
    tick: u64,
) -> BTreeMap<ShipId, Assignment> {
    let mut free: Vec<&FleetMember> = fleet
        .iter()
        .filter(|member| member.position.is_finite())
        .collect();
    let mut assignments = BTreeMap::new();

    for ranked_enemy in ranked {
        if free.is_empty() {
            break;
        }
        let target = ranked_enemy.enemy.position();
        if world.is_outside_danger_zone(target) {
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        for (slot, member) in free.iter().enumerate() {
            let score = bid(member, target, &ranked_enemy.enemy.id, previous);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((slot, score));
            }
        }

        if let Some((slot, _)) = best {
            let winner = free.remove(slot);
            assignments.insert(
                winner.id.clone(),
                Assignment {
                    target: ranked_enemy.enemy.id.clone(),
                    priority: ranked_enemy.priority,
                    assigned_tick: tick,
                },
            );
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::snapshot::{DangerZone, MapSnapshot};
    use std::collections::HashSet;

    fn enemy(id: &str, x: f64, y: f64, size: u32) -> ShipSnapshot {
        ShipSnapshot {
            id: ShipId::new(id),
            x,
            y,
            size: Some(size),
            ..ShipSnapshot::default()
        }
    }

    fn member(id: &str, x: f64, y: f64, role: Role) -> FleetMember {
        FleetMember {
            id: ShipId::new(id),
            role,
            position: Point::new(x, y),
        }
    }

    fn world() -> WorldModel {
        WorldModel::new(&MapSnapshot::new(2000, 2000, Vec::new())).unwrap()
    }

    #[test]
    fn size_heuristics_can_disagree() {
        let mut ship = ShipSnapshot {
            id: ShipId::new("ship-7"),
            speed: 1.0,
            ..ShipSnapshot::default()
        };
        assert_eq!(SizeHeuristic::IdSuffix.estimate(&ship), Some(3));
        assert_eq!(SizeHeuristic::Speed.estimate(&ship), Some(5));

        ship.id = ShipId::new("ship-x");
        assert_eq!(SizeHeuristic::IdSuffix.estimate(&ship), None);

        ship.size = Some(2);
        assert_eq!(SizeHeuristic::Speed.estimate(&ship), Some(2));
    }

    #[test]
    fn proximity_bonus_is_summed_and_floored() {
        let fleet = [member("a", 0.0, 0.0, Role::Scout), member("b", 500.0, 0.0, Role::Scout)];
        let target = enemy("e", 100.0, 0.0, 1);
        // 50 (size) + (100 - 10) + (100 - 40)
        assert_eq!(enemy_priority(&target, &fleet, SizeHeuristic::IdSuffix), 200.0);

        let far = enemy("f", 5000.0, 0.0, 1);
        assert_eq!(enemy_priority(&far, &fleet, SizeHeuristic::IdSuffix), 50.0);
    }

    #[test]
    fn larger_enemy_is_assigned_first_to_the_best_bidder() {
        let fleet = [
            member("scout", 100.0, 100.0, Role::Scout),
            member("attacker", 100.0, 100.0, Role::Attacker),
        ];
        let enemies = [enemy("small", 300.0, 100.0, 1), enemy("big", 100.0, 300.0, 5)];
        let ranked = rank_enemies(&enemies, &fleet, SizeHeuristic::IdSuffix);
        assert_eq!(ranked[0].enemy.id, ShipId::new("big"));

        let assignments = auction(&ranked, &fleet, &world(), &BTreeMap::new(), 1);
        assert_eq!(assignments[&ShipId::new("attacker")].target, ShipId::new("big"));
        assert_eq!(assignments[&ShipId::new("scout")].target, ShipId::new("small"));
    }

    #[test]
    fn auction_is_injective() {
        let fleet: Vec<FleetMember> = (0..4)
            .map(|i| member(&format!("s{i}"), 100.0 * i as f64, 0.0, Role::Scout))
            .collect();
        let enemies: Vec<ShipSnapshot> = (0..6)
            .map(|i| enemy(&format!("e{i}"), 50.0 * i as f64, 80.0, 1 + i % 5))
            .collect();
        let ranked = rank_enemies(&enemies, &fleet, SizeHeuristic::IdSuffix);
        let assignments = auction(&ranked, &fleet, &world(), &BTreeMap::new(), 0);

        assert_eq!(assignments.len(), 4);
        let targets: HashSet<_> = assignments.values().map(|a| a.target.clone()).collect();
        assert_eq!(targets.len(), assignments.len());
    }

    #[test]
    fn enemies_outside_the_zone_are_skipped() {
        let mut world = world();
        world.update_danger_zone(
            Some(DangerZone {
                x: 0.0,
                y: 0.0,
                radius: 200.0,
            }),
            0,
        );
        let fleet = [member("a", 10.0, 10.0, Role::Attacker)];
        let enemies = [enemy("out", 900.0, 900.0, 5), enemy("in", 50.0, 50.0, 1)];
        let ranked = rank_enemies(&enemies, &fleet, SizeHeuristic::IdSuffix);
        let assignments = auction(&ranked, &fleet, &world, &BTreeMap::new(), 0);
        assert_eq!(assignments[&ShipId::new("a")].target, ShipId::new("in"));
    }

    #[test]
    fn reassignment_penalty_keeps_current_holder() {
        let fleet = [
            member("holder", 100.0, 100.0, Role::Scout),
            member("other", 100.0, 150.0, Role::Scout),
        ];
        let enemies = [enemy("e", 100.0, 300.0, 3)];
        let ranked = rank_enemies(&enemies, &fleet, SizeHeuristic::IdSuffix);
        let mut previous = BTreeMap::new();
        previous.insert(
            ShipId::new("other"),
            Assignment {
                target: ShipId::new("gone"),
                priority: 0.0,
                assigned_tick: 0,
            },
        );
        let assignments = auction(&ranked, &fleet, &world(), &previous, 10);
        assert_eq!(assignments[&ShipId::new("holder")].target, ShipId::new("e"));
        assert!(!assignments.contains_key(&ShipId::new("other")));
    }

    #[test]
    fn allocator_throttles_reranking_and_tracks_staleness() {
        let world = world();
        let fleet = [member("a", 0.0, 0.0, Role::Attacker)];
        let mut allocator = TargetAllocator::new(10, 20, SizeHeuristic::IdSuffix);

        assert!(allocator.update(0, &[enemy("e1", 100.0, 0.0, 2)], &fleet, &world));
        assert!(!allocator.update(5, &[enemy("e2", 50.0, 0.0, 5)], &fleet, &world));
        assert_eq!(
            allocator.assignment(&ShipId::new("a")).map(|a| a.target.clone()),
            Some(ShipId::new("e1"))
        );

        assert!(!allocator.is_stale(&ShipId::new("e1"), 19));
        assert!(allocator.is_stale(&ShipId::new("e1"), 20));
        assert!(allocator.is_stale(&ShipId::new("never"), 0));

        assert!(allocator.update(10, &[], &fleet, &world));
        assert!(allocator.assignments().is_empty());
    }

    #[test]
    fn destroyed_enemy_is_dropped_before_the_next_rerank() {
        let world = world();
        let fleet = [member("a", 0.0, 0.0, Role::Attacker)];
        let mut allocator = TargetAllocator::new(10, 20, SizeHeuristic::IdSuffix);
        assert!(allocator.update(0, &[enemy("e", 100.0, 0.0, 2)], &fleet, &world));
        assert!(allocator.assigned_target(&ShipId::new("a")).is_some());

        let mut wreck = enemy("e", 100.0, 0.0, 2);
        wreck.hp = Some(0);
        assert!(!allocator.update(1, &[wreck], &fleet, &world));
        assert!(allocator.assignment(&ShipId::new("a")).is_none());
        assert!(allocator.assigned_target(&ShipId::new("a")).is_none());
        assert!(allocator.last_seen_tick(&ShipId::new("e")).is_none());
        assert!(allocator.is_stale(&ShipId::new("e"), 1));
    }

    #[test]
    fn backwards_tick_resets_memory() {
        let world = world();
        let fleet = [member("a", 0.0, 0.0, Role::Attacker)];
        let mut allocator = TargetAllocator::new(10, 20, SizeHeuristic::IdSuffix);
        allocator.update(100, &[enemy("e1", 100.0, 0.0, 2)], &fleet, &world);
        assert!(allocator.update(3, &[], &fleet, &world));
        assert!(allocator.last_seen_tick(&ShipId::new("e1")).is_none());
    }
}
