// Kinematics
pub const TURN_SPEED_LIMIT: f64 = 2.0;
pub const CRUISE_SPEED: f64 = 2.0;
pub const ARRIVAL_SPEED: f64 = 1.0;
pub const ARRIVAL_RADIUS: f64 = 40.0;
// Half a hull length per unit of ship size
pub const HULL_MARGIN_PER_SIZE: f64 = 0.5;

// Risk assessment
pub const BORDER_SAFETY_MARGIN: f64 = 50.0;
pub const OBSTACLE_LOOKAHEAD_FACTOR: f64 = 1.5;
pub const OBSTACLE_RAY_STEP: f64 = 1.0;

// Danger zone
pub const ZONE_LOOKAHEAD_TICKS: f64 = 5.0;
pub const ZONE_WARNING_MARGIN: f64 = 50.0;
pub const ZONE_SAFE_RADIUS_FRACTION: f64 = 0.8;

// Engagement
pub const ENGAGE_CLOSE_FRACTION: f64 = 0.8;
pub const ENGAGE_RETREAT_FRACTION: f64 = 0.6;
pub const PROJECTILE_SPEED: f64 = 30.0;

// Turn cooldowns, in ticks since the previous turn
pub const TURN_COOLDOWN_ENGAGE: u64 = 5;
pub const TURN_COOLDOWN_MANEUVER: u64 = 3;

// Target allocation
pub const TARGET_RERANK_INTERVAL_TICKS: u64 = 10;
pub const TARGET_STALE_TICKS: u64 = 20;
pub const SIZE_PRIORITY_WEIGHT: f64 = 50.0;
pub const PROXIMITY_BONUS_MAX: f64 = 100.0;
pub const PROXIMITY_BONUS_FALLOFF: f64 = 10.0;
pub const AUCTION_BASE_SCORE: f64 = 1000.0;
pub const AUCTION_BONUS_ATTACKER: f64 = 150.0;
pub const AUCTION_BONUS_SUPPORT: f64 = 75.0;
pub const AUCTION_BONUS_SCOUT: f64 = 0.0;
pub const AUCTION_REASSIGN_PENALTY: f64 = 200.0;

// Roles
pub const ATTACKER_MIN_SIZE: u32 = 4;
pub const SUPPORT_SIZE: u32 = 3;
pub const MAX_SHIP_SIZE: u32 = 5;

// Patrol
pub const ORBIT_PHASE_STEP_DEGREES: u64 = 25;
pub const WANDER_REFRESH_TICKS: u64 = 50;
pub const WANDER_PHASE_STEP_DEGREES: u64 = 30;
pub const WANDER_MIN_DISTANCE: f64 = 100.0;
pub const WANDER_MAX_DISTANCE: f64 = 300.0;
