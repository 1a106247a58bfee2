//! Collision lookahead: border, obstacle and turn-speed risk for one ship.

use serde::Serialize;

use crate::constants::{
    BORDER_SAFETY_MARGIN, CRUISE_SPEED, OBSTACLE_LOOKAHEAD_FACTOR, OBSTACLE_RAY_STEP,
    TURN_SPEED_LIMIT,
};
use crate::geometry::{direction_to, stopping_distance, Point};
use crate::heading::Heading;
use crate::world::WorldModel;

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    None,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn grade(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Moderate => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// Grades a hazard `margin` units away against the stopping distance.
    fn from_margin(margin: f64, stop: f64) -> Self {
        if margin <= stop {
            Self::Critical
        } else if margin <= 2.0 * stop {
            Self::High
        } else if margin <= 3.0 * stop {
            Self::Moderate
        } else {
            Self::None
        }
    }

    /// Paths graded at most moderate may still be travelled.
    pub fn is_passable(self) -> bool {
        self <= Self::Moderate
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSource {
    Border,
    Obstacle,
    Turn,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub evasive: Option<Heading>,
    pub margin: f64,
    pub source: Option<RiskSource>,
}

impl RiskAssessment {
    pub const CLEAR: Self = Self {
        level: RiskLevel::None,
        evasive: None,
        margin: f64::INFINITY,
        source: None,
    };

    /// Keeps `self` unless `other` is strictly worse.
    fn worst(self, other: Option<Self>) -> Self {
        match other {
            Some(other) if other.level > self.level => other,
            _ => self,
        }
    }
}

pub struct RiskAssessor<'a> {
    world: &'a WorldModel,
    hull_margin: f64,
}

impl<'a> RiskAssessor<'a> {
    pub fn new(world: &'a WorldModel) -> Self {
        Self {
            world,
            hull_margin: 0.0,
        }
    }

    /// A predicted stop closer to the edge than `margin` is critical.
    pub fn with_hull_margin(mut self, margin: f64) -> Self {
        self.hull_margin = margin.max(0.0);
        self
    }

    /// Full assessment of the ship's current trajectory, including the
    /// turn-speed check.
    pub fn assess(&self, position: Point, heading: Heading, speed: f64) -> RiskAssessment {
        self.assess_path(position, heading, speed)
            .worst(self.turn_risk(speed))
    }

    /// Border and obstacle risk only.
    pub fn assess_path(&self, position: Point, heading: Heading, speed: f64) -> RiskAssessment {
        let stop = stopping_distance(speed);
        RiskAssessment::CLEAR
            .worst(self.border_risk(position, heading, stop))
            .worst(self.obstacle_risk(position, heading, speed, stop))
    }

    /// Risk of travelling along `heading`, probed at no less than cruise speed
    /// so a stationary ship does not count a wall in front of it as safe.
    pub fn heading_risk(&self, position: Point, heading: Heading, speed: f64) -> RiskLevel {
        self.assess_path(position, heading, speed.max(CRUISE_SPEED)).level
    }

    pub fn is_heading_safe(&self, position: Point, heading: Heading, speed: f64) -> bool {
        self.heading_risk(position, heading, speed).is_passable()
    }

    /// Least risky of `candidates`, earlier candidates winning ties. Falls back
    /// to the first candidate (or north) when the list is empty.
    pub fn safest_heading(&self, position: Point, speed: f64, candidates: &[Heading]) -> Heading {
        let mut best: Option<(Heading, RiskLevel)> = None;
        for &heading in candidates {
            let level = self.heading_risk(position, heading, speed);
            if best.map_or(true, |(_, best_level)| level < best_level) {
                best = Some((heading, level));
            }
        }
        best.map(|(heading, _)| heading).unwrap_or_default()
    }

    fn border_risk(&self, position: Point, heading: Heading, stop: f64) -> Option<RiskAssessment> {
        let predicted = position.advanced(heading, stop);
        let (width, height) = self.world.bounds();
        let breaching = self
            .world
            .is_out_of_bounds(predicted.x, predicted.y, self.hull_margin);

        // (distance of predicted stop to edge, distance of ship to edge, heading away)
        let edges = [
            (predicted.x, position.x, Heading::East),
            (width - predicted.x, width - position.x, Heading::West),
            (predicted.y, position.y, Heading::South),
            (height - predicted.y, height - position.y, Heading::North),
        ];

        let mut worst: Option<RiskAssessment> = None;
        for (predicted_gap, margin, away) in edges {
            // Only edges the ship is closing on.
            if predicted_gap >= BORDER_SAFETY_MARGIN || predicted_gap >= margin {
                continue;
            }
            let level = if breaching && predicted_gap < self.hull_margin {
                RiskLevel::Critical
            } else {
                RiskLevel::from_margin(margin, stop)
            };
            let candidate = RiskAssessment {
                level,
                evasive: Some(away),
                margin,
                source: Some(RiskSource::Border),
            };
            worst = match worst {
                Some(current)
                    if current.level > level
                        || (current.level == level && current.margin <= margin) =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            };
        }
        worst.filter(|assessment| assessment.level > RiskLevel::None)
    }

    fn obstacle_risk(
        &self,
        position: Point,
        heading: Heading,
        speed: f64,
        stop: f64,
    ) -> Option<RiskAssessment> {
        // Never look less than one tick of travel ahead.
        let lookahead = (OBSTACLE_LOOKAHEAD_FACTOR * stop).max(speed);
        let (margin, cell) =
            self.world
                .first_obstacle_along(position, heading, lookahead, OBSTACLE_RAY_STEP)?;
        let level = RiskLevel::from_margin(margin, stop);
        if level == RiskLevel::None {
            return None;
        }
        Some(RiskAssessment {
            level,
            evasive: Some(direction_to(cell, position)),
            margin,
            source: Some(RiskSource::Obstacle),
        })
    }

    fn turn_risk(&self, speed: f64) -> Option<RiskAssessment> {
        (speed > TURN_SPEED_LIMIT).then_some(RiskAssessment {
            level: RiskLevel::Moderate,
            evasive: None,
            margin: f64::INFINITY,
            source: Some(RiskSource::Turn),
        })
    }
}
