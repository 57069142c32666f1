//! Ejecta entity state
//!
//! An entity is one ejected object:
//! - position and velocity in the vent-centred frame (z is altitude)
//! - species tag selecting the shared physical constants
//! - split stage, which only ever moves from `Unsplit` to `Split`
//! - cosmetic color carried through fragmentation

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Stable handle for entities, valid across fragmentation of other entities.
    pub struct EntityId;
}

/// Coarse ejecta category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Ash,
    Particle,
    Rock,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Ash, Species::Particle, Species::Rock];

    pub fn label(self) -> &'static str {
        match self {
            Species::Ash => "ash",
            Species::Particle => "particle",
            Species::Rock => "rock",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fragmentation stage of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStage {
    /// Never split
    #[default]
    Unsplit,
    /// Produced by (or has produced) fragments; terminal
    Split,
}

/// RGB display color in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const RED: Color = Color::new(1.0, 0.0, 0.0);
    pub const YELLOW: Color = Color::new(1.0, 1.0, 0.0);
    pub const GREY: Color = Color::new(0.5, 0.5, 0.5);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// One ejecta object
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Position [m]
    pub position: Vector3<f64>,
    /// Velocity [m/s]
    pub velocity: Vector3<f64>,
    pub species: Species,
    pub split_stage: SplitStage,
    pub color: Color,
}

impl Entity {
    /// Create an unsplit entity
    pub fn new(
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        species: Species,
        color: Color,
    ) -> Self {
        Self {
            position,
            velocity,
            species,
            split_stage: SplitStage::Unsplit,
            color,
        }
    }

    pub fn altitude(&self) -> f64 {
        self.position.z
    }

    /// Distance from the vent axis in the horizontal plane
    pub fn horizontal_distance(&self) -> f64 {
        self.position.x.hypot(self.position.y)
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn is_split(&self) -> bool {
        self.split_stage == SplitStage::Split
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite()) && self.velocity.iter().all(|v| v.is_finite())
    }
}

/// Read-only snapshot of an entity for renderers and reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub id: EntityId,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub species: Species,
    pub split_stage: SplitStage,
    pub color: Color,
}

impl EntityState {
    pub fn from_entity(id: EntityId, entity: &Entity) -> Self {
        Self {
            id,
            position: entity.position,
            velocity: entity.velocity,
            species: entity.species,
            split_stage: entity.split_stage,
            color: entity.color,
        }
    }
}
