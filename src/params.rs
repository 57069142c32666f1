//! Per-species physical constants
//!
//! Shared by every entity of a population and fixed for the lifetime of the
//! population.

use serde::{Deserialize, Serialize};

use crate::state::{Color, Species};
use crate::{invalid, Result};

/// Closed speed interval `[lo, hi]` [m/s]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub lo: f64,
    pub hi: f64,
}

impl SpeedRange {
    /// Build a range, rejecting negative bounds and `lo > hi`
    pub fn new(lo: f64, hi: f64) -> Result<Self> {
        let range = Self { lo, hi };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lo.is_finite() || !self.hi.is_finite() {
            return Err(invalid(format!(
                "speed range [{}, {}] must be finite",
                self.lo, self.hi
            )));
        }
        if self.lo < 0.0 {
            return Err(invalid(format!("speed range lower bound {} is negative", self.lo)));
        }
        if self.lo > self.hi {
            return Err(invalid(format!(
                "speed range lower bound {} exceeds upper bound {}",
                self.lo, self.hi
            )));
        }
        Ok(())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            lo: self.lo * factor,
            hi: self.hi * factor,
        }
    }
}

/// How the launch speed interval of a species is derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LaunchSpeed {
    /// Absolute interval, independent of the eruption
    Fixed(SpeedRange),
    /// Fractions of the effective vent exit velocity
    ExitFraction { lo: f64, hi: f64 },
    /// Multiples of the species terminal velocity
    Settling { lo: f64, hi: f64 },
}

impl LaunchSpeed {
    pub fn validate(&self) -> Result<()> {
        match *self {
            LaunchSpeed::Fixed(range) => range.validate(),
            LaunchSpeed::ExitFraction { lo, hi } | LaunchSpeed::Settling { lo, hi } => {
                SpeedRange { lo, hi }.validate()
            }
        }
    }
}

/// Still-air properties used by the terminal velocity estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirProperties {
    /// Dynamic viscosity [kg/(m s)]
    pub viscosity: f64,
    /// Density [kg/m^3]
    pub density: f64,
}

impl Default for AirProperties {
    fn default() -> Self {
        Self {
            viscosity: 1.81e-5,
            density: 1.225,
        }
    }
}

/// Constants shared by all entities of one species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    /// Number of entities spawned at the vent
    pub count: usize,
    /// Diameter [m]
    pub diameter_m: f64,
    /// Bulk density [kg/m^3]
    pub density_kg_m3: f64,
    /// Multiplier on gravity in the vertical update
    pub gravity_scale: f64,
    /// Multiplicative damping of horizontal velocity per tick
    pub drag_factor: f64,
    pub launch: LaunchSpeed,
    /// Break into fragments on first ground contact
    pub fragments_on_impact: bool,
    /// Record impact speed on first ground contact
    pub track_impacts: bool,
    /// Colors assigned in equal contiguous groups at spawn
    pub palette: Vec<Color>,
}

impl SpeciesParams {
    /// Fine ash: light, barely affected by gravity, launched near settling speed
    pub fn ash() -> Self {
        Self {
            count: 300,
            diameter_m: 0.001,
            density_kg_m3: 1_000.0,
            gravity_scale: 0.5,
            drag_factor: 0.98,
            launch: LaunchSpeed::Settling { lo: 1.0, hi: 4.0 },
            fragments_on_impact: false,
            track_impacts: false,
            palette: vec![Color::GREY],
        }
    }

    /// Lapilli-size pyroclasts that break apart on first impact
    pub fn particle() -> Self {
        Self {
            count: 150,
            diameter_m: 0.02,
            density_kg_m3: 1_000.0,
            gravity_scale: 1.0,
            drag_factor: 0.98,
            launch: LaunchSpeed::ExitFraction { lo: 0.5, hi: 1.0 },
            fragments_on_impact: true,
            track_impacts: false,
            palette: vec![Color::RED, Color::YELLOW, Color::BLACK],
        }
    }

    /// Ballistic blocks, five times the particle diameter
    pub fn rock() -> Self {
        Self {
            count: 20,
            diameter_m: 0.1,
            density_kg_m3: 1_000.0,
            gravity_scale: 5.0,
            drag_factor: 0.98,
            launch: LaunchSpeed::ExitFraction { lo: 0.5, hi: 1.0 },
            fragments_on_impact: false,
            track_impacts: true,
            palette: vec![Color::BLACK],
        }
    }

    pub fn for_species(species: Species) -> Self {
        match species {
            Species::Ash => Self::ash(),
            Species::Particle => Self::particle(),
            Species::Rock => Self::rock(),
        }
    }

    pub fn validate(&self, species: Species) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.diameter_m) || !positive(self.density_kg_m3) {
            return Err(invalid(format!(
                "{species}: diameter and density must be > 0"
            )));
        }
        if !self.gravity_scale.is_finite() || self.gravity_scale < 0.0 {
            return Err(invalid(format!("{species}: gravity_scale must be finite and >= 0")));
        }
        if !(0.0..=1.0).contains(&self.drag_factor) {
            return Err(invalid(format!("{species}: drag_factor must be in [0, 1]")));
        }
        if self.palette.is_empty() {
            return Err(invalid(format!("{species}: palette must not be empty")));
        }
        self.launch.validate()
    }

    /// Color of the `index`-th of `count` spawned entities
    pub fn color_for(&self, index: usize, count: usize) -> Color {
        let groups = self.palette.len().max(1);
        let per_group = (count / groups).max(1);
        let group = (index / per_group).min(groups - 1);
        self.palette.get(group).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_range_rejects_inverted_bounds() {
        assert!(SpeedRange::new(800.0, 400.0).is_err());
        assert!(SpeedRange::new(-1.0, 400.0).is_err());
        assert!(SpeedRange::new(400.0, 400.0).is_ok());
    }

    #[test]
    fn test_default_species_are_valid() {
        for species in Species::ALL {
            SpeciesParams::for_species(species)
                .validate(species)
                .expect("default species params should validate");
        }
    }

    #[test]
    fn test_rock_gravity_exceeds_particle_gravity() {
        let (rock, particle) = (SpeciesParams::rock(), SpeciesParams::particle());
        assert!(rock.gravity_scale > particle.gravity_scale);
    }

    #[test]
    fn test_palette_groups_are_contiguous() {
        let params = SpeciesParams::particle();
        assert_eq!(params.color_for(0, 150), Color::RED);
        assert_eq!(params.color_for(49, 150), Color::RED);
        assert_eq!(params.color_for(50, 150), Color::YELLOW);
        assert_eq!(params.color_for(149, 150), Color::BLACK);
        // remainder lands in the last group
        assert_eq!(params.color_for(151, 152), Color::BLACK);
    }
}
