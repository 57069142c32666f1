use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnNull};

use crate::fragmentation::FragmentationConfig;
use crate::integrator::StepConfig;
use crate::params::{AirProperties, SpeciesParams, SpeedRange};
use crate::sampler::DEFAULT_SAMPLE_COUNT;
use crate::state::Species;
use crate::wind::WindMode;
use crate::{invalid, Result, G};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    pub mode: WindMode,
    /// Magnitude interval for generated vectors [m/s]
    pub speed_range: SpeedRange,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            mode: WindMode::PerRun,
            speed_range: WindMode::PerRun.default_speed_range(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    #[serde_as(as = "DefaultOnNull")]
    pub dt: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub steps_per_frame: u64,
    #[serde_as(as = "DefaultOnNull")]
    pub total_frames: u64,
    #[serde_as(as = "DefaultOnNull")]
    pub seed: u64,
    #[serde_as(as = "DefaultOnNull")]
    pub gravity: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub vent_height: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub exit_velocity: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub altitude_ceiling: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub cone_half_angle_deg: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub sample_count: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub scale_launch_by_discharge: bool,
    pub wind: WindConfig,
    pub fragmentation: FragmentationConfig,
    pub air: AirProperties,
    #[serde(deserialize_with = "ash_section")]
    pub ash: SpeciesParams,
    #[serde(deserialize_with = "particle_section")]
    pub particle: SpeciesParams,
    #[serde(deserialize_with = "rock_section")]
    pub rock: SpeciesParams,
}

type SectionResult<E> = std::result::Result<SpeciesParams, E>;

/// Species sections are read over that species' defaults, so a section only
/// lists the fields it changes and `null` keeps the defaults
fn merge_species<'de, D>(deserializer: D, base: SpeciesParams) -> SectionResult<D::Error>
where
    D: Deserializer<'de>,
{
    let changes = Value::deserialize(deserializer)?;
    let mut merged = serde_json::to_value(base).map_err(D::Error::custom)?;
    match (merged.as_object_mut(), changes) {
        (_, Value::Null) => {}
        (Some(fields), Value::Object(changes)) => fields.extend(changes),
        (_, other) => {
            return Err(D::Error::custom(format!(
                "species section must be an object, got {other}"
            )));
        }
    }
    serde_json::from_value(merged).map_err(D::Error::custom)
}

fn ash_section<'de, D: Deserializer<'de>>(deserializer: D) -> SectionResult<D::Error> {
    merge_species(deserializer, SpeciesParams::ash())
}

fn particle_section<'de, D: Deserializer<'de>>(deserializer: D) -> SectionResult<D::Error> {
    merge_species(deserializer, SpeciesParams::particle())
}

fn rock_section<'de, D: Deserializer<'de>>(deserializer: D) -> SectionResult<D::Error> {
    merge_species(deserializer, SpeciesParams::rock())
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            steps_per_frame: 100,
            total_frames: 300,
            seed: 1421,
            gravity: G,
            vent_height: 1421.0,
            exit_velocity: 800.0,
            altitude_ceiling: 4_000.0,
            cone_half_angle_deg: 30.0,
            sample_count: DEFAULT_SAMPLE_COUNT,
            scale_launch_by_discharge: false,
            wind: WindConfig::default(),
            fragmentation: FragmentationConfig::default(),
            air: AirProperties::default(),
            ash: SpeciesParams::ash(),
            particle: SpeciesParams::particle(),
            rock: SpeciesParams::rock(),
        }
    }
}

impl SimConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(invalid(format!("dt must be > 0, got {}", self.dt)));
        }

        if self.steps_per_frame == 0 || self.total_frames == 0 {
            return Err(invalid(
                "steps_per_frame and total_frames must be greater than zero",
            ));
        }

        if self.sample_count == 0 {
            return Err(invalid("sample_count must be greater than zero"));
        }

        if !self.gravity.is_finite() || self.gravity <= 0.0 {
            return Err(invalid("gravity must be finite and > 0"));
        }

        if !self.altitude_ceiling.is_finite() || self.altitude_ceiling <= 0.0 {
            return Err(invalid("altitude_ceiling must be finite and > 0"));
        }

        if !self.vent_height.is_finite()
            || self.vent_height < 0.0
            || self.vent_height >= self.altitude_ceiling
        {
            return Err(invalid(format!(
                "vent_height {} must lie in [0, altitude_ceiling)",
                self.vent_height
            )));
        }

        if !self.exit_velocity.is_finite() || self.exit_velocity < 0.0 {
            return Err(invalid("exit_velocity must be finite and >= 0"));
        }

        if !(0.0..=180.0).contains(&self.cone_half_angle_deg) {
            return Err(invalid("cone_half_angle_deg must be in [0, 180]"));
        }

        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.air.viscosity) || !positive(self.air.density) {
            return Err(invalid("air viscosity and density must be > 0"));
        }

        self.wind.speed_range.validate()?;
        self.fragmentation.validate()?;
        for species in Species::ALL {
            self.species(species).validate(species)?;
        }

        Ok(())
    }

    pub fn species(&self, species: Species) -> &SpeciesParams {
        match species {
            Species::Ash => &self.ash,
            Species::Particle => &self.particle,
            Species::Rock => &self.rock,
        }
    }

    pub fn step_config(&self) -> StepConfig {
        StepConfig {
            dt: self.dt,
            gravity: self.gravity,
            altitude_ceiling: self.altitude_ceiling,
        }
    }

    pub fn vent(&self) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, self.vent_height)
    }

    pub fn cone_half_angle(&self) -> f64 {
        self.cone_half_angle_deg.to_radians()
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_frames.saturating_mul(self.steps_per_frame)
    }
}
