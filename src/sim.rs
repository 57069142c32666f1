//! Simulation harness
//!
//! Owns every piece of mutable run state: the seeded random source, the three
//! populations, the wind model and the extrema tracker. One call to
//! [`Simulation::advance`] is one tick; [`Simulation::run`] plays the whole
//! configured run.

use std::collections::BTreeMap;

use nalgebra::Vector2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::extrema::{Extrema, ExtremaTracker};
use crate::fragmentation::{ConicalBurst, FragmentationRule};
use crate::integrator::step;
use crate::population::{launch_range, ConeAxis, Population};
use crate::sampler::{EruptionParameterSample, ParameterSampler};
use crate::state::{EntityState, Species};
use crate::wind::{heading_deg, WindModel};
use crate::{EjectaError, Result};

/// Progress is logged once per this many frames
pub const PROGRESS_EVERY_FRAMES: u64 = 50;

/// Margin added to the farthest rock to suggest a safe distance [m]
pub const SAFE_DISTANCE_MARGIN: f64 = 500.0;

/// State after one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSnapshot {
    /// Ticks completed so far
    pub tick: u64,
    /// Simulated time [s]
    pub time_s: f64,
    /// Wind applied during this tick
    pub wind: Vector2<f64>,
    pub counts: BTreeMap<Species, usize>,
    pub fragmentation_events: usize,
    pub ground_contacts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesSummary {
    pub species: Species,
    pub count: usize,
    pub split_count: usize,
    pub max_altitude: Option<f64>,
    pub extrema: Option<Extrema>,
}

/// End-of-run report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub ticks: u64,
    pub simulated_time_s: f64,
    /// Vent exit velocity after discharge scaling [m/s]
    pub exit_velocity: f64,
    pub parameters: EruptionParameterSample,
    pub wind: Vector2<f64>,
    pub wind_speed: f64,
    pub wind_heading_deg: f64,
    pub species: Vec<SpeciesSummary>,
    pub fragmentation_events: usize,
    pub rock_impact_speeds: Vec<f64>,
    pub max_rock_distance: f64,
    pub max_particle_distance: f64,
    pub safe_distance_m: f64,
}

impl RunSummary {
    pub fn species(&self, species: Species) -> Option<&SpeciesSummary> {
        self.species.iter().find(|s| s.species == species)
    }
}

pub struct Simulation {
    config: SimConfig,
    rng: ChaCha8Rng,
    parameters: EruptionParameterSample,
    exit_velocity: f64,
    wind: WindModel,
    rule: Box<dyn FragmentationRule>,
    populations: Vec<Population>,
    tracker: ExtremaTracker,
    tick: u64,
    fragmentation_events: usize,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        let rule = ConicalBurst::new(&config.fragmentation, config.gravity)?;
        Self::with_rule(config, Box::new(rule))
    }

    /// Build a simulation that fragments with a custom rule
    pub fn with_rule(config: SimConfig, rule: Box<dyn FragmentationRule>) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let parameters = ParameterSampler::default().sample(config.sample_count, &mut rng)?;
        let exit_velocity = if config.scale_launch_by_discharge {
            config.exit_velocity * parameters.discharge_ratio()
        } else {
            config.exit_velocity
        };

        let mut wind = WindModel::new(config.wind.mode, config.wind.speed_range)?;
        let initial_wind = wind.begin_run(&mut rng);

        let mut populations = Vec::with_capacity(Species::ALL.len());
        for species in Species::ALL {
            let params = config.species(species).clone();
            let speed_range = launch_range(&params, exit_velocity, &config.air)?;
            let count = params.count;
            populations.push(Population::spawn(
                species,
                params,
                count,
                config.vent(),
                speed_range,
                config.cone_half_angle(),
                ConeAxis::Vertical,
                &mut rng,
            )?);
        }

        let mut tracker = ExtremaTracker::new();
        for population in &populations {
            tracker.observe(population, &[]);
        }

        info!(
            seed = config.seed,
            exit_velocity,
            wind_speed = initial_wind.norm(),
            ticks = config.total_ticks(),
            "simulation initialised"
        );

        Ok(Self {
            config,
            rng,
            parameters,
            exit_velocity,
            wind,
            rule,
            populations,
            tracker,
            tick: 0,
            fragmentation_events: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn parameters(&self) -> &EruptionParameterSample {
        &self.parameters
    }

    pub fn exit_velocity(&self) -> f64 {
        self.exit_velocity
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> f64 {
        self.tick as f64 * self.config.dt
    }

    pub fn wind(&self) -> Vector2<f64> {
        self.wind.current()
    }

    pub fn is_finished(&self) -> bool {
        self.tick >= self.config.total_ticks()
    }

    pub fn fragmentation_events(&self) -> usize {
        self.fragmentation_events
    }

    pub fn population(&self, species: Species) -> Option<&Population> {
        self.populations.iter().find(|p| p.species() == species)
    }

    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    /// Snapshot of every live entity of a species
    pub fn current_state(&self, species: Species) -> Vec<EntityState> {
        self.population(species)
            .map(Population::current_state)
            .unwrap_or_default()
    }

    pub fn tracker(&self) -> &ExtremaTracker {
        &self.tracker
    }

    pub fn extrema(&self, species: Species) -> Option<Extrema> {
        self.tracker.extrema(species)
    }

    /// Advance every population by one tick
    pub fn advance(&mut self) -> Result<TickSnapshot> {
        let wind = self.wind.tick(&mut self.rng);
        let step_config = self.config.step_config();

        let mut counts = BTreeMap::new();
        let mut fragmentation_events = 0;
        let mut ground_contacts = 0;

        for population in self.populations.iter_mut() {
            let report = step(
                population,
                &wind,
                &step_config,
                self.rule.as_ref(),
                &mut self.rng,
            )?;

            if !population.all_finite() {
                return Err(EjectaError::NonFiniteState {
                    species: population.species(),
                    tick: self.tick,
                });
            }

            self.tracker.observe(population, &report.contacts);
            fragmentation_events += report.fragmentation_events;
            ground_contacts += report.contacts.len();
            counts.insert(population.species(), population.len());
        }

        self.fragmentation_events += fragmentation_events;
        self.tick += 1;

        if fragmentation_events > 0 {
            debug!(
                tick = self.tick,
                events = fragmentation_events,
                "fragments spawned"
            );
        }

        Ok(TickSnapshot {
            tick: self.tick,
            time_s: self.time(),
            wind,
            counts,
            fragmentation_events,
            ground_contacts,
        })
    }

    /// Play the remaining ticks of the configured run
    pub fn run(&mut self) -> Result<RunSummary> {
        let total = self.config.total_ticks();
        let steps_per_frame = self.config.steps_per_frame;

        while self.tick < total {
            if let Err(err) = self.advance() {
                warn!(tick = self.tick, %err, "run aborted");
                return Err(err);
            }

            if self.tick % steps_per_frame == 0 {
                let frame = self.tick / steps_per_frame;
                if frame % PROGRESS_EVERY_FRAMES == 0 {
                    info!(
                        frame,
                        total_frames = self.config.total_frames,
                        max_rock_distance = self.tracker.max_distance(Species::Rock),
                        fragmentation_events = self.fragmentation_events,
                        "progress"
                    );
                }
            }
        }

        let summary = self.summary();
        info!(
            ticks = summary.ticks,
            max_rock_distance = summary.max_rock_distance,
            max_particle_distance = summary.max_particle_distance,
            safe_distance = summary.safe_distance_m,
            "run complete"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        let wind = self.wind.current();
        let species = self
            .populations
            .iter()
            .map(|population| SpeciesSummary {
                species: population.species(),
                count: population.len(),
                split_count: population.split_count(),
                max_altitude: population.max_altitude(),
                extrema: self.tracker.extrema(population.species()),
            })
            .collect();

        let max_rock_distance = self.tracker.max_distance(Species::Rock);

        RunSummary {
            seed: self.config.seed,
            ticks: self.tick,
            simulated_time_s: self.time(),
            exit_velocity: self.exit_velocity,
            parameters: self.parameters.clone(),
            wind,
            wind_speed: wind.norm(),
            wind_heading_deg: heading_deg(&wind),
            species,
            fragmentation_events: self.fragmentation_events,
            rock_impact_speeds: self
                .tracker
                .impact_speeds(Species::Rock)
                .into_iter()
                .map(|(_, speed)| speed)
                .collect(),
            max_rock_distance,
            max_particle_distance: self.tracker.max_distance(Species::Particle),
            safe_distance_m: max_rock_distance + SAFE_DISTANCE_MARGIN,
        }
    }
}
