use serde::Serialize;
use tracing::info;

use crate::config::SimConfig;
use crate::sampler::{mean, std_dev};
use crate::sim::{Simulation, SAFE_DISTANCE_MARGIN};
use crate::state::Species;
use crate::{invalid, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialRecord {
    pub run_id: usize,
    pub seed: u64,
    pub exit_velocity: f64,
    pub wind_speed: f64,
    pub max_particle_distance: f64,
    pub max_rock_distance: f64,
    /// Impact speed of the farthest rock, if it landed
    pub rock_impact_speed: Option<f64>,
    pub fragmentation_events: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrialSummary {
    pub n_runs: usize,
    pub base_seed: u64,
    pub mean_max_particle_distance: f64,
    pub std_max_particle_distance: f64,
    pub mean_max_rock_distance: f64,
    pub std_max_rock_distance: f64,
    /// Runs whose farthest rock landed before the end of the run
    pub landed_runs: usize,
    pub mean_rock_impact_speed: Option<f64>,
    pub std_rock_impact_speed: Option<f64>,
    pub max_rock_distance: f64,
    pub safe_distance_m: f64,
}

/// Seed of run `run_id` in a batch built on `base`
pub fn trial_seed(base: &SimConfig, run_id: usize) -> u64 {
    base.seed.wrapping_add(run_id as u64)
}

/// Run `runs` independent simulations that differ only in their seed
pub fn run_trials(base: &SimConfig, runs: usize) -> Result<Vec<TrialRecord>> {
    if runs == 0 {
        return Err(invalid("trial count must be greater than zero"));
    }
    base.validate()?;

    let mut records = Vec::with_capacity(runs);
    for run_id in 0..runs {
        let seed = trial_seed(base, run_id);
        let config = SimConfig {
            seed,
            ..base.clone()
        };
        let mut sim = Simulation::new(config)?;
        let summary = sim.run()?;

        let rock = sim.extrema(Species::Rock);
        records.push(TrialRecord {
            run_id,
            seed,
            exit_velocity: summary.exit_velocity,
            wind_speed: summary.wind_speed,
            max_particle_distance: summary.max_particle_distance,
            max_rock_distance: summary.max_rock_distance,
            rock_impact_speed: rock.and_then(|e| e.impact_speed),
            fragmentation_events: summary.fragmentation_events,
        });
    }

    info!(runs, base_seed = base.seed, "trial batch complete");
    Ok(records)
}

pub fn summarize_trials(base: &SimConfig, records: &[TrialRecord]) -> TrialSummary {
    let particle: Vec<f64> = records.iter().map(|r| r.max_particle_distance).collect();
    let rock: Vec<f64> = records.iter().map(|r| r.max_rock_distance).collect();
    let impacts: Vec<f64> = records.iter().filter_map(|r| r.rock_impact_speed).collect();

    let particle_mean = mean(&particle);
    let rock_mean = mean(&rock);
    let (impact_mean, impact_std) = if impacts.is_empty() {
        (None, None)
    } else {
        let m = mean(&impacts);
        (Some(m), Some(std_dev(&impacts, m)))
    };
    let max_rock_distance = rock.iter().copied().fold(0.0, f64::max);

    TrialSummary {
        n_runs: records.len(),
        base_seed: base.seed,
        mean_max_particle_distance: particle_mean,
        std_max_particle_distance: std_dev(&particle, particle_mean),
        mean_max_rock_distance: rock_mean,
        std_max_rock_distance: std_dev(&rock, rock_mean),
        landed_runs: impacts.len(),
        mean_rock_impact_speed: impact_mean,
        std_rock_impact_speed: impact_std,
        max_rock_distance,
        safe_distance_m: max_rock_distance + SAFE_DISTANCE_MARGIN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> SimConfig {
        SimConfig {
            steps_per_frame: 5,
            total_frames: 4,
            sample_count: 50,
            ..SimConfig::default()
        }
    }

    fn record(run_id: usize, particle: f64, rock: f64, impact: Option<f64>) -> TrialRecord {
        TrialRecord {
            run_id,
            seed: run_id as u64,
            exit_velocity: 800.0,
            wind_speed: 20.0,
            max_particle_distance: particle,
            max_rock_distance: rock,
            rock_impact_speed: impact,
            fragmentation_events: 0,
        }
    }

    #[test]
    fn test_trials_use_consecutive_seeds() {
        let base = tiny();
        let records = run_trials(&base, 3).expect("trials should run");
        assert_eq!(records.len(), 3);
        for (run_id, record) in records.iter().enumerate() {
            assert_eq!(record.run_id, run_id);
            assert_eq!(record.seed, base.seed + run_id as u64);
            assert!(record.max_rock_distance >= 0.0);
        }
        assert_ne!(records[0].wind_speed, records[1].wind_speed);
    }

    #[test]
    fn test_zero_trials_is_rejected() {
        assert!(run_trials(&tiny(), 0).is_err());
    }

    #[test]
    fn test_summary_statistics() {
        let records = vec![
            record(0, 100.0, 1_000.0, Some(200.0)),
            record(1, 300.0, 3_000.0, None),
            record(2, 200.0, 2_000.0, Some(400.0)),
        ];
        let summary = summarize_trials(&tiny(), &records);

        assert_eq!(summary.n_runs, 3);
        assert!((summary.mean_max_particle_distance - 200.0).abs() < 1e-9);
        assert!((summary.mean_max_rock_distance - 2_000.0).abs() < 1e-9);
        let expected_std = (2.0_f64 / 3.0).sqrt() * 1_000.0;
        assert!((summary.std_max_rock_distance - expected_std).abs() < 1e-9);
        assert_eq!(summary.landed_runs, 2);
        assert_eq!(summary.mean_rock_impact_speed, Some(300.0));
        assert_eq!(summary.std_rock_impact_speed, Some(100.0));
        assert_eq!(summary.safe_distance_m, 3_500.0);
    }

    #[test]
    fn test_summary_without_landings() {
        let records = vec![record(0, 10.0, 20.0, None)];
        let summary = summarize_trials(&tiny(), &records);
        assert_eq!(summary.landed_runs, 0);
        assert!(summary.mean_rock_impact_speed.is_none());
    }
}
