//! Horizontal wind forcing

use std::f64::consts::TAU;

use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::SpeedRange;
use crate::Result;

/// When the wind vector is (re)generated
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WindMode {
    /// No wind
    Calm,
    /// Constant vector, never resampled
    Fixed { vx: f64, vy: f64 },
    /// Drawn once at the start of a run
    #[default]
    PerRun,
    /// Drawn again on every tick
    PerTick,
}

impl WindMode {
    /// Speed interval used when none is configured: gusts are stronger than
    /// the steady per-run wind
    pub fn default_speed_range(self) -> SpeedRange {
        match self {
            WindMode::PerTick => SpeedRange {
                lo: 50.0,
                hi: 200.0,
            },
            _ => SpeedRange { lo: 10.0, hi: 30.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindModel {
    mode: WindMode,
    speed_range: SpeedRange,
    current: Vector2<f64>,
}

impl WindModel {
    pub fn new(mode: WindMode, speed_range: SpeedRange) -> Result<Self> {
        speed_range.validate()?;
        let current = match mode {
            WindMode::Fixed { vx, vy } => Vector2::new(vx, vy),
            _ => Vector2::zeros(),
        };
        Ok(Self {
            mode,
            speed_range,
            current,
        })
    }

    pub fn calm() -> Self {
        Self {
            mode: WindMode::Calm,
            speed_range: SpeedRange { lo: 0.0, hi: 0.0 },
            current: Vector2::zeros(),
        }
    }

    pub fn mode(&self) -> WindMode {
        self.mode
    }

    /// Wind vector most recently handed out
    pub fn current(&self) -> Vector2<f64> {
        self.current
    }

    /// Draw a vector: magnitude uniform in the speed range, direction uniform in `[0, 2pi)`
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector2<f64> {
        let speed = rng.gen_range(self.speed_range.lo..=self.speed_range.hi);
        let direction = rng.gen_range(0.0..TAU);
        Vector2::new(speed * direction.cos(), speed * direction.sin())
    }

    /// Reset the cached vector for a new run
    pub fn begin_run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vector2<f64> {
        self.current = match self.mode {
            WindMode::Calm => Vector2::zeros(),
            WindMode::Fixed { vx, vy } => Vector2::new(vx, vy),
            WindMode::PerRun | WindMode::PerTick => self.generate(rng),
        };
        self.current
    }

    /// Wind vector to apply on the next tick
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vector2<f64> {
        if self.mode == WindMode::PerTick {
            self.current = self.generate(rng);
        }
        self.current
    }
}

/// Compass heading of a wind vector in degrees, `[0, 360)`
pub fn heading_deg(wind: &Vector2<f64>) -> f64 {
    let angle = wind.y.atan2(wind.x).to_degrees();
    if angle < 0.0 {
        angle + 360.0
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn range(lo: f64, hi: f64) -> SpeedRange {
        SpeedRange::new(lo, hi).expect("valid range")
    }

    #[test]
    fn test_generated_magnitude_within_range() {
        let model = WindModel::new(WindMode::PerTick, range(10.0, 30.0)).expect("valid model");
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            let speed = model.generate(&mut rng).norm();
            assert!((10.0 - 1e-9..=30.0 + 1e-9).contains(&speed));
        }
    }

    #[test]
    fn test_per_run_wind_is_cached() {
        let mut model = WindModel::new(WindMode::PerRun, range(10.0, 30.0)).expect("valid model");
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let first = model.begin_run(&mut rng);
        for _ in 0..10 {
            assert_eq!(model.tick(&mut rng), first);
        }
    }

    #[test]
    fn test_per_tick_wind_changes() {
        let mut model = WindModel::new(WindMode::PerTick, range(50.0, 200.0)).expect("valid model");
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let first = model.begin_run(&mut rng);
        let second = model.tick(&mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn test_calm_and_fixed_modes() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut calm = WindModel::calm();
        assert_eq!(calm.begin_run(&mut rng), Vector2::zeros());

        let mut fixed =
            WindModel::new(WindMode::Fixed { vx: 3.0, vy: -4.0 }, range(0.0, 0.0)).expect("valid");
        assert_eq!(fixed.tick(&mut rng), Vector2::new(3.0, -4.0));
    }

    #[test]
    fn test_heading_is_non_negative() {
        assert!((heading_deg(&Vector2::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
        assert!(heading_deg(&Vector2::new(1.0, 0.0)).abs() < 1e-9);
    }

    #[test]
    fn test_mode_is_tagged_by_kind() {
        let gusty: WindMode = serde_json::from_str(r#"{ "kind": "per_tick" }"#).expect("parse");
        assert_eq!(gusty, WindMode::PerTick);

        let fixed: WindMode =
            serde_json::from_str(r#"{ "kind": "fixed", "vx": 3.0, "vy": -4.0 }"#).expect("parse");
        assert_eq!(fixed, WindMode::Fixed { vx: 3.0, vy: -4.0 });
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let bad = SpeedRange { lo: 30.0, hi: 10.0 };
        assert!(WindModel::new(WindMode::PerRun, bad).is_err());
    }
}
