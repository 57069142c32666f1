//! Impact fragmentation
//!
//! An unsplit entity that reaches the ground is replaced by `k` fragments
//! launched from the impact point. Fragments are terminal: they never split.

use std::f64::consts::TAU;

use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::state::{Entity, SplitStage};
use crate::{invalid, Result, G};

/// Produces the fragments of an entity on its first ground contact
pub trait FragmentationRule {
    /// Fragments replacing `parent`, all tagged `SplitStage::Split`
    fn split(&self, parent: &Entity, rng: &mut dyn rand::RngCore) -> Vec<Entity>;

    /// Number of fragments produced per event
    fn fragment_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentationConfig {
    /// Fragments per event (`k`)
    pub fragment_count: usize,
    /// Maximum angle of a fragment from vertical [deg]
    pub cone_half_angle_deg: f64,
    /// Lowest fragment launch speed [m/s]
    pub floor_speed: f64,
    /// Height the fastest fragment can reach [m]
    pub apex_height: f64,
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            fragment_count: 3,
            cone_half_angle_deg: 30.0,
            floor_speed: 100.0,
            apex_height: 4_000.0,
        }
    }
}

impl FragmentationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fragment_count == 0 {
            return Err(invalid("fragment_count must be greater than zero"));
        }
        if !(0.0..=180.0).contains(&self.cone_half_angle_deg) {
            return Err(invalid("fragment cone_half_angle_deg must be in [0, 180]"));
        }
        if !self.floor_speed.is_finite() || self.floor_speed < 0.0 {
            return Err(invalid("fragment floor_speed must be finite and >= 0"));
        }
        if !self.apex_height.is_finite() || self.apex_height < 0.0 {
            return Err(invalid("fragment apex_height must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Fragments burst upward inside a cone around vertical, fast enough to reach
/// at most the apex height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicalBurst {
    fragment_count: usize,
    cone_half_angle: f64,
    floor_speed: f64,
    apex_speed: f64,
}

impl ConicalBurst {
    pub fn new(config: &FragmentationConfig, gravity: f64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fragment_count: config.fragment_count,
            cone_half_angle: config.cone_half_angle_deg.to_radians(),
            floor_speed: config.floor_speed,
            apex_speed: apex_speed(gravity, config.apex_height),
        })
    }

    /// Speed needed to reach the apex height
    pub fn apex_speed(&self) -> f64 {
        self.apex_speed
    }

    pub fn floor_speed(&self) -> f64 {
        self.floor_speed
    }
}

impl Default for ConicalBurst {
    fn default() -> Self {
        let config = FragmentationConfig::default();
        Self {
            fragment_count: config.fragment_count,
            cone_half_angle: config.cone_half_angle_deg.to_radians(),
            floor_speed: config.floor_speed,
            apex_speed: apex_speed(G, config.apex_height),
        }
    }
}

/// `sqrt(2 g h)`
pub fn apex_speed(gravity: f64, apex_height: f64) -> f64 {
    (2.0 * gravity * apex_height).max(0.0).sqrt()
}

impl FragmentationRule for ConicalBurst {
    fn split(&self, parent: &Entity, rng: &mut dyn rand::RngCore) -> Vec<Entity> {
        let origin = Vector3::new(parent.position.x, parent.position.y, 0.0);
        let top = self.apex_speed.max(self.floor_speed);

        (0..self.fragment_count)
            .map(|_| {
                let azimuth = rng.gen_range(0.0..TAU);
                let polar = rng.gen_range(0.0..=self.cone_half_angle);
                let speed = rng.gen_range(self.floor_speed..=top);
                let velocity = Vector3::new(
                    speed * polar.sin() * azimuth.cos(),
                    speed * polar.sin() * azimuth.sin(),
                    speed * polar.cos(),
                );
                Entity {
                    position: origin,
                    velocity,
                    species: parent.species,
                    split_stage: SplitStage::Split,
                    color: parent.color,
                }
            })
            .collect()
    }

    fn fragment_count(&self) -> usize {
        self.fragment_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Color, Species};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn impacted() -> Entity {
        Entity::new(
            Vector3::new(120.0, -35.0, -0.4),
            Vector3::new(5.0, 5.0, -60.0),
            Species::Particle,
            Color::YELLOW,
        )
    }

    #[test]
    fn test_fragments_start_on_ground_at_impact_point() {
        let rule = ConicalBurst::default();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let fragments = rule.split(&impacted(), &mut rng);

        assert_eq!(fragments.len(), 3);
        for fragment in &fragments {
            assert_eq!(fragment.position, Vector3::new(120.0, -35.0, 0.0));
            assert_eq!(fragment.split_stage, SplitStage::Split);
            assert_eq!(fragment.color, Color::YELLOW);
            assert_eq!(fragment.species, Species::Particle);
        }
    }

    #[test]
    fn test_fragment_speeds_between_floor_and_apex() {
        let rule = ConicalBurst::default();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let apex = (2.0 * G * 4_000.0_f64).sqrt();
        assert!((rule.apex_speed() - apex).abs() < 1e-9);

        for _ in 0..50 {
            for fragment in rule.split(&impacted(), &mut rng) {
                let speed = fragment.speed();
                assert!(speed >= 100.0 - 1e-9 && speed <= apex + 1e-9);
                let min_vz = speed * 30.0_f64.to_radians().cos() - 1e-9;
                assert!(fragment.velocity.z >= min_vz);
            }
        }
    }

    #[test]
    fn test_low_apex_falls_back_to_floor_speed() {
        let config = FragmentationConfig {
            apex_height: 1.0,
            ..FragmentationConfig::default()
        };
        let rule = ConicalBurst::new(&config, G).expect("valid config");
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for fragment in rule.split(&impacted(), &mut rng) {
            assert!((fragment.speed() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_fragment_count_is_rejected() {
        let config = FragmentationConfig {
            fragment_count: 0,
            ..FragmentationConfig::default()
        };
        assert!(ConicalBurst::new(&config, G).is_err());
    }
}
