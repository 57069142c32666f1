//! Fixed-step ballistic integrator
//!
//! Per tick and per entity, in this order:
//! 1. gravity on the vertical velocity
//! 2. multiplicative drag on the horizontal velocity
//! 3. wind forcing on the horizontal velocity
//! 4. explicit position update
//! 5. altitude ceiling clamp with downward reflection
//! 6. ground test (fragmentation or clamp to z = 0)
//!
//! Fragmentation never mutates the population mid-sweep: removals and
//! insertions are buffered and applied once every entity has been advanced.

use std::collections::HashSet;

use nalgebra::{Vector2, Vector3};
use rand::RngCore;
use serde::Serialize;
use tracing::debug;

use crate::fragmentation::FragmentationRule;
use crate::population::Population;
use crate::state::{Entity, EntityId, SplitStage};
use crate::{invalid, Result};

/// Integration constants shared by every population
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    /// Time step [s]
    pub dt: f64,
    /// Gravitational acceleration before the species multiplier [m/s^2]
    pub gravity: f64,
    /// Simulation-domain cap on altitude [m]
    pub altitude_ceiling: f64,
}

impl StepConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(invalid(format!("dt must be > 0, got {}", self.dt)));
        }
        if !self.gravity.is_finite() || self.gravity < 0.0 {
            return Err(invalid("gravity must be finite and >= 0"));
        }
        if !self.altitude_ceiling.is_finite() || self.altitude_ceiling <= 0.0 {
            return Err(invalid("altitude_ceiling must be finite and > 0"));
        }
        Ok(())
    }
}

/// An entity found at or below ground level after its update
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundContact {
    pub id: EntityId,
    /// Speed magnitude at contact [m/s]
    pub speed: f64,
    pub position: Vector3<f64>,
    pub split_stage: SplitStage,
}

/// What happened during one call to [`step`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Ground contacts in sweep order, recorded before any fragmentation
    pub contacts: Vec<GroundContact>,
    pub ceiling_hits: usize,
    pub fragmentation_events: usize,
    pub fragments_spawned: usize,
}

/// Apply steps 1-5 to one entity; returns true if the ceiling was hit
pub fn advance_entity(
    entity: &mut Entity,
    wind: &Vector2<f64>,
    gravity_dv: f64,
    drag_factor: f64,
    dt: f64,
    altitude_ceiling: f64,
) -> bool {
    let v = &mut entity.velocity;
    v.z -= gravity_dv;
    v.x *= drag_factor;
    v.y *= drag_factor;
    v.x += wind.x * dt;
    v.y += wind.y * dt;

    entity.position += entity.velocity * dt;

    if entity.position.z >= altitude_ceiling {
        entity.position.z = altitude_ceiling;
        entity.velocity.z = -entity.velocity.z.abs();
        return true;
    }
    false
}

/// Advance every entity of `population` by one tick
pub fn step(
    population: &mut Population,
    wind: &Vector2<f64>,
    config: &StepConfig,
    rule: &dyn FragmentationRule,
    rng: &mut dyn RngCore,
) -> Result<StepReport> {
    config.validate()?;

    let species = population.species();
    let params = population.params();
    let gravity_dv = config.gravity * params.gravity_scale * config.dt;
    let drag_factor = params.drag_factor;
    let fragments_on_impact = params.fragments_on_impact;

    let mut report = StepReport::default();
    let mut pending_remove: HashSet<EntityId> = HashSet::new();
    let mut pending_insert: Vec<Entity> = Vec::new();

    for (id, entity) in population.iter_mut() {
        if advance_entity(
            entity,
            wind,
            gravity_dv,
            drag_factor,
            config.dt,
            config.altitude_ceiling,
        ) {
            report.ceiling_hits += 1;
        }

        if entity.position.z > 0.0 {
            continue;
        }

        report.contacts.push(GroundContact {
            id,
            speed: entity.speed(),
            position: entity.position,
            split_stage: entity.split_stage,
        });

        if fragments_on_impact && entity.split_stage == SplitStage::Unsplit {
            pending_remove.insert(id);
            pending_insert.extend(rule.split(entity, rng));
            report.fragmentation_events += 1;
        } else {
            // rests on the ground but keeps its lateral velocity
            entity.position.z = 0.0;
        }
    }

    if report.fragmentation_events > 0 {
        population.remove_many(&pending_remove);
        report.fragments_spawned = pending_insert.len();
        for fragment in pending_insert {
            population.insert(fragment);
        }
        debug!(
            species = %species,
            events = report.fragmentation_events,
            spawned = report.fragments_spawned,
            population = population.len(),
            "fragmentation"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragmentation::ConicalBurst;
    use crate::params::SpeciesParams;
    use crate::state::{Color, Species};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::cell::Cell;

    const G: f64 = 9.81;

    fn config() -> StepConfig {
        StepConfig {
            dt: 0.05,
            gravity: G,
            altitude_ceiling: 4_000.0,
        }
    }

    fn single(
        species: Species,
        params: SpeciesParams,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
    ) -> (Population, EntityId) {
        let mut population = Population::new(species, params).expect("valid params");
        let id = population.insert(Entity::new(position, velocity, species, Color::BLACK));
        (population, id)
    }

    struct CountingRule {
        inner: ConicalBurst,
        calls: Cell<usize>,
    }

    impl FragmentationRule for CountingRule {
        fn split(&self, parent: &Entity, rng: &mut dyn RngCore) -> Vec<Entity> {
            self.calls.set(self.calls.get() + 1);
            self.inner.split(parent, rng)
        }

        fn fragment_count(&self) -> usize {
            self.inner.fragment_count()
        }
    }

    #[test]
    fn test_update_order_gravity_drag_wind_integrate() {
        let mut entity = Entity::new(
            Vector3::new(0.0, 0.0, 100.0),
            Vector3::new(10.0, -20.0, 5.0),
            Species::Particle,
            Color::RED,
        );
        let wind = Vector2::new(2.0, 4.0);
        let dt = 0.5;
        let hit = advance_entity(&mut entity, &wind, G * 1.0 * dt, 0.9, dt, 4_000.0);
        assert!(!hit);

        let vx = 10.0 * 0.9 + 2.0 * dt;
        let vy = -20.0 * 0.9 + 4.0 * dt;
        let vz = 5.0 - G * dt;
        assert!((entity.velocity - Vector3::new(vx, vy, vz)).norm() < 1e-12);
        let expected = Vector3::new(vx * dt, vy * dt, 100.0 + vz * dt);
        assert!((entity.position - expected).norm() < 1e-12);
    }

    #[test]
    fn test_ceiling_clamp_reflects_downward() {
        let (mut population, id) = single(
            Species::Rock,
            SpeciesParams::rock(),
            Vector3::new(0.0, 0.0, 3_990.0),
            Vector3::new(0.0, 0.0, 700.0),
        );
        let (rule, calm) = (ConicalBurst::default(), Vector2::zeros());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = step(&mut population, &calm, &config(), &rule, &mut rng).expect("step");

        let rock = population.get(id).expect("rock survives");
        assert_eq!(report.ceiling_hits, 1);
        assert_eq!(rock.position.z, 4_000.0);
        assert!(rock.velocity.z <= 0.0);
    }

    #[test]
    fn test_rock_clamps_to_ground_and_keeps_lateral_velocity() {
        let (mut population, id) = single(
            Species::Rock,
            SpeciesParams::rock(),
            Vector3::new(50.0, 0.0, 0.5),
            Vector3::new(20.0, 0.0, -40.0),
        );
        let (rule, calm) = (ConicalBurst::default(), Vector2::zeros());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = step(&mut population, &calm, &config(), &rule, &mut rng).expect("step");

        let rock = population.get(id).expect("rocks are never destroyed");
        assert_eq!(rock.position.z, 0.0);
        assert!((rock.velocity.x - 20.0 * 0.98).abs() < 1e-12);
        assert_eq!(report.contacts.len(), 1);
        assert_eq!(report.fragmentation_events, 0);
        assert_eq!(population.len(), 1);
    }

    #[test]
    fn test_fragmentation_changes_size_by_k_minus_one() {
        let mut population =
            Population::new(Species::Particle, SpeciesParams::particle()).expect("valid");
        for i in 0..4 {
            let z = if i < 2 { 0.1 } else { 2_000.0 };
            population.insert(Entity::new(
                Vector3::new(i as f64 * 10.0, 0.0, z),
                Vector3::new(0.0, 0.0, -50.0),
                Species::Particle,
                Color::RED,
            ));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (rule, calm) = (ConicalBurst::default(), Vector2::zeros());
        let report = step(&mut population, &calm, &config(), &rule, &mut rng).expect("step");

        assert_eq!(report.fragmentation_events, 2);
        assert_eq!(report.fragments_spawned, 6);
        assert_eq!(population.len(), 4 + 2 * (rule.fragment_count() - 1));

        let fragments: Vec<&Entity> = population
            .iter()
            .map(|(_, e)| e)
            .filter(|e| e.is_split())
            .collect();
        assert_eq!(fragments.len(), 6);
        assert!(fragments.iter().all(|e| e.position.z == 0.0));
    }

    #[test]
    fn test_split_entities_never_split_again() {
        let rule = CountingRule {
            inner: ConicalBurst::default(),
            calls: Cell::new(0),
        };
        let (mut population, _) = single(
            Species::Particle,
            SpeciesParams::particle(),
            Vector3::new(0.0, 0.0, 0.2),
            Vector3::new(0.0, 0.0, -10.0),
        );
        population
            .iter_mut()
            .for_each(|(_, e)| e.split_stage = SplitStage::Split);

        let calm = Vector2::zeros();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..20 {
            step(&mut population, &calm, &config(), &rule, &mut rng).expect("step");
        }
        assert_eq!(rule.calls.get(), 0);
        assert_eq!(population.len(), 1);
    }

    #[test]
    fn test_contact_recorded_before_fragmentation() {
        let (mut population, id) = single(
            Species::Particle,
            SpeciesParams::particle(),
            Vector3::new(0.0, 0.0, 0.1),
            Vector3::new(3.0, 4.0, -12.0),
        );
        let (rule, calm) = (ConicalBurst::default(), Vector2::zeros());
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let report = step(&mut population, &calm, &config(), &rule, &mut rng).expect("step");

        assert_eq!(report.contacts.len(), 1);
        assert_eq!(report.contacts[0].id, id);
        assert_eq!(report.contacts[0].split_stage, SplitStage::Unsplit);
        assert!(report.contacts[0].speed > 0.0);
        assert!(!population.contains(id));
    }

    #[test]
    fn test_non_positive_dt_is_rejected() {
        let (mut population, _) = single(
            Species::Ash,
            SpeciesParams::ash(),
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::zeros(),
        );
        let bad = StepConfig {
            dt: 0.0,
            ..config()
        };
        let (rule, calm) = (ConicalBurst::default(), Vector2::zeros());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(step(&mut population, &calm, &bad, &rule, &mut rng).is_err());
    }
}
