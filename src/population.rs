//! Homogeneous ejecta populations
//!
//! A population owns every entity of one species in a dense, ordered store
//! addressed through generational handles, so ids stay valid while other
//! entities are removed by fragmentation.

use std::collections::HashSet;
use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;
use rand::Rng;
use slotmap::SlotMap;

use crate::params::{AirProperties, LaunchSpeed, SpeciesParams, SpeedRange};
use crate::state::{Entity, EntityId, EntityState, Species};
use crate::{invalid, Result, G};

/// Vectors shorter than this have no usable direction
pub const DIRECTION_EPSILON: f64 = 1e-12;

/// Reference axis of a cone distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConeAxis {
    /// Straight up (+z)
    Vertical,
    /// Along an arbitrary vector; a degenerate vector yields zero directions
    Along(Vector3<f64>),
}

/// Unit vector along `v`, or the zero vector when `v` has no direction
pub fn direction_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if !norm.is_finite() || norm < DIRECTION_EPSILON {
        return Vector3::zeros();
    }
    v / norm
}

/// Direction drawn uniformly in azimuth and within `half_angle` (radians) of `axis`
pub fn sample_cone_direction<R: Rng + ?Sized>(
    axis: ConeAxis,
    half_angle: f64,
    rng: &mut R,
) -> Vector3<f64> {
    let azimuth = rng.gen_range(0.0..TAU);
    let polar = rng.gen_range(0.0..=half_angle);
    let local = Vector3::new(
        polar.sin() * azimuth.cos(),
        polar.sin() * azimuth.sin(),
        polar.cos(),
    );

    match axis {
        ConeAxis::Vertical => local,
        ConeAxis::Along(v) => {
            let a = direction_or_zero(&v);
            if a == Vector3::zeros() {
                return a;
            }
            let helper = if a.z.abs() < 0.9 {
                Vector3::z()
            } else {
                Vector3::x()
            };
            let u = direction_or_zero(&helper.cross(&a));
            let w = a.cross(&u);
            u * local.x + w * local.y + a * local.z
        }
    }
}

/// Keep the magnitude of `velocity` and redraw its direction inside a cone.
/// [`Population::spawn`] launches through this; external spawners can use it
/// to re-aim velocities around a [`ConeAxis::Along`] axis.
pub fn recone<R: Rng + ?Sized>(
    velocity: &Vector3<f64>,
    half_angle: f64,
    axis: ConeAxis,
    rng: &mut R,
) -> Vector3<f64> {
    velocity.norm() * sample_cone_direction(axis, half_angle, rng)
}

/// Particle Reynolds number
pub fn reynolds_number(density: f64, diameter: f64, speed: f64, viscosity: f64) -> f64 {
    density * diameter * speed / viscosity
}

/// Settling speed by Reynolds regime (thresholds 6 and 500)
pub fn terminal_velocity(
    re: f64,
    diameter: f64,
    density: f64,
    viscosity: f64,
    air_density: f64,
) -> f64 {
    if re > 500.0 {
        3.1 * (G * density * diameter / air_density).sqrt()
    } else if re > 6.0 {
        (diameter * 4.0 * G * density) / (225.0 * viscosity * air_density) * (1.0 / 3.0)
    } else {
        (G * density * diameter * diameter) / (18.0 * viscosity)
    }
}

/// Launch speed interval of a species for a given vent exit velocity
pub fn launch_range(
    params: &SpeciesParams,
    exit_velocity: f64,
    air: &AirProperties,
) -> Result<SpeedRange> {
    let range = match params.launch {
        LaunchSpeed::Fixed(range) => range,
        LaunchSpeed::ExitFraction { lo, hi } => SpeedRange {
            lo: lo * exit_velocity,
            hi: hi * exit_velocity,
        },
        LaunchSpeed::Settling { lo, hi } => {
            let re = reynolds_number(
                params.density_kg_m3,
                params.diameter_m,
                exit_velocity,
                air.viscosity,
            );
            let vt = terminal_velocity(
                re,
                params.diameter_m,
                params.density_kg_m3,
                air.viscosity,
                air.density,
            );
            SpeedRange {
                lo: lo * vt,
                hi: hi * vt,
            }
        }
    };
    range.validate()?;
    Ok(range)
}

/// Entities of a single species plus their shared constants
#[derive(Debug, Clone)]
pub struct Population {
    species: Species,
    params: SpeciesParams,
    slots: SlotMap<EntityId, usize>,
    handles: Vec<EntityId>,
    entities: Vec<Entity>,
}

impl Population {
    /// Create an empty population
    pub fn new(species: Species, params: SpeciesParams) -> Result<Self> {
        params.validate(species)?;
        Ok(Self {
            species,
            params,
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            entities: Vec::new(),
        })
    }

    /// Spawn `count` entities at `origin` with speeds uniform in `speed_range`
    /// and directions inside a cone of `cone_half_angle` (radians) around `axis`
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<R: Rng + ?Sized>(
        species: Species,
        params: SpeciesParams,
        count: usize,
        origin: Vector3<f64>,
        speed_range: SpeedRange,
        cone_half_angle: f64,
        axis: ConeAxis,
        rng: &mut R,
    ) -> Result<Self> {
        speed_range.validate()?;
        if !(0.0..=PI).contains(&cone_half_angle) {
            return Err(invalid(format!(
                "cone half-angle {cone_half_angle} rad must be in [0, pi]"
            )));
        }

        let mut population = Self::new(species, params)?;
        population.reserve(count);
        for index in 0..count {
            let speed = rng.gen_range(speed_range.lo..=speed_range.hi);
            let velocity = recone(&(Vector3::z() * speed), cone_half_angle, axis, rng);
            let color = population.params.color_for(index, count);
            population.insert(Entity::new(origin, velocity, species, color));
        }
        Ok(population)
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn params(&self) -> &SpeciesParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
        self.handles.reserve(additional);
        self.entities.reserve(additional);
    }

    /// Append an entity and return its handle
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let index = self.entities.len();
        self.entities.push(entity);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let index = *self.slots.get(id)?;
        self.entities.get(index)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let index = *self.slots.get(id)?;
        self.entities.get_mut(index)
    }

    /// Iterate in dense storage order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.handles.iter().copied().zip(self.entities.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut Entity)> + '_ {
        self.handles.iter().copied().zip(self.entities.iter_mut())
    }

    /// Remove every entity in `dead`, preserving the order of the survivors
    pub fn remove_many(&mut self, dead: &HashSet<EntityId>) -> usize {
        if dead.is_empty() {
            return 0;
        }
        let mut write = 0;
        for read in 0..self.handles.len() {
            let id = self.handles[read];
            if dead.contains(&id) {
                self.slots.remove(id);
                continue;
            }
            if write != read {
                self.handles.swap(write, read);
                self.entities.swap(write, read);
            }
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = write;
            }
            write += 1;
        }
        let removed = self.handles.len().saturating_sub(write);
        self.handles.truncate(write);
        self.entities.truncate(write);
        removed
    }

    /// Snapshot of every live entity
    pub fn current_state(&self) -> Vec<EntityState> {
        self.iter()
            .map(|(id, entity)| EntityState::from_entity(id, entity))
            .collect()
    }

    /// Count of entities that have fragmented or were produced by fragmentation
    pub fn split_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_split()).count()
    }

    /// Highest altitude of any live entity
    pub fn max_altitude(&self) -> Option<f64> {
        self.entities.iter().map(Entity::altitude).reduce(f64::max)
    }

    pub fn all_finite(&self) -> bool {
        self.entities.iter().all(Entity::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Color, SplitStage};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn vent() -> Vector3<f64> {
        Vector3::new(0.0, 0.0, 1421.0)
    }

    #[test]
    fn test_spawn_places_everything_at_vent() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let range = SpeedRange::new(400.0, 800.0).expect("valid range");
        let population = Population::spawn(
            Species::Rock,
            SpeciesParams::rock(),
            20,
            vent(),
            range,
            30.0_f64.to_radians(),
            ConeAxis::Vertical,
            &mut rng,
        )
        .expect("spawn should succeed");

        assert_eq!(population.len(), 20);
        for (_, entity) in population.iter() {
            let speed = entity.speed();
            assert_eq!(entity.position, vent());
            assert!((400.0 - 1e-9..=800.0 + 1e-9).contains(&speed));
            assert_eq!(entity.split_stage, SplitStage::Unsplit);
            // within 30 degrees of vertical
            let min_vz = speed * 30.0_f64.to_radians().cos() - 1e-9;
            assert!(entity.velocity.z >= min_vz);
        }
    }

    #[test]
    fn test_spawn_rejects_inverted_speed_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = Population::spawn(
            Species::Rock,
            SpeciesParams::rock(),
            1,
            vent(),
            SpeedRange {
                lo: 800.0,
                hi: 400.0,
            },
            0.5,
            ConeAxis::Vertical,
            &mut rng,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cone_around_arbitrary_axis() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let axis = Vector3::new(1.0, 1.0, 0.0);
        let unit_axis = axis.normalize();
        let half = 20.0_f64.to_radians();
        for _ in 0..100 {
            let dir = sample_cone_direction(ConeAxis::Along(axis), half, &mut rng);
            assert!((dir.norm() - 1.0).abs() < 1e-9);
            assert!(dir.dot(&unit_axis) >= half.cos() - 1e-9);
        }
    }

    #[test]
    fn test_spawn_around_tilted_axis() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let axis = Vector3::new(1.0, 0.0, 1.0);
        let half = 10.0_f64.to_radians();
        let population = Population::spawn(
            Species::Particle,
            SpeciesParams::particle(),
            50,
            vent(),
            SpeedRange::new(100.0, 200.0).expect("valid range"),
            half,
            ConeAxis::Along(axis),
            &mut rng,
        )
        .expect("spawn should succeed");

        let unit_axis = axis.normalize();
        for (_, entity) in population.iter() {
            let speed = entity.speed();
            assert!((100.0 - 1e-9..=200.0 + 1e-9).contains(&speed));
            let cos = entity.velocity.dot(&unit_axis) / speed;
            assert!(cos >= half.cos() - 1e-9);
        }
    }

    #[test]
    fn test_recone_keeps_magnitude_and_guards_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let v = Vector3::new(30.0, -40.0, 120.0);
        let out = recone(&v, 0.3, ConeAxis::Along(v), &mut rng);
        assert!((out.norm() - v.norm()).abs() < 1e-9);

        let zero = Vector3::zeros();
        let still = recone(&zero, 0.3, ConeAxis::Along(zero), &mut rng);
        assert_eq!(still, Vector3::zeros());
        assert!(still.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_terminal_velocity_regimes() {
        let (mu, rho_a) = (1.81e-5, 1.225);
        let fast = terminal_velocity(1_000.0, 0.001, 1_000.0, mu, rho_a);
        let expected_fast = 3.1 * (G * 1_000.0 * 0.001 / rho_a).sqrt();
        assert!((fast - expected_fast).abs() < 1e-9);

        let mid = terminal_velocity(100.0, 1e-5, 1_000.0, mu, rho_a);
        let expected_mid = (1e-5 * 4.0 * G * 1_000.0) / (225.0 * mu * rho_a) / 3.0;
        assert!((mid - expected_mid).abs() < 1e-9);

        let slow = terminal_velocity(1.0, 1e-5, 1_000.0, mu, rho_a);
        assert!((slow - G * 1_000.0 * 1e-10 / (18.0 * mu)).abs() < 1e-12);
    }

    #[test]
    fn test_settling_launch_range_scales_terminal_velocity() {
        let params = SpeciesParams::ash();
        let range = launch_range(&params, 800.0, &AirProperties::default()).expect("valid");
        assert!(range.lo > 0.0);
        assert!((range.hi / range.lo - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_many_preserves_order_and_ids() {
        let mut population =
            Population::new(Species::Particle, SpeciesParams::particle()).expect("valid");
        let ids: Vec<EntityId> = (0..5)
            .map(|i| {
                population.insert(Entity::new(
                    Vector3::new(i as f64, 0.0, 0.0),
                    Vector3::zeros(),
                    Species::Particle,
                    Color::RED,
                ))
            })
            .collect();

        let dead: HashSet<EntityId> = [ids[1], ids[3]].into_iter().collect();
        assert_eq!(population.remove_many(&dead), 2);
        assert_eq!(population.len(), 3);
        assert!(!population.contains(ids[1]));

        let xs: Vec<f64> = population.iter().map(|(_, e)| e.position.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 4.0]);
        assert_eq!(population.get(ids[4]).map(|e| e.position.x), Some(4.0));
    }
}
