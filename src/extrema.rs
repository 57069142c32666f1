//! Running maxima of horizontal travel and impact speeds

use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::Serialize;
use slotmap::SecondaryMap;

use crate::integrator::GroundContact;
use crate::population::Population;
use crate::state::{EntityId, Species};

#[derive(Debug, Clone, Copy, PartialEq)]
struct ExtremaRecord {
    max_distance: f64,
    owner_id: EntityId,
    owner_position: Vector3<f64>,
}

/// Farthest-travelled entity of a species
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extrema {
    /// Horizontal distance from the vent axis [m]
    pub max_distance: f64,
    pub owner_id: EntityId,
    pub owner_position: Vector3<f64>,
    /// Impact speed of the owner, if it has hit the ground and is tracked
    pub impact_speed: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtremaTracker {
    records: BTreeMap<Species, ExtremaRecord>,
    impact_speeds: BTreeMap<Species, SecondaryMap<EntityId, f64>>,
}

impl ExtremaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the post-step state of `population` into the running maxima
    pub fn observe(&mut self, population: &Population, contacts: &[GroundContact]) {
        let species = population.species();

        if population.params().track_impacts {
            let speeds = self.impact_speeds.entry(species).or_default();
            for contact in contacts {
                if !speeds.contains_key(contact.id) {
                    speeds.insert(contact.id, contact.speed);
                }
            }
        }

        let farthest = population
            .iter()
            .map(|(id, entity)| (id, entity.horizontal_distance(), entity.position))
            .reduce(|best, next| if next.1 > best.1 { next } else { best });

        let Some((owner_id, distance, owner_position)) = farthest else {
            return;
        };

        match self.records.get_mut(&species) {
            Some(record) if distance > record.max_distance => {
                *record = ExtremaRecord {
                    max_distance: distance,
                    owner_id,
                    owner_position,
                };
            }
            Some(_) => {}
            None => {
                self.records.insert(
                    species,
                    ExtremaRecord {
                        max_distance: distance,
                        owner_id,
                        owner_position,
                    },
                );
            }
        }
    }

    pub fn extrema(&self, species: Species) -> Option<Extrema> {
        let record = self.records.get(&species)?;
        Some(Extrema {
            max_distance: record.max_distance,
            owner_id: record.owner_id,
            owner_position: record.owner_position,
            impact_speed: self.impact_speed(species, record.owner_id),
        })
    }

    /// Largest horizontal distance seen so far, 0 before any observation
    pub fn max_distance(&self, species: Species) -> f64 {
        self.records
            .get(&species)
            .map(|record| record.max_distance)
            .unwrap_or(0.0)
    }

    pub fn impact_speed(&self, species: Species, id: EntityId) -> Option<f64> {
        self.impact_speeds
            .get(&species)
            .and_then(|speeds| speeds.get(id))
            .copied()
    }

    /// Every recorded impact speed of a species
    pub fn impact_speeds(&self, species: Species) -> Vec<(EntityId, f64)> {
        self.impact_speeds
            .get(&species)
            .map(|speeds| speeds.iter().map(|(id, speed)| (id, *speed)).collect())
            .unwrap_or_default()
    }
}
