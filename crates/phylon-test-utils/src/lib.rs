//! Test utilities for Phylon development.
//!
//! Provides a [`SpeciesBuilder`] for hand-written scenarios, seeded random
//! rosters for property tests and benchmarks, and reusable stage fixtures
//! in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use phylon_core::{
    Habitat, PressureKind, PressureModifiers, Species, SpeciesArena, SpeciesId, Traits, TurnId,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use fixtures::{FailingStage, FatalStage, RecordingStage, StageLog};

/// Fluent construction of a [`Species`] with sensible defaults:
/// a marine producer of 1 000 individuals with default traits.
#[derive(Clone, Debug)]
pub struct SpeciesBuilder {
    species: Species,
}

impl SpeciesBuilder {
    pub fn new(code: &str) -> Self {
        Self {
            species: Species::new(code, 1.0, 1_000, Traits::default(), Habitat::Marine),
        }
    }

    pub fn level(mut self, level: f64) -> Self {
        self.species.trophic_level = level;
        self
    }

    pub fn population(mut self, population: u64) -> Self {
        self.species.population = population;
        self
    }

    /// Body weight in grams.
    pub fn weight(mut self, grams: f64) -> Self {
        self.species.traits.body_weight_g = grams;
        self
    }

    /// Body length in centimetres.
    pub fn length(mut self, cm: f64) -> Self {
        self.species.traits.body_length_cm = cm;
        self
    }

    pub fn generation_days(mut self, days: f64) -> Self {
        self.species.traits.generation_time_days = days;
        self
    }

    pub fn reproduction(mut self, rate: f64) -> Self {
        self.species.traits.reproduction_rate = rate;
        self
    }

    pub fn habitat(mut self, habitat: Habitat) -> Self {
        self.species.habitat = habitat;
        self
    }

    pub fn created(mut self, turn: TurnId) -> Self {
        self.species.created_turn = turn;
        self
    }

    /// Death rate observed last turn.
    pub fn death_rate(mut self, rate: f64) -> Self {
        self.species.last_death_rate = Some(rate);
        self
    }

    pub fn traits(mut self, traits: Traits) -> Self {
        self.species.traits = traits;
        self
    }

    /// Set the resistance matching `kind`. [`PressureKind::Other`] sets
    /// all six.
    pub fn resistance(mut self, kind: PressureKind, value: f64) -> Self {
        let t = &mut self.species.traits;
        match kind {
            PressureKind::Heat => t.heat_resistance = value,
            PressureKind::Cold => t.cold_resistance = value,
            PressureKind::Drought => t.drought_resistance = value,
            PressureKind::Salinity => t.salinity_resistance = value,
            PressureKind::Toxin => t.toxin_resistance = value,
            PressureKind::Disease => t.disease_resistance = value,
            PressureKind::Other => {
                t.heat_resistance = value;
                t.cold_resistance = value;
                t.drought_resistance = value;
                t.salinity_resistance = value;
                t.toxin_resistance = value;
                t.disease_resistance = value;
            }
        }
        self
    }

    pub fn defense(mut self, value: f64) -> Self {
        self.species.traits.defense = value;
        self
    }

    pub fn build(self) -> Species {
        self.species
    }
}

const HABITATS: [Habitat; 4] = [
    Habitat::Marine,
    Habitat::Coastal,
    Habitat::Freshwater,
    Habitat::Terrestrial,
];

/// A reproducible roster of `count` living species.
///
/// Roughly a third of the species after the first few descend from an
/// earlier one, so lineages several generations deep appear in larger
/// rosters. Trophic levels cover all four bands.
pub fn random_roster(seed: u64, count: usize) -> SpeciesArena {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut arena = SpeciesArena::new();
    for i in 0..count {
        let level = f64::from(rng.random_range(2u8..=8)) * 0.5;
        let length: f64 = rng.random_range(0.05..400.0);
        let mut traits = Traits::default();
        traits.body_length_cm = length;
        traits.body_weight_g = (length * length * length * 0.02).max(0.001);
        traits.generation_time_days = rng.random_range(1.0..3_650.0);
        traits.reproduction_rate = rng.random_range(0.5..50.0);
        traits.heat_resistance = rng.random_range(0.0..=10.0);
        traits.cold_resistance = rng.random_range(0.0..=10.0);
        traits.drought_resistance = rng.random_range(0.0..=10.0);
        traits.defense = rng.random_range(0.0..=10.0);
        let habitat = HABITATS[rng.random_range(0..HABITATS.len())];
        let population = rng.random_range(500u64..5_000_000);
        let species = Species::new(format!("R{i}"), level, population, traits, habitat);

        let parent = (i > 3 && rng.random_bool(0.35))
            .then(|| SpeciesId(rng.random_range(0..i as u32)));
        match parent {
            Some(p) => {
                let created = TurnId(rng.random_range(1..20));
                arena.push_offspring(species, p, created)
            }
            None => arena.push(species, None),
        }
        .expect("parents are always earlier roster entries");
    }
    arena
}

/// A reproducible set of environmental pressures.
pub fn random_pressures(seed: u64) -> PressureModifiers {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut pressures = PressureModifiers::new();
    for name in ["temperature", "drought", "pollution", "disease"] {
        if rng.random_bool(0.6) {
            pressures.insert(name, rng.random_range(-3.0..3.0));
        }
    }
    pressures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rosters_are_reproducible() {
        let a = random_roster(7, 40);
        let b = random_roster(7, 40);
        assert_eq!(a.len(), 40);
        let pops_a: Vec<u64> = a.iter().map(|s| s.population).collect();
        let pops_b: Vec<u64> = b.iter().map(|s| s.population).collect();
        assert_eq!(pops_a, pops_b);
        assert!(a.iter().any(|s| s.parent.is_some()));
    }

    #[test]
    fn builder_overrides_defaults() {
        let sp = SpeciesBuilder::new("X")
            .level(3.0)
            .population(42)
            .resistance(PressureKind::Other, 9.0)
            .death_rate(0.2)
            .build();
        assert_eq!(sp.trophic_level, 3.0);
        assert_eq!(sp.population, 42);
        assert_eq!(sp.traits.toxin_resistance, 9.0);
        assert_eq!(sp.last_death_rate, Some(0.2));
    }
}
