//! Benchmark profiles for the Phylon engine.
//!
//! - [`reference_profile`]: 200 species with niche data, one full session
//! - [`stress_profile`]: 2 000 species, same pipeline
//! - [`random_niche`]: deterministic niche snapshot for any roster

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use phylon_core::{InMemoryEventLog, InMemorySpeciesRepository, NicheMetrics, NicheSnapshot, SpeciesArena};
use phylon_engine::{Simulation, SimulationConfig, TurnInputs};
use phylon_test_utils::{random_pressures, random_roster};

/// A session over an in-memory repository.
pub type BenchSession = Simulation<InMemorySpeciesRepository, InMemoryEventLog>;

/// Session plus the inputs to feed it every turn.
pub struct Profile {
    /// The session.
    pub session: BenchSession,
    /// Inputs reused for every turn.
    pub inputs: TurnInputs,
}

/// 200 species.
pub fn reference_profile(seed: u64) -> Profile {
    profile(seed, 200)
}

/// 2 000 species.
pub fn stress_profile(seed: u64) -> Profile {
    profile(seed, 2_000)
}

fn profile(seed: u64, count: usize) -> Profile {
    let arena = random_roster(seed, count);
    let inputs = TurnInputs::new(random_pressures(seed), random_niche(&arena, seed));
    let session = Simulation::new(
        &SimulationConfig::default(),
        InMemorySpeciesRepository::new(arena),
        InMemoryEventLog::new(),
    )
    .expect("default configuration is valid");
    Profile { session, inputs }
}

/// Niche metrics for every species, plus explicit overlaps between
/// roughly one pair in ten.
pub fn random_niche(arena: &SpeciesArena, seed: u64) -> NicheSnapshot {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x9e37_79b9);
    let mut niche = NicheSnapshot::new();
    for sp in arena.iter() {
        niche.insert(
            sp.id,
            NicheMetrics {
                overlap: rng.random_range(0.0..=1.0),
                saturation: rng.random_range(0.0..2.0),
            },
        );
    }
    let ids: Vec<_> = arena.iter().map(|s| s.id).collect();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if rng.random_bool(0.1) {
                niche.set_pair_overlap(a, b, rng.random_range(0.0..=1.0));
            }
        }
    }
    niche
}
