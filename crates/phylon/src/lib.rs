//! Phylon: turn-based population dynamics for evolution simulations.
//!
//! This is the facade crate that re-exports the public API of the Phylon
//! sub-crates. Most users only need this one dependency.
//!
//! # Quick start
//!
//! ```rust
//! use phylon::prelude::*;
//!
//! let mut arena = SpeciesArena::new();
//! let grass = arena
//!     .push(Species::new("A", 1.0, 10_000, Traits::default(), Habitat::Terrestrial), None)
//!     .unwrap();
//!
//! let mut sim = Simulation::new(
//!     &SimulationConfig::default(),
//!     InMemorySpeciesRepository::new(arena),
//!     InMemoryEventLog::new(),
//! )
//! .unwrap();
//!
//! let outcome = sim.run_turn(TurnInputs::default()).unwrap();
//! assert_eq!(outcome.turn(), TurnId(0));
//! assert!(sim.repository().arena().get(grass).unwrap().population < 10_000);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `phylon-core` | Species arena, ids, turn inputs and results, collaborator traits |
//! | [`stage`] | `phylon-stage` | Stage trait, typed context slots, pipeline validation |
//! | [`ecology`] | `phylon-ecology` | Trophic, competition, mortality and population calculators |
//! | [`engine`] | `phylon-engine` | Turn engine, simulation sessions, external-call runner |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core data model (`phylon-core`).
///
/// Species records and their lineage arena, per-turn inputs such as
/// [`types::PressureModifiers`], result types such as
/// [`types::MortalityReport`], and the [`types::SpeciesRepository`] and
/// [`types::LineageEventLog`] collaborator traits.
pub use phylon_core as types;

/// Stage abstraction (`phylon-stage`).
///
/// Implement [`stage::Stage`] to add a collaborator (pressure parsing,
/// narrative, speciation) to the turn pipeline.
pub use phylon_stage as stage;

/// Population-dynamics calculators and their stages (`phylon-ecology`).
pub use phylon_ecology as ecology;

/// Turn orchestration (`phylon-engine`).
///
/// [`engine::Simulation`] for committed turns against a repository,
/// [`engine::TurnEngine`] for running a pipeline over a bare context.
pub use phylon_engine as engine;

/// Common imports for typical Phylon usage.
///
/// ```rust
/// use phylon::prelude::*;
/// ```
pub mod prelude {
    // Data model
    pub use phylon_core::{
        Habitat, LineageCode, NicheMetrics, NicheSnapshot, PressureModifiers, ResourceSnapshot,
        Species, SpeciesArena, SpeciesId, SpeciesStatus, Traits, TrophicBand, TurnId,
    };

    // Results and events
    pub use phylon_core::{
        CompetitionResult, Diagnostic, LineageEvent, MortalityReport, MortalityResult, Tier,
        TrophicInteractions,
    };

    // Collaborators
    pub use phylon_core::{
        InMemoryEventLog, InMemorySpeciesRepository, LineageEventLog, SpeciesRepository,
    };

    // Errors
    pub use phylon_core::{RepositoryError, StageError, TurnError};

    // Stages
    pub use phylon_stage::{SlotKey, SlotSet, Stage, StageContext, StageKind, StageOutcome, WriteMode};

    // Engine
    pub use phylon_engine::{
        ConfigError, Simulation, SimulationConfig, TurnEngine, TurnInputs, TurnMetrics,
        TurnOutcome, TurnReport,
    };
}
