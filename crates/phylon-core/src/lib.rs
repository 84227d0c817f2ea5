//! Core types and traits for the Phylon population-dynamics engine.
//!
//! Every other Phylon crate builds on this one, and it depends on none of
//! them. It holds the shared data model: ids, the
//! species arena, per-turn inputs and outputs, error types, and the
//! repository and event-log interfaces.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod error;
pub mod event;
pub mod id;
pub mod input;
pub mod result;
pub mod species;
pub mod traits;

pub use arena::{AncestorChain, SpeciesArena};
pub use error::{RepositoryError, StageError, TraitError, TurnError};
pub use event::{LineageEvent, LineageEventKind};
pub use id::{LineageCode, SpeciesId, TurnId};
pub use input::{NicheMetrics, NicheSnapshot, PressureKind, PressureModifiers, ResourceSnapshot};
pub use result::{
    CompetitionRegime, CompetitionResult, CompetitionStatus, CompetitionTable, Diagnostic,
    MortalityBreakdown, MortalityReport, MortalityResult, PairEffect, PairOutcome, Tier,
    TrophicInteractions,
};
pub use species::{
    round_trophic_level, trophic_group_key, ExtinctionReason, ExtinctionRecord, Habitat,
    Intervention, Species, SpeciesStatus, Symbiosis, Traits, TrophicBand, MAX_EXTENSION_TRAITS,
    TRAIT_SCALE_MAX,
};
pub use traits::{
    InMemoryEventLog, InMemorySpeciesRepository, LineageEventLog, SpeciesRepository,
};
