//! Ecological models for the Phylon population-dynamics engine.
//!
//! Each model is a plain calculator with its own validated config, plus a
//! [`Stage`](phylon_stage::Stage) wrapper that wires it into a turn:
//!
//! - [`TrophicInteractionCalculator`]: band biomass, grazing, predation
//!   and food scarcity.
//! - [`KinCompetitionCalculator`]: fitness ranking and pairwise
//!   competition within trophic groups, intensified between kin.
//! - [`MortalityEngine`]: compounds every loss source into one death rate
//!   per species, amortized over the generations in a turn.
//! - [`PopulationUpdater`] and [`ExtinctionChecker`]: apply deaths and
//!   decide extinction.
//! - [`TierClassifier`]: sorts results into reporting tiers.
//!
//! # Pipeline order (each turn)
//!
//! 1. [`TrophicStage`]
//! 2. [`CompetitionStage`]
//! 3. [`MortalityStage`]
//! 4. [`PopulationStage`]

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod competition;
pub mod mortality;
pub mod params;
pub mod population;
pub mod stages;
pub mod tier;
pub mod trophic;

pub use competition::{
    fitness_scores, rank_normalize, resolve_pair, Amplification, CompetitionConfig, Contender,
    FitnessConfig, KinCompetitionCalculator,
};
pub use mortality::{
    amortize, compound_mortality, generations_per_turn, MortalityConfig, MortalityEngine,
    MortalityInputs,
};
pub use params::{clamp_unit, ParameterError, Step, StepTable};
pub use population::{ExtinctionChecker, PopulationConfig, PopulationOutcome, PopulationUpdater};
pub use stages::{CompetitionStage, MortalityStage, PopulationStage, TrophicStage};
pub use tier::{TierClassifier, TierConfig};
pub use trophic::{band_biomass, TrophicConfig, TrophicInteractionCalculator};
