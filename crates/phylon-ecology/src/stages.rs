//! The four core stages of a turn.
//!
//! # Pipeline order (each turn)
//!
//! 1. [`TrophicStage`]: species → trophic
//! 2. [`CompetitionStage`]: species, niche → competition
//! 3. [`MortalityStage`]: species, pressures, niche, resources, trophic,
//!    competition → mortality
//! 4. [`PopulationStage`]: species, mortality → updated species, lineage
//!    events
//!
//! Every stage also appends its diagnostics to the shared notes slot.

use tracing::{debug, warn};

use phylon_core::{Diagnostic, StageError, Tier};
use phylon_stage::slot::{
    COMPETITION, LINEAGE_EVENTS, MORTALITY, NICHE, NOTES, PRESSURES, RESOURCES, SPECIES, TROPHIC,
    UPDATED_SPECIES,
};
use phylon_stage::{SlotId, SlotSet, Stage, StageContext, StageOutcome, WriteMode};

use crate::competition::{CompetitionConfig, KinCompetitionCalculator};
use crate::mortality::{MortalityConfig, MortalityEngine, MortalityInputs};
use crate::population::{ExtinctionChecker, PopulationConfig, PopulationUpdater};
use crate::tier::{TierClassifier, TierConfig};
use crate::trophic::{TrophicConfig, TrophicInteractionCalculator};

/// Registered stage names.
pub mod names {
    /// [`TrophicStage`](super::TrophicStage).
    pub const TROPHIC: &str = "trophic";
    /// [`CompetitionStage`](super::CompetitionStage).
    pub const COMPETITION: &str = "competition";
    /// [`MortalityStage`](super::MortalityStage).
    pub const MORTALITY: &str = "mortality";
    /// [`PopulationStage`](super::PopulationStage).
    pub const POPULATION: &str = "population";
}

/// Default registration order values.
///
/// Gaps leave room for collaborator stages: pressure parsing before 200,
/// narrative and speciation after 500.
pub mod order {
    /// [`TrophicStage`](super::TrophicStage).
    pub const TROPHIC: u32 = 200;
    /// [`CompetitionStage`](super::CompetitionStage).
    pub const COMPETITION: u32 = 300;
    /// [`MortalityStage`](super::MortalityStage).
    pub const MORTALITY: u32 = 400;
    /// [`PopulationStage`](super::PopulationStage).
    pub const POPULATION: u32 = 500;
}

// ── TrophicStage ───────────────────────────────────────────────────

/// Computes grazing, predation and scarcity from band biomass.
#[derive(Clone, Debug, Default)]
pub struct TrophicStage {
    calculator: TrophicInteractionCalculator,
}

impl TrophicStage {
    /// Stage with the given tuning.
    pub fn new(config: TrophicConfig) -> Self {
        Self {
            calculator: TrophicInteractionCalculator::new(config),
        }
    }
}

impl Stage for TrophicStage {
    fn name(&self) -> &str {
        names::TROPHIC
    }

    fn reads(&self) -> SlotSet {
        SlotSet::of(&[SPECIES.id()])
    }

    fn writes(&self) -> Vec<(SlotId, WriteMode)> {
        vec![
            (TROPHIC.id(), WriteMode::Exclusive),
            (NOTES.id(), WriteMode::Append),
        ]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
        let interactions = self.calculator.compute(ctx.read(SPECIES)?);
        let diagnostics = interactions.diagnostics.clone();
        ctx.write(TROPHIC, interactions)?;
        finish(ctx, diagnostics)
    }
}

// ── CompetitionStage ───────────────────────────────────────────────

/// Resolves kin and non-kin competition within trophic groups.
#[derive(Clone, Debug, Default)]
pub struct CompetitionStage {
    calculator: KinCompetitionCalculator,
}

impl CompetitionStage {
    /// Stage with the given tuning.
    pub fn new(config: CompetitionConfig) -> Self {
        Self {
            calculator: KinCompetitionCalculator::new(config),
        }
    }
}

impl Stage for CompetitionStage {
    fn name(&self) -> &str {
        names::COMPETITION
    }

    fn reads(&self) -> SlotSet {
        SlotSet::of(&[SPECIES.id(), NICHE.id()])
    }

    fn writes(&self) -> Vec<(SlotId, WriteMode)> {
        vec![(COMPETITION.id(), WriteMode::Exclusive)]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
        let table = self
            .calculator
            .compute(ctx.read(SPECIES)?, ctx.read(NICHE)?, ctx.turn());
        ctx.write(COMPETITION, table)?;
        Ok(StageOutcome::Completed)
    }
}

// ── MortalityStage ─────────────────────────────────────────────────

/// Computes authoritative death rates and tiers the results.
#[derive(Clone, Debug, Default)]
pub struct MortalityStage {
    engine: MortalityEngine,
    tiers: TierClassifier,
    checker: ExtinctionChecker,
}

impl MortalityStage {
    /// Stage with the given tuning. The population config supplies the
    /// viable-population floor used for tiering.
    pub fn new(mortality: MortalityConfig, tiers: TierConfig, population: PopulationConfig) -> Self {
        Self {
            engine: MortalityEngine::new(mortality),
            tiers: TierClassifier::new(tiers),
            checker: ExtinctionChecker::new(population),
        }
    }
}

impl Stage for MortalityStage {
    fn name(&self) -> &str {
        names::MORTALITY
    }

    fn reads(&self) -> SlotSet {
        SlotSet::of(&[
            SPECIES.id(),
            PRESSURES.id(),
            NICHE.id(),
            RESOURCES.id(),
            TROPHIC.id(),
            COMPETITION.id(),
        ])
    }

    fn writes(&self) -> Vec<(SlotId, WriteMode)> {
        vec![
            (MORTALITY.id(), WriteMode::Exclusive),
            (NOTES.id(), WriteMode::Append),
        ]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
        let arena = ctx.read(SPECIES)?;
        let inputs = MortalityInputs {
            arena,
            pressures: ctx.read(PRESSURES)?,
            niche: ctx.read(NICHE)?,
            resources: ctx.read_optional(RESOURCES)?,
            trophic: Some(ctx.read(TROPHIC)?),
            competition: Some(ctx.read(COMPETITION)?),
            turn: ctx.turn(),
        };
        let mut report = self.engine.evaluate(&inputs);
        self.tiers.classify(&mut report, arena, &self.checker);

        let mut diagnostics = Vec::new();
        for result in report.results() {
            let code = arena
                .get(result.species)
                .map_or_else(|| result.species.to_string(), |sp| sp.code.to_string());
            diagnostics.extend(
                result
                    .notes
                    .iter()
                    .map(|n| Diagnostic::new(format!("{code}/{}", n.subject), n.message.clone())),
            );
        }
        debug!(
            critical = report.tier(Tier::Critical).count(),
            focus = report.tier(Tier::Focus).count(),
            deaths = report.total_deaths(),
            "mortality tiered"
        );
        ctx.write(MORTALITY, report)?;
        finish(ctx, diagnostics)
    }
}

// ── PopulationStage ────────────────────────────────────────────────

/// Applies deaths, tracks streaks and decides extinction.
///
/// Produces the updated species records and extinction events; the
/// engine commits both after the turn.
#[derive(Clone, Debug, Default)]
pub struct PopulationStage {
    updater: PopulationUpdater,
}

impl PopulationStage {
    /// Stage with the given tuning.
    pub fn new(config: PopulationConfig) -> Self {
        Self {
            updater: PopulationUpdater::new(config),
        }
    }
}

impl Stage for PopulationStage {
    fn name(&self) -> &str {
        names::POPULATION
    }

    fn requires(&self) -> Vec<&str> {
        vec![names::MORTALITY]
    }

    fn reads(&self) -> SlotSet {
        SlotSet::of(&[SPECIES.id(), MORTALITY.id()])
    }

    fn writes(&self) -> Vec<(SlotId, WriteMode)> {
        vec![
            (UPDATED_SPECIES.id(), WriteMode::Exclusive),
            (LINEAGE_EVENTS.id(), WriteMode::Append),
        ]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
        let arena = ctx.read(SPECIES)?;
        let report = ctx.read(MORTALITY)?;
        // Committing deaths against species that do not exist would
        // corrupt the repository.
        if let Some(stray) = report.results().iter().find(|r| arena.get(r.species).is_none()) {
            return Err(StageError::Fatal {
                reason: format!("mortality result for unknown species {}", stray.species),
            });
        }
        let outcome = self.updater.apply(arena, report, ctx.turn());
        ctx.write(UPDATED_SPECIES, outcome.updated)?;
        ctx.extend(LINEAGE_EVENTS, outcome.events)?;
        Ok(StageOutcome::Completed)
    }
}

fn finish(
    ctx: &mut StageContext<'_>,
    diagnostics: Vec<Diagnostic>,
) -> Result<StageOutcome, StageError> {
    if !diagnostics.is_empty() {
        warn!(
            stage = ctx.stage_name(),
            count = diagnostics.len(),
            "stage recovered from malformed inputs"
        );
        ctx.extend(NOTES, diagnostics.iter().cloned())?;
    }
    Ok(StageOutcome::from_diagnostics(diagnostics))
}
