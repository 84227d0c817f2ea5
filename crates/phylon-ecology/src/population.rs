//! Survivor bookkeeping and the extinction decision.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use phylon_core::{
    ExtinctionReason, ExtinctionRecord, LineageEvent, LineageEventKind, MortalityReport, Species,
    SpeciesArena, SpeciesStatus, TurnId,
};

use crate::params::{Check, ParameterError, StepTable};

/// Tuning for [`ExtinctionChecker`] and [`PopulationUpdater`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Minimum viable population by body length (cm).
    pub viable_population: StepTable<u64>,
    /// Death rate above which a turn extends the high-mortality streak.
    pub streak_death_rate: f64,
    /// Streak length that triggers extinction.
    pub streak_limit: u32,
    /// Single-turn death rate above which the species collapses.
    pub collapse_death_rate: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            viable_population: StepTable::new(
                &[(0.1, 10_000), (1.0, 2_000), (10.0, 500), (100.0, 100)],
                50,
            ),
            streak_death_rate: 0.5,
            streak_limit: 3,
            collapse_death_rate: 0.85,
        }
    }
}

impl PopulationConfig {
    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let c = Check("population");
        c.table("viable_population", &self.viable_population)?;
        c.unit("streak_death_rate", self.streak_death_rate)?;
        c.unit("collapse_death_rate", self.collapse_death_rate)?;
        if self.streak_limit == 0 {
            return Err(ParameterError {
                component: "population",
                parameter: "streak_limit",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ── ExtinctionChecker ──────────────────────────────────────────────

/// Evaluates the three extinction predicates.
#[derive(Clone, Debug, Default)]
pub struct ExtinctionChecker {
    config: PopulationConfig,
}

impl ExtinctionChecker {
    /// Checker with the given tuning.
    pub fn new(config: PopulationConfig) -> Self {
        Self { config }
    }

    /// Active tuning.
    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Size-dependent floor below which a species cannot persist.
    pub fn minimum_viable_population(&self, species: &Species) -> u64 {
        self.config
            .viable_population
            .lookup(species.traits.body_length_cm)
    }

    /// Streak after a turn with `death_rate`.
    pub fn next_streak(&self, current: u32, death_rate: f64) -> u32 {
        if death_rate > self.config.streak_death_rate {
            current.saturating_add(1)
        } else {
            0
        }
    }

    /// First predicate that holds, checked in order: viability, streak,
    /// collapse. `streak` is the value after this turn.
    pub fn check(
        &self,
        species: &Species,
        survivors: u64,
        death_rate: f64,
        streak: u32,
    ) -> Option<ExtinctionReason> {
        let minimum = self.minimum_viable_population(species);
        if survivors < minimum {
            Some(ExtinctionReason::BelowViablePopulation { survivors, minimum })
        } else if streak >= self.config.streak_limit {
            Some(ExtinctionReason::SustainedMortality { turns: streak })
        } else if death_rate > self.config.collapse_death_rate {
            Some(ExtinctionReason::CatastrophicCollapse { death_rate })
        } else {
            None
        }
    }
}

// ── PopulationUpdater ──────────────────────────────────────────────

/// Species records and events produced by one population update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PopulationOutcome {
    /// Every species whose record changed, ready to commit.
    pub updated: Vec<Species>,
    /// One event per species that went extinct.
    pub events: Vec<LineageEvent>,
}

impl PopulationOutcome {
    /// Number of extinctions this turn.
    pub fn extinctions(&self) -> usize {
        self.events.len()
    }
}

/// Applies mortality to species records.
#[derive(Clone, Debug, Default)]
pub struct PopulationUpdater {
    checker: ExtinctionChecker,
}

impl PopulationUpdater {
    /// Updater with the given tuning.
    pub fn new(config: PopulationConfig) -> Self {
        Self {
            checker: ExtinctionChecker::new(config),
        }
    }

    /// The extinction checker in use.
    pub fn checker(&self) -> &ExtinctionChecker {
        &self.checker
    }

    /// Apply a mortality report to a snapshot of the species.
    ///
    /// Extinct species and species missing from the arena are skipped.
    /// The arena itself is untouched; the caller commits `updated`.
    pub fn apply(
        &self,
        arena: &SpeciesArena,
        report: &MortalityReport,
        turn: TurnId,
    ) -> PopulationOutcome {
        let mut out = PopulationOutcome::default();
        for result in report.results() {
            let Some(current) = arena.get(result.species) else {
                continue;
            };
            if !current.is_alive() {
                continue;
            }
            let mut sp = current.clone();
            let streak = self
                .checker
                .next_streak(sp.high_mortality_streak, result.death_rate);
            sp.high_mortality_streak = streak;
            sp.last_death_rate = Some(result.death_rate);
            sp.intervention.tick_down();

            match self
                .checker
                .check(&sp, result.survivors, result.death_rate, streak)
            {
                Some(reason) => {
                    sp.population = 0;
                    sp.status = SpeciesStatus::Extinct;
                    sp.extinction = Some(ExtinctionRecord { reason, turn });
                    info!(
                        species = %sp.code,
                        %reason,
                        survivors = result.survivors,
                        death_rate = result.death_rate,
                        "species extinct"
                    );
                    out.events.push(LineageEvent {
                        lineage_code: sp.code.clone(),
                        species: sp.id,
                        kind: LineageEventKind::Extinction(reason),
                        turn,
                        final_population: result.survivors,
                        death_rate: result.death_rate,
                    });
                }
                None => {
                    sp.population = result.survivors;
                }
            }
            out.updated.push(sp);
        }
        debug!(
            updated = out.updated.len(),
            extinctions = out.extinctions(),
            "population updated"
        );
        out
    }
}
