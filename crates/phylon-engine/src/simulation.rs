//! Simulation sessions: repository in, committed turns out.
//!
//! A [`Simulation`] owns the species repository, the lineage event log
//! and a [`TurnEngine`]. Each [`run_turn()`](Simulation::run_turn)
//! snapshots the repository, runs the pipeline, then commits the updated
//! species and extinction events in one place after every stage has run.
//! Nothing is committed for an aborted turn.

use std::time::Instant;

use tracing::{info, info_span, warn};

use phylon_core::{
    Diagnostic, LineageEvent, LineageEventLog, MortalityReport, NicheSnapshot, PressureModifiers,
    RepositoryError, ResourceSnapshot, Species, SpeciesArena, SpeciesId, SpeciesRepository,
    TurnError, TurnId,
};
use phylon_ecology::stages::{order, CompetitionStage, MortalityStage, PopulationStage, TrophicStage};
use phylon_stage::slot::{
    LINEAGE_EVENTS, MORTALITY, NICHE, NOTES, PRESSURES, RESOURCES, SPECIES, UPDATED_SPECIES,
};
use phylon_stage::TurnContext;

use crate::config::{ConfigError, SimulationConfig};
use crate::metrics::TurnMetrics;
use crate::turn::{TurnEngine, TurnEngineBuilder, TurnReport};

/// The four core stages, with the standard input slots declared.
///
/// Collaborator stages (pressure parsing, narrative, speciation) can be
/// registered on the returned builder before `build()`.
pub fn core_pipeline(config: &SimulationConfig) -> TurnEngineBuilder {
    TurnEngine::builder()
        .input(SPECIES.id())
        .input(PRESSURES.id())
        .input(NICHE.id())
        .input(RESOURCES.id())
        .register(TrophicStage::new(config.trophic.clone()), order::TROPHIC)
        .register(
            CompetitionStage::new(config.competition.clone()),
            order::COMPETITION,
        )
        .register(
            MortalityStage::new(
                config.mortality.clone(),
                config.tier.clone(),
                config.population.clone(),
            ),
            order::MORTALITY,
        )
        .register(
            PopulationStage::new(config.population.clone()),
            order::POPULATION,
        )
}

/// Per-turn inputs supplied by collaborators.
#[derive(Clone, Debug, Default)]
pub struct TurnInputs {
    /// Environmental pressures.
    pub pressures: PressureModifiers,
    /// Niche analyzer output.
    pub niche: NicheSnapshot,
    /// Optional carrying capacities.
    pub resources: Option<ResourceSnapshot>,
}

impl TurnInputs {
    /// Inputs without carrying capacities.
    pub fn new(pressures: PressureModifiers, niche: NicheSnapshot) -> Self {
        Self {
            pressures,
            niche,
            resources: None,
        }
    }

    /// Attach carrying capacities.
    pub fn with_resources(mut self, resources: ResourceSnapshot) -> Self {
        self.resources = Some(resources);
        self
    }
}

/// Everything a committed turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Per-stage statuses and metrics.
    pub report: TurnReport,
    /// Mortality results, if the mortality stage ran.
    pub mortality: Option<MortalityReport>,
    /// Species records that were committed.
    pub updated: Vec<Species>,
    /// Extinction events that were recorded.
    pub events: Vec<LineageEvent>,
    /// Diagnostics appended by stages.
    pub notes: Vec<Diagnostic>,
}

impl TurnOutcome {
    /// The turn that ran.
    pub fn turn(&self) -> TurnId {
        self.report.turn
    }
}

/// A running simulation.
#[derive(Debug)]
pub struct Simulation<R, L> {
    engine: TurnEngine,
    repository: R,
    events: L,
    turn: TurnId,
    last_metrics: TurnMetrics,
}

impl<R: SpeciesRepository, L: LineageEventLog> Simulation<R, L> {
    /// Session running the core pipeline, starting at turn 0.
    ///
    /// # Errors
    ///
    /// Any invalid parameter in `config`.
    pub fn new(config: &SimulationConfig, repository: R, events: L) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = core_pipeline(config).build()?;
        Ok(Self::with_engine(engine, repository, events))
    }

    /// Session running a custom pipeline.
    pub fn with_engine(engine: TurnEngine, repository: R, events: L) -> Self {
        Self {
            engine,
            repository,
            events,
            turn: TurnId(0),
            last_metrics: TurnMetrics::default(),
        }
    }

    /// Resume numbering at `turn`.
    pub fn starting_at(mut self, turn: TurnId) -> Self {
        self.turn = turn;
        self
    }

    /// The turn the next `run_turn` will execute.
    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// The species repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Mutable repository access between turns (seeding, speciation).
    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    /// The lineage event log.
    pub fn events(&self) -> &L {
        &self.events
    }

    /// The turn engine.
    pub fn engine(&self) -> &TurnEngine {
        &self.engine
    }

    /// Metrics from the last committed turn.
    pub fn last_metrics(&self) -> &TurnMetrics {
        &self.last_metrics
    }

    /// Tear down the session, returning its collaborators.
    pub fn into_parts(self) -> (R, L) {
        (self.repository, self.events)
    }

    /// Run one turn and commit its results.
    ///
    /// # Errors
    ///
    /// - [`TurnError::Aborted`]: a stage failed fatally. Nothing was
    ///   committed and the turn counter did not advance.
    /// - [`TurnError::CommitFailed`]: the repository rejected an update.
    ///   Living records already written are restored to their snapshot
    ///   values and the turn counter does not advance. Extinctions that
    ///   were written before the rejection keep their records and their
    ///   events, so a retried turn neither repeats nor loses them.
    pub fn run_turn(&mut self, inputs: TurnInputs) -> Result<TurnOutcome, TurnError> {
        let turn = self.turn;
        let span = info_span!("simulation_turn", turn = turn.0);
        let _entered = span.enter();

        let mut ctx = TurnContext::new(turn);
        ctx.insert(SPECIES, self.repository.snapshot());
        ctx.insert(PRESSURES, inputs.pressures);
        ctx.insert(NICHE, inputs.niche);
        if let Some(resources) = inputs.resources {
            ctx.insert(RESOURCES, resources);
        }

        let mut report = self.engine.run_turn(&mut ctx)?;

        let commit_start = Instant::now();
        let snapshot = ctx.take(SPECIES).unwrap_or_default();
        let updated = ctx.take(UPDATED_SPECIES).unwrap_or_default();
        let events = ctx.take(LINEAGE_EVENTS).unwrap_or_default();
        self.commit(&snapshot, &updated, &events)?;
        let mortality = ctx.take(MORTALITY);
        let notes = ctx.take(NOTES).unwrap_or_default();

        let metrics = &mut report.metrics;
        metrics.commit_us = commit_start.elapsed().as_micros() as u64;
        metrics.species_updated = updated.len() as u32;
        metrics.deaths = mortality.as_ref().map_or(0, MortalityReport::total_deaths);
        metrics.extinctions = events.len() as u32;
        info!(
            updated = metrics.species_updated,
            deaths = metrics.deaths,
            extinctions = metrics.extinctions,
            failed = metrics.stages_failed,
            "turn committed"
        );
        self.last_metrics = metrics.clone();
        self.turn = turn.next();

        Ok(TurnOutcome {
            report,
            mortality,
            updated,
            events,
            notes,
        })
    }

    /// Write living records first, then each extinct record followed at
    /// once by its events. An extinct record is never written without its
    /// event; a rejection rolls the living records back to `snapshot`.
    fn commit(
        &mut self,
        snapshot: &SpeciesArena,
        updated: &[Species],
        events: &[LineageEvent],
    ) -> Result<(), RepositoryError> {
        let (living, extinct): (Vec<&Species>, Vec<&Species>) =
            updated.iter().partition(|s| s.is_alive());

        let mut written: Vec<SpeciesId> = Vec::with_capacity(living.len());
        for species in living {
            if let Err(e) = self.repository.upsert(species) {
                self.roll_back(snapshot, &written);
                return Err(e);
            }
            written.push(species.id);
        }
        for species in extinct {
            if let Err(e) = self.repository.upsert(species) {
                self.roll_back(snapshot, &written);
                return Err(e);
            }
            for event in events.iter().filter(|e| e.species == species.id) {
                self.events.record(event.clone());
            }
        }
        Ok(())
    }

    fn roll_back(&mut self, snapshot: &SpeciesArena, written: &[SpeciesId]) {
        for &id in written {
            let Some(original) = snapshot.get(id) else {
                continue;
            };
            if let Err(error) = self.repository.upsert(original) {
                warn!(species = %original.code, %error, "rollback of committed record failed");
            }
        }
        if !written.is_empty() {
            warn!(restored = written.len(), "turn commit rolled back");
        }
    }
}
