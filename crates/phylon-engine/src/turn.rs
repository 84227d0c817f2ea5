//! Turn engine: the stage orchestrator.
//!
//! [`TurnEngine`] owns the registered stages and the validated
//! [`StagePlan`]. Each [`run_turn()`](TurnEngine::run_turn) executes the
//! stages in ascending order, once each, lending every stage a
//! [`StageContext`] restricted to its declarations.
//!
//! # Failure handling
//!
//! - `Err(StageError::Failed)` and the other recoverable errors: the
//!   stage is logged, every stage that transitively depends on it is
//!   skipped, and independent stages still run.
//! - `Err(StageError::Fatal)`: the turn stops and
//!   [`TurnError::Aborted`] is returned. The engine holds no per-turn
//!   state, so the next call starts cleanly.

use std::time::Instant;

use tracing::{debug, debug_span, info_span, warn};

use phylon_core::{Diagnostic, StageError, TurnError, TurnId};
use phylon_stage::{
    validate_pipeline, RegisteredStage, SlotId, SlotSet, Stage, StageContext, StageKind,
    StageOutcome, StagePlan, TurnContext,
};

use crate::config::ConfigError;
use crate::metrics::TurnMetrics;

// Compile-time assertion: TurnEngine can move to a worker thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<TurnEngine>();
    }
};

// ── TurnReport ─────────────────────────────────────────────────────

/// What happened to one stage during a turn.
#[derive(Clone, Debug, PartialEq)]
pub enum StageStatus {
    /// Ran normally.
    Completed,
    /// Ran, but recovered from bad inputs.
    Degraded {
        /// What was recovered.
        diagnostics: Vec<Diagnostic>,
    },
    /// Returned a recoverable error.
    Failed(StageError),
    /// Not run because an upstream stage failed.
    Skipped {
        /// The failed stage that blocked this one.
        blocked_by: String,
    },
}

impl StageStatus {
    /// Whether the stage produced its outputs.
    pub fn ran(&self) -> bool {
        matches!(self, Self::Completed | Self::Degraded { .. })
    }
}

/// One stage's entry in a [`TurnReport`].
#[derive(Clone, Debug, PartialEq)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,
    /// Outcome.
    pub status: StageStatus,
    /// Execution time in microseconds; zero when skipped.
    pub elapsed_us: u64,
}

/// Result of a turn that was not aborted.
#[derive(Clone, Debug)]
#[must_use]
pub struct TurnReport {
    /// The turn that ran.
    pub turn: TurnId,
    /// Every planned stage, in execution order.
    pub stages: Vec<StageRecord>,
    /// Timings and counters.
    pub metrics: TurnMetrics,
}

impl TurnReport {
    /// Status of a stage by name.
    pub fn status(&self, name: &str) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.status)
    }

    /// Records of stages that failed or were skipped.
    pub fn problems(&self) -> impl Iterator<Item = &StageRecord> {
        self.stages.iter().filter(|r| !r.status.ran())
    }

    /// Whether every stage completed without degradation.
    pub fn is_clean(&self) -> bool {
        self.stages
            .iter()
            .all(|r| r.status == StageStatus::Completed)
    }
}

// ── Builder ────────────────────────────────────────────────────────

/// Collects stages and input slots, then validates them into a
/// [`TurnEngine`].
///
/// ```ignore
/// let engine = TurnEngine::builder()
///     .input(SPECIES.id())
///     .register(TrophicStage::default(), order::TROPHIC)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct TurnEngineBuilder {
    inputs: SlotSet,
    stages: Vec<RegisteredStage>,
}

impl TurnEngineBuilder {
    /// Declare a slot the caller seeds before each turn.
    pub fn input(mut self, slot: SlotId) -> Self {
        self.inputs.insert(slot);
        self
    }

    /// Declare several input slots.
    pub fn inputs(mut self, slots: SlotSet) -> Self {
        self.inputs = self.inputs.union(&slots);
        self
    }

    /// Register a stage at `order`.
    pub fn register(self, stage: impl Stage, order: u32) -> Self {
        self.register_boxed(Box::new(stage), order)
    }

    /// Register an already boxed stage at `order`.
    pub fn register_boxed(mut self, stage: Box<dyn Stage>, order: u32) -> Self {
        self.stages.push(RegisteredStage { order, stage });
        self
    }

    /// Validate the pipeline and build the engine.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Pipeline`] for every structural problem found by
    /// [`validate_pipeline`].
    pub fn build(self) -> Result<TurnEngine, ConfigError> {
        let plan = validate_pipeline(&self.stages, self.inputs)?;
        debug!(
            stages = plan.len(),
            inputs = self.inputs.len(),
            "turn pipeline validated"
        );
        Ok(TurnEngine {
            stages: self.stages,
            plan,
            turns_run: 0,
            last_metrics: TurnMetrics::default(),
        })
    }
}

// ── TurnEngine ─────────────────────────────────────────────────────

/// Runs a validated stage pipeline, one turn at a time.
///
/// `run_turn` takes `&mut self`, so two turns can never overlap.
pub struct TurnEngine {
    stages: Vec<RegisteredStage>,
    plan: StagePlan,
    turns_run: u64,
    last_metrics: TurnMetrics,
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine")
            .field("stages", &self.stage_names())
            .field("turns_run", &self.turns_run)
            .finish()
    }
}

impl TurnEngine {
    /// Start a new pipeline.
    pub fn builder() -> TurnEngineBuilder {
        TurnEngineBuilder::default()
    }

    /// The validated plan.
    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.plan.stages().iter().map(|s| s.name.as_str()).collect()
    }

    /// Turns that ran to completion (not aborted).
    pub fn turns_run(&self) -> u64 {
        self.turns_run
    }

    /// Metrics from the most recent completed turn.
    pub fn last_metrics(&self) -> &TurnMetrics {
        &self.last_metrics
    }

    /// Execute every stage once against `ctx`.
    ///
    /// # Errors
    ///
    /// [`TurnError::Aborted`] when a stage returns [`StageError::Fatal`].
    /// Slots written before the abort stay in `ctx`; callers must not
    /// commit them.
    pub fn run_turn(&mut self, ctx: &mut TurnContext) -> Result<TurnReport, TurnError> {
        let turn_start = Instant::now();
        let turn = ctx.turn();
        let span = info_span!("turn", turn = turn.0);
        let _entered = span.enter();

        let mut blocked: Vec<Option<String>> = vec![None; self.plan.len()];
        let mut records = Vec::with_capacity(self.plan.len());
        let mut metrics = TurnMetrics::default();

        for (position, planned) in self.plan.stages().iter().enumerate() {
            if let Some(root) = blocked[position].take() {
                debug!(stage = %planned.name, blocked_by = %root, "stage skipped");
                metrics.stages_skipped += 1;
                records.push(StageRecord {
                    name: planned.name.clone(),
                    status: StageStatus::Skipped { blocked_by: root },
                    elapsed_us: 0,
                });
                continue;
            }

            let stage = &self.stages[planned.index].stage;
            let stage_span = debug_span!("stage", name = %planned.name);
            let _stage_entered = stage_span.enter();
            let stage_start = Instant::now();
            let result = {
                let mut sctx = StageContext::new(
                    ctx,
                    &planned.name,
                    planned.reads,
                    planned.exclusive,
                    planned.append,
                );
                stage.run(&mut sctx)
            };
            let elapsed = stage_start.elapsed();
            let elapsed_us = elapsed.as_micros() as u64;
            if let StageKind::External { budget } = planned.kind {
                if elapsed > budget {
                    warn!(
                        stage = %planned.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        budget_ms = budget.as_millis() as u64,
                        "external stage exceeded its budget"
                    );
                }
            }

            let status = match result {
                Ok(StageOutcome::Completed) => StageStatus::Completed,
                Ok(StageOutcome::Degraded { diagnostics }) => {
                    warn!(
                        stage = %planned.name,
                        diagnostics = diagnostics.len(),
                        "stage degraded"
                    );
                    StageStatus::Degraded { diagnostics }
                }
                Err(error) if error.is_fatal() => {
                    warn!(stage = %planned.name, %error, "turn aborted");
                    return Err(TurnError::Aborted {
                        stage: planned.name.clone(),
                        reason: error,
                    });
                }
                Err(error) => {
                    let dependents = self.plan.dependents_of(position);
                    warn!(
                        stage = %planned.name,
                        %error,
                        skipping = dependents.len(),
                        "stage failed"
                    );
                    for d in dependents {
                        blocked[d].get_or_insert_with(|| planned.name.clone());
                    }
                    StageStatus::Failed(error)
                }
            };

            if status.ran() {
                metrics.stages_run += 1;
                metrics.stage_us.push((planned.name.clone(), elapsed_us));
            } else {
                metrics.stages_failed += 1;
            }
            records.push(StageRecord {
                name: planned.name.clone(),
                status,
                elapsed_us,
            });
        }

        metrics.total_us = turn_start.elapsed().as_micros() as u64;
        self.turns_run += 1;
        self.last_metrics = metrics.clone();
        debug!(
            run = metrics.stages_run,
            failed = metrics.stages_failed,
            skipped = metrics.stages_skipped,
            total_us = metrics.total_us,
            "turn stages finished"
        );
        Ok(TurnReport {
            turn,
            stages: records,
            metrics,
        })
    }
}
