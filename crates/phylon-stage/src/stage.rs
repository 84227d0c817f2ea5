//! The [`Stage`] trait and its declaration types.
//!
//! A stage is one step of a simulation turn. It declares, once at
//! registration, which upstream stages it needs and which context slots it
//! reads and writes, so the whole turn can be validated before it runs.

use std::time::Duration;

use phylon_core::{Diagnostic, StageError};

use crate::context::StageContext;
use crate::slot::{SlotId, SlotSet};

/// How a stage may write a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// The stage is the only writer of the slot this turn.
    Exclusive,
    /// Several stages may push onto the slot's `Vec`; nobody replaces it.
    Append,
}

/// Execution character of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StageKind {
    /// Pure, synchronous computation. Never blocks.
    #[default]
    Compute,
    /// Calls an external service. Must fall back deterministically if the
    /// service errors or exceeds `budget`.
    External {
        /// Wall-clock time the stage is expected to stay within.
        budget: Duration,
    },
}

/// Successful result of [`Stage::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// All outputs were produced normally.
    Completed,
    /// Outputs were produced, but some inputs had to be clamped or a
    /// fallback was used.
    Degraded {
        /// What was recovered.
        diagnostics: Vec<Diagnostic>,
    },
}

impl StageOutcome {
    /// `Degraded` when `diagnostics` is non-empty, otherwise `Completed`.
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            Self::Completed
        } else {
            Self::Degraded { diagnostics }
        }
    }

    /// Diagnostics carried by the outcome.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Completed => &[],
            Self::Degraded { diagnostics } => diagnostics,
        }
    }
}

/// One step of a simulation turn.
///
/// # Contract
///
/// - `name()`, `requires()`, `reads()`, `writes()` and `kind()` are
///   queried once at registration and must not change afterwards.
/// - `run()` touches only the slots it declared; the [`StageContext`]
///   rejects anything else.
/// - `Compute` stages are deterministic: same context, same outputs.
///
/// # Examples
///
/// ```
/// use phylon_core::{Diagnostic, StageError};
/// use phylon_stage::{slot, SlotSet, Stage, StageContext, StageOutcome, WriteMode};
/// use phylon_stage::SlotId;
///
/// struct CountSpecies;
///
/// impl Stage for CountSpecies {
///     fn name(&self) -> &str { "count_species" }
///
///     fn reads(&self) -> SlotSet { SlotSet::of(&[slot::SPECIES.id()]) }
///
///     fn writes(&self) -> Vec<(SlotId, WriteMode)> {
///         vec![(slot::NOTES.id(), WriteMode::Append)]
///     }
///
///     fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
///         let alive = ctx.read(slot::SPECIES)?.alive().count();
///         ctx.append(slot::NOTES, Diagnostic::new("species", format!("{alive} alive")))?;
///         Ok(StageOutcome::Completed)
///     }
/// }
///
/// assert_eq!(CountSpecies.name(), "count_species");
/// ```
pub trait Stage: Send + 'static {
    /// Unique name, used for dependencies, logging and reports.
    fn name(&self) -> &str;

    /// Names of stages that must run (and succeed) before this one.
    fn requires(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Context slots this stage reads.
    fn reads(&self) -> SlotSet;

    /// Context slots this stage writes.
    fn writes(&self) -> Vec<(SlotId, WriteMode)>;

    /// Whether the stage computes locally or calls out.
    fn kind(&self) -> StageKind {
        StageKind::Compute
    }

    /// Execute the stage for one turn.
    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError>;
}
