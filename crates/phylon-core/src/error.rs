//! Error types for the Phylon engine.
//!
//! Organized by subsystem: turn execution, individual stages, persistence
//! and trait validation. Per-species computation problems are never errors;
//! they surface as [`Diagnostic`](crate::Diagnostic) notes on results.

use std::error::Error;
use std::fmt;

/// Errors from the turn engine during `run_turn()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnError {
    /// A stage returned [`StageError::Fatal`]; the turn was abandoned
    /// and no state was committed.
    Aborted {
        /// Name of the stage that aborted the turn.
        stage: String,
        /// The underlying stage error.
        reason: StageError,
    },
    /// Committing the turn's species updates failed.
    CommitFailed(RepositoryError),
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted { stage, reason } => {
                write!(f, "turn aborted by stage '{stage}': {reason}")
            }
            Self::CommitFailed(e) => write!(f, "commit failed: {e}"),
        }
    }
}

impl Error for TurnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Aborted { reason, .. } => Some(reason),
            Self::CommitFailed(e) => Some(e),
        }
    }
}

impl From<RepositoryError> for TurnError {
    fn from(e: RepositoryError) -> Self {
        Self::CommitFailed(e)
    }
}

/// Errors from an individual stage's `run()`.
///
/// `Failed` is recoverable: the engine logs it, skips the stages that
/// depend on the failed one and carries on. `Fatal` aborts the turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageError {
    /// The stage could not produce its outputs this turn.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A required context slot was missing or had the wrong type.
    MissingInput {
        /// Name of the slot.
        slot: &'static str,
    },
    /// The stage attempted a read it did not declare.
    UndeclaredRead {
        /// Name of the slot.
        slot: &'static str,
    },
    /// The stage attempted a write it did not declare.
    UndeclaredWrite {
        /// Name of the slot.
        slot: &'static str,
    },
    /// Continuing the turn would corrupt state; abort it.
    Fatal {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl StageError {
    /// Whether this error aborts the whole turn.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "stage failed: {reason}"),
            Self::MissingInput { slot } => write!(f, "context slot '{slot}' is not available"),
            Self::UndeclaredRead { slot } => {
                write!(f, "read of undeclared context slot '{slot}'")
            }
            Self::UndeclaredWrite { slot } => {
                write!(f, "write to undeclared context slot '{slot}'")
            }
            Self::Fatal { reason } => write!(f, "fatal: {reason}"),
        }
    }
}

impl Error for StageError {}

/// Errors from a [`SpeciesRepository`](crate::SpeciesRepository).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepositoryError {
    /// The species id is not known to the repository.
    UnknownSpecies {
        /// The offending id.
        id: crate::SpeciesId,
    },
    /// An extinct species cannot be revived.
    ResurrectionRejected {
        /// The offending id.
        id: crate::SpeciesId,
    },
    /// Backend-specific failure.
    Backend {
        /// Human-readable description.
        reason: String,
    },
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSpecies { id } => write!(f, "unknown species {id}"),
            Self::ResurrectionRejected { id } => {
                write!(f, "species {id} is extinct and cannot change status")
            }
            Self::Backend { reason } => write!(f, "repository backend: {reason}"),
        }
    }
}

impl Error for RepositoryError {}

/// A trait record failed validation.
#[derive(Clone, Debug, PartialEq)]
pub enum TraitError {
    /// A numeric trait is NaN or infinite.
    NonFinite {
        /// Trait name.
        name: String,
    },
    /// A numeric trait lies outside its permitted range.
    OutOfRange {
        /// Trait name.
        name: String,
        /// The offending value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// The extension map is full.
    TooManyExtensions {
        /// Configured maximum.
        max: usize,
    },
}

impl fmt::Display for TraitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { name } => write!(f, "trait '{name}' must be finite"),
            Self::OutOfRange {
                name,
                value,
                min,
                max,
            } => write!(f, "trait '{name}' = {value} outside [{min}, {max}]"),
            Self::TooManyExtensions { max } => {
                write!(f, "at most {max} extension traits are allowed")
            }
        }
    }
}

impl Error for TraitError {}
