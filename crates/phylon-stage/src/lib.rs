//! Stage abstraction for the Phylon turn engine.
//!
//! A turn is a fixed sequence of [`Stage`]s that communicate through typed
//! slots in a [`TurnContext`]. Each stage declares its upstream stages and
//! the slots it reads and writes; [`validate_pipeline`] checks those
//! declarations once, and the [`StageContext`] enforces them on every run.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod pipeline;
pub mod slot;
pub mod stage;

pub use context::{StageContext, TurnContext};
pub use pipeline::{
    validate_pipeline, PipelineError, PlannedStage, RegisteredStage, StagePlan, WriteConflict,
};
pub use slot::{SlotId, SlotKey, SlotSet, SlotSetIter};
pub use stage::{Stage, StageKind, StageOutcome, WriteMode};
