//! Turn orchestration and simulation sessions for Phylon.
//!
//! [`TurnEngine`] validates a stage pipeline once and runs it turn after
//! turn. [`Simulation`] wraps an engine with the species repository and
//! lineage event log, and is the usual entry point:
//!
//! ```ignore
//! let mut sim = Simulation::new(&SimulationConfig::default(), repo, log)?;
//! let outcome = sim.run_turn(TurnInputs::new(pressures, niche))?;
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod events;
pub mod external;
pub mod metrics;
pub mod simulation;
pub mod turn;

pub use config::{ConfigError, ExternalConfig, SimulationConfig};
pub use events::ChannelEventLog;
pub use external::{ExternalCallRunner, ExternalOutcome, FallbackReason};
pub use metrics::TurnMetrics;
pub use simulation::{core_pipeline, Simulation, TurnInputs, TurnOutcome};
pub use turn::{StageRecord, StageStatus, TurnEngine, TurnEngineBuilder, TurnReport};
