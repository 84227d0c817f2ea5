//! Reusable stage fixtures.
//!
//! - [`RecordingStage`]: logs its invocation and stamps its name into the
//!   trace slots it owns.
//! - [`FailingStage`]: succeeds a fixed number of times, then returns a
//!   recoverable failure.
//! - [`FatalStage`]: always aborts the turn.
//!
//! All fixtures share a [`StageLog`] so tests can assert execution order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use phylon_core::{Diagnostic, StageError};
use phylon_stage::{SlotId, SlotKey, SlotSet, Stage, StageContext, StageKind, StageOutcome, WriteMode};

/// Trace slots for fixture pipelines. Each holds the names of the stages
/// that wrote it.
pub const TRACE_A: SlotKey<Vec<String>> = SlotKey::custom(0, "trace_a");
pub const TRACE_B: SlotKey<Vec<String>> = SlotKey::custom(1, "trace_b");
pub const TRACE_C: SlotKey<Vec<String>> = SlotKey::custom(2, "trace_c");

/// Shared, ordered record of stage invocations.
#[derive(Clone, Debug, Default)]
pub struct StageLog(Arc<Mutex<Vec<String>>>);

impl StageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    /// Invocations so far, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Declarations shared by every fixture.
#[derive(Clone, Debug)]
struct Decl {
    name: String,
    requires: Vec<String>,
    reads: SlotSet,
    owns: Vec<SlotKey<Vec<String>>>,
    appends: Vec<SlotKey<Vec<String>>>,
    kind: StageKind,
}

impl Decl {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            reads: SlotSet::empty(),
            owns: Vec::new(),
            appends: Vec::new(),
            kind: StageKind::Compute,
        }
    }

    fn writes(&self) -> Vec<(SlotId, WriteMode)> {
        self.owns
            .iter()
            .map(|k| (k.id(), WriteMode::Exclusive))
            .chain(self.appends.iter().map(|k| (k.id(), WriteMode::Append)))
            .collect()
    }

    fn stamp(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        for key in self.owns.iter().chain(&self.appends) {
            ctx.append(*key, self.name.clone())?;
        }
        Ok(())
    }
}

macro_rules! declaration_builders {
    ($ty:ty) => {
        impl $ty {
            /// Declare a dependency on another stage.
            pub fn after(mut self, stage: &str) -> Self {
                self.decl.requires.push(stage.to_string());
                self
            }

            /// Declare a read.
            pub fn reading(mut self, slot: SlotId) -> Self {
                self.decl.reads.insert(slot);
                self
            }

            /// Declare exclusive ownership of a trace slot.
            pub fn owns(mut self, key: SlotKey<Vec<String>>) -> Self {
                self.decl.owns.push(key);
                self
            }

            /// Declare an append-only write to a trace slot.
            pub fn appends(mut self, key: SlotKey<Vec<String>>) -> Self {
                self.decl.appends.push(key);
                self
            }

            /// Mark the stage as external with the given budget.
            pub fn external(mut self, budget: Duration) -> Self {
                self.decl.kind = StageKind::External { budget };
                self
            }
        }
    };
}

macro_rules! stage_declarations {
    () => {
        fn name(&self) -> &str {
            &self.decl.name
        }

        fn requires(&self) -> Vec<&str> {
            self.decl.requires.iter().map(String::as_str).collect()
        }

        fn reads(&self) -> SlotSet {
            self.decl.reads
        }

        fn writes(&self) -> Vec<(SlotId, WriteMode)> {
            self.decl.writes()
        }

        fn kind(&self) -> StageKind {
            self.decl.kind
        }
    };
}

// ── RecordingStage ─────────────────────────────────────────────────

/// Logs each run and stamps its name into every slot it writes.
///
/// With [`degrade`](RecordingStage::degrade) it returns
/// [`StageOutcome::Degraded`] carrying one diagnostic.
pub struct RecordingStage {
    decl: Decl,
    log: StageLog,
    degraded: bool,
}

impl RecordingStage {
    pub fn new(name: impl Into<String>, log: &StageLog) -> Self {
        Self {
            decl: Decl::new(name),
            log: log.clone(),
            degraded: false,
        }
    }

    /// Report a degraded outcome on every run.
    pub fn degrade(mut self) -> Self {
        self.degraded = true;
        self
    }
}

declaration_builders!(RecordingStage);

impl Stage for RecordingStage {
    stage_declarations!();

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
        self.log.push(&self.decl.name);
        self.decl.stamp(ctx)?;
        if self.degraded {
            Ok(StageOutcome::Degraded {
                diagnostics: vec![Diagnostic::new(self.decl.name.clone(), "degraded on purpose")],
            })
        } else {
            Ok(StageOutcome::Completed)
        }
    }
}

// ── FailingStage ───────────────────────────────────────────────────

/// Succeeds `succeed_count` times, then fails with
/// [`StageError::Failed`] on every later run.
pub struct FailingStage {
    decl: Decl,
    log: StageLog,
    succeed_count: usize,
    calls: AtomicUsize,
}

impl FailingStage {
    pub fn new(name: impl Into<String>, succeed_count: usize, log: &StageLog) -> Self {
        Self {
            decl: Decl::new(name),
            log: log.clone(),
            succeed_count,
            calls: AtomicUsize::new(0),
        }
    }
}

declaration_builders!(FailingStage);

impl Stage for FailingStage {
    stage_declarations!();

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
        self.log.push(&self.decl.name);
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(StageError::Failed {
                reason: format!("{} failed on call {n}", self.decl.name),
            });
        }
        self.decl.stamp(ctx)?;
        Ok(StageOutcome::Completed)
    }
}

// ── FatalStage ─────────────────────────────────────────────────────

/// Always returns [`StageError::Fatal`].
pub struct FatalStage {
    decl: Decl,
    log: StageLog,
}

impl FatalStage {
    pub fn new(name: impl Into<String>, log: &StageLog) -> Self {
        Self {
            decl: Decl::new(name),
            log: log.clone(),
        }
    }
}

declaration_builders!(FatalStage);

impl Stage for FatalStage {
    stage_declarations!();

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
        self.log.push(&self.decl.name);
        self.decl.stamp(ctx)?;
        Err(StageError::Fatal {
            reason: format!("{} refuses to continue", self.decl.name),
        })
    }
}
