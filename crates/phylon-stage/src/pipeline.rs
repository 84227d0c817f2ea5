//! Pipeline validation and execution planning.
//!
//! [`validate_pipeline`] runs once when a turn engine is built. It rejects
//! every structural problem up front (ordering, dependencies, slot
//! ownership) and produces a [`StagePlan`]: the execution order plus, for
//! each stage, the slot sets its [`StageContext`](crate::StageContext) will
//! enforce and the upstream stages whose failure makes it skip.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::slot::{SlotId, SlotSet};
use crate::stage::{Stage, StageKind, WriteMode};

/// A stage together with its position key.
pub struct RegisteredStage {
    /// Execution key. Stages run in strictly ascending order.
    pub order: u32,
    /// The stage.
    pub stage: Box<dyn Stage>,
}

impl fmt::Debug for RegisteredStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredStage")
            .field("order", &self.order)
            .field("name", &self.stage.name())
            .finish()
    }
}

// ── Plan ───────────────────────────────────────────────────────────

/// Everything the engine needs to run one stage.
#[derive(Clone, Debug)]
pub struct PlannedStage {
    /// Index into the registered-stage slice.
    pub index: usize,
    /// Stage name.
    pub name: String,
    /// Registration order key.
    pub order: u32,
    /// Compute or external.
    pub kind: StageKind,
    /// Declared reads.
    pub reads: SlotSet,
    /// Slots written exclusively.
    pub exclusive: SlotSet,
    /// Slots appended to.
    pub append: SlotSet,
    /// Execution positions of direct upstream stages, through `requires`
    /// or through a read slot written earlier.
    pub upstream: SmallVec<[usize; 4]>,
}

/// Validated execution plan, in execution order.
#[derive(Debug)]
#[must_use]
pub struct StagePlan {
    stages: Vec<PlannedStage>,
    inputs: SlotSet,
}

impl StagePlan {
    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the plan has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    /// Stage at an execution position.
    pub fn get(&self, position: usize) -> Option<&PlannedStage> {
        self.stages.get(position)
    }

    /// Slots the engine must seed before the turn.
    pub fn inputs(&self) -> SlotSet {
        self.inputs
    }

    /// Execution position of a stage by name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Positions of every stage that transitively depends on `position`.
    pub fn dependents_of(&self, position: usize) -> Vec<usize> {
        let mut tainted = vec![false; self.stages.len()];
        if let Some(t) = tainted.get_mut(position) {
            *t = true;
        }
        let mut out = Vec::new();
        for (i, stage) in self.stages.iter().enumerate().skip(position + 1) {
            if stage.upstream.iter().any(|&u| tainted[u]) {
                tainted[i] = true;
                out.push(i);
            }
        }
        out
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// Two stages claiming the same slot incompatibly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteConflict {
    /// Contested slot.
    pub slot: SlotId,
    /// Earlier writer.
    pub first_writer: String,
    /// Later writer.
    pub second_writer: String,
}

/// Structural errors found while building a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// No stages registered.
    EmptyPipeline,
    /// Two stages share a name.
    DuplicateStageName {
        /// The repeated name.
        name: String,
    },
    /// Two stages share an order key.
    DuplicateOrder {
        /// The repeated key.
        order: u32,
        /// First stage registered with it.
        first: String,
        /// Second stage registered with it.
        second: String,
    },
    /// A stage requires a stage that was never registered.
    UnknownDependency {
        /// Dependent stage.
        stage: String,
        /// Missing stage name.
        requires: String,
    },
    /// The `requires` graph contains a cycle.
    DependencyCycle {
        /// Stage names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },
    /// A required stage is ordered at or after its dependent.
    OrderViolation {
        /// Dependent stage.
        stage: String,
        /// Required stage that runs too late.
        requires: String,
    },
    /// Slot ownership conflicts.
    WriteConflict(Vec<WriteConflict>),
    /// A stage writes a slot the engine seeds as input.
    InputOverwrite {
        /// Offending stage.
        stage: String,
        /// The input slot.
        slot: SlotId,
    },
    /// A stage reads a slot that is neither an input nor written earlier.
    UnsatisfiedRead {
        /// Reading stage.
        stage: String,
        /// The slot.
        slot: SlotId,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPipeline => write!(f, "pipeline has no stages"),
            Self::DuplicateStageName { name } => {
                write!(f, "stage name '{name}' registered twice")
            }
            Self::DuplicateOrder {
                order,
                first,
                second,
            } => write!(f, "stages '{first}' and '{second}' share order {order}"),
            Self::UnknownDependency { stage, requires } => {
                write!(f, "stage '{stage}' requires unregistered stage '{requires}'")
            }
            Self::DependencyCycle { cycle } => {
                write!(f, "dependency cycle: {}", cycle.join(" -> "))
            }
            Self::OrderViolation { stage, requires } => write!(
                f,
                "stage '{stage}' requires '{requires}', which is not ordered before it"
            ),
            Self::WriteConflict(conflicts) => {
                write!(f, "write conflicts: ")?;
                for (i, c) in conflicts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(
                        f,
                        "slot {} written by '{}' and '{}'",
                        c.slot, c.first_writer, c.second_writer
                    )?;
                }
                Ok(())
            }
            Self::InputOverwrite { stage, slot } => {
                write!(f, "stage '{stage}' writes input slot {slot}")
            }
            Self::UnsatisfiedRead { stage, slot } => write!(
                f,
                "stage '{stage}' reads slot {slot}, which is neither an input nor written earlier"
            ),
        }
    }
}

impl Error for PipelineError {}

// ── Validation ─────────────────────────────────────────────────────

/// Validate a set of registered stages against the engine's input slots.
///
/// Checks, in this order:
///
/// 1. At least one stage.
/// 2. Unique names and unique order keys.
/// 3. Every `requires` entry names a registered stage.
/// 4. The `requires` graph is acyclic.
/// 5. Every required stage is ordered strictly before its dependent.
/// 6. Each slot has one exclusive writer, or only append writers.
/// 7. No stage writes an input slot.
/// 8. Every read slot is an input or written by an earlier stage.
pub fn validate_pipeline(
    stages: &[RegisteredStage],
    inputs: SlotSet,
) -> Result<StagePlan, PipelineError> {
    if stages.is_empty() {
        return Err(PipelineError::EmptyPipeline);
    }

    // Names, unique.
    let mut by_name: IndexMap<&str, usize> = IndexMap::new();
    for (i, reg) in stages.iter().enumerate() {
        let name = reg.stage.name();
        if by_name.insert(name, i).is_some() {
            return Err(PipelineError::DuplicateStageName { name: name.into() });
        }
    }

    // Execution order, unique keys.
    let mut exec: Vec<usize> = (0..stages.len()).collect();
    exec.sort_by_key(|&i| stages[i].order);
    for w in exec.windows(2) {
        let (a, b) = (&stages[w[0]], &stages[w[1]]);
        if a.order == b.order {
            return Err(PipelineError::DuplicateOrder {
                order: a.order,
                first: a.stage.name().into(),
                second: b.stage.name().into(),
            });
        }
    }

    // Dependencies resolve to indices.
    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(stages.len());
    for reg in stages {
        let mut resolved = Vec::new();
        for req in reg.stage.requires() {
            match by_name.get(req) {
                Some(&j) => resolved.push(j),
                None => {
                    return Err(PipelineError::UnknownDependency {
                        stage: reg.stage.name().into(),
                        requires: req.into(),
                    })
                }
            }
        }
        deps.push(resolved);
    }

    if let Some(cycle) = find_cycle(&deps) {
        return Err(PipelineError::DependencyCycle {
            cycle: cycle
                .into_iter()
                .map(|i| stages[i].stage.name().to_string())
                .collect(),
        });
    }

    for (i, reg) in stages.iter().enumerate() {
        for &j in &deps[i] {
            if stages[j].order >= reg.order {
                return Err(PipelineError::OrderViolation {
                    stage: reg.stage.name().into(),
                    requires: stages[j].stage.name().into(),
                });
            }
        }
    }

    // Write ownership, in execution order.
    let mut writers: IndexMap<SlotId, Vec<(usize, WriteMode)>> = IndexMap::new();
    let mut conflicts = Vec::new();
    for (pos, &i) in exec.iter().enumerate() {
        for (slot, mode) in stages[i].stage.writes() {
            let entry = writers.entry(slot).or_default();
            if let Some(&(prev, prev_mode)) = entry.last() {
                if mode == WriteMode::Exclusive || prev_mode == WriteMode::Exclusive {
                    conflicts.push(WriteConflict {
                        slot,
                        first_writer: stages[exec[prev]].stage.name().into(),
                        second_writer: stages[i].stage.name().into(),
                    });
                }
            }
            entry.push((pos, mode));
        }
    }
    if !conflicts.is_empty() {
        return Err(PipelineError::WriteConflict(conflicts));
    }

    for &i in &exec {
        for (slot, _) in stages[i].stage.writes() {
            if inputs.contains(slot) {
                return Err(PipelineError::InputOverwrite {
                    stage: stages[i].stage.name().into(),
                    slot,
                });
            }
        }
    }

    // Build the plan; reads must be satisfiable at their position.
    let position_of: IndexMap<usize, usize> =
        exec.iter().enumerate().map(|(pos, &i)| (i, pos)).collect();
    let mut planned = Vec::with_capacity(stages.len());
    for (pos, &i) in exec.iter().enumerate() {
        let stage = &stages[i].stage;
        let reads = stage.reads();
        let mut upstream: SmallVec<[usize; 4]> = SmallVec::new();
        for &j in &deps[i] {
            push_unique(&mut upstream, position_of[&j]);
        }
        for slot in reads {
            if inputs.contains(slot) {
                continue;
            }
            let earlier: SmallVec<[usize; 4]> = writers
                .get(&slot)
                .map(|w| w.iter().map(|&(p, _)| p).filter(|&p| p < pos).collect())
                .unwrap_or_default();
            if earlier.is_empty() {
                return Err(PipelineError::UnsatisfiedRead {
                    stage: stage.name().into(),
                    slot,
                });
            }
            // Append-only slots are shared; only an exclusive producer
            // makes the reader depend on it.
            let exclusive = writers
                .get(&slot)
                .is_some_and(|w| w.iter().any(|&(_, m)| m == WriteMode::Exclusive));
            if exclusive {
                for p in earlier {
                    push_unique(&mut upstream, p);
                }
            }
        }
        upstream.sort_unstable();

        let mut exclusive = SlotSet::empty();
        let mut append = SlotSet::empty();
        for (slot, mode) in stage.writes() {
            match mode {
                WriteMode::Exclusive => exclusive.insert(slot),
                WriteMode::Append => append.insert(slot),
            };
        }
        planned.push(PlannedStage {
            index: i,
            name: stage.name().to_string(),
            order: stages[i].order,
            kind: stage.kind(),
            reads,
            exclusive,
            append,
            upstream,
        });
    }

    Ok(StagePlan {
        stages: planned,
        inputs,
    })
}

fn push_unique(list: &mut SmallVec<[usize; 4]>, v: usize) {
    if !list.contains(&v) {
        list.push(v);
    }
}

/// Depth-first search for a cycle in `deps` (edges point to requirements).
fn find_cycle(deps: &[Vec<usize>]) -> Option<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        node: usize,
        deps: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::Active;
        path.push(node);
        for &next in &deps[node] {
            match marks[next] {
                Mark::Active => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::New => {
                    if let Some(c) = visit(next, deps, marks, path) {
                        return Some(c);
                    }
                }
                Mark::Done => {}
            }
        }
        path.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; deps.len()];
    let mut path = Vec::new();
    for node in 0..deps.len() {
        if marks[node] == Mark::New {
            if let Some(c) = visit(node, deps, &mut marks, &mut path) {
                return Some(c);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageContext;
    use crate::slot::{SlotKey, COMPETITION, MORTALITY, NICHE, NOTES, SPECIES, TROPHIC};
    use crate::stage::StageOutcome;
    use phylon_core::StageError;

    struct Probe {
        name: &'static str,
        requires: Vec<&'static str>,
        reads: Vec<SlotId>,
        writes: Vec<(SlotId, WriteMode)>,
    }

    impl Probe {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                requires: Vec::new(),
                reads: Vec::new(),
                writes: Vec::new(),
            }
        }

        fn after(mut self, name: &'static str) -> Self {
            self.requires.push(name);
            self
        }

        fn reading<T>(mut self, key: SlotKey<T>) -> Self {
            self.reads.push(key.id());
            self
        }

        fn owns<T>(mut self, key: SlotKey<T>) -> Self {
            self.writes.push((key.id(), WriteMode::Exclusive));
            self
        }

        fn appends<T>(mut self, key: SlotKey<T>) -> Self {
            self.writes.push((key.id(), WriteMode::Append));
            self
        }

        fn at(self, order: u32) -> RegisteredStage {
            RegisteredStage {
                order,
                stage: Box::new(self),
            }
        }
    }

    impl Stage for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn requires(&self) -> Vec<&str> {
            self.requires.clone()
        }

        fn reads(&self) -> SlotSet {
            SlotSet::of(&self.reads)
        }

        fn writes(&self) -> Vec<(SlotId, WriteMode)> {
            self.writes.clone()
        }

        fn run(&self, _ctx: &mut StageContext<'_>) -> Result<StageOutcome, StageError> {
            Ok(StageOutcome::Completed)
        }
    }

    fn inputs() -> SlotSet {
        SlotSet::of(&[SPECIES.id(), NICHE.id()])
    }

    #[test]
    fn empty_pipeline_rejected() {
        assert_eq!(
            validate_pipeline(&[], inputs()).unwrap_err(),
            PipelineError::EmptyPipeline
        );
    }

    #[test]
    fn valid_chain_is_ordered_by_key() {
        let stages = vec![
            Probe::new("mortality")
                .after("trophic")
                .reading(TROPHIC)
                .owns(MORTALITY)
                .at(30),
            Probe::new("trophic").reading(SPECIES).owns(TROPHIC).at(10),
            Probe::new("competition")
                .reading(SPECIES)
                .reading(NICHE)
                .owns(COMPETITION)
                .at(20),
        ];
        let plan = validate_pipeline(&stages, inputs()).unwrap();
        let names: Vec<_> = plan.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["trophic", "competition", "mortality"]);
        assert_eq!(plan.get(2).unwrap().upstream.as_slice(), &[0]);
        assert!(plan.get(1).unwrap().upstream.is_empty());
        assert_eq!(plan.get(0).unwrap().index, 1);
        assert_eq!(plan.position_of("mortality"), Some(2));
        assert_eq!(plan.dependents_of(0), vec![2]);
        assert!(plan.dependents_of(1).is_empty());
    }

    #[test]
    fn duplicate_name_rejected() {
        let stages = vec![Probe::new("a").at(1), Probe::new("a").at(2)];
        assert!(matches!(
            validate_pipeline(&stages, inputs()),
            Err(PipelineError::DuplicateStageName { name }) if name == "a"
        ));
    }

    #[test]
    fn duplicate_order_rejected() {
        let stages = vec![Probe::new("a").at(5), Probe::new("b").at(5)];
        assert!(matches!(
            validate_pipeline(&stages, inputs()),
            Err(PipelineError::DuplicateOrder { order: 5, .. })
        ));
    }

    #[test]
    fn missing_dependency_rejected() {
        let stages = vec![Probe::new("mortality").after("trophic").at(1)];
        assert_eq!(
            validate_pipeline(&stages, inputs()).unwrap_err(),
            PipelineError::UnknownDependency {
                stage: "mortality".into(),
                requires: "trophic".into(),
            }
        );
    }

    #[test]
    fn cycle_rejected_before_ordering() {
        let stages = vec![
            Probe::new("a").after("c").at(1),
            Probe::new("b").after("a").at(2),
            Probe::new("c").after("b").at(3),
        ];
        match validate_pipeline(&stages, inputs()) {
            Err(PipelineError::DependencyCycle { cycle }) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let stages = vec![Probe::new("a").after("a").at(1)];
        assert!(matches!(
            validate_pipeline(&stages, inputs()),
            Err(PipelineError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn required_stage_must_run_first() {
        let stages = vec![
            Probe::new("early").after("late").at(1),
            Probe::new("late").at(2),
        ];
        assert_eq!(
            validate_pipeline(&stages, inputs()).unwrap_err(),
            PipelineError::OrderViolation {
                stage: "early".into(),
                requires: "late".into(),
            }
        );
    }

    #[test]
    fn two_exclusive_writers_conflict() {
        let stages = vec![
            Probe::new("a").owns(TROPHIC).at(1),
            Probe::new("b").owns(TROPHIC).at(2),
        ];
        match validate_pipeline(&stages, inputs()) {
            Err(PipelineError::WriteConflict(c)) => {
                assert_eq!(c.len(), 1);
                assert_eq!(c[0].first_writer, "a");
                assert_eq!(c[0].second_writer, "b");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn mixed_modes_conflict_but_appenders_share() {
        let mixed = vec![
            Probe::new("a").appends(NOTES).at(1),
            Probe::new("b").owns(NOTES).at(2),
        ];
        assert!(matches!(
            validate_pipeline(&mixed, inputs()),
            Err(PipelineError::WriteConflict(_))
        ));

        let shared = vec![
            Probe::new("a").appends(NOTES).at(1),
            Probe::new("b").appends(NOTES).at(2),
            Probe::new("c").reading(NOTES).at(3),
        ];
        let plan = validate_pipeline(&shared, inputs()).unwrap();
        assert!(plan.get(2).unwrap().upstream.is_empty());
    }

    #[test]
    fn input_slots_are_read_only() {
        let stages = vec![Probe::new("a").owns(SPECIES).at(1)];
        assert_eq!(
            validate_pipeline(&stages, inputs()).unwrap_err(),
            PipelineError::InputOverwrite {
                stage: "a".into(),
                slot: SPECIES.id(),
            }
        );
    }

    #[test]
    fn read_before_write_rejected() {
        let stages = vec![
            Probe::new("reader").reading(TROPHIC).at(1),
            Probe::new("writer").owns(TROPHIC).at(2),
        ];
        assert_eq!(
            validate_pipeline(&stages, inputs()).unwrap_err(),
            PipelineError::UnsatisfiedRead {
                stage: "reader".into(),
                slot: TROPHIC.id(),
            }
        );
    }

    #[test]
    fn transitive_dependents_found() {
        let stages = vec![
            Probe::new("a").owns(TROPHIC).at(1),
            Probe::new("b").reading(TROPHIC).owns(COMPETITION).at(2),
            Probe::new("c").reading(COMPETITION).at(3),
            Probe::new("d").reading(SPECIES).at(4),
        ];
        let plan = validate_pipeline(&stages, inputs()).unwrap();
        assert_eq!(plan.dependents_of(0), vec![1, 2]);
        assert_eq!(plan.inputs(), inputs());
    }

    #[test]
    fn error_messages_name_the_stages() {
        let err = PipelineError::WriteConflict(vec![WriteConflict {
            slot: TROPHIC.id(),
            first_writer: "x".into(),
            second_writer: "y".into(),
        }]);
        assert_eq!(
            err.to_string(),
            "write conflicts: slot trophic#4 written by 'x' and 'y'"
        );
    }
}
