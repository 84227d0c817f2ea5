//! Collaborator interfaces: species persistence and the lineage event log.
//!
//! The engine receives both by dependency injection when a simulation
//! session is constructed; nothing here is global.

use crate::arena::SpeciesArena;
use crate::error::RepositoryError;
use crate::event::LineageEvent;
use crate::species::Species;

/// Repository-style access to persisted species records.
///
/// `snapshot()` is called once at turn start; `upsert()` once per changed
/// species when the turn commits.
pub trait SpeciesRepository {
    /// Consistent view of every species (living and extinct).
    fn snapshot(&self) -> SpeciesArena;

    /// Write back one species record.
    fn upsert(&mut self, species: &Species) -> Result<(), RepositoryError>;
}

/// Append-only sink for lineage events.
pub trait LineageEventLog {
    /// Append an event.
    fn record(&mut self, event: LineageEvent);
}

/// Repository backed by an in-memory [`SpeciesArena`].
#[derive(Clone, Debug, Default)]
pub struct InMemorySpeciesRepository {
    arena: SpeciesArena,
}

impl InMemorySpeciesRepository {
    /// Wrap an existing arena.
    pub fn new(arena: SpeciesArena) -> Self {
        Self { arena }
    }

    /// Direct read access.
    pub fn arena(&self) -> &SpeciesArena {
        &self.arena
    }

    /// Direct write access, for seeding and speciation collaborators.
    pub fn arena_mut(&mut self) -> &mut SpeciesArena {
        &mut self.arena
    }
}

impl SpeciesRepository for InMemorySpeciesRepository {
    fn snapshot(&self) -> SpeciesArena {
        self.arena.clone()
    }

    fn upsert(&mut self, species: &Species) -> Result<(), RepositoryError> {
        self.arena.replace(species.clone())
    }
}

/// Event log kept in a `Vec`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventLog {
    events: Vec<LineageEvent>,
}

impl InMemoryEventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in append order.
    pub fn events(&self) -> &[LineageEvent] {
        &self.events
    }
}

impl LineageEventLog for InMemoryEventLog {
    fn record(&mut self, event: LineageEvent) {
        self.events.push(event);
    }
}

impl<L: LineageEventLog + ?Sized> LineageEventLog for Box<L> {
    fn record(&mut self, event: LineageEvent) {
        (**self).record(event);
    }
}
