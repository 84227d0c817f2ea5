//! Per-turn value store and the slot-checked view handed to each stage.

use std::any::Any;

use indexmap::IndexMap;
use phylon_core::{StageError, TurnId};

use crate::slot::{SlotId, SlotKey, SlotSet};

/// Type-erased values produced and consumed during one turn.
///
/// The engine seeds the input slots, lends the context to each stage
/// through a [`StageContext`], and takes the outputs back afterwards.
#[derive(Default)]
pub struct TurnContext {
    turn: TurnId,
    slots: IndexMap<SlotId, Box<dyn Any + Send>>,
}

impl TurnContext {
    /// Empty context for `turn`.
    pub fn new(turn: TurnId) -> Self {
        Self {
            turn,
            slots: IndexMap::new(),
        }
    }

    /// The turn this context belongs to.
    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// Move the context to another turn, dropping every stored value.
    pub fn reset(&mut self, turn: TurnId) {
        self.turn = turn;
        self.slots.clear();
    }

    /// Store a value, replacing any previous one.
    pub fn insert<T: Any + Send>(&mut self, key: SlotKey<T>, value: T) {
        self.slots.insert(key.id(), Box::new(value));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<T: Any + Send>(mut self, key: SlotKey<T>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Borrow a value. `None` if absent or stored under another type.
    pub fn get<T: Any>(&self, key: SlotKey<T>) -> Option<&T> {
        self.slots
            .get(&key.id())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutably borrow a value.
    pub fn get_mut<T: Any>(&mut self, key: SlotKey<T>) -> Option<&mut T> {
        self.slots
            .get_mut(&key.id())
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Remove and return a value. A value of the wrong type is left in place.
    pub fn take<T: Any + Send>(&mut self, key: SlotKey<T>) -> Option<T> {
        let boxed = self.slots.shift_remove(&key.id())?;
        match boxed.downcast::<T>() {
            Ok(v) => Some(*v),
            Err(original) => {
                self.slots.insert(key.id(), original);
                None
            }
        }
    }

    /// Drop the value in `id`, if any.
    pub fn remove(&mut self, id: SlotId) -> bool {
        self.slots.shift_remove(&id).is_some()
    }

    /// Whether `id` holds a value.
    pub fn contains(&self, id: SlotId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Slots that currently hold a value.
    pub fn occupied(&self) -> SlotSet {
        self.slots.keys().copied().collect()
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("turn", &self.turn)
            .field("occupied", &self.occupied())
            .finish()
    }
}

// ── StageContext ───────────────────────────────────────────────────

/// A stage's view of the [`TurnContext`], limited to its declared slots.
pub struct StageContext<'a> {
    inner: &'a mut TurnContext,
    stage: &'a str,
    reads: SlotSet,
    exclusive: SlotSet,
    append: SlotSet,
}

impl<'a> StageContext<'a> {
    /// Wrap `inner` for one stage invocation.
    pub fn new(
        inner: &'a mut TurnContext,
        stage: &'a str,
        reads: SlotSet,
        exclusive: SlotSet,
        append: SlotSet,
    ) -> Self {
        Self {
            inner,
            stage,
            reads,
            exclusive,
            append,
        }
    }

    /// Current turn.
    pub fn turn(&self) -> TurnId {
        self.inner.turn()
    }

    /// Name of the running stage.
    pub fn stage_name(&self) -> &str {
        self.stage
    }

    fn readable(&self, id: SlotId) -> bool {
        self.reads.contains(id) || self.exclusive.contains(id) || self.append.contains(id)
    }

    /// Read a slot that must be present.
    ///
    /// # Errors
    ///
    /// [`StageError::UndeclaredRead`] if the slot was not declared, and
    /// [`StageError::MissingInput`] if it holds no value of type `T`.
    pub fn read<T: Any>(&self, key: SlotKey<T>) -> Result<&T, StageError> {
        self.read_optional(key)?
            .ok_or(StageError::MissingInput { slot: key.name() })
    }

    /// Read a slot that may legitimately be empty this turn.
    pub fn read_optional<T: Any>(&self, key: SlotKey<T>) -> Result<Option<&T>, StageError> {
        if !self.readable(key.id()) {
            return Err(StageError::UndeclaredRead { slot: key.name() });
        }
        Ok(self.inner.get(key))
    }

    /// Store the value of an exclusively-owned slot.
    pub fn write<T: Any + Send>(&mut self, key: SlotKey<T>, value: T) -> Result<(), StageError> {
        if !self.exclusive.contains(key.id()) {
            return Err(StageError::UndeclaredWrite { slot: key.name() });
        }
        self.inner.insert(key, value);
        Ok(())
    }

    /// Push one item onto a list slot.
    pub fn append<T: Any + Send>(
        &mut self,
        key: SlotKey<Vec<T>>,
        item: T,
    ) -> Result<(), StageError> {
        self.extend(key, std::iter::once(item))
    }

    /// Push several items onto a list slot.
    pub fn extend<T, I>(&mut self, key: SlotKey<Vec<T>>, items: I) -> Result<(), StageError>
    where
        T: Any + Send,
        I: IntoIterator<Item = T>,
    {
        let id = key.id();
        if !self.append.contains(id) && !self.exclusive.contains(id) {
            return Err(StageError::UndeclaredWrite { slot: key.name() });
        }
        if !self.inner.contains(id) {
            self.inner.insert(key, Vec::new());
        }
        match self.inner.get_mut(key) {
            Some(list) => {
                list.extend(items);
                Ok(())
            }
            None => Err(StageError::Fatal {
                reason: format!("slot '{}' holds a value of another type", key.name()),
            }),
        }
    }
}
