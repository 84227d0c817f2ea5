//! Context slots: identifiers, bitsets and typed keys.
//!
//! A slot is one named value in the per-turn [`TurnContext`](crate::TurnContext).
//! Stages declare the slots they read as a [`SlotSet`] and address values
//! through a [`SlotKey<T>`], which fixes the slot's Rust type at compile time.

use std::fmt;
use std::marker::PhantomData;

use phylon_core::{
    CompetitionTable, Diagnostic, LineageEvent, MortalityReport, NicheSnapshot,
    PressureModifiers, ResourceSnapshot, SpeciesArena, TrophicInteractions,
};

/// Number of distinct slots a [`SlotSet`] can hold.
pub const MAX_SLOTS: u8 = 128;

/// First id available for collaborator-defined slots.
pub const FIRST_CUSTOM_SLOT: u8 = 32;

/// Identifies a context slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    /// Wrap a raw id. Panics (at compile time for constants) when
    /// `raw >= MAX_SLOTS`.
    pub const fn new(raw: u8) -> Self {
        assert!(raw < MAX_SLOTS, "slot id out of range");
        Self(raw)
    }

    /// Raw numeric id.
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Name of a built-in slot, or `"custom"`.
    pub fn name(self) -> &'static str {
        BUILTIN_NAMES
            .get(self.0 as usize)
            .copied()
            .flatten()
            .unwrap_or("custom")
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name(), self.0)
    }
}

// ── SlotSet ────────────────────────────────────────────────────────

/// Fixed-width bitset of [`SlotId`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SlotSet {
    bits: u128,
}

impl SlotSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Build a set from a slice of ids.
    pub fn of(ids: &[SlotId]) -> Self {
        ids.iter().copied().collect()
    }

    /// Add a slot. Returns `true` if it was not already present.
    pub fn insert(&mut self, id: SlotId) -> bool {
        let mask = 1u128 << id.0;
        let fresh = self.bits & mask == 0;
        self.bits |= mask;
        fresh
    }

    /// Remove a slot. Returns `true` if it was present.
    pub fn remove(&mut self, id: SlotId) -> bool {
        let mask = 1u128 << id.0;
        let present = self.bits & mask != 0;
        self.bits &= !mask;
        present
    }

    /// Whether the set contains `id`.
    pub fn contains(&self, id: SlotId) -> bool {
        self.bits & (1u128 << id.0) != 0
    }

    /// `self | other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// `self & other`.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            bits: self.bits & other.bits,
        }
    }

    /// Slots in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    /// Whether every slot of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.bits & !other.bits == 0
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Number of slots in the set.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Slots in ascending id order.
    pub fn iter(&self) -> SlotSetIter {
        SlotSetIter { rest: self.bits }
    }
}

impl fmt::Debug for SlotSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<SlotId> for SlotSet {
    fn from_iter<I: IntoIterator<Item = SlotId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl IntoIterator for SlotSet {
    type Item = SlotId;
    type IntoIter = SlotSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &SlotSet {
    type Item = SlotId;
    type IntoIter = SlotSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`SlotSet`], lowest id first.
#[derive(Clone, Debug)]
pub struct SlotSetIter {
    rest: u128,
}

impl Iterator for SlotSetIter {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        if self.rest == 0 {
            return None;
        }
        let bit = self.rest.trailing_zeros() as u8;
        self.rest &= self.rest - 1;
        Some(SlotId(bit))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rest.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SlotSetIter {}

// ── Typed keys ─────────────────────────────────────────────────────

/// A slot id paired with the type stored in it.
pub struct SlotKey<T> {
    id: SlotId,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SlotKey<T> {
    /// Declare a typed slot.
    pub const fn new(id: SlotId, name: &'static str) -> Self {
        Self {
            id,
            name,
            _marker: PhantomData,
        }
    }

    /// Declare a collaborator slot at `FIRST_CUSTOM_SLOT + offset`.
    pub const fn custom(offset: u8, name: &'static str) -> Self {
        Self::new(SlotId::new(FIRST_CUSTOM_SLOT + offset), name)
    }

    /// The untyped id.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Human-readable name, used in errors.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for SlotKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotKey<T> {}

impl<T> fmt::Debug for SlotKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotKey({}#{})", self.name, self.id.0)
    }
}

// ── Built-in slots ─────────────────────────────────────────────────

/// Species snapshot taken at turn start. Engine input.
pub const SPECIES: SlotKey<SpeciesArena> = SlotKey::new(SlotId(0), "species");
/// Environmental pressures. Engine input.
pub const PRESSURES: SlotKey<PressureModifiers> = SlotKey::new(SlotId(1), "pressures");
/// Niche analyzer output. Engine input.
pub const NICHE: SlotKey<NicheSnapshot> = SlotKey::new(SlotId(2), "niche");
/// Optional carrying capacities. Engine input.
pub const RESOURCES: SlotKey<ResourceSnapshot> = SlotKey::new(SlotId(3), "resources");
/// Written by the trophic stage.
pub const TROPHIC: SlotKey<TrophicInteractions> = SlotKey::new(SlotId(4), "trophic");
/// Written by the competition stage.
pub const COMPETITION: SlotKey<CompetitionTable> = SlotKey::new(SlotId(5), "competition");
/// Written by the mortality stage.
pub const MORTALITY: SlotKey<MortalityReport> = SlotKey::new(SlotId(6), "mortality");
/// Species records updated by the population stage, ready to commit.
pub const UPDATED_SPECIES: SlotKey<Vec<phylon_core::Species>> =
    SlotKey::new(SlotId(7), "updated_species");
/// Lineage events raised this turn. Append-only.
pub const LINEAGE_EVENTS: SlotKey<Vec<LineageEvent>> = SlotKey::new(SlotId(8), "lineage_events");
/// Free-form notes from any stage. Append-only.
pub const NOTES: SlotKey<Vec<Diagnostic>> = SlotKey::new(SlotId(9), "notes");

const BUILTIN_NAMES: [Option<&str>; 10] = [
    Some("species"),
    Some("pressures"),
    Some("niche"),
    Some("resources"),
    Some("trophic"),
    Some("competition"),
    Some("mortality"),
    Some("updated_species"),
    Some("lineage_events"),
    Some("notes"),
];
