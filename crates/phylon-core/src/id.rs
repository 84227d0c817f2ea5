//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a species within a [`SpeciesArena`](crate::SpeciesArena).
///
/// `SpeciesId(n)` is the n-th species pushed into the arena. Ids are never
/// reused, so an extinct species keeps its slot and its descendants keep a
/// valid parent reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

impl SpeciesId {
    /// Arena index for this id.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SpeciesId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing turn counter.
///
/// Incremented each time the simulation commits one turn.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TurnId(pub u64);

impl TurnId {
    /// The turn after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Turns elapsed since `earlier`, saturating at zero.
    pub fn since(self, earlier: TurnId) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TurnId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Human-readable lineage label (e.g. `"A1b2"`).
///
/// Purely a display label. Ancestry is always derived from parent ids in
/// the arena, never from the structure of the code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageCode(String);

impl LineageCode {
    /// Wrap a code string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineageCode {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for LineageCode {
    fn from(v: String) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_since_saturates() {
        assert_eq!(TurnId(10).since(TurnId(4)), 6);
        assert_eq!(TurnId(3).since(TurnId(9)), 0);
        assert_eq!(TurnId(3).next(), TurnId(4));
    }

    #[test]
    fn lineage_code_displays_raw() {
        let code = LineageCode::new("B2a1");
        assert_eq!(code.to_string(), "B2a1");
        assert_eq!(code.as_str(), "B2a1");
    }
}
