//! Immutable lineage events.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{LineageCode, SpeciesId, TurnId};
use crate::species::ExtinctionReason;

/// What happened to a lineage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageEventKind {
    /// The species went extinct.
    Extinction(ExtinctionReason),
}

/// An event appended to the lineage log. Never modified after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineageEvent {
    /// Display code of the species.
    pub lineage_code: LineageCode,
    /// The species.
    pub species: SpeciesId,
    /// What happened.
    pub kind: LineageEventKind,
    /// Turn of the event.
    pub turn: TurnId,
    /// Survivors computed for the turn, before being forced to zero.
    pub final_population: u64,
    /// Death rate of the turn.
    pub death_rate: f64,
}

impl LineageEvent {
    /// Extinction reason, if this is an extinction event.
    pub fn extinction_reason(&self) -> Option<ExtinctionReason> {
        match self.kind {
            LineageEventKind::Extinction(reason) => Some(reason),
        }
    }
}

impl fmt::Display for LineageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LineageEventKind::Extinction(reason) => write!(
                f,
                "turn {}: {} extinct ({reason}; final population {}, death rate {:.3})",
                self.turn, self.lineage_code, self.final_population, self.death_rate
            ),
        }
    }
}
