//! Read-only per-turn inputs supplied by external collaborators.
//!
//! - [`PressureModifiers`] — named environmental pressures from the
//!   pressure-parsing stage.
//! - [`NicheSnapshot`] — overlap and saturation from the niche analyzer.
//! - [`ResourceSnapshot`] — optional per-species carrying capacities.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::SpeciesId;
use crate::species::Species;

// ── Environmental pressure ─────────────────────────────────────────

/// Resistance class an environmental pressure is checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureKind {
    /// Warming, heat waves.
    Heat,
    /// Cooling, glaciation.
    Cold,
    /// Aridity.
    Drought,
    /// Salinity change.
    Salinity,
    /// Pollution, acidification, volcanic outgassing.
    Toxin,
    /// Pathogens.
    Disease,
    /// Anything without a dedicated resistance trait.
    Other,
}

impl PressureKind {
    /// Classify a named pressure and return the kind plus its magnitude.
    ///
    /// `temperature` is signed: positive values are heat, negative values
    /// cold. Every other name uses `|intensity|`. Returns `None` for
    /// non-finite intensities.
    pub fn classify(name: &str, intensity: f64) -> Option<(PressureKind, f64)> {
        if !intensity.is_finite() {
            return None;
        }
        let key = name.trim().to_ascii_lowercase();
        let kind = match key.as_str() {
            "temperature" if intensity < 0.0 => Self::Cold,
            "temperature" | "heat" | "warming" | "heatwave" => Self::Heat,
            "cold" | "cooling" | "glaciation" | "ice_age" => Self::Cold,
            "drought" | "aridity" | "desertification" => Self::Drought,
            "salinity" | "salinization" => Self::Salinity,
            "toxin" | "toxicity" | "pollution" | "acidification" | "volcanic" | "volcanism" => {
                Self::Toxin
            }
            "disease" | "pathogen" | "epidemic" => Self::Disease,
            _ => Self::Other,
        };
        Some((kind, intensity.abs()))
    }
}

/// Named pressure → intensity map for one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureModifiers {
    entries: IndexMap<String, f64>,
}

impl PressureModifiers {
    /// Empty map (no active pressures).
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a pressure.
    pub fn insert(&mut self, name: impl Into<String>, intensity: f64) {
        self.entries.insert(name.into(), intensity);
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, intensity: f64) -> Self {
        self.insert(name, intensity);
        self
    }

    /// Raw intensity by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.get(name).copied()
    }

    /// Whether no pressure is active.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw `(name, intensity)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Classified `(kind, magnitude)` pairs, skipping non-finite entries.
    pub fn classified(&self) -> impl Iterator<Item = (PressureKind, f64)> + '_ {
        self.entries
            .iter()
            .filter_map(|(name, &v)| PressureKind::classify(name, v))
    }

    /// Names of entries whose intensity is NaN or infinite.
    pub fn malformed(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, v)| !v.is_finite())
            .map(|(k, _)| k.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for PressureModifiers {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ── Niche metrics ──────────────────────────────────────────────────

/// Per-species output of the niche analyzer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NicheMetrics {
    /// Aggregate overlap with co-occurring species, `[0, 1]`.
    pub overlap: f64,
    /// Population relative to estimated carrying capacity, `>= 0`.
    pub saturation: f64,
}

/// Niche metrics for every species plus optional pairwise overlaps.
#[derive(Clone, Debug, Default)]
pub struct NicheSnapshot {
    metrics: IndexMap<SpeciesId, NicheMetrics>,
    pairwise: IndexMap<(SpeciesId, SpeciesId), f64>,
}

impl NicheSnapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a species' metrics.
    pub fn insert(&mut self, id: SpeciesId, metrics: NicheMetrics) {
        self.metrics.insert(id, metrics);
    }

    /// Record the overlap of an unordered pair.
    pub fn set_pair_overlap(&mut self, a: SpeciesId, b: SpeciesId, overlap: f64) {
        self.pairwise.insert(pair_key(a, b), overlap);
    }

    /// Raw metrics for a species, if the analyzer produced any.
    pub fn get(&self, id: SpeciesId) -> Option<NicheMetrics> {
        self.metrics.get(&id).copied()
    }

    /// Metrics for a species, neutral when absent.
    pub fn metrics(&self, id: SpeciesId) -> NicheMetrics {
        self.get(id).unwrap_or_default()
    }

    /// Overlap between two species in `[0, 1]`.
    ///
    /// Uses the analyzer's pairwise value when present. Otherwise estimates
    /// `sqrt(overlap_a * overlap_b)`, halved across habitats. Non-finite
    /// values count as no overlap.
    pub fn pair_overlap(&self, a: &Species, b: &Species) -> f64 {
        let raw = match self.pairwise.get(&pair_key(a.id, b.id)) {
            Some(&v) => v,
            None => {
                let oa = clamp_unit(self.metrics(a.id).overlap);
                let ob = clamp_unit(self.metrics(b.id).overlap);
                let estimate = (oa * ob).sqrt();
                if a.habitat == b.habitat {
                    estimate
                } else {
                    estimate * 0.5
                }
            }
        };
        clamp_unit(raw)
    }
}

fn pair_key(a: SpeciesId, b: SpeciesId) -> (SpeciesId, SpeciesId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ── Resources ──────────────────────────────────────────────────────

/// External carrying-capacity estimate, in individuals.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    capacity: IndexMap<SpeciesId, f64>,
}

impl ResourceSnapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the carrying capacity for a species.
    pub fn set_capacity(&mut self, id: SpeciesId, capacity: f64) {
        self.capacity.insert(id, capacity);
    }

    /// Carrying capacity for a species, if known.
    pub fn capacity(&self, id: SpeciesId) -> Option<f64> {
        self.capacity.get(&id).copied()
    }

    /// `population / capacity`, if a positive finite capacity is known.
    pub fn saturation_for(&self, species: &Species) -> Option<f64> {
        match self.capacity(species.id) {
            Some(c) if c.is_finite() && c > 0.0 => Some(species.population as f64 / c),
            _ => None,
        }
    }
}
