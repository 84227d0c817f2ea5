//! Species records, the fixed-schema [`Traits`] record and trophic bands.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::TraitError;
use crate::id::{LineageCode, SpeciesId, TurnId};
use crate::input::PressureKind;

/// Upper bound of the abstract trait scale (resistances, defense, extensions).
pub const TRAIT_SCALE_MAX: f64 = 10.0;

/// Maximum number of experimental extension traits per species.
pub const MAX_EXTENSION_TRAITS: usize = 16;

// ── Traits ─────────────────────────────────────────────────────────

/// Fixed-schema numeric trait record.
///
/// Morphology and life history use physical units. Resistances and
/// `defense` use the abstract `0..=10` scale. Experimental traits live in
/// a small validated extension map; the engine never reads them by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Traits {
    /// Characteristic body length in centimetres.
    pub body_length_cm: f64,
    /// Average adult body weight in grams.
    pub body_weight_g: f64,
    /// Time from birth to reproduction, in days.
    pub generation_time_days: f64,
    /// Offspring produced per individual per generation.
    pub reproduction_rate: f64,
    /// Heat tolerance.
    pub heat_resistance: f64,
    /// Cold tolerance.
    pub cold_resistance: f64,
    /// Drought tolerance.
    pub drought_resistance: f64,
    /// Salinity tolerance.
    pub salinity_resistance: f64,
    /// Toxin and pollution tolerance.
    pub toxin_resistance: f64,
    /// Disease and pathogen tolerance.
    pub disease_resistance: f64,
    /// Anti-predator / anti-grazer defense (armor, toxicity, evasion).
    pub defense: f64,
    extensions: IndexMap<String, f64>,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            body_length_cm: 1.0,
            body_weight_g: 1.0,
            generation_time_days: 30.0,
            reproduction_rate: 5.0,
            heat_resistance: 5.0,
            cold_resistance: 5.0,
            drought_resistance: 5.0,
            salinity_resistance: 5.0,
            toxin_resistance: 5.0,
            disease_resistance: 5.0,
            defense: 0.0,
            extensions: IndexMap::new(),
        }
    }
}

impl Traits {
    /// Raw resistance score (`0..=10`) against a pressure kind.
    ///
    /// [`PressureKind::Other`] has no dedicated trait and falls back to
    /// the mean of all resistances.
    pub fn resistance(&self, kind: PressureKind) -> f64 {
        match kind {
            PressureKind::Heat => self.heat_resistance,
            PressureKind::Cold => self.cold_resistance,
            PressureKind::Drought => self.drought_resistance,
            PressureKind::Salinity => self.salinity_resistance,
            PressureKind::Toxin => self.toxin_resistance,
            PressureKind::Disease => self.disease_resistance,
            PressureKind::Other => self.mean_resistance(),
        }
    }

    /// Mean of the six resistance traits.
    pub fn mean_resistance(&self) -> f64 {
        (self.heat_resistance
            + self.cold_resistance
            + self.drought_resistance
            + self.salinity_resistance
            + self.toxin_resistance
            + self.disease_resistance)
            / 6.0
    }

    /// Look up an experimental extension trait.
    pub fn extension(&self, name: &str) -> Option<f64> {
        self.extensions.get(name).copied()
    }

    /// All extension traits in insertion order.
    pub fn extensions(&self) -> &IndexMap<String, f64> {
        &self.extensions
    }

    /// Insert or replace an extension trait after validating it.
    pub fn set_extension(&mut self, name: impl Into<String>, value: f64) -> Result<(), TraitError> {
        let name = name.into();
        check_scaled(&name, value)?;
        if !self.extensions.contains_key(&name) && self.extensions.len() >= MAX_EXTENSION_TRAITS {
            return Err(TraitError::TooManyExtensions {
                max: MAX_EXTENSION_TRAITS,
            });
        }
        self.extensions.insert(name, value);
        Ok(())
    }

    /// Check every field against its permitted range.
    pub fn validate(&self) -> Result<(), TraitError> {
        for (name, value) in [
            ("body_length_cm", self.body_length_cm),
            ("body_weight_g", self.body_weight_g),
            ("generation_time_days", self.generation_time_days),
            ("reproduction_rate", self.reproduction_rate),
        ] {
            if !value.is_finite() {
                return Err(TraitError::NonFinite { name: name.into() });
            }
            if value < 0.0 {
                return Err(TraitError::OutOfRange {
                    name: name.into(),
                    value,
                    min: 0.0,
                    max: f64::INFINITY,
                });
            }
        }
        for (name, value) in [
            ("heat_resistance", self.heat_resistance),
            ("cold_resistance", self.cold_resistance),
            ("drought_resistance", self.drought_resistance),
            ("salinity_resistance", self.salinity_resistance),
            ("toxin_resistance", self.toxin_resistance),
            ("disease_resistance", self.disease_resistance),
            ("defense", self.defense),
        ] {
            check_scaled(name, value)?;
        }
        if self.extensions.len() > MAX_EXTENSION_TRAITS {
            return Err(TraitError::TooManyExtensions {
                max: MAX_EXTENSION_TRAITS,
            });
        }
        for (name, &value) in &self.extensions {
            check_scaled(name, value)?;
        }
        Ok(())
    }
}

fn check_scaled(name: &str, value: f64) -> Result<(), TraitError> {
    if !value.is_finite() {
        return Err(TraitError::NonFinite { name: name.into() });
    }
    if !(0.0..=TRAIT_SCALE_MAX).contains(&value) {
        return Err(TraitError::OutOfRange {
            name: name.into(),
            value,
            min: 0.0,
            max: TRAIT_SCALE_MAX,
        });
    }
    Ok(())
}

// ── Classification ─────────────────────────────────────────────────

/// Broad habitat classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Habitat {
    /// Open ocean.
    Marine,
    /// Ocean floor below the photic zone.
    DeepSea,
    /// Shorelines, estuaries and reefs.
    Coastal,
    /// Rivers and lakes.
    Freshwater,
    /// Land.
    Terrestrial,
    /// Splits its life between water and land.
    Amphibious,
    /// Flight-dependent.
    Aerial,
}

/// Lifecycle status of a species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesStatus {
    /// Participates in every turn.
    Alive,
    /// Informational marker set by manual edits; still simulated.
    Split,
    /// Terminal. Never simulated again.
    Extinct,
}

impl SpeciesStatus {
    /// Whether the species takes part in population dynamics.
    pub fn is_living(self) -> bool {
        !matches!(self, Self::Extinct)
    }
}

/// Rounded trophic position used to aggregate biomass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrophicBand {
    /// Rounded level below 1.5.
    Producer,
    /// Rounded level in `[1.5, 2.5)`.
    Primary,
    /// Rounded level in `[2.5, 3.5)`.
    Secondary,
    /// Rounded level of 3.5 and above.
    Apex,
}

impl TrophicBand {
    /// All bands, lowest first.
    pub const ALL: [TrophicBand; 4] = [
        TrophicBand::Producer,
        TrophicBand::Primary,
        TrophicBand::Secondary,
        TrophicBand::Apex,
    ];

    /// Band for a continuous trophic level.
    pub fn from_level(level: f64) -> Self {
        let rounded = round_trophic_level(level);
        if rounded < 1.5 {
            Self::Producer
        } else if rounded < 2.5 {
            Self::Primary
        } else if rounded < 3.5 {
            Self::Secondary
        } else {
            Self::Apex
        }
    }

    /// The band this band feeds on, if any.
    pub fn prey(self) -> Option<Self> {
        match self {
            Self::Producer => None,
            Self::Primary => Some(Self::Producer),
            Self::Secondary => Some(Self::Primary),
            Self::Apex => Some(Self::Secondary),
        }
    }
}

/// Round a trophic level to the nearest half step. Non-finite levels map to 1.0.
pub fn round_trophic_level(level: f64) -> f64 {
    if level.is_finite() {
        (level * 2.0).round() / 2.0
    } else {
        1.0
    }
}

/// Integer grouping key for a trophic level (half steps).
pub fn trophic_group_key(level: f64) -> i64 {
    (round_trophic_level(level) * 2.0) as i64
}

// ── Relationships and interventions ────────────────────────────────

/// Obligate dependency on other species.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Symbiosis {
    /// Species this one depends on.
    pub partners: SmallVec<[SpeciesId; 4]>,
    /// Dependency strength in `[0, 1]`.
    pub strength: f64,
}

/// Player-driven interventions, each with a remaining-turn counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    /// Turns of protection remaining.
    pub protected_turns: u32,
    /// Turns of suppression remaining.
    pub suppressed_turns: u32,
}

impl Intervention {
    /// Whether protection is active this turn.
    pub fn is_protected(&self) -> bool {
        self.protected_turns > 0
    }

    /// Whether suppression is active this turn.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed_turns > 0
    }

    /// Whether any intervention is active this turn.
    pub fn is_active(&self) -> bool {
        self.is_protected() || self.is_suppressed()
    }

    /// Count both counters down by one turn.
    pub fn tick_down(&mut self) {
        self.protected_turns = self.protected_turns.saturating_sub(1);
        self.suppressed_turns = self.suppressed_turns.saturating_sub(1);
    }
}

// ── Extinction ─────────────────────────────────────────────────────

/// Why a species went extinct.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExtinctionReason {
    /// Survivors fell below the minimum viable population.
    BelowViablePopulation {
        /// Surviving individuals.
        survivors: u64,
        /// Size-dependent minimum.
        minimum: u64,
    },
    /// Death rate stayed high for too many consecutive turns.
    SustainedMortality {
        /// Length of the high-mortality streak.
        turns: u32,
    },
    /// A single turn's death rate exceeded the collapse threshold.
    CatastrophicCollapse {
        /// The turn's death rate.
        death_rate: f64,
    },
}

impl std::fmt::Display for ExtinctionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowViablePopulation { survivors, minimum } => {
                write!(f, "population {survivors} below viable minimum {minimum}")
            }
            Self::SustainedMortality { turns } => {
                write!(f, "high mortality for {turns} consecutive turns")
            }
            Self::CatastrophicCollapse { death_rate } => {
                write!(f, "catastrophic collapse (death rate {death_rate:.2})")
            }
        }
    }
}

/// Permanent record attached to an extinct species.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtinctionRecord {
    /// Triggering predicate.
    pub reason: ExtinctionReason,
    /// Turn of extinction.
    pub turn: TurnId,
}

// ── Species ────────────────────────────────────────────────────────

/// A species record as seen by the engine.
///
/// `id` and `parent` are assigned by [`SpeciesArena::push`](crate::SpeciesArena::push).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Arena slot.
    pub id: SpeciesId,
    /// Display label.
    pub code: LineageCode,
    /// Direct ancestor, if any.
    pub parent: Option<SpeciesId>,
    /// Continuous trophic level (1 = producer).
    pub trophic_level: f64,
    /// Living individuals.
    pub population: u64,
    /// Numeric traits.
    pub traits: Traits,
    /// Habitat classification.
    pub habitat: Habitat,
    /// Lifecycle status.
    pub status: SpeciesStatus,
    /// Obligate dependencies.
    pub symbiosis: Option<Symbiosis>,
    /// Active interventions.
    pub intervention: Intervention,
    /// Turn the species appeared.
    pub created_turn: TurnId,
    /// Most recent turn this species produced a descendant species.
    pub last_offspring_turn: Option<TurnId>,
    /// Consecutive turns with a death rate above the streak threshold.
    pub high_mortality_streak: u32,
    /// Death rate applied in the previous turn.
    pub last_death_rate: Option<f64>,
    /// Set exactly once, when the species goes extinct.
    pub extinction: Option<ExtinctionRecord>,
}

impl Species {
    /// A new living species with no parent, created at turn 0.
    pub fn new(
        code: impl Into<LineageCode>,
        trophic_level: f64,
        population: u64,
        traits: Traits,
        habitat: Habitat,
    ) -> Self {
        Self {
            id: SpeciesId(0),
            code: code.into(),
            parent: None,
            trophic_level,
            population,
            traits,
            habitat,
            status: SpeciesStatus::Alive,
            symbiosis: None,
            intervention: Intervention::default(),
            created_turn: TurnId(0),
            last_offspring_turn: None,
            high_mortality_streak: 0,
            last_death_rate: None,
            extinction: None,
        }
    }

    /// Whether the species takes part in this turn.
    pub fn is_alive(&self) -> bool {
        self.status.is_living()
    }

    /// Trophic band of this species.
    pub fn band(&self) -> TrophicBand {
        TrophicBand::from_level(self.trophic_level)
    }

    /// Living biomass in grams.
    pub fn biomass_g(&self) -> f64 {
        let weight = self.traits.body_weight_g;
        if weight.is_finite() && weight > 0.0 {
            self.population as f64 * weight
        } else {
            0.0
        }
    }
}
