//! Per-turn outputs of the trophic, competition and mortality stages.
//!
//! All of these live for exactly one turn inside the turn context. Only
//! [`MortalityReport`] leaves the turn, as part of the turn report.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::SpeciesId;
use crate::species::TrophicBand;

// ── Diagnostics ────────────────────────────────────────────────────

/// A recovered computation problem, attached to the affected result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Which input or term was affected (e.g. `"niche.overlap"`).
    pub subject: String,
    /// What was wrong and how it was clamped.
    pub message: String,
}

impl Diagnostic {
    /// Build a diagnostic note.
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

// ── Trophic ────────────────────────────────────────────────────────

/// Biomass flow pressures for one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrophicInteractions {
    /// Grazing pressure on each producer species, `[0, 1]`.
    pub grazing: IndexMap<SpeciesId, f64>,
    /// Predation pressure on each consumer species, `[0, 1]`.
    pub predation: IndexMap<SpeciesId, f64>,
    /// Living biomass per band, in grams.
    pub biomass: IndexMap<TrophicBand, f64>,
    /// Food scarcity per consuming band, `[0, 2]`.
    pub scarcity: IndexMap<TrophicBand, f64>,
    /// Degenerate ratios that were clamped.
    pub diagnostics: Vec<Diagnostic>,
}

impl TrophicInteractions {
    /// Grazing pressure on a species (0 when not a grazed producer).
    pub fn grazing_on(&self, id: SpeciesId) -> f64 {
        self.grazing.get(&id).copied().unwrap_or(0.0)
    }

    /// Predation pressure on a species (0 when unpreyed).
    pub fn predation_on(&self, id: SpeciesId) -> f64 {
        self.predation.get(&id).copied().unwrap_or(0.0)
    }

    /// Scarcity for a consuming band (0 for producers).
    pub fn scarcity_for(&self, band: TrophicBand) -> f64 {
        self.scarcity.get(&band).copied().unwrap_or(0.0)
    }

    /// Biomass of a band in grams.
    pub fn biomass_of(&self, band: TrophicBand) -> f64 {
        self.biomass.get(&band).copied().unwrap_or(0.0)
    }
}

// ── Competition ────────────────────────────────────────────────────

/// Outcome label of a species' strongest competitive interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    /// Won an intense contest.
    Dominant,
    /// Lost an intense contest.
    Subordinate,
    /// Intense contest too close to call.
    Contested,
    /// Mild competition, or none.
    Coexisting,
}

/// Competitive regime selected for a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionRegime {
    /// Winner/loser resolution.
    Intense,
    /// Inverse-fitness split of a small base pressure.
    Mild,
}

/// Competition modifiers for one species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompetitionResult {
    /// Additive mortality change (negative is a bonus).
    pub mortality_modifier: f64,
    /// Additive reproduction change.
    pub reproduction_modifier: f64,
    /// Label from the strongest interaction.
    pub status: CompetitionStatus,
    /// Counterpart in the strongest interaction.
    pub main_competitor: Option<SpeciesId>,
    /// Group-relative fitness in `[0, 1]`.
    pub fitness: f64,
}

impl CompetitionResult {
    /// No modifiers, coexisting, mid fitness.
    pub fn neutral() -> Self {
        Self {
            mortality_modifier: 0.0,
            reproduction_modifier: 0.0,
            status: CompetitionStatus::Coexisting,
            main_competitor: None,
            fitness: 0.5,
        }
    }
}

impl Default for CompetitionResult {
    fn default() -> Self {
        Self::neutral()
    }
}

/// One side of a resolved pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairEffect {
    /// The species.
    pub species: SpeciesId,
    /// Its label in this pair.
    pub status: CompetitionStatus,
    /// Mortality delta from this pair.
    pub mortality_delta: f64,
    /// Reproduction delta from this pair.
    pub reproduction_delta: f64,
}

/// A resolved pairwise interaction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairOutcome {
    /// Regime that applied.
    pub regime: CompetitionRegime,
    /// Niche overlap of the pair.
    pub overlap: f64,
    /// Kinship distance, `None` when unrelated within the bound.
    pub kinship: Option<u32>,
    /// Effect on the first species as passed in.
    pub first: PairEffect,
    /// Effect on the second species as passed in.
    pub second: PairEffect,
}

impl PairOutcome {
    /// The effect on `id`, if it took part.
    pub fn effect_on(&self, id: SpeciesId) -> Option<&PairEffect> {
        if self.first.species == id {
            Some(&self.first)
        } else if self.second.species == id {
            Some(&self.second)
        } else {
            None
        }
    }
}

/// Competition results for one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitionTable {
    results: IndexMap<SpeciesId, CompetitionResult>,
    pairs: Vec<PairOutcome>,
}

impl CompetitionTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a species' aggregated result.
    pub fn insert(&mut self, id: SpeciesId, result: CompetitionResult) {
        self.results.insert(id, result);
    }

    /// Record a resolved pair.
    pub fn push_pair(&mut self, pair: PairOutcome) {
        self.pairs.push(pair);
    }

    /// Result for a species, neutral when absent.
    pub fn result_for(&self, id: SpeciesId) -> CompetitionResult {
        self.results.get(&id).cloned().unwrap_or_default()
    }

    /// Raw lookup without defaulting.
    pub fn get(&self, id: SpeciesId) -> Option<&CompetitionResult> {
        self.results.get(&id)
    }

    /// All per-species results.
    pub fn iter(&self) -> impl Iterator<Item = (&SpeciesId, &CompetitionResult)> {
        self.results.iter()
    }

    /// All resolved pairs.
    pub fn pairs(&self) -> &[PairOutcome] {
        &self.pairs
    }

    /// Number of species with a result.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no species has a result.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ── Mortality ──────────────────────────────────────────────────────

/// Population tier used to route results to downstream collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Under intervention or at risk.
    Critical,
    /// Among the most populous.
    Focus,
    /// Everything else.
    Background,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::Focus => "focus",
            Self::Background => "background",
        };
        f.write_str(s)
    }
}

/// Every intermediate term of a death-rate computation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MortalityBreakdown {
    /// Capped environmental loss.
    pub environment_loss: f64,
    /// Capped niche-overlap loss.
    pub niche_loss: f64,
    /// Capped resource loss.
    pub resource_loss: f64,
    /// Capped trophic loss.
    pub trophic_loss: f64,
    /// `1 - Π(1 - loss)`.
    pub base_mortality: f64,
    /// Generations elapsed this turn (1 when scaling is disabled).
    pub generations: f64,
    /// Mortality after generational scaling or the resistance fallback.
    pub scaled_mortality: f64,
    /// Competition modifier applied.
    pub competition: f64,
    /// Recent-offspring penalty applied.
    pub offspring_penalty: f64,
    /// Lineage pressure applied.
    pub lineage_penalty: f64,
    /// Symbiotic-collapse penalty applied.
    pub symbiosis_penalty: f64,
    /// Net intervention change (protection then suppression).
    pub intervention: f64,
}

/// Authoritative mortality for one species this turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MortalityResult {
    /// The species.
    pub species: SpeciesId,
    /// Population at turn start.
    pub initial_population: u64,
    /// `floor(initial_population * death_rate)`.
    pub deaths: u64,
    /// `initial_population - deaths`.
    pub survivors: u64,
    /// Final death rate in the clamp range.
    pub death_rate: f64,
    /// Recovered input problems.
    pub notes: Vec<Diagnostic>,
    /// Niche overlap used.
    pub niche_overlap: f64,
    /// Capped resource loss used.
    pub resource_pressure: f64,
    /// Grazing pressure used.
    pub grazing_pressure: f64,
    /// Predation pressure used.
    pub predation_pressure: f64,
    /// Routing tier.
    pub tier: Tier,
    /// Intermediate terms.
    pub breakdown: MortalityBreakdown,
}

/// All mortality results of a turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MortalityReport {
    results: Vec<MortalityResult>,
}

impl MortalityReport {
    /// Wrap a result list.
    pub fn new(results: Vec<MortalityResult>) -> Self {
        Self { results }
    }

    /// Result for a species.
    pub fn get(&self, id: SpeciesId) -> Option<&MortalityResult> {
        self.results.iter().find(|r| r.species == id)
    }

    /// All results in species order.
    pub fn results(&self) -> &[MortalityResult] {
        &self.results
    }

    /// Mutable access, used by tier classification.
    pub fn results_mut(&mut self) -> &mut [MortalityResult] {
        &mut self.results
    }

    /// Results belonging to one tier.
    pub fn tier(&self, tier: Tier) -> impl Iterator<Item = &MortalityResult> {
        self.results.iter().filter(move |r| r.tier == tier)
    }

    /// Results split by tier, critical first.
    pub fn by_tier(&self) -> IndexMap<Tier, Vec<&MortalityResult>> {
        let mut out: IndexMap<Tier, Vec<&MortalityResult>> = [
            (Tier::Critical, Vec::new()),
            (Tier::Focus, Vec::new()),
            (Tier::Background, Vec::new()),
        ]
        .into_iter()
        .collect();
        for r in &self.results {
            out.entry(r.tier).or_default().push(r);
        }
        out
    }

    /// Total deaths this turn.
    pub fn total_deaths(&self) -> u64 {
        self.results.iter().map(|r| r.deaths).sum()
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the report is empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: u32, tier: Tier, deaths: u64) -> MortalityResult {
        MortalityResult {
            species: SpeciesId(id),
            initial_population: 100,
            deaths,
            survivors: 100 - deaths,
            death_rate: deaths as f64 / 100.0,
            notes: Vec::new(),
            niche_overlap: 0.0,
            resource_pressure: 0.0,
            grazing_pressure: 0.0,
            predation_pressure: 0.0,
            tier,
            breakdown: MortalityBreakdown::default(),
        }
    }

    #[test]
    fn report_splits_by_tier() {
        let report = MortalityReport::new(vec![
            result(0, Tier::Background, 10),
            result(1, Tier::Critical, 60),
            result(2, Tier::Background, 5),
        ]);
        let split = report.by_tier();
        assert_eq!(split[&Tier::Critical].len(), 1);
        assert!(split[&Tier::Focus].is_empty());
        assert_eq!(split[&Tier::Background].len(), 2);
        assert_eq!(report.total_deaths(), 75);
        assert_eq!(report.get(SpeciesId(1)).unwrap().deaths, 60);
    }

    #[test]
    fn absent_competition_entry_is_neutral() {
        let table = CompetitionTable::new();
        let r = table.result_for(SpeciesId(3));
        assert_eq!(r, CompetitionResult::neutral());
        assert_eq!(r.status, CompetitionStatus::Coexisting);
    }

    #[test]
    fn trophic_lookups_default_to_zero() {
        let t = TrophicInteractions::default();
        assert_eq!(t.grazing_on(SpeciesId(0)), 0.0);
        assert_eq!(t.scarcity_for(TrophicBand::Apex), 0.0);
    }
}
