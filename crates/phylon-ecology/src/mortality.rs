//! The mortality model.
//!
//! Each risk source becomes a capped loss factor; losses compound on
//! survival (`1 - Π(1 - loss)`), are amortized over the generations that
//! fit into one turn, then receive additive adjustments for competition,
//! recent speciation, lineage pressure, symbiotic collapse and player
//! interventions before the final clamp.
//!
//! Bad per-species inputs never raise: they are clamped and recorded as
//! [`Diagnostic`] notes on the affected [`MortalityResult`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use phylon_core::{
    CompetitionTable, Diagnostic, MortalityBreakdown, MortalityReport, MortalityResult,
    NicheSnapshot, PressureModifiers, ResourceSnapshot, Species, SpeciesArena, SpeciesStatus,
    Tier, TrophicBand, TrophicInteractions, TurnId, TRAIT_SCALE_MAX,
};

use crate::params::{clamp_unit, Check, ParameterError, StepTable};

// ── Configuration ──────────────────────────────────────────────────

/// Tuning for [`MortalityEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MortalityConfig {
    /// Loss per unit of pressure intensity before resistance.
    pub environment_scale: f64,
    /// Share of environmental loss a maximal resistance trait removes.
    pub max_trait_resistance: f64,
    /// Cap on the environmental loss.
    pub environment_cap: f64,
    /// Loss per unit of niche overlap.
    pub niche_weight: f64,
    /// Cap on the niche loss.
    pub niche_cap: f64,
    /// Loss per unit of saturation above 1.
    pub saturation_weight: f64,
    /// Loss per unit of food scarcity.
    pub scarcity_weight: f64,
    /// Cap on the resource loss.
    pub resource_cap: f64,
    /// Loss per unit of grazing pressure (producers).
    pub grazing_sensitivity: f64,
    /// Loss per unit of predation pressure (consumers).
    pub predation_sensitivity: f64,
    /// Share of trophic loss a maximal defense trait removes.
    pub defense_effect: f64,
    /// Cap on the trophic loss.
    pub trophic_cap: f64,
    /// Amortize mortality over the generations in a turn.
    pub generational_scaling: bool,
    /// Real time covered by one turn.
    pub turn_duration_days: f64,
    /// Fallback multiplier by body length (cm), used without scaling.
    pub size_resistance: StepTable<f64>,
    /// Fallback multiplier by reproduction rate, used without scaling.
    pub strategy_resistance: StepTable<f64>,
    /// Penalty in the turn a species speciates.
    pub offspring_penalty: f64,
    /// Turns over which the offspring penalty decays to zero.
    pub offspring_decay_turns: u32,
    /// Lineage pressure per unit overlap and population ratio.
    pub lineage_weight: f64,
    /// Kinship distance within which lineage pressure applies.
    pub lineage_max_distance: u32,
    /// Cap on `pop_kin / pop_self`.
    pub lineage_population_ratio_cap: f64,
    /// Multiplier when a younger descendant is comparably populous.
    pub ancestor_penalty: f64,
    /// Population share that makes a descendant "comparable".
    pub comparable_ratio: f64,
    /// Multiplier for pressure from older kin.
    pub older_kin_factor: f64,
    /// Cap on the total lineage pressure.
    pub lineage_cap: f64,
    /// Penalty per unit of dependency strength and extinct-partner share.
    pub symbiosis_scale: f64,
    /// Factor applied by protection.
    pub protection_factor: f64,
    /// Additive penalty from suppression.
    pub suppression_penalty: f64,
    /// Background attrition floor.
    pub min_death_rate: f64,
    /// Single-turn ceiling.
    pub max_death_rate: f64,
}

impl Default for MortalityConfig {
    fn default() -> Self {
        Self {
            environment_scale: 0.1,
            max_trait_resistance: 0.7,
            environment_cap: 0.65,
            niche_weight: 0.3,
            niche_cap: 0.45,
            saturation_weight: 0.4,
            scarcity_weight: 0.25,
            resource_cap: 0.5,
            grazing_sensitivity: 1.0,
            predation_sensitivity: 0.8,
            defense_effect: 0.5,
            trophic_cap: 0.6,
            generational_scaling: true,
            turn_duration_days: 36_500.0,
            size_resistance: StepTable::new(&[(0.1, 0.7), (10.0, 0.85), (100.0, 1.0)], 1.1),
            strategy_resistance: StepTable::new(&[(2.0, 1.0), (10.0, 0.9)], 0.8),
            offspring_penalty: 0.08,
            offspring_decay_turns: 5,
            lineage_weight: 0.05,
            lineage_max_distance: 2,
            lineage_population_ratio_cap: 2.0,
            ancestor_penalty: 1.5,
            comparable_ratio: 0.8,
            older_kin_factor: 0.5,
            lineage_cap: 0.15,
            symbiosis_scale: 0.4,
            protection_factor: 0.5,
            suppression_penalty: 0.25,
            min_death_rate: 0.03,
            max_death_rate: 0.98,
        }
    }
}

impl MortalityConfig {
    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let c = Check("mortality");
        c.non_negative("environment_scale", self.environment_scale)?;
        c.unit("max_trait_resistance", self.max_trait_resistance)?;
        c.unit("defense_effect", self.defense_effect)?;
        for (name, cap) in [
            ("environment_cap", self.environment_cap),
            ("niche_cap", self.niche_cap),
            ("resource_cap", self.resource_cap),
            ("trophic_cap", self.trophic_cap),
            ("lineage_cap", self.lineage_cap),
        ] {
            // A cap of 1 would let a single factor guarantee death.
            c.unit(name, cap)?;
            if cap >= 1.0 {
                return Err(ParameterError {
                    component: "mortality",
                    parameter: name,
                    reason: format!("must be below 1, got {cap}"),
                });
            }
        }
        for (name, v) in [
            ("niche_weight", self.niche_weight),
            ("saturation_weight", self.saturation_weight),
            ("scarcity_weight", self.scarcity_weight),
            ("grazing_sensitivity", self.grazing_sensitivity),
            ("predation_sensitivity", self.predation_sensitivity),
            ("offspring_penalty", self.offspring_penalty),
            ("lineage_weight", self.lineage_weight),
            ("lineage_population_ratio_cap", self.lineage_population_ratio_cap),
            ("ancestor_penalty", self.ancestor_penalty),
            ("older_kin_factor", self.older_kin_factor),
            ("symbiosis_scale", self.symbiosis_scale),
            ("suppression_penalty", self.suppression_penalty),
        ] {
            c.non_negative(name, v)?;
        }
        c.positive("turn_duration_days", self.turn_duration_days)?;
        c.table("size_resistance", &self.size_resistance)?;
        c.table("strategy_resistance", &self.strategy_resistance)?;
        c.unit("comparable_ratio", self.comparable_ratio)?;
        c.unit("protection_factor", self.protection_factor)?;
        c.unit("min_death_rate", self.min_death_rate)?;
        c.unit("max_death_rate", self.max_death_rate)?;
        c.ordered("death_rate", self.min_death_rate, self.max_death_rate)?;
        Ok(())
    }
}

// ── Pure formulas ──────────────────────────────────────────────────

/// `1 - Π(1 - loss)`. Each loss is clamped to `[0, 1]` first.
pub fn compound_mortality(losses: &[f64]) -> f64 {
    let survival: f64 = losses.iter().map(|&l| 1.0 - clamp_unit(l)).product();
    1.0 - survival
}

/// Generations of an organism that fit into one turn, at least 1.
pub fn generations_per_turn(turn_duration_days: f64, generation_time_days: f64) -> f64 {
    if generation_time_days.is_finite() && generation_time_days > 0.0 {
        (turn_duration_days / generation_time_days).max(1.0)
    } else {
        1.0
    }
}

/// Spread `base` over `generations` and re-compound it:
/// `1 - exp(g * ln(1 - base / g))`.
///
/// Equals `base` when `g == 1` and never exceeds it for `g > 1`.
pub fn amortize(base: f64, generations: f64) -> f64 {
    let base = clamp_unit(base);
    let g = if generations.is_finite() {
        generations.max(1.0)
    } else {
        1.0
    };
    if base >= 1.0 && g == 1.0 {
        return 1.0;
    }
    let per_generation = base / g;
    let cumulative = 1.0 - (g * (-per_generation).ln_1p()).exp();
    cumulative.clamp(0.0, base)
}

// ── Inputs ─────────────────────────────────────────────────────────

/// Everything one mortality pass reads.
#[derive(Clone, Copy, Debug)]
pub struct MortalityInputs<'a> {
    /// Species snapshot.
    pub arena: &'a SpeciesArena,
    /// Environmental pressures.
    pub pressures: &'a PressureModifiers,
    /// Niche analyzer output.
    pub niche: &'a NicheSnapshot,
    /// Optional carrying capacities.
    pub resources: Option<&'a ResourceSnapshot>,
    /// Trophic pressures, if the trophic stage ran.
    pub trophic: Option<&'a TrophicInteractions>,
    /// Competition modifiers, if the competition stage ran.
    pub competition: Option<&'a CompetitionTable>,
    /// Current turn.
    pub turn: TurnId,
}

// ── Engine ─────────────────────────────────────────────────────────

/// Computes authoritative death rates.
#[derive(Clone, Debug, Default)]
pub struct MortalityEngine {
    config: MortalityConfig,
}

impl MortalityEngine {
    /// Engine with the given tuning.
    pub fn new(config: MortalityConfig) -> Self {
        Self { config }
    }

    /// Active tuning.
    pub fn config(&self) -> &MortalityConfig {
        &self.config
    }

    /// Evaluate every living species. Tiers are left at
    /// [`Tier::Background`]; see [`TierClassifier`](crate::TierClassifier).
    pub fn evaluate(&self, inputs: &MortalityInputs<'_>) -> MortalityReport {
        let malformed: Vec<&str> = inputs.pressures.malformed().collect();
        if !malformed.is_empty() {
            warn!(?malformed, "ignoring non-finite pressure intensities");
        }
        let results: Vec<MortalityResult> = inputs
            .arena
            .alive()
            .map(|sp| self.evaluate_species(sp, inputs))
            .collect();
        let report = MortalityReport::new(results);
        debug!(
            species = report.len(),
            deaths = report.total_deaths(),
            "mortality evaluated"
        );
        report
    }

    /// Evaluate one species.
    pub fn evaluate_species(&self, sp: &Species, inputs: &MortalityInputs<'_>) -> MortalityResult {
        let cfg = &self.config;
        let mut notes = Vec::new();
        let mut breakdown = MortalityBreakdown::default();

        if !sp.trophic_level.is_finite() {
            notes.push(Diagnostic::new(
                "trophic_level",
                format!("{} is not finite; treated as producer", sp.trophic_level),
            ));
        }
        for name in inputs.pressures.malformed() {
            notes.push(Diagnostic::new(
                format!("pressure.{name}"),
                "non-finite intensity ignored",
            ));
        }

        // Environment.
        let env_raw: f64 = inputs
            .pressures
            .classified()
            .map(|(kind, magnitude)| {
                let trait_value = sp.traits.resistance(kind);
                let resistance = if trait_value.is_finite() {
                    trait_value.clamp(0.0, TRAIT_SCALE_MAX) / TRAIT_SCALE_MAX
                } else {
                    0.0
                };
                magnitude * cfg.environment_scale * (1.0 - resistance * cfg.max_trait_resistance)
            })
            .sum();
        breakdown.environment_loss = env_raw.min(cfg.environment_cap).max(0.0);

        // Niche.
        let metrics = inputs.niche.metrics(sp.id);
        let overlap = sanitize_unit(metrics.overlap, "niche.overlap", &mut notes);
        breakdown.niche_loss = (overlap * cfg.niche_weight).min(cfg.niche_cap);

        // Resources.
        let saturation = match inputs.resources.and_then(|r| r.saturation_for(sp)) {
            Some(s) => s,
            None => {
                let s = metrics.saturation;
                if s.is_finite() && s >= 0.0 {
                    s
                } else {
                    notes.push(Diagnostic::new(
                        "niche.saturation",
                        format!("{s} is not a valid saturation; using 0"),
                    ));
                    0.0
                }
            }
        };
        let band = sp.band();
        let trophic = inputs.trophic;
        let scarcity = trophic.map_or(0.0, |t| t.scarcity_for(band));
        breakdown.resource_loss = ((saturation - 1.0).max(0.0) * cfg.saturation_weight
            + scarcity * cfg.scarcity_weight)
            .min(cfg.resource_cap);

        // Trophic.
        let grazing = trophic.map_or(0.0, |t| t.grazing_on(sp.id));
        let predation = trophic.map_or(0.0, |t| t.predation_on(sp.id));
        let trophic_raw = if band == TrophicBand::Producer {
            grazing * cfg.grazing_sensitivity
        } else {
            predation * cfg.predation_sensitivity
        };
        let defense = sanitize_scale(sp.traits.defense, "traits.defense", &mut notes);
        let shield = 1.0 - defense / TRAIT_SCALE_MAX * cfg.defense_effect;
        breakdown.trophic_loss = (trophic_raw * shield).min(cfg.trophic_cap).max(0.0);

        breakdown.base_mortality = compound_mortality(&[
            breakdown.environment_loss,
            breakdown.niche_loss,
            breakdown.resource_loss,
            breakdown.trophic_loss,
        ]);

        // Time scaling.
        if cfg.generational_scaling {
            let gen_days = sp.traits.generation_time_days;
            if !(gen_days.is_finite() && gen_days > 0.0) {
                notes.push(Diagnostic::new(
                    "traits.generation_time_days",
                    format!("{gen_days} is not positive; assuming one generation per turn"),
                ));
            }
            breakdown.generations = generations_per_turn(cfg.turn_duration_days, gen_days);
            breakdown.scaled_mortality = amortize(breakdown.base_mortality, breakdown.generations);
        } else {
            breakdown.generations = 1.0;
            let size = cfg.size_resistance.lookup(sp.traits.body_length_cm);
            let strategy = cfg.strategy_resistance.lookup(sp.traits.reproduction_rate);
            breakdown.scaled_mortality = (breakdown.base_mortality * size * strategy).min(1.0);
        }

        // Additive adjustments.
        breakdown.competition = inputs
            .competition
            .map_or(0.0, |t| t.result_for(sp.id).mortality_modifier);
        breakdown.offspring_penalty = self.offspring_penalty(sp, inputs.turn);
        breakdown.lineage_penalty = self.lineage_pressure(sp, inputs);
        breakdown.symbiosis_penalty = self.symbiosis_penalty(sp, inputs.arena, &mut notes);

        let mut rate = breakdown.scaled_mortality
            + breakdown.competition
            + breakdown.offspring_penalty
            + breakdown.lineage_penalty
            + breakdown.symbiosis_penalty;
        let before_intervention = rate;
        if sp.intervention.is_protected() {
            rate *= cfg.protection_factor;
        }
        if sp.intervention.is_suppressed() {
            rate += cfg.suppression_penalty;
        }
        breakdown.intervention = rate - before_intervention;

        if !rate.is_finite() {
            notes.push(Diagnostic::new(
                "death_rate",
                format!("{rate} is not finite; using the floor"),
            ));
            rate = cfg.min_death_rate;
        }
        let death_rate = rate.clamp(cfg.min_death_rate, cfg.max_death_rate);

        let population = sp.population;
        if population == 0 {
            notes.push(Diagnostic::new(
                "population",
                "living species with zero population; no deaths applied",
            ));
        }
        let deaths = ((population as f64 * death_rate).floor() as u64).min(population);

        MortalityResult {
            species: sp.id,
            initial_population: population,
            deaths,
            survivors: population - deaths,
            death_rate,
            notes,
            niche_overlap: overlap,
            resource_pressure: breakdown.resource_loss,
            grazing_pressure: grazing,
            predation_pressure: predation,
            tier: Tier::Background,
            breakdown,
        }
    }

    /// Linearly decaying penalty after producing a descendant species.
    pub fn offspring_penalty(&self, sp: &Species, turn: TurnId) -> f64 {
        let cfg = &self.config;
        let Some(last) = sp.last_offspring_turn else {
            return 0.0;
        };
        let since = turn.since(last);
        if cfg.offspring_decay_turns == 0 || since >= u64::from(cfg.offspring_decay_turns) {
            return 0.0;
        }
        cfg.offspring_penalty * (1.0 - since as f64 / f64::from(cfg.offspring_decay_turns))
    }

    /// Pressure from living close kin, capped.
    pub fn lineage_pressure(&self, sp: &Species, inputs: &MortalityInputs<'_>) -> f64 {
        let cfg = &self.config;
        let arena = inputs.arena;
        let mut total = 0.0;
        for other in arena.alive() {
            if other.id == sp.id {
                continue;
            }
            let Some(distance) = arena.kinship_distance(sp.id, other.id, cfg.lineage_max_distance)
            else {
                continue;
            };
            if distance > cfg.lineage_max_distance {
                continue;
            }
            let overlap = inputs.niche.pair_overlap(sp, other);
            let ratio = if sp.population == 0 {
                cfg.lineage_population_ratio_cap
            } else {
                (other.population as f64 / sp.population as f64)
                    .min(cfg.lineage_population_ratio_cap)
            };
            let age_factor = if other.created_turn > sp.created_turn {
                let descendant = arena.is_descendant(other.id, sp.id, cfg.lineage_max_distance);
                let comparable =
                    other.population as f64 >= cfg.comparable_ratio * sp.population as f64;
                if descendant && comparable {
                    cfg.ancestor_penalty
                } else {
                    1.0
                }
            } else if other.created_turn < sp.created_turn {
                cfg.older_kin_factor
            } else {
                1.0
            };
            total += cfg.lineage_weight * overlap * ratio * age_factor;
        }
        total.min(cfg.lineage_cap)
    }

    /// Penalty for depending on partners that have gone extinct.
    pub fn symbiosis_penalty(
        &self,
        sp: &Species,
        arena: &SpeciesArena,
        notes: &mut Vec<Diagnostic>,
    ) -> f64 {
        let Some(sym) = &sp.symbiosis else {
            return 0.0;
        };
        if sym.partners.is_empty() {
            return 0.0;
        }
        let mut lost = 0usize;
        for &partner in &sym.partners {
            match arena.get(partner) {
                Some(p) if p.status != SpeciesStatus::Extinct => {}
                Some(_) => lost += 1,
                None => {
                    notes.push(Diagnostic::new(
                        "symbiosis.partners",
                        format!("unknown partner {partner} counted as extinct"),
                    ));
                    lost += 1;
                }
            }
        }
        let strength = sanitize_unit(sym.strength, "symbiosis.strength", notes);
        self.config.symbiosis_scale * strength * lost as f64 / sym.partners.len() as f64
    }
}

fn sanitize_unit(v: f64, subject: &str, notes: &mut Vec<Diagnostic>) -> f64 {
    let clean = clamp_unit(v);
    if clean != v {
        notes.push(Diagnostic::new(
            subject,
            format!("{v} outside [0, 1]; clamped to {clean}"),
        ));
    }
    clean
}

fn sanitize_scale(v: f64, subject: &str, notes: &mut Vec<Diagnostic>) -> f64 {
    let clean = if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, TRAIT_SCALE_MAX)
    };
    if clean != v {
        notes.push(Diagnostic::new(
            subject,
            format!("{v} outside [0, {TRAIT_SCALE_MAX}]; clamped to {clean}"),
        ));
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylon_core::{
        CompetitionResult, CompetitionStatus, Habitat, Intervention, NicheMetrics, SpeciesId,
        Symbiosis,
    };
    use phylon_test_utils::SpeciesBuilder;
    use proptest::prelude::*;
    use smallvec::smallvec;

    struct World {
        arena: SpeciesArena,
        pressures: PressureModifiers,
        niche: NicheSnapshot,
        trophic: Option<TrophicInteractions>,
        competition: Option<CompetitionTable>,
    }

    impl World {
        fn new(species: Vec<Species>) -> Self {
            let mut arena = SpeciesArena::new();
            for sp in species {
                arena.push(sp, None).unwrap();
            }
            Self {
                arena,
                pressures: PressureModifiers::new(),
                niche: NicheSnapshot::new(),
                trophic: None,
                competition: None,
            }
        }

        fn inputs(&self, turn: u64) -> MortalityInputs<'_> {
            MortalityInputs {
                arena: &self.arena,
                pressures: &self.pressures,
                niche: &self.niche,
                resources: None,
                trophic: self.trophic.as_ref(),
                competition: self.competition.as_ref(),
                turn: TurnId(turn),
            }
        }
    }

    fn unscaled() -> MortalityConfig {
        MortalityConfig {
            generational_scaling: false,
            size_resistance: StepTable::new(&[], 1.0),
            strategy_resistance: StepTable::new(&[], 1.0),
            ..MortalityConfig::default()
        }
    }

    #[test]
    fn two_half_losses_compound_to_three_quarters() {
        assert!((compound_mortality(&[0.5, 0.5]) - 0.75).abs() < 1e-12);
        assert_eq!(compound_mortality(&[]), 0.0);
        assert!((compound_mortality(&[0.2, 0.0, 0.5]) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn amortization_identity_at_one_generation() {
        for base in [0.0, 0.1, 0.5, 0.9] {
            assert!((amortize(base, 1.0) - base).abs() < 1e-12);
        }
        // Limit for very many generations is 1 - e^-base.
        let many = amortize(0.6, 1e9);
        assert!((many - (1.0 - (-0.6f64).exp())).abs() < 1e-6);
    }

    #[test]
    fn generations_floor_at_one() {
        assert_eq!(generations_per_turn(36_500.0, 30.0), 36_500.0 / 30.0);
        assert_eq!(generations_per_turn(100.0, 1_000.0), 1.0);
        assert_eq!(generations_per_turn(100.0, 0.0), 1.0);
        assert_eq!(generations_per_turn(100.0, f64::NAN), 1.0);
    }

    #[test]
    fn environment_respects_resistance() {
        let mut w = World::new(vec![
            SpeciesBuilder::new("Tough").resistance(phylon_core::PressureKind::Drought, 10.0).build(),
            SpeciesBuilder::new("Soft").resistance(phylon_core::PressureKind::Drought, 0.0).build(),
        ]);
        w.pressures.insert("drought", 3.0);
        let engine = MortalityEngine::new(unscaled());
        let report = engine.evaluate(&w.inputs(0));
        let tough = &report.get(SpeciesId(0)).unwrap().breakdown;
        let soft = &report.get(SpeciesId(1)).unwrap().breakdown;
        assert!((tough.environment_loss - 3.0 * 0.1 * 0.3).abs() < 1e-12);
        assert!((soft.environment_loss - 0.3).abs() < 1e-12);

        w.pressures.insert("drought", 50.0);
        let capped = engine.evaluate(&w.inputs(0));
        assert_eq!(capped.get(SpeciesId(1)).unwrap().breakdown.environment_loss, 0.65);
    }

    #[test]
    fn niche_and_resource_losses() {
        let mut w = World::new(vec![SpeciesBuilder::new("A").population(1_000).build()]);
        w.niche.insert(
            SpeciesId(0),
            NicheMetrics {
                overlap: 0.5,
                saturation: 1.5,
            },
        );
        let r = MortalityEngine::new(unscaled()).evaluate_species(
            w.arena.get(SpeciesId(0)).unwrap(),
            &w.inputs(0),
        );
        assert!((r.breakdown.niche_loss - 0.15).abs() < 1e-12);
        assert!((r.breakdown.resource_loss - 0.2).abs() < 1e-12);
        let expected = 1.0 - 0.85 * 0.8;
        assert!((r.death_rate - expected).abs() < 1e-12);
        assert_eq!(r.niche_overlap, 0.5);
    }

    #[test]
    fn resource_snapshot_overrides_saturation() {
        let w = World::new(vec![SpeciesBuilder::new("A").population(3_000).build()]);
        let mut res = ResourceSnapshot::new();
        res.set_capacity(SpeciesId(0), 1_000.0);
        let mut inputs = w.inputs(0);
        inputs.resources = Some(&res);
        let r = MortalityEngine::new(unscaled())
            .evaluate_species(w.arena.get(SpeciesId(0)).unwrap(), &inputs);
        // (3 - 1) * 0.4 = 0.8, capped at 0.5
        assert_eq!(r.breakdown.resource_loss, 0.5);
    }

    #[test]
    fn defense_reduces_trophic_loss() {
        let mut w = World::new(vec![
            SpeciesBuilder::new("H").level(2.0).defense(10.0).build(),
            SpeciesBuilder::new("H2").level(2.0).defense(0.0).build(),
        ]);
        let mut t = TrophicInteractions::default();
        t.predation.insert(SpeciesId(0), 0.5);
        t.predation.insert(SpeciesId(1), 0.5);
        w.trophic = Some(t);
        let report = MortalityEngine::new(unscaled()).evaluate(&w.inputs(0));
        let armored = report.get(SpeciesId(0)).unwrap();
        let bare = report.get(SpeciesId(1)).unwrap();
        assert!((armored.breakdown.trophic_loss - 0.5 * 0.8 * 0.5).abs() < 1e-12);
        assert!((bare.breakdown.trophic_loss - 0.4).abs() < 1e-12);
        assert_eq!(bare.predation_pressure, 0.5);
    }

    #[test]
    fn fallback_uses_size_and_strategy_tables() {
        let mut w = World::new(vec![SpeciesBuilder::new("A")
            .length(500.0)
            .reproduction(1.0)
            .build()]);
        w.niche.insert(
            SpeciesId(0),
            NicheMetrics {
                overlap: 1.0,
                saturation: 0.0,
            },
        );
        let cfg = MortalityConfig {
            generational_scaling: false,
            ..MortalityConfig::default()
        };
        let r = MortalityEngine::new(cfg)
            .evaluate_species(w.arena.get(SpeciesId(0)).unwrap(), &w.inputs(0));
        assert!((r.breakdown.scaled_mortality - 0.3 * 1.1 * 1.0).abs() < 1e-12);
        assert_eq!(r.breakdown.generations, 1.0);
    }

    #[test]
    fn competition_and_offspring_adjustments() {
        let mut parent = SpeciesBuilder::new("P").population(1_000).build();
        parent.last_offspring_turn = Some(TurnId(8));
        let mut w = World::new(vec![parent]);
        let mut table = CompetitionTable::new();
        table.insert(
            SpeciesId(0),
            CompetitionResult {
                mortality_modifier: 0.1,
                status: CompetitionStatus::Subordinate,
                ..CompetitionResult::neutral()
            },
        );
        w.competition = Some(table);
        let engine = MortalityEngine::new(unscaled());
        let r = engine.evaluate_species(w.arena.get(SpeciesId(0)).unwrap(), &w.inputs(10));
        // 0.08 * (1 - 2/5)
        assert!((r.breakdown.offspring_penalty - 0.048).abs() < 1e-12);
        assert!((r.death_rate - (0.1 + 0.048)).abs() < 1e-12);
        let parent = w.arena.get(SpeciesId(0)).unwrap();
        assert_eq!(engine.offspring_penalty(parent, TurnId(13)), 0.0);
        assert!((engine.offspring_penalty(parent, TurnId(8)) - 0.08).abs() < 1e-12);
    }

    #[test]
    fn comparable_younger_descendant_pressures_ancestor() {
        let mut arena = SpeciesArena::new();
        let anc = arena
            .push(SpeciesBuilder::new("A").population(1_000).build(), None)
            .unwrap();
        let kid = arena
            .push_offspring(
                SpeciesBuilder::new("A1").population(900).build(),
                anc,
                TurnId(3),
            )
            .unwrap();
        let mut niche = NicheSnapshot::new();
        niche.set_pair_overlap(anc, kid, 0.8);
        let pressures = PressureModifiers::new();
        let inputs = MortalityInputs {
            arena: &arena,
            pressures: &pressures,
            niche: &niche,
            resources: None,
            trophic: None,
            competition: None,
            turn: TurnId(4),
        };
        let engine = MortalityEngine::default();
        let on_anc = engine.lineage_pressure(arena.get(anc).unwrap(), &inputs);
        let on_kid = engine.lineage_pressure(arena.get(kid).unwrap(), &inputs);
        assert!((on_anc - 0.05 * 0.8 * 0.9 * 1.5).abs() < 1e-12);
        // Kid sees an older relative: ratio capped at 1000/900, factor 0.5.
        assert!((on_kid - 0.05 * 0.8 * (1_000.0 / 900.0) * 0.5).abs() < 1e-12);
    }

    #[test]
    fn symbiosis_collapse_scales_with_extinct_share() {
        let mut dead = SpeciesBuilder::new("D").build();
        dead.status = SpeciesStatus::Extinct;
        let mut host = SpeciesBuilder::new("H").build();
        host.symbiosis = Some(Symbiosis {
            partners: smallvec![SpeciesId(0), SpeciesId(1)],
            strength: 0.5,
        });
        let w = World::new(vec![dead, SpeciesBuilder::new("L").build(), host]);
        let mut notes = Vec::new();
        let penalty = MortalityEngine::default().symbiosis_penalty(
            w.arena.get(SpeciesId(2)).unwrap(),
            &w.arena,
            &mut notes,
        );
        assert!((penalty - 0.4 * 0.5 * 0.5).abs() < 1e-12);
        assert!(notes.is_empty());
    }

    #[test]
    fn protection_applies_before_suppression() {
        let mut sp = SpeciesBuilder::new("A").population(1_000).build();
        sp.intervention = Intervention {
            protected_turns: 1,
            suppressed_turns: 1,
        };
        let mut w = World::new(vec![sp]);
        w.niche.insert(
            SpeciesId(0),
            NicheMetrics {
                overlap: 1.0,
                saturation: 0.0,
            },
        );
        let r = MortalityEngine::new(unscaled())
            .evaluate_species(w.arena.get(SpeciesId(0)).unwrap(), &w.inputs(0));
        // 0.3 * 0.5 + 0.25
        assert!((r.death_rate - 0.4).abs() < 1e-12);
        assert!((r.breakdown.intervention - 0.1).abs() < 1e-12);
    }

    #[test]
    fn malformed_inputs_are_noted_not_raised() {
        let mut sp = SpeciesBuilder::new("A").population(0).build();
        sp.traits.generation_time_days = 0.0;
        sp.traits.defense = f64::NAN;
        let mut w = World::new(vec![sp]);
        w.pressures.insert("heat", f64::NAN);
        w.niche.insert(
            SpeciesId(0),
            NicheMetrics {
                overlap: 1.7,
                saturation: -3.0,
            },
        );
        let r = MortalityEngine::default()
            .evaluate_species(w.arena.get(SpeciesId(0)).unwrap(), &w.inputs(0));
        let subjects: Vec<&str> = r.notes.iter().map(|n| n.subject.as_str()).collect();
        for expected in [
            "pressure.heat",
            "niche.overlap",
            "niche.saturation",
            "traits.defense",
            "traits.generation_time_days",
            "population",
        ] {
            assert!(subjects.contains(&expected), "missing note {expected}");
        }
        assert_eq!(r.deaths, 0);
        assert_eq!(r.survivors, 0);
        assert!((0.03..=0.98).contains(&r.death_rate));
    }

    #[test]
    fn floor_applies_in_ideal_conditions() {
        let w = World::new(vec![SpeciesBuilder::new("A").population(1_000).build()]);
        let r = MortalityEngine::default()
            .evaluate_species(w.arena.get(SpeciesId(0)).unwrap(), &w.inputs(0));
        assert_eq!(r.death_rate, 0.03);
        assert_eq!(r.deaths, 30);
        assert_eq!(r.survivors, 970);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(MortalityConfig::default().validate().is_ok());
        let bad = MortalityConfig {
            trophic_cap: 1.0,
            ..MortalityConfig::default()
        };
        assert_eq!(bad.validate().unwrap_err().parameter, "trophic_cap");
    }

    fn arb_species() -> impl Strategy<Value = Species> {
        (
            0u64..10_000_000,
            0.5f64..5.0,
            prop::num::f64::ANY,
            0.0f64..12.0,
            0.0f64..10_000.0,
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(pop, level, weird, defense, gen_days, protect, suppress)| {
                let mut sp = SpeciesBuilder::new("P")
                    .population(pop)
                    .level(level)
                    .defense(defense)
                    .generation_days(gen_days)
                    .habitat(Habitat::Coastal)
                    .build();
                sp.traits.heat_resistance = weird;
                sp.intervention = Intervention {
                    protected_turns: u32::from(protect),
                    suppressed_turns: u32::from(suppress),
                };
                sp
            })
    }

    proptest! {
        #[test]
        fn death_rate_always_clamped(
            sp in arb_species(),
            heat in prop::num::f64::ANY,
            overlap in prop::num::f64::ANY,
            saturation in prop::num::f64::ANY,
            modifier in -1.0f64..1.0,
            scaling in any::<bool>(),
        ) {
            let mut w = World::new(vec![sp]);
            w.pressures.insert("heat", heat);
            w.niche.insert(SpeciesId(0), NicheMetrics { overlap, saturation });
            let mut table = CompetitionTable::new();
            table.insert(SpeciesId(0), CompetitionResult {
                mortality_modifier: modifier,
                ..CompetitionResult::neutral()
            });
            w.competition = Some(table);
            let cfg = MortalityConfig { generational_scaling: scaling, ..MortalityConfig::default() };
            let r = MortalityEngine::new(cfg)
                .evaluate_species(w.arena.get(SpeciesId(0)).unwrap(), &w.inputs(0));
            prop_assert!((0.03..=0.98).contains(&r.death_rate));
            prop_assert_eq!(r.deaths + r.survivors, r.initial_population);
        }

        #[test]
        fn amortization_never_exceeds_base(base in 0.0f64..0.999, g in 1.0f64..1e7) {
            let cumulative = amortize(base, g);
            prop_assert!(cumulative <= base + 1e-12);
            prop_assert!(cumulative >= 0.0);
        }

        #[test]
        fn amortization_monotone_in_generations(
            base in 0.01f64..0.99,
            g in 1.0f64..1e4,
            extra in 0.0f64..1e4,
        ) {
            prop_assert!(amortize(base, g + extra) <= amortize(base, g) + 1e-12);
        }

        #[test]
        fn compound_is_bounded_and_order_preserving(
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
            c in 0.0f64..=1.0,
        ) {
            let m = compound_mortality(&[a, b]);
            prop_assert!(m <= 1.0 && m >= a.max(b) - 1e-12);
            prop_assert!(compound_mortality(&[a, b, c]) >= m - 1e-12);
        }
    }
}
