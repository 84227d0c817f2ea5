//! Fitness ranking and pairwise competition within trophic groups.
//!
//! Species sharing a rounded trophic level compete. Each gets a
//! group-relative fitness score; each pair is then resolved by niche
//! overlap and kinship into an intense contest (winner and loser), a mild
//! split of a small shared pressure, or no interaction at all.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use phylon_core::{
    trophic_group_key, CompetitionRegime, CompetitionResult, CompetitionStatus, CompetitionTable,
    NicheSnapshot, PairEffect, PairOutcome, Species, SpeciesArena, SpeciesId, TurnId,
};

use crate::params::{Check, ParameterError};

// ── Configuration ──────────────────────────────────────────────────

/// Exponents of the amplification curve around 0.5.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Amplification {
    /// Applied to values above the midpoint.
    pub stretch: f64,
    /// Applied to values below the midpoint.
    pub compress: f64,
}

impl Amplification {
    /// Push `v` away from 0.5: values above move toward 1 and values
    /// below toward 0. Fixed points are 0, 0.5 and 1.
    pub fn apply(&self, v: f64) -> f64 {
        let v = v.clamp(0.0, 1.0);
        if v >= 0.5 {
            1.0 - 0.5 * ((1.0 - v) / 0.5).powf(self.stretch)
        } else {
            0.5 * (v / 0.5).powf(self.compress)
        }
    }
}

/// Fitness model tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Weight of the population factor.
    pub population_weight: f64,
    /// Weight of the survival factor.
    pub survival_weight: f64,
    /// Weight of the reproduction-efficiency factor.
    pub reproduction_weight: f64,
    /// Weight of the trophic-stability factor.
    pub trophic_weight: f64,
    /// Curve for the population factor.
    pub population_curve: Amplification,
    /// Curve for the survival factor.
    pub survival_curve: Amplification,
    /// Curve for the reproduction factor.
    pub reproduction_curve: Amplification,
    /// Curve for the trophic factor.
    pub trophic_curve: Amplification,
    /// Death rate assumed for species with no history.
    pub assumed_death_rate: f64,
    /// Stability lost per trophic level above 1.
    pub trophic_penalty_per_level: f64,
    /// Turns before age decay starts.
    pub age_grace_turns: u64,
    /// Decay per turn beyond the grace period.
    pub age_decay_rate: f64,
    /// Maximum total decay.
    pub age_decay_max: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            population_weight: 0.4,
            survival_weight: 0.3,
            reproduction_weight: 0.2,
            trophic_weight: 0.1,
            population_curve: Amplification {
                stretch: 1.5,
                compress: 2.0,
            },
            survival_curve: Amplification {
                stretch: 1.5,
                compress: 1.5,
            },
            reproduction_curve: Amplification {
                stretch: 1.2,
                compress: 1.5,
            },
            trophic_curve: Amplification {
                stretch: 1.0,
                compress: 1.0,
            },
            assumed_death_rate: 0.15,
            trophic_penalty_per_level: 0.1,
            age_grace_turns: 20,
            age_decay_rate: 0.005,
            age_decay_max: 0.15,
        }
    }
}

/// Tuning for [`KinCompetitionCalculator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionConfig {
    /// Fitness model.
    pub fitness: FitnessConfig,
    /// Largest kinship distance still treated as kin.
    pub kin_max_distance: u32,
    /// Generations walked upward when measuring kinship.
    pub max_kinship_depth: u32,
    /// Overlap above which every pair competes intensely.
    pub intense_overlap: f64,
    /// Overlap from which kin compete intensely and others mildly.
    pub interaction_overlap: f64,
    /// Intensity multiplier for kin in an intense contest.
    pub kin_intensity: f64,
    /// Fitness gap below which an intense contest is a draw.
    pub contested_threshold: f64,
    /// Mortality added to both sides of a draw, per unit overlap.
    pub contested_penalty: f64,
    /// Dominant mortality bonus per unit strength.
    pub dominant_mortality_rate: f64,
    /// Cap on the dominant mortality bonus.
    pub dominant_mortality_cap: f64,
    /// Dominant reproduction bonus per unit strength.
    pub dominant_reproduction_rate: f64,
    /// Cap on the dominant reproduction bonus.
    pub dominant_reproduction_cap: f64,
    /// Subordinate mortality penalty per unit strength.
    pub subordinate_mortality_rate: f64,
    /// Cap on the subordinate mortality penalty.
    pub subordinate_mortality_cap: f64,
    /// Share of the subordinate penalty forgiven per unit of non-overlap.
    pub refuge: f64,
    /// Subordinate reproduction penalty per unit strength.
    pub subordinate_reproduction_rate: f64,
    /// Cap on the subordinate reproduction penalty.
    pub subordinate_reproduction_cap: f64,
    /// Mild-regime pressure per unit overlap, split between the pair.
    pub coexistence_pressure: f64,
    /// Lower clamp of the aggregated mortality modifier.
    pub min_mortality_modifier: f64,
    /// Upper clamp of the aggregated mortality modifier.
    pub max_mortality_modifier: f64,
    /// Lower clamp of the aggregated reproduction modifier.
    pub min_reproduction_modifier: f64,
    /// Upper clamp of the aggregated reproduction modifier.
    pub max_reproduction_modifier: f64,
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            fitness: FitnessConfig::default(),
            kin_max_distance: 4,
            max_kinship_depth: 5,
            intense_overlap: 0.6,
            interaction_overlap: 0.3,
            kin_intensity: 1.3,
            contested_threshold: 0.08,
            contested_penalty: 0.05,
            dominant_mortality_rate: 0.25,
            dominant_mortality_cap: 0.10,
            dominant_reproduction_rate: 0.12,
            dominant_reproduction_cap: 0.05,
            subordinate_mortality_rate: 0.6,
            subordinate_mortality_cap: 0.25,
            refuge: 0.5,
            subordinate_reproduction_rate: 0.2,
            subordinate_reproduction_cap: 0.10,
            coexistence_pressure: 0.04,
            min_mortality_modifier: -0.15,
            max_mortality_modifier: 0.35,
            min_reproduction_modifier: -0.2,
            max_reproduction_modifier: 0.1,
        }
    }
}

impl CompetitionConfig {
    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let c = Check("competition");
        let f = &self.fitness;
        for (name, w) in [
            ("fitness.population_weight", f.population_weight),
            ("fitness.survival_weight", f.survival_weight),
            ("fitness.reproduction_weight", f.reproduction_weight),
            ("fitness.trophic_weight", f.trophic_weight),
        ] {
            c.unit(name, w)?;
        }
        for (name, curve) in [
            ("fitness.population_curve", f.population_curve),
            ("fitness.survival_curve", f.survival_curve),
            ("fitness.reproduction_curve", f.reproduction_curve),
            ("fitness.trophic_curve", f.trophic_curve),
        ] {
            c.positive(name, curve.stretch)?;
            c.positive(name, curve.compress)?;
        }
        c.unit("fitness.assumed_death_rate", f.assumed_death_rate)?;
        c.non_negative("fitness.trophic_penalty_per_level", f.trophic_penalty_per_level)?;
        c.non_negative("fitness.age_decay_rate", f.age_decay_rate)?;
        c.unit("fitness.age_decay_max", f.age_decay_max)?;
        c.unit("intense_overlap", self.intense_overlap)?;
        c.unit("interaction_overlap", self.interaction_overlap)?;
        c.ordered(
            "interaction_overlap",
            self.interaction_overlap,
            self.intense_overlap,
        )?;
        c.positive("kin_intensity", self.kin_intensity)?;
        c.unit("contested_threshold", self.contested_threshold)?;
        for (name, v) in [
            ("contested_penalty", self.contested_penalty),
            ("dominant_mortality_rate", self.dominant_mortality_rate),
            ("dominant_mortality_cap", self.dominant_mortality_cap),
            ("dominant_reproduction_rate", self.dominant_reproduction_rate),
            ("dominant_reproduction_cap", self.dominant_reproduction_cap),
            ("subordinate_mortality_rate", self.subordinate_mortality_rate),
            ("subordinate_mortality_cap", self.subordinate_mortality_cap),
            ("subordinate_reproduction_rate", self.subordinate_reproduction_rate),
            ("subordinate_reproduction_cap", self.subordinate_reproduction_cap),
            ("coexistence_pressure", self.coexistence_pressure),
        ] {
            c.non_negative(name, v)?;
        }
        c.unit("refuge", self.refuge)?;
        c.ordered(
            "mortality_modifier",
            self.min_mortality_modifier,
            self.max_mortality_modifier,
        )?;
        c.ordered(
            "reproduction_modifier",
            self.min_reproduction_modifier,
            self.max_reproduction_modifier,
        )?;
        Ok(())
    }
}

// ── Fitness ────────────────────────────────────────────────────────

/// Rank-normalize to `[0, 1]`. Ties share their average rank; a single
/// value maps to 0.5. Non-finite values rank as 0.
pub fn rank_normalize(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0.5];
    }
    let clean: Vec<f64> = values
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| clean[a].total_cmp(&clean[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && clean[order[j + 1]] == clean[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg / (n - 1) as f64;
        }
        i = j + 1;
    }
    ranks
}

/// Group-relative fitness of each member, in input order.
pub fn fitness_scores(config: &FitnessConfig, members: &[&Species], turn: TurnId) -> Vec<f64> {
    let population: Vec<f64> = members
        .iter()
        .map(|s| (1.0 + s.population as f64).ln())
        .collect();
    let survival: Vec<f64> = members
        .iter()
        .map(|s| 1.0 - s.last_death_rate.unwrap_or(config.assumed_death_rate))
        .collect();
    let reproduction: Vec<f64> = members
        .iter()
        .map(|s| s.traits.reproduction_rate / s.traits.body_length_cm.max(1e-3))
        .collect();
    let stability: Vec<f64> = members
        .iter()
        .map(|s| 1.0 - config.trophic_penalty_per_level * (s.trophic_level - 1.0))
        .collect();

    let factors = [
        (rank_normalize(&population), config.population_curve, config.population_weight),
        (rank_normalize(&survival), config.survival_curve, config.survival_weight),
        (
            rank_normalize(&reproduction),
            config.reproduction_curve,
            config.reproduction_weight,
        ),
        (rank_normalize(&stability), config.trophic_curve, config.trophic_weight),
    ];

    members
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let raw: f64 = factors
                .iter()
                .map(|(ranks, curve, weight)| weight * curve.apply(ranks[i]))
                .sum();
            let age = turn.since(s.created_turn).saturating_sub(config.age_grace_turns);
            let decay = (config.age_decay_rate * age as f64).min(config.age_decay_max);
            (raw * (1.0 - decay)).clamp(0.0, 1.0)
        })
        .collect()
}

// ── Pair resolution ────────────────────────────────────────────────

/// One side of a pair as seen by [`resolve_pair`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contender {
    /// Species id.
    pub id: SpeciesId,
    /// Group-relative fitness.
    pub fitness: f64,
}

/// Resolve one pair. `None` when the niches are differentiated enough
/// that the pair does not interact.
///
/// The result depends only on the unordered pair: swapping `a` and `b`
/// swaps `first` and `second` and nothing else.
pub fn resolve_pair(
    config: &CompetitionConfig,
    a: Contender,
    b: Contender,
    overlap: f64,
    kinship: Option<u32>,
) -> Option<PairOutcome> {
    let overlap = if overlap.is_finite() {
        overlap.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let kin = kinship.is_some_and(|d| d <= config.kin_max_distance);
    let regime = if overlap > config.intense_overlap || (kin && overlap >= config.interaction_overlap)
    {
        CompetitionRegime::Intense
    } else if overlap >= config.interaction_overlap {
        CompetitionRegime::Mild
    } else {
        return None;
    };

    let effect = |c: Contender, status, mortality_delta, reproduction_delta| PairEffect {
        species: c.id,
        status,
        mortality_delta,
        reproduction_delta,
    };

    let (first, second) = match regime {
        CompetitionRegime::Intense => {
            let intensity = if kin { config.kin_intensity } else { 1.0 };
            let gap = (a.fitness - b.fitness).abs();
            if gap < config.contested_threshold || gap == 0.0 {
                let penalty = config.contested_penalty * overlap * intensity;
                (
                    effect(a, CompetitionStatus::Contested, penalty, 0.0),
                    effect(b, CompetitionStatus::Contested, penalty, 0.0),
                )
            } else {
                let strength = gap * overlap * intensity;
                let dom_mort = (config.dominant_mortality_rate * strength)
                    .min(config.dominant_mortality_cap);
                let dom_repro = (config.dominant_reproduction_rate * strength)
                    .min(config.dominant_reproduction_cap);
                let sub_mort = (config.subordinate_mortality_rate * strength)
                    .min(config.subordinate_mortality_cap)
                    * (1.0 - config.refuge * (1.0 - overlap));
                let sub_repro = (config.subordinate_reproduction_rate * strength)
                    .min(config.subordinate_reproduction_cap);
                let winner = |c| effect(c, CompetitionStatus::Dominant, -dom_mort, dom_repro);
                let loser = |c| effect(c, CompetitionStatus::Subordinate, sub_mort, -sub_repro);
                if a.fitness > b.fitness {
                    (winner(a), loser(b))
                } else {
                    (loser(a), winner(b))
                }
            }
        }
        CompetitionRegime::Mild => {
            let base = config.coexistence_pressure * overlap;
            let total = a.fitness + b.fitness;
            // Each side carries the other's share of total fitness.
            let (share_a, share_b) = if total > 0.0 {
                (b.fitness / total, a.fitness / total)
            } else {
                (0.5, 0.5)
            };
            (
                effect(a, CompetitionStatus::Coexisting, base * share_a, 0.0),
                effect(b, CompetitionStatus::Coexisting, base * share_b, 0.0),
            )
        }
    };

    Some(PairOutcome {
        regime,
        overlap,
        kinship,
        first,
        second,
    })
}

// ── Calculator ─────────────────────────────────────────────────────

#[derive(Default)]
struct Accumulator {
    mortality: f64,
    reproduction: f64,
    strongest: Option<(f64, CompetitionStatus, SpeciesId)>,
}

impl Accumulator {
    fn absorb(&mut self, effect: &PairEffect, competitor: SpeciesId) {
        self.mortality += effect.mortality_delta;
        self.reproduction += effect.reproduction_delta;
        let magnitude = effect.mortality_delta.abs();
        if self.strongest.is_none_or(|(m, ..)| magnitude > m) {
            self.strongest = Some((magnitude, effect.status, competitor));
        }
    }
}

/// Stateless competition resolver.
#[derive(Clone, Debug, Default)]
pub struct KinCompetitionCalculator {
    config: CompetitionConfig,
}

impl KinCompetitionCalculator {
    /// Calculator with the given tuning.
    pub fn new(config: CompetitionConfig) -> Self {
        Self { config }
    }

    /// Active tuning.
    pub fn config(&self) -> &CompetitionConfig {
        &self.config
    }

    /// Kinship distance between two species under this configuration.
    pub fn kinship(&self, arena: &SpeciesArena, a: SpeciesId, b: SpeciesId) -> Option<u32> {
        arena.kinship_distance(a, b, self.config.max_kinship_depth)
    }

    /// Resolve competition for every living species.
    ///
    /// Every living species receives exactly one result; species alone in
    /// their trophic group get the neutral result with fitness 0.5.
    pub fn compute(
        &self,
        arena: &SpeciesArena,
        niche: &NicheSnapshot,
        turn: TurnId,
    ) -> CompetitionTable {
        let mut groups: IndexMap<i64, Vec<&Species>> = IndexMap::new();
        for sp in arena.alive() {
            groups
                .entry(trophic_group_key(sp.trophic_level))
                .or_default()
                .push(sp);
        }
        groups.sort_keys();

        let mut table = CompetitionTable::new();
        for (key, members) in &groups {
            let fitness = fitness_scores(&self.config.fitness, members, turn);
            let mut acc: Vec<Accumulator> = members.iter().map(|_| Accumulator::default()).collect();

            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    let (a, b) = (members[i], members[j]);
                    let overlap = niche.pair_overlap(a, b);
                    let kinship = self.kinship(arena, a.id, b.id);
                    let outcome = resolve_pair(
                        &self.config,
                        Contender {
                            id: a.id,
                            fitness: fitness[i],
                        },
                        Contender {
                            id: b.id,
                            fitness: fitness[j],
                        },
                        overlap,
                        kinship,
                    );
                    if let Some(pair) = outcome {
                        acc[i].absorb(&pair.first, b.id);
                        acc[j].absorb(&pair.second, a.id);
                        table.push_pair(pair);
                    }
                }
            }

            for ((sp, score), acc) in members.iter().zip(&fitness).zip(acc) {
                let (status, main_competitor) = match acc.strongest {
                    Some((_, status, other)) => (status, Some(other)),
                    None => (CompetitionStatus::Coexisting, None),
                };
                table.insert(
                    sp.id,
                    CompetitionResult {
                        mortality_modifier: acc.mortality.clamp(
                            self.config.min_mortality_modifier,
                            self.config.max_mortality_modifier,
                        ),
                        reproduction_modifier: acc.reproduction.clamp(
                            self.config.min_reproduction_modifier,
                            self.config.max_reproduction_modifier,
                        ),
                        status,
                        main_competitor,
                        fitness: *score,
                    },
                );
            }
            debug!(group = key, members = members.len(), "competition group resolved");
        }
        debug!(
            species = table.len(),
            pairs = table.pairs().len(),
            "competition computed"
        );
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylon_core::{Habitat, NicheMetrics, SpeciesStatus};
    use phylon_test_utils::SpeciesBuilder;
    use proptest::prelude::*;

    fn c(id: u32, fitness: f64) -> Contender {
        Contender {
            id: SpeciesId(id),
            fitness,
        }
    }

    #[test]
    fn amplification_fixed_points_and_direction() {
        let curve = Amplification {
            stretch: 1.5,
            compress: 2.0,
        };
        assert_eq!(curve.apply(0.0), 0.0);
        assert_eq!(curve.apply(0.5), 0.5);
        assert_eq!(curve.apply(1.0), 1.0);
        assert!(curve.apply(0.75) > 0.75);
        assert!(curve.apply(0.25) < 0.25);
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(rank_normalize(&[7.0]), vec![0.5]);
        assert_eq!(rank_normalize(&[3.0, 1.0, 2.0]), vec![1.0, 0.0, 0.5]);
        assert_eq!(rank_normalize(&[1.0, 1.0, 5.0]), vec![0.25, 0.25, 1.0]);
        assert_eq!(rank_normalize(&[f64::NAN, 1.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn fitter_species_scores_higher() {
        let strong = SpeciesBuilder::new("S").population(100_000).death_rate(0.05).build();
        let weak = SpeciesBuilder::new("W").population(100).death_rate(0.6).build();
        let scores = fitness_scores(&FitnessConfig::default(), &[&strong, &weak], TurnId(0));
        assert!(scores[0] > scores[1]);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn age_decay_penalizes_old_lineages() {
        let young = SpeciesBuilder::new("Y").created(TurnId(90)).build();
        let old = SpeciesBuilder::new("O").created(TurnId(0)).build();
        let scores = fitness_scores(&FitnessConfig::default(), &[&young, &old], TurnId(100));
        // Identical traits: only the 80-turn excess age differs (decay capped at 0.15).
        assert!((scores[1] - scores[0] * 0.85).abs() < 1e-12);
    }

    #[test]
    fn regimes_by_overlap_and_kinship() {
        let cfg = CompetitionConfig::default();
        let a = c(0, 0.9);
        let b = c(1, 0.2);
        assert_eq!(
            resolve_pair(&cfg, a, b, 0.7, None).map(|p| p.regime),
            Some(CompetitionRegime::Intense)
        );
        assert_eq!(
            resolve_pair(&cfg, a, b, 0.45, Some(2)).map(|p| p.regime),
            Some(CompetitionRegime::Intense)
        );
        assert_eq!(
            resolve_pair(&cfg, a, b, 0.45, Some(6)).map(|p| p.regime),
            Some(CompetitionRegime::Mild)
        );
        assert_eq!(
            resolve_pair(&cfg, a, b, 0.45, None).map(|p| p.regime),
            Some(CompetitionRegime::Mild)
        );
        assert!(resolve_pair(&cfg, a, b, 0.2, Some(1)).is_none());
    }

    #[test]
    fn intense_winner_and_loser_magnitudes() {
        let cfg = CompetitionConfig::default();
        let p = resolve_pair(&cfg, c(0, 0.8), c(1, 0.4), 0.8, None).unwrap();
        // strength = 0.4 * 0.8 = 0.32
        assert_eq!(p.first.status, CompetitionStatus::Dominant);
        assert!((p.first.mortality_delta + 0.08).abs() < 1e-12);
        assert!((p.first.reproduction_delta - 0.0384).abs() < 1e-12);
        assert_eq!(p.second.status, CompetitionStatus::Subordinate);
        // min(0.25, 0.192) * (1 - 0.5 * 0.2)
        assert!((p.second.mortality_delta - 0.192 * 0.9).abs() < 1e-12);
        assert!((p.second.reproduction_delta + 0.064).abs() < 1e-12);
    }

    #[test]
    fn close_contest_penalizes_both() {
        let cfg = CompetitionConfig::default();
        let p = resolve_pair(&cfg, c(0, 0.50), c(1, 0.55), 0.7, Some(2)).unwrap();
        let expected = 0.05 * 0.7 * 1.3;
        for side in [p.first, p.second] {
            assert_eq!(side.status, CompetitionStatus::Contested);
            assert!((side.mortality_delta - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn mild_split_loads_the_weaker_side() {
        let cfg = CompetitionConfig::default();
        let p = resolve_pair(&cfg, c(0, 0.75), c(1, 0.25), 0.5, None).unwrap();
        assert!((p.first.mortality_delta - 0.02 * 0.25).abs() < 1e-12);
        assert!((p.second.mortality_delta - 0.02 * 0.75).abs() < 1e-12);
        assert_eq!(p.first.status, CompetitionStatus::Coexisting);

        let zero = resolve_pair(&cfg, c(0, 0.0), c(1, 0.0), 0.5, None).unwrap();
        assert_eq!(zero.first.mortality_delta, zero.second.mortality_delta);
    }

    #[test]
    fn every_living_species_gets_one_result() {
        let mut arena = SpeciesArena::new();
        let root = arena
            .push(SpeciesBuilder::new("R").level(2.0).population(5_000).build(), None)
            .unwrap();
        let kid = arena
            .push(SpeciesBuilder::new("R1").level(2.0).population(500).build(), Some(root))
            .unwrap();
        let lone = arena
            .push(SpeciesBuilder::new("Z").level(3.0).population(50).build(), None)
            .unwrap();
        let mut dead = SpeciesBuilder::new("D").level(2.0).build();
        dead.status = SpeciesStatus::Extinct;
        let dead = arena.push(dead, None).unwrap();

        let mut niche = NicheSnapshot::new();
        niche.set_pair_overlap(root, kid, 0.9);
        let table = KinCompetitionCalculator::default().compute(&arena, &niche, TurnId(1));

        assert_eq!(table.len(), 3);
        assert!(table.get(dead).is_none());
        assert_eq!(table.result_for(lone), CompetitionResult::neutral());
        let r = table.result_for(root);
        let k = table.result_for(kid);
        assert_eq!(r.status, CompetitionStatus::Dominant);
        assert_eq!(r.main_competitor, Some(kid));
        assert_eq!(k.status, CompetitionStatus::Subordinate);
        assert!(k.mortality_modifier > 0.0 && r.mortality_modifier < 0.0);
        assert_eq!(table.pairs().len(), 1);
        assert_eq!(table.pairs()[0].kinship, Some(1));
    }

    #[test]
    fn modifiers_are_clamped_after_summing() {
        let mut arena = SpeciesArena::new();
        let mut niche = NicheSnapshot::new();
        let weak = arena
            .push(SpeciesBuilder::new("W").population(10).death_rate(0.9).build(), None)
            .unwrap();
        niche.insert(weak, NicheMetrics { overlap: 1.0, saturation: 1.0 });
        for i in 0..6 {
            let id = arena
                .push(
                    SpeciesBuilder::new(&format!("S{i}"))
                        .population(1_000_000)
                        .death_rate(0.05)
                        .habitat(Habitat::Marine)
                        .build(),
                    None,
                )
                .unwrap();
            niche.insert(id, NicheMetrics { overlap: 1.0, saturation: 1.0 });
        }
        let table = KinCompetitionCalculator::default().compute(&arena, &niche, TurnId(0));
        let w = table.result_for(weak);
        assert!(w.mortality_modifier <= 0.35 + 1e-12);
        assert!(w.reproduction_modifier >= -0.2 - 1e-12);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(CompetitionConfig::default().validate().is_ok());
        let bad = CompetitionConfig {
            interaction_overlap: 0.7,
            ..CompetitionConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    proptest! {
        #[test]
        fn swapping_a_pair_swaps_labels_only(
            fa in 0.0f64..=1.0,
            fb in 0.0f64..=1.0,
            overlap in 0.0f64..=1.0,
            kinship in prop::option::of(0u32..8),
        ) {
            let cfg = CompetitionConfig::default();
            let ab = resolve_pair(&cfg, c(0, fa), c(1, fb), overlap, kinship);
            let ba = resolve_pair(&cfg, c(1, fb), c(0, fa), overlap, kinship);
            prop_assert_eq!(ab.is_some(), ba.is_some());
            if let (Some(ab), Some(ba)) = (ab, ba) {
                prop_assert_eq!(ab.regime, ba.regime);
                prop_assert_eq!(ab.first, ba.second);
                prop_assert_eq!(ab.second, ba.first);
            }
        }

        #[test]
        fn fitness_stays_in_unit_interval(
            pops in prop::collection::vec(0u64..10_000_000, 1..8),
            turn in 0u64..500,
        ) {
            let members: Vec<Species> = pops
                .iter()
                .enumerate()
                .map(|(i, &p)| SpeciesBuilder::new(&format!("S{i}")).population(p).build())
                .collect();
            let refs: Vec<&Species> = members.iter().collect();
            for s in fitness_scores(&FitnessConfig::default(), &refs, TurnId(turn)) {
                prop_assert!((0.0..=1.0).contains(&s));
            }
        }
    }
}
