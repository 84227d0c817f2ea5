//! Reporting tiers for mortality results.
//!
//! Tiers do not change any number; they tell downstream consumers which
//! species deserve detailed attention this turn.

use serde::{Deserialize, Serialize};

use phylon_core::{MortalityReport, SpeciesArena, SpeciesId, Tier};

use crate::params::{Check, ParameterError};
use crate::population::ExtinctionChecker;

/// Tuning for [`TierClassifier`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Death rate at or above which a species is critical.
    pub critical_death_rate: f64,
    /// Survivors below this multiple of the MVP make a species critical.
    pub critical_mvp_multiple: f64,
    /// How many of the remaining species, by population, are in focus.
    pub focus_count: usize,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            critical_death_rate: 0.5,
            critical_mvp_multiple: 2.0,
            focus_count: 8,
        }
    }
}

impl TierConfig {
    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let c = Check("tier");
        c.unit("critical_death_rate", self.critical_death_rate)?;
        c.non_negative("critical_mvp_multiple", self.critical_mvp_multiple)?;
        Ok(())
    }
}

/// Assigns a [`Tier`] to every result in a report.
#[derive(Clone, Debug, Default)]
pub struct TierClassifier {
    config: TierConfig,
}

impl TierClassifier {
    /// Classifier with the given tuning.
    pub fn new(config: TierConfig) -> Self {
        Self { config }
    }

    /// Active tuning.
    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Tier the results in place.
    ///
    /// Focus ties on population break toward the lower species id so the
    /// outcome does not depend on report order.
    pub fn classify(
        &self,
        report: &mut MortalityReport,
        arena: &SpeciesArena,
        checker: &ExtinctionChecker,
    ) {
        let cfg = &self.config;
        let mut candidates: Vec<(u64, SpeciesId, usize)> = Vec::new();
        for (index, result) in report.results_mut().iter_mut().enumerate() {
            let species = arena.get(result.species);
            let intervened = species.is_some_and(|sp| sp.intervention.is_active());
            let endangered = species.is_some_and(|sp| {
                let threshold =
                    checker.minimum_viable_population(sp) as f64 * cfg.critical_mvp_multiple;
                (result.survivors as f64) < threshold
            });
            if intervened || result.death_rate >= cfg.critical_death_rate || endangered {
                result.tier = Tier::Critical;
            } else {
                result.tier = Tier::Background;
                candidates.push((result.initial_population, result.species, index));
            }
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let results = report.results_mut();
        for &(_, _, index) in candidates.iter().take(cfg.focus_count) {
            results[index].tier = Tier::Focus;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylon_core::{Intervention, MortalityBreakdown, MortalityResult};
    use phylon_test_utils::SpeciesBuilder;

    fn result(id: u32, population: u64, death_rate: f64) -> MortalityResult {
        let deaths = (population as f64 * death_rate).floor() as u64;
        MortalityResult {
            species: SpeciesId(id),
            initial_population: population,
            deaths,
            survivors: population - deaths,
            death_rate,
            notes: Vec::new(),
            niche_overlap: 0.0,
            resource_pressure: 0.0,
            grazing_pressure: 0.0,
            predation_pressure: 0.0,
            tier: Tier::Background,
            breakdown: MortalityBreakdown::default(),
        }
    }

    fn arena(populations: &[u64]) -> SpeciesArena {
        let mut arena = SpeciesArena::new();
        for (i, &pop) in populations.iter().enumerate() {
            arena
                .push(
                    SpeciesBuilder::new(&format!("S{i}"))
                        .population(pop)
                        .length(50.0)
                        .build(),
                    None,
                )
                .unwrap();
        }
        arena
    }

    #[test]
    fn focus_takes_the_most_populous() {
        let pops = [5_000, 9_000, 7_000, 9_000];
        let arena = arena(&pops);
        let mut report = MortalityReport::new(
            pops.iter()
                .enumerate()
                .map(|(i, &p)| result(i as u32, p, 0.1))
                .collect(),
        );
        let classifier = TierClassifier::new(TierConfig {
            focus_count: 2,
            ..TierConfig::default()
        });
        classifier.classify(&mut report, &arena, &ExtinctionChecker::default());
        let tiers: Vec<Tier> = report.results().iter().map(|r| r.tier).collect();
        assert_eq!(
            tiers,
            vec![Tier::Background, Tier::Focus, Tier::Background, Tier::Focus]
        );
    }

    #[test]
    fn critical_conditions() {
        let mut arena = arena(&[10_000, 10_000, 150]);
        arena.get_mut(SpeciesId(0)).unwrap().intervention = Intervention {
            protected_turns: 2,
            suppressed_turns: 0,
        };
        let mut report = MortalityReport::new(vec![
            result(0, 10_000, 0.1),
            result(1, 10_000, 0.5),
            // 150 * 0.9 = 135 survivors < 2 * 100
            result(2, 150, 0.1),
        ]);
        TierClassifier::default().classify(&mut report, &arena, &ExtinctionChecker::default());
        assert_eq!(report.tier(Tier::Critical).count(), 3);
        assert_eq!(report.tier(Tier::Focus).count(), 0);
    }
}
