//! Biomass flow between trophic bands.
//!
//! Converts population and body weight into biomass per [`TrophicBand`],
//! then derives grazing pressure on producers, predation pressure on each
//! consumer band and a scarcity score for every consuming band.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use phylon_core::{Diagnostic, SpeciesArena, TrophicBand, TrophicInteractions};

use crate::params::{Check, ParameterError};

/// Tuning for [`TrophicInteractionCalculator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrophicConfig {
    /// Multiplier on primary-consumer biomass in the grazing ratio.
    pub grazing_coefficient: f64,
    /// Multiplier on predator biomass in the predation ratio.
    pub predation_coefficient: f64,
    /// Sustainable primary-consumer : producer biomass ratio.
    pub primary_ratio: f64,
    /// Sustainable secondary : primary biomass ratio.
    pub secondary_ratio: f64,
    /// Sustainable apex : secondary biomass ratio.
    pub apex_ratio: f64,
    /// Subtracted from the raw scarcity ratio before clipping.
    pub scarcity_bias: f64,
    /// Upper clip of scarcity; also the value used when prey is absent.
    pub max_scarcity: f64,
}

impl Default for TrophicConfig {
    fn default() -> Self {
        Self {
            grazing_coefficient: 10.0,
            predation_coefficient: 10.0,
            primary_ratio: 0.25,
            secondary_ratio: 0.15,
            apex_ratio: 0.05,
            scarcity_bias: 1.0,
            max_scarcity: 2.0,
        }
    }
}

impl TrophicConfig {
    /// Sustainable biomass ratio of a consuming band over its prey band.
    pub fn sustainable_ratio(&self, band: TrophicBand) -> Option<f64> {
        match band {
            TrophicBand::Producer => None,
            TrophicBand::Primary => Some(self.primary_ratio),
            TrophicBand::Secondary => Some(self.secondary_ratio),
            TrophicBand::Apex => Some(self.apex_ratio),
        }
    }

    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let c = Check("trophic");
        c.non_negative("grazing_coefficient", self.grazing_coefficient)?;
        c.non_negative("predation_coefficient", self.predation_coefficient)?;
        c.positive("primary_ratio", self.primary_ratio)?;
        c.positive("secondary_ratio", self.secondary_ratio)?;
        c.positive("apex_ratio", self.apex_ratio)?;
        c.finite("scarcity_bias", self.scarcity_bias)?;
        c.non_negative("max_scarcity", self.max_scarcity)?;
        Ok(())
    }
}

/// Stateless biomass-ratio calculator.
#[derive(Clone, Debug, Default)]
pub struct TrophicInteractionCalculator {
    config: TrophicConfig,
}

impl TrophicInteractionCalculator {
    /// Calculator with the given tuning.
    pub fn new(config: TrophicConfig) -> Self {
        Self { config }
    }

    /// Active tuning.
    pub fn config(&self) -> &TrophicConfig {
        &self.config
    }

    /// Compute this turn's trophic pressures from the living species.
    pub fn compute(&self, arena: &SpeciesArena) -> TrophicInteractions {
        let cfg = &self.config;
        let mut out = TrophicInteractions::default();

        out.biomass = band_biomass(arena, &mut out.diagnostics);
        let bio = |band: TrophicBand| out.biomass.get(&band).copied().unwrap_or(0.0);

        // Grazing: primary consumers against producers.
        let grazing = pressure_ratio(
            bio(TrophicBand::Primary) * cfg.grazing_coefficient,
            bio(TrophicBand::Producer),
            "grazing",
            &mut out.diagnostics,
        );

        // Predation: every band above against the band itself.
        let mut predation: IndexMap<TrophicBand, f64> = IndexMap::new();
        for band in [TrophicBand::Primary, TrophicBand::Secondary, TrophicBand::Apex] {
            let above: f64 = TrophicBand::ALL
                .iter()
                .filter(|&&b| b > band)
                .map(|&b| bio(b))
                .sum();
            let p = pressure_ratio(
                above * cfg.predation_coefficient,
                bio(band),
                "predation",
                &mut out.diagnostics,
            );
            predation.insert(band, p);
        }

        for band in [TrophicBand::Primary, TrophicBand::Secondary, TrophicBand::Apex] {
            let s = self.scarcity(band, bio(band), &out.biomass, &mut out.diagnostics);
            out.scarcity.insert(band, s);
        }

        for sp in arena.alive() {
            match sp.band() {
                TrophicBand::Producer => {
                    out.grazing.insert(sp.id, grazing);
                }
                band => {
                    let p = predation.get(&band).copied().unwrap_or(0.0);
                    out.predation.insert(sp.id, p);
                }
            }
        }

        debug!(
            grazing,
            producer_biomass = bio(TrophicBand::Producer),
            primary_biomass = bio(TrophicBand::Primary),
            diagnostics = out.diagnostics.len(),
            "trophic interactions computed"
        );
        out
    }

    fn scarcity(
        &self,
        band: TrophicBand,
        consumer: f64,
        biomass: &IndexMap<TrophicBand, f64>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> f64 {
        let cfg = &self.config;
        let (Some(prey_band), Some(ratio)) = (band.prey(), cfg.sustainable_ratio(band)) else {
            return 0.0;
        };
        if consumer <= 0.0 {
            return 0.0;
        }
        let prey = biomass.get(&prey_band).copied().unwrap_or(0.0);
        let capacity = ratio * prey;
        if capacity <= 0.0 {
            diagnostics.push(Diagnostic::new(
                format!("scarcity.{band:?}"),
                format!("no {prey_band:?} biomass under {consumer:.1} g of consumers; scarcity set to maximum"),
            ));
            return cfg.max_scarcity;
        }
        let raw = consumer / capacity - cfg.scarcity_bias;
        if raw.is_nan() {
            return cfg.max_scarcity;
        }
        raw.clamp(0.0, cfg.max_scarcity)
    }
}

/// Living biomass per band, every band present (zero when empty).
///
/// Species whose body weight is not a positive finite number contribute
/// nothing and are noted.
pub fn band_biomass(
    arena: &SpeciesArena,
    diagnostics: &mut Vec<Diagnostic>,
) -> IndexMap<TrophicBand, f64> {
    let mut biomass: IndexMap<TrophicBand, f64> =
        TrophicBand::ALL.iter().map(|&b| (b, 0.0)).collect();
    for sp in arena.alive() {
        let w = sp.traits.body_weight_g;
        if !(w.is_finite() && w > 0.0) && sp.population > 0 {
            diagnostics.push(Diagnostic::new(
                format!("{}.body_weight_g", sp.code),
                format!("body weight {w} ignored; species adds no biomass"),
            ));
        }
        if let Some(total) = biomass.get_mut(&sp.band()) {
            *total += sp.biomass_g();
        }
    }
    biomass
}

/// `clip(numerator / denominator, 0, 1)` without dividing by zero.
fn pressure_ratio(
    numerator: f64,
    denominator: f64,
    what: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> f64 {
    if numerator <= 0.0 || numerator.is_nan() {
        return 0.0;
    }
    if denominator <= 0.0 || denominator.is_nan() {
        diagnostics.push(Diagnostic::new(
            what,
            "consumers present without prey biomass; pressure set to 1",
        ));
        return 1.0;
    }
    (numerator / denominator).clamp(0.0, 1.0)
}
