//! Simulation configuration, validation, and error types.
//!
//! [`SimulationConfig`] composes the per-model configs. Every field has a
//! default, so a JSON document only needs the values it overrides.
//! [`validate()`](SimulationConfig::validate) runs before any engine is
//! built; pipeline structure is checked separately by
//! [`TurnEngineBuilder::build`](crate::TurnEngineBuilder::build).

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use phylon_ecology::{
    CompetitionConfig, MortalityConfig, ParameterError, PopulationConfig, TierConfig,
    TrophicConfig,
};
use phylon_stage::PipelineError;

// ── ExternalConfig ─────────────────────────────────────────────────

/// Limits for [`ExternalCallRunner`](crate::ExternalCallRunner).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// Requests allowed in flight at once. Default: 4.
    pub max_in_flight: usize,
    /// Deadline for a whole batch, in milliseconds. Default: 2000.
    pub timeout_ms: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            timeout_ms: 2_000,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while loading or validating configuration, or while
/// building a turn engine.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Stage pipeline validation failed.
    Pipeline(PipelineError),
    /// A model parameter is out of range.
    InvalidParameter(ParameterError),
    /// The external-call limits are unusable.
    InvalidExternal {
        /// Which limit is wrong.
        reason: String,
    },
    /// The configuration document could not be parsed.
    Json {
        /// Parser message, with line and column.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline(e) => write!(f, "pipeline: {e}"),
            Self::InvalidParameter(e) => write!(f, "invalid parameter {e}"),
            Self::InvalidExternal { reason } => write!(f, "invalid external config: {reason}"),
            Self::Json { reason } => write!(f, "config parse error: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pipeline(e) => Some(e),
            Self::InvalidParameter(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for ConfigError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl From<ParameterError> for ConfigError {
    fn from(e: ParameterError) -> Self {
        Self::InvalidParameter(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            reason: e.to_string(),
        }
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Complete tuning for a simulation session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grazing, predation and scarcity.
    pub trophic: TrophicConfig,
    /// Fitness and pairwise competition.
    pub competition: CompetitionConfig,
    /// Death-rate model.
    pub mortality: MortalityConfig,
    /// Viability and extinction.
    pub population: PopulationConfig,
    /// Reporting tiers.
    pub tier: TierConfig,
    /// External-call limits.
    pub external: ExternalConfig,
}

impl SimulationConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every model config and the external limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trophic.validate()?;
        self.competition.validate()?;
        self.mortality.validate()?;
        self.population.validate()?;
        self.tier.validate()?;
        if self.external.max_in_flight == 0 {
            return Err(ConfigError::InvalidExternal {
                reason: "max_in_flight must be at least 1".into(),
            });
        }
        if self.external.timeout_ms == 0 {
            return Err(ConfigError::InvalidExternal {
                reason: "timeout_ms must be at least 1".into(),
            });
        }
        Ok(())
    }
}
