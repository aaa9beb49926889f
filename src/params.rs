//! Run parameters, read from a TOML file. Every field has a default, so an empty file
//! describes the standard size sweep.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::ParseError,
    evaluate::CoverageMetric,
    generate::{FleetParams, Sampling},
    model::{FairnessObjective, MovementRule},
    solver::{BackendKind, SolveLimits},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Base model solves over geometrically growing candidate sets
    #[default]
    SizeSweep,
    /// Base against binary model over candidate set sizes and frequency bounds
    Compare,
    /// A single consistency model solve
    Consistency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    #[default]
    PerZone,
    Network,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationParams {
    /// Smallest candidate set of a size sweep
    pub min: usize,
    /// Largest candidate set of a size sweep, ten times `min` if absent
    pub max: Option<usize>,
    pub steps: usize,
    /// Candidate set sizes compared between formulations
    pub sizes: Vec<usize>,
    /// Candidate set size of a consistency run
    pub count: usize,
    pub sampling: Sampling,
}
impl Default for ConfigurationParams {
    fn default() -> Self {
        Self {
            min: 100,
            max: None,
            steps: 8,
            sizes: vec![100, 500, 1000, 2000, 5000],
            count: 10_000,
            sampling: Sampling::default(),
        }
    }
}
impl ConfigurationParams {
    pub fn max(&self) -> usize {
        self.max.unwrap_or(self.min * 10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub objective: FairnessObjective,
    /// Unary expansion width of the consistency model
    pub max_frequency: u32,
    /// Unary expansion widths compared against the base model
    pub frequency_bounds: Vec<u32>,
    pub max_movement: u32,
    pub movement_rule: MovementKind,
    /// Whether the consistency model uses unary deployment counts
    pub binarize: bool,
}
impl Default for ModelParams {
    fn default() -> Self {
        Self {
            objective: FairnessObjective::default(),
            max_frequency: 3,
            frequency_bounds: vec![3, 5, 10],
            max_movement: 10,
            movement_rule: MovementKind::default(),
            binarize: false,
        }
    }
}
impl ModelParams {
    pub fn movement(&self) -> MovementRule {
        match self.movement_rule {
            MovementKind::PerZone => MovementRule::PerZone { max_shift: self.max_movement },
            MovementKind::Network => MovementRule::Network { max_moves: self.max_movement },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub backend: BackendKind,
    pub time_limit_secs: Option<u64>,
    pub mip_gap: Option<f64>,
}
impl Default for SolverParams {
    fn default() -> Self {
        Self { backend: BackendKind::default(), time_limit_secs: Some(600), mip_gap: Some(0.01) }
    }
}
impl SolverParams {
    pub fn limits(&self) -> SolveLimits {
        SolveLimits { time_limit: self.time_limit_secs.map(Duration::from_secs), mip_gap: self.mip_gap }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    pub mode: RunMode,
    /// Path of the instance description
    pub instance: PathBuf,
    pub fleet: FleetParams,
    pub configurations: ConfigurationParams,
    pub coverage: CoverageMetric,
    pub model: ModelParams,
    pub solver: SolverParams,
}
impl Default for RunParams {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            instance: PathBuf::from("instances/five_zones.toml"),
            fleet: FleetParams::default(),
            configurations: ConfigurationParams::default(),
            coverage: CoverageMetric::default(),
            model: ModelParams::default(),
            solver: SolverParams::default(),
        }
    }
}
impl RunParams {
    /// Rejects parameters no run could use
    pub fn validate(&self) -> Result<(), ParseError> {
        let invalid = |message: &str| Err(ParseError::InvalidParams(message.into()));
        let c = &self.configurations;
        if self.fleet.ambulances == 0 {
            return invalid("the fleet needs at least one ambulance");
        }
        if self.fleet.periods == 0 {
            return invalid("the horizon needs at least one period");
        }
        if c.min == 0 || c.max() < c.min || c.steps == 0 {
            return Err(ParseError::InvalidParams(format!(
                "configuration range {}..={} in {} steps is empty", c.min, c.max(), c.steps
            )));
        }
        if c.count == 0 || c.sizes.is_empty() || c.sizes.contains(&0) {
            return invalid("configuration counts must be positive");
        }
        if self.model.max_frequency == 0 || self.model.frequency_bounds.contains(&0) {
            return invalid("frequency bounds must be at least 1");
        }
        if let Some(gap) = self.solver.mip_gap {
            if !(0.0..1.0).contains(&gap) {
                return invalid("the MIP gap must lie in [0, 1)");
            }
        }
        match self.coverage {
            CoverageMetric::Radius { radius } if !(radius >= 0.0) => invalid("the coverage radius must be non-negative"),
            CoverageMetric::ResponseTime { worst_case } if !(worst_case >= 0.0) => {
                invalid("the worst-case response time must be non-negative")
            }
            _ => Ok(()),
        }
    }
}
