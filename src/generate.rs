//! Generates the candidate deployment configurations the integer program chooses from.
//!
//! Generation is lazy: [`ConfigurationGenerator::iter`] yields configurations one at a
//! time, and calling it again restarts the identical sequence. How many to take is left
//! to the caller, including the geometric prefix sizes used by size sweeps.

use itertools::Itertools;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{error::GenerationError, problem::ZoneGraph};

pub mod sampling;

pub use sampling::Sampling;

/// Fleet-wide parameters shared by generation and model building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetParams {
    /// The total number of ambulances, deployed in every period
    pub ambulances: u32,
    /// The number of periods in the planning horizon
    pub periods: usize,
    /// Whether period 0 may only use base stations
    pub base_constrained: bool,
    /// The minimum number of ambulances at every base in period 0.
    /// Only meaningful when `base_constrained` is set.
    pub min_per_base: u32,
}
impl Default for FleetParams {
    fn default() -> Self {
        Self { ambulances: 50, periods: 6, base_constrained: true, min_per_base: 0 }
    }
}
impl FleetParams {
    pub fn effective_min_per_base(&self) -> u32 {
        if self.base_constrained {self.min_per_base} else {0}
    }
}

/// One candidate full-horizon deployment: how many ambulances sit in each zone in
/// each period. Every period deploys the whole fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Configuration {
    counts: Array2<u32>,
}
impl Configuration {
    /// Wraps a `[zone, period]` count matrix, checking every period deploys exactly
    /// `ambulances`
    pub fn new(counts: Array2<u32>, ambulances: u32) -> Result<Self, GenerationError> {
        for (period, column) in counts.columns().into_iter().enumerate() {
            let found = column.sum();
            if found != ambulances {
                return Err(GenerationError::BudgetViolated { period, expected: ambulances, found });
            }
        }
        Ok(Self { counts })
    }

    pub fn count(&self, zone: usize, period: usize) -> u32 {
        self.counts[[zone, period]]
    }

    pub fn counts(&self) -> &Array2<u32> {
        &self.counts
    }

    pub fn zones(&self) -> usize {
        self.counts.nrows()
    }

    pub fn periods(&self) -> usize {
        self.counts.ncols()
    }

    /// Per-zone counts of a single period
    pub fn period(&self, period: usize) -> ArrayView1<'_, u32> {
        self.counts.column(period)
    }

    /// Whether all period-0 ambulances sit on bases, each holding at least `min_per_base`
    pub fn starts_on_bases(&self, graph: &ZoneGraph, min_per_base: u32) -> bool {
        (0..self.zones()).all(|z| {
            let c = self.counts[[z, 0]];
            if graph.is_base(z) {c >= min_per_base} else {c == 0}
        })
    }

    /// The largest per-zone change between consecutive periods
    pub fn max_shift(&self) -> u32 {
        (1..self.periods())
            .flat_map(|p| (0..self.zones()).map(move |z| (z, p)))
            .map(|(z, p)| self.counts[[z, p]].abs_diff(self.counts[[z, p - 1]]))
            .max()
            .unwrap_or(0)
    }
}

/// Produces configurations for one graph, fleet and sampling strategy
#[derive(Debug, Clone)]
pub struct ConfigurationGenerator<'a> {
    graph: &'a ZoneGraph,
    fleet: FleetParams,
    sampling: Sampling,
    origins: Vec<usize>,
}
impl<'a> ConfigurationGenerator<'a> {
    /// Fails with `EmptyConfigurationSet` when no configuration can satisfy the fleet
    /// parameters at all
    pub fn new(graph: &'a ZoneGraph, fleet: FleetParams, sampling: Sampling) -> Result<Self, GenerationError> {
        let empty = |reason: String| Err(GenerationError::EmptyConfigurationSet { reason });
        if graph.zone_count() == 0 {
            return empty("the instance has no zones".into());
        }
        if fleet.periods == 0 {
            return empty("the planning horizon has no periods".into());
        }
        let origins = if fleet.base_constrained {graph.bases()} else {(0..graph.zone_count()).collect_vec()};
        if origins.is_empty() {
            return empty("base-constrained deployment requested but the instance has no bases".into());
        }
        let required = fleet.effective_min_per_base() as u64 * origins.len() as u64;
        if fleet.base_constrained && required > fleet.ambulances as u64 {
            return empty(format!(
                "{} bases need at least {} ambulances each, but only {} are available",
                origins.len(), fleet.min_per_base, fleet.ambulances
            ));
        }
        Ok(Self { graph, fleet, sampling, origins })
    }

    pub fn fleet(&self) -> FleetParams {
        self.fleet
    }

    /// A fresh lazy sequence of distinct configurations
    pub fn iter(&self) -> sampling::Configurations {
        sampling::Configurations::new(
            self.sampling,
            self.graph.zone_count(),
            self.origins.clone(),
            self.fleet,
        )
    }

    /// The first `count` configurations of the sequence
    pub fn generate(&self, count: usize) -> Result<Vec<Configuration>, GenerationError> {
        let configurations = self.iter().take(count).collect_vec();
        if configurations.is_empty() && count > 0 {
            return Err(GenerationError::EmptyConfigurationSet {
                reason: format!("{:?} sampling produced no configuration", self.sampling),
            });
        }
        if configurations.len() < count {
            warn!(requested = count, produced = configurations.len(), "configuration space exhausted early");
        }
        info!(count = configurations.len(), sampling = ?self.sampling, "generated configurations");
        Ok(configurations)
    }

    /// Generates `max` configurations once and the geometric prefix sizes between
    /// `min` and `max`
    pub fn generate_log_spaced(&self, min: usize, max: usize, steps: usize) -> Result<ConfigurationPool, GenerationError> {
        let sizes = log_spaced_counts(min, max, steps)?;
        let configurations = self.generate(max)?;
        let available = configurations.len();
        let sizes = sizes.into_iter().map(|s| s.min(available)).dedup().collect_vec();
        Ok(ConfigurationPool { configurations, sizes })
    }
}

/// A generated candidate set, studied at increasing prefix sizes
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationPool {
    pub configurations: Vec<Configuration>,
    pub sizes: Vec<usize>,
}
impl ConfigurationPool {
    pub fn prefix(&self, size: usize) -> &[Configuration] {
        &self.configurations[..size.min(self.configurations.len())]
    }
}

/// Integer counts spaced geometrically from `min` to `max` inclusive, rounded down,
/// sorted and de-duplicated
pub fn log_spaced_counts(min: usize, max: usize, steps: usize) -> Result<Vec<usize>, GenerationError> {
    if min == 0 || min > max || steps == 0 {
        return Err(GenerationError::InvalidRange { min, max, steps });
    }
    if steps == 1 {
        return Ok(vec![min]);
    }
    let (lo, hi) = ((min as f64).log10(), (max as f64).log10());
    let counts = (0..steps).map(|i| {
        let exponent = lo + (hi - lo) * i as f64 / (steps - 1) as f64;
        // The epsilon keeps exact powers like 10^3 from flooring to 999
        ((10f64.powf(exponent) + 1e-9).floor() as usize).clamp(min, max)
    });
    Ok(counts.sorted().dedup().collect_vec())
}
