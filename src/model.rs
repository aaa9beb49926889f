//! Formulates the configuration-selection integer program.
//!
//! The three formulations are assembled from the same [`Contribution`]s and differ only in
//! which ones are applied and how deployment counts are encoded:
//!
//! - the base model selects one configuration and exposes its counts as integer variables;
//! - the binary model replaces the integer counts by unary (thermometer) bit strings;
//! - the consistency model adds movement bounds between consecutive periods.

use itertools::Itertools;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::ModelError,
    evaluate::CoverageTable,
    generate::{Configuration, FleetParams},
    problem::ZoneGraph,
};

pub mod contrib;
pub mod program;
pub mod unary;

pub use contrib::Contribution;
use program::{IntegerProgram, LinearExpr, VarId};

/// How the per-zone deployment counts of the selected configuration are represented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum CountEncoding {
    /// One integer variable in `0..=A` per zone and period
    Integer,
    /// `min(A, max_frequency)` ordered binary variables per zone and period
    Unary { max_frequency: Option<u32> },
}

/// How far the deployment may change between consecutive periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum MovementRule {
    /// No zone's count changes by more than `max_shift`
    PerZone { max_shift: u32 },
    /// Ambulances travel at most one edge per period, and at most `max_moves` move in total
    Network { max_moves: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FairnessObjective {
    /// Minimise the difference between the best and worst covered zone.
    /// Indifferent between uniformly good and uniformly poor plans.
    MinimiseGap,
    /// Maximise the coverage of the worst covered zone
    #[default]
    MaximiseMinimum,
    /// Maximise the coverage summed over all zones
    MaximiseTotal,
}

/// Which contributions make up a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub counts: CountEncoding,
    pub movement: Option<MovementRule>,
    pub objective: FairnessObjective,
    /// Whether period 0 may only use base stations
    pub base_constrained: bool,
    /// The minimum number of ambulances at each base in period 0
    pub min_per_base: u32,
}
impl ModelSpec {
    /// Direct selection with integer deployment counts
    pub fn base() -> Self {
        Self {
            counts: CountEncoding::Integer,
            movement: None,
            objective: FairnessObjective::default(),
            base_constrained: true,
            min_per_base: 0,
        }
    }

    /// Direct selection with unary deployment counts, `None` meaning as wide as the fleet
    pub fn binary(max_frequency: Option<u32>) -> Self {
        Self { counts: CountEncoding::Unary { max_frequency }, ..Self::base() }
    }

    /// The base model plus movement bounds; only period 0 is restricted to bases
    pub fn consistency(rule: MovementRule) -> Self {
        Self { movement: Some(rule), ..Self::base() }
    }

    pub fn with_counts(self, counts: CountEncoding) -> Self {
        Self { counts, ..self }
    }

    pub fn with_objective(self, objective: FairnessObjective) -> Self {
        Self { objective, ..self }
    }

    /// Copies the base-station restriction of a fleet
    pub fn with_fleet(self, fleet: &FleetParams) -> Self {
        Self { base_constrained: fleet.base_constrained, min_per_base: fleet.effective_min_per_base(), ..self }
    }

    pub fn label(&self) -> &'static str {
        match (self.movement, self.counts) {
            (Some(_), _) => "consistency",
            (None, CountEncoding::Unary { .. }) => "binary",
            (None, CountEncoding::Integer) => "base",
        }
    }

    /// The contributions this model is assembled from, in application order
    pub fn contributions(&self) -> Vec<Box<dyn Contribution>> {
        let mut parts: Vec<Box<dyn Contribution>> = vec![
            Box::new(contrib::Selection),
            Box::new(contrib::DeploymentCounts { encoding: self.counts }),
        ];
        if self.base_constrained {
            parts.push(Box::new(contrib::BaseOrigin { min_per_base: self.min_per_base }));
        }
        if let Some(rule) = self.movement {
            parts.push(Box::new(contrib::Movement { rule }));
        }
        parts.push(Box::new(contrib::Coverage));
        parts.push(Box::new(contrib::Fairness { objective: self.objective }));
        parts
    }
}

/// Everything a model is built from. Borrowed read-only for the whole build.
#[derive(Debug, Clone, Copy)]
pub struct ModelInputs<'a> {
    pub graph: &'a ZoneGraph,
    pub ambulances: u32,
    pub configurations: &'a [Configuration],
    pub coverage: &'a [CoverageTable],
}
impl<'a> ModelInputs<'a> {
    pub fn zones(&self) -> usize {
        self.graph.zone_count()
    }

    pub fn periods(&self) -> usize {
        self.configurations.first().map_or(0, |c| c.periods())
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.configurations.is_empty() {
            return Err(ModelError::NoConfigurations);
        }
        if self.coverage.len() != self.configurations.len() {
            return Err(ModelError::CoverageMismatch {
                configurations: self.configurations.len(),
                coverage: self.coverage.len(),
            });
        }
        let expected = [self.zones(), self.periods()];
        for (index, (configuration, table)) in self.configurations.iter().zip(self.coverage).enumerate() {
            for found in [configuration.counts().shape(), table.scores().shape()] {
                if found != expected {
                    return Err(ModelError::ShapeMismatch { index, expected, found: [found[0], found[1]] });
                }
            }
        }
        Ok(())
    }
}

/// Variables holding the deployment count of each zone and period
#[derive(Debug, Clone, PartialEq)]
pub enum CountVariables {
    /// Indexed `[zone, period]`
    Integer(Array2<VarId>),
    /// Indexed `[zone, period, bit]`
    Unary(Array3<VarId>),
}

/// Ambulances moving from `from` to `to` between `period` and `period + 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flow {
    pub from: usize,
    pub to: usize,
    pub period: usize,
    pub var: VarId,
}

/// Where each kind of variable lives in the program
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLayout {
    /// One indicator per configuration
    pub selection: Vec<VarId>,
    pub counts: CountVariables,
    pub flows: Vec<Flow>,
    /// Coverage of each zone over the horizon
    pub coverage: Vec<VarId>,
    pub coverage_high: Option<VarId>,
    pub coverage_low: Option<VarId>,
}
impl VariableLayout {
    /// The deployment count of a zone in a period, in terms of the count variables
    pub fn count_expr(&self, zone: usize, period: usize) -> LinearExpr {
        count_expr(&self.counts, zone, period)
    }
}

fn count_expr(counts: &CountVariables, zone: usize, period: usize) -> LinearExpr {
    match counts {
        CountVariables::Integer(x) => LinearExpr::from(x[[zone, period]]),
        CountVariables::Unary(bits) => bits.slice(ndarray::s![zone, period, ..]).iter().map(|&v| (v, 1.0)).collect(),
    }
}

/// Accumulates contributions into a program
pub struct ModelBuilder<'a> {
    pub(crate) inputs: ModelInputs<'a>,
    pub(crate) program: IntegerProgram,
    pub(crate) selection: Vec<VarId>,
    pub(crate) counts: Option<CountVariables>,
    pub(crate) flows: Vec<Flow>,
    pub(crate) coverage: Vec<VarId>,
    pub(crate) coverage_high: Option<VarId>,
    pub(crate) coverage_low: Option<VarId>,
}
impl<'a> ModelBuilder<'a> {
    fn new(inputs: ModelInputs<'a>) -> Self {
        Self {
            inputs,
            program: IntegerProgram::new(),
            selection: vec![],
            counts: None,
            flows: vec![],
            coverage: vec![],
            coverage_high: None,
            coverage_low: None,
        }
    }

    /// `Σ_c count_c[zone, period] · select[c]`: the count implied by the selection
    pub(crate) fn selected_count(&self, zone: usize, period: usize) -> LinearExpr {
        self.inputs.configurations.iter().zip(&self.selection)
            .map(|(c, &v)| (v, c.count(zone, period) as f64))
            .collect()
    }

    pub(crate) fn count_expr(&self, zone: usize, period: usize) -> LinearExpr {
        // UNWRAP: deployment counts are always contributed before anything reading them
        count_expr(self.counts.as_ref().unwrap(), zone, period)
    }

    fn finish(self, spec: ModelSpec) -> FormulatedModel {
        let (zones, periods, ambulances) = (self.inputs.zones(), self.inputs.periods(), self.inputs.ambulances);
        FormulatedModel {
            spec,
            program: self.program,
            layout: VariableLayout {
                selection: self.selection,
                // UNWRAP: every spec contributes deployment counts
                counts: self.counts.unwrap(),
                flows: self.flows,
                coverage: self.coverage,
                coverage_high: self.coverage_high,
                coverage_low: self.coverage_low,
            },
            zones,
            periods,
            ambulances,
        }
    }
}

/// A built integer program together with the handles needed to read its solution
#[derive(Debug, Clone)]
pub struct FormulatedModel {
    spec: ModelSpec,
    program: IntegerProgram,
    layout: VariableLayout,
    zones: usize,
    periods: usize,
    ambulances: u32,
}
impl FormulatedModel {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn program(&self) -> &IntegerProgram {
        &self.program
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn zones(&self) -> usize {
        self.zones
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    pub fn ambulances(&self) -> u32 {
        self.ambulances
    }

    pub fn label(&self) -> &'static str {
        self.spec.label()
    }
}

/// Builds the program described by `spec` over the given candidates
pub fn build_model(spec: &ModelSpec, inputs: ModelInputs<'_>) -> Result<FormulatedModel, ModelError> {
    inputs.validate()?;
    if let CountEncoding::Unary { max_frequency: Some(0) } = spec.counts {
        return Err(ModelError::ZeroFrequencyBound);
    }
    let mut builder = ModelBuilder::new(inputs);
    for contribution in spec.contributions() {
        contribution.apply(&mut builder);
        debug!(
            contribution = contribution.name(),
            variables = builder.program.num_variables(),
            constraints = builder.program.num_constraints(),
            "applied contribution"
        );
    }
    let model = builder.finish(*spec);
    let (binary, integer, continuous) = model.program.variable_census();
    debug!(
        model = model.label(),
        configurations = inputs.configurations.len(),
        binary, integer, continuous,
        constraints = model.program.num_constraints(),
        "built model"
    );
    Ok(model)
}

/// Shorthand for the zone × period grid, in row-major order
pub(crate) fn grid(zones: usize, periods: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..zones).cartesian_product(0..periods)
}
