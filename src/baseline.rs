//! Implements a direct enumeration over the candidate configurations to use as a
//! baseline for the integer programs.
//! Every formulation selects exactly one candidate, so scoring each feasible candidate
//! and keeping the best reproduces the ILP optimum without a solver.
//! Note that the network movement rule depends on the graph in a way a single
//! configuration cannot be checked against cheaply, so it is not supported here.

use ordered_float::OrderedFloat;

use crate::{
    evaluate::CoverageTable,
    generate::Configuration,
    model::{CountEncoding, FairnessObjective, ModelSpec, MovementRule},
    problem::ZoneGraph,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineChoice {
    pub index: usize,
    pub objective: f64,
}

/// The objective value of a selection with the given per-zone coverage
pub fn objective_value(objective: FairnessObjective, zone_coverage: &[f64]) -> f64 {
    let min = zone_coverage.iter().copied().fold(f64::INFINITY, f64::min);
    let max = zone_coverage.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    match objective {
        FairnessObjective::MinimiseGap => max - min,
        FairnessObjective::MaximiseMinimum => min,
        FairnessObjective::MaximiseTotal => zone_coverage.iter().sum(),
    }
}

/// Whether selecting `configuration` satisfies every constraint of `spec`
pub fn is_admissible(spec: &ModelSpec, graph: &ZoneGraph, ambulances: u32, configuration: &Configuration) -> bool {
    if spec.base_constrained && !configuration.starts_on_bases(graph, spec.min_per_base) {
        return false;
    }
    if let CountEncoding::Unary { max_frequency: Some(n) } = spec.counts {
        if configuration.counts().iter().any(|&c| c > n.min(ambulances)) {
            return false;
        }
    }
    match spec.movement {
        Some(MovementRule::PerZone { max_shift }) => configuration.max_shift() <= max_shift,
        _ => true,
    }
}

/// Scores every admissible candidate, returning the best.
/// `None` if there is none, or if `spec` uses the network movement rule.
pub fn best_by_enumeration(
    spec: &ModelSpec,
    graph: &ZoneGraph,
    ambulances: u32,
    configurations: &[Configuration],
    coverage: &[CoverageTable],
) -> Option<BaselineChoice> {
    if let Some(MovementRule::Network { .. }) = spec.movement {
        return None;
    }
    let scored = configurations.iter().zip(coverage).enumerate()
        .filter(|(_, (c, _))| is_admissible(spec, graph, ambulances, c))
        .map(|(index, (_, t))| BaselineChoice { index, objective: objective_value(spec.objective, &t.zone_totals()) });
    match spec.objective {
        FairnessObjective::MinimiseGap => scored.min_by_key(|c| OrderedFloat(c.objective)),
        FairnessObjective::MaximiseMinimum | FairnessObjective::MaximiseTotal => {
            scored.max_by_key(|c| OrderedFloat(c.objective))
        }
    }
}
