//! Turns a solver assignment back into an allocation plan.
//!
//! Counts are read from the model's count variables rather than copied from the selected
//! configuration, and then compared against it: a mismatch means the formulation or the
//! solver is broken, and is reported as an error instead of producing a plan.

use std::time::Duration;

use itertools::Itertools;
use ndarray::Array2;
use serde::Serialize;
use tracing::error;

use crate::{
    error::InterpretError,
    evaluate::CoverageTable,
    generate::Configuration,
    model::{grid, program::FEASIBILITY_TOLERANCE, unary, CountVariables, FormulatedModel},
    solver::{Solution, SolveStatus},
};

/// The realised deployment and its coverage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPlan {
    /// Index of the selected configuration
    pub selected: usize,
    /// Ambulances per `[zone, period]`
    pub counts: Array2<u32>,
    /// Coverage score per `[zone, period]`
    pub coverage: Array2<f64>,
    /// Coverage per zone, summed over the horizon
    pub zone_coverage: Vec<f64>,
    pub fairness_gap: f64,
    pub minimum_coverage: f64,
    pub total_coverage: f64,
}
impl AllocationPlan {
    /// The number of periods in which a zone has any coverage
    pub fn covered_periods(&self, zone: usize) -> usize {
        self.coverage.row(zone).iter().filter(|&&s| s > 0.0).count()
    }

    pub fn zones(&self) -> usize {
        self.counts.nrows()
    }

    pub fn periods(&self) -> usize {
        self.counts.ncols()
    }
}

/// Everything downstream reporting needs about one solve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    pub label: &'static str,
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub solve_time: Duration,
    pub num_variables: usize,
    pub num_constraints: usize,
    /// Present exactly when the status has a solution
    pub plan: Option<AllocationPlan>,
}

pub fn interpret(
    model: &FormulatedModel,
    configurations: &[Configuration],
    coverage: &[CoverageTable],
    solution: &Solution,
) -> Result<AllocationReport, InterpretError> {
    let layout = model.layout();
    let mut report = AllocationReport {
        label: model.label(),
        status: solution.status,
        objective: solution.objective,
        solve_time: solution.solve_time,
        num_variables: model.program().num_variables(),
        num_constraints: model.program().num_constraints(),
        plan: None,
    };
    let Some(values) = solution.assignment.as_deref() else {
        return Ok(report);
    };
    for found in [configurations.len(), coverage.len()] {
        if found != layout.selection.len() {
            return Err(InterpretError::CandidateMismatch { expected: layout.selection.len(), found });
        }
    }

    let chosen = layout.selection.iter().positions(|v| values[v.index()] > 0.5).collect_vec();
    let &[selected] = chosen.as_slice() else {
        return Err(InterpretError::SelectionInconsistency(chosen.len()));
    };

    let counts = decode_counts(&layout.counts, values, model.zones(), model.periods())?;
    let expected = configurations[selected].counts();
    for (z, p) in grid(model.zones(), model.periods()) {
        let (decoded, expected) = (counts[[z, p]], expected[[z, p]]);
        if decoded == expected {
            continue;
        }
        return Err(match layout.counts {
            CountVariables::Unary(_) => binarization_inconsistency(z, p, format!(
                "bits decode to {decoded}, but configuration {selected} deploys {expected}"
            )),
            CountVariables::Integer(_) => InterpretError::CountMismatch { zone: z, period: p, decoded, expected },
        });
    }

    let table = &coverage[selected];
    let zone_coverage = table.zone_totals();
    let (minimum_coverage, maximum) = zone_coverage.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));
    report.plan = Some(AllocationPlan {
        selected,
        counts,
        coverage: table.scores().clone(),
        fairness_gap: maximum - minimum_coverage,
        minimum_coverage,
        total_coverage: zone_coverage.iter().sum(),
        zone_coverage,
    });
    Ok(report)
}

fn binarization_inconsistency(zone: usize, period: usize, detail: String) -> InterpretError {
    error!(zone, period, %detail, "binarization inconsistency");
    InterpretError::BinarizationInconsistency { zone, period, detail }
}

fn decode_counts(counts: &CountVariables, values: &[f64], zones: usize, periods: usize) -> Result<Array2<u32>, InterpretError> {
    let mut decoded = Array2::zeros((zones, periods));
    for (z, p) in grid(zones, periods) {
        decoded[[z, p]] = match counts {
            CountVariables::Integer(x) => {
                let value = values[x[[z, p]].index()];
                if value < -FEASIBILITY_TOLERANCE || (value - value.round()).abs() > FEASIBILITY_TOLERANCE {
                    return Err(InterpretError::NonIntegralCount { zone: z, period: p, value });
                }
                value.round() as u32
            }
            CountVariables::Unary(bits) => {
                let mut thermometer = vec![];
                for (k, var) in bits.slice(ndarray::s![z, p, ..]).iter().enumerate() {
                    let value = values[var.index()];
                    if value.abs() > FEASIBILITY_TOLERANCE && (value - 1.0).abs() > FEASIBILITY_TOLERANCE {
                        return Err(binarization_inconsistency(z, p, format!("bit {k} has value {value}")));
                    }
                    thermometer.push(value > 0.5);
                }
                match unary::collapse(&thermometer) {
                    Some(count) => count,
                    None => {
                        // UNWRAP: collapse only fails on a disordered bit string
                        let k = unary::first_disorder(&thermometer).unwrap();
                        return Err(binarization_inconsistency(z, p, format!("bit {k} is set after an unset bit")));
                    }
                }
            }
        };
    }
    Ok(decoded)
}
