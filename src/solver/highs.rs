//! The HiGHS backend, which honours time limits and optimality gaps

use highs::{Col, HighsModelStatus, RowProblem, Sense};

use super::{BackendOutcome, MipBackend, SolveLimits};
use crate::{
    error::SolverError,
    model::program::{Comparison, Direction, IntegerProgram},
};

const NAME: &str = "highs";

#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend;

impl MipBackend for HighsBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn solve(&self, program: &IntegerProgram, limits: &SolveLimits) -> Result<BackendOutcome, SolverError> {
        let mut costs = vec![0.0; program.num_variables()];
        for &(var, c) in program.objective().expr.terms() {
            costs[var.index()] += c;
        }

        let mut problem = RowProblem::new();
        let columns: Vec<Col> = program.variables().iter().zip(&costs).map(|(v, &cost)| {
            let (lower, upper) = v.domain.bounds();
            problem.add_column_with_integrality(cost, lower..=upper, v.domain.is_integral())
        }).collect();
        for row in program.constraints().iter().filter(|c| !c.lhs.terms().is_empty()) {
            let terms: Vec<(Col, f64)> = row.lhs.terms().iter().map(|&(var, c)| (columns[var.index()], c)).collect();
            let rhs = row.rhs - row.lhs.constant_value();
            match row.cmp {
                Comparison::LessEq => {problem.add_row(..=rhs, terms);}
                Comparison::GreaterEq => {problem.add_row(rhs.., terms);}
                Comparison::Equal => {problem.add_row(rhs..=rhs, terms);}
            }
        }

        let sense = match program.objective().direction {
            Direction::Minimise => Sense::Minimise,
            Direction::Maximise => Sense::Maximise,
        };
        let mut model = problem.optimise(sense);
        model.make_quiet();
        if let Some(limit) = limits.time_limit {
            model.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(gap) = limits.mip_gap {
            model.set_option("mip_rel_gap", gap);
        }
        let solved = model.try_solve()
            .map_err(|status| SolverError::Backend { backend: NAME, message: format!("{status:?}") })?;

        let values = || solved.get_solution().columns().to_vec();
        match solved.status() {
            HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => Ok(BackendOutcome::Optimal(values())),
            HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => Ok(BackendOutcome::Infeasible),
            HighsModelStatus::Unbounded => Err(SolverError::Unbounded { backend: NAME }),
            HighsModelStatus::ReachedTimeLimit => {
                Ok(BackendOutcome::TimeLimited(incumbent(solved.objective_value(), values(), columns.len())))
            }
            other => Err(SolverError::Backend { backend: NAME, message: format!("unexpected status {other:?}") }),
        }
    }
}

/// HiGHS fills the column values even when the MIP search found nothing; only a finite
/// objective value marks a real incumbent
fn incumbent(objective: f64, values: Vec<f64>, columns: usize) -> Option<Vec<f64>> {
    (objective.is_finite() && values.len() == columns).then_some(values)
}
