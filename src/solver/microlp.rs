//! The default backend: `good_lp` driving the pure-Rust `microlp` branch and bound.

use std::sync::Once;

use good_lp::{
    constraint, solvers::microlp::microlp, variable, Expression, ProblemVariables, ResolutionError,
    Solution as _, SolverModel, Variable,
};
use tracing::warn;

use super::{BackendOutcome, MipBackend, SolveLimits};
use crate::{
    error::SolverError,
    model::program::{Comparison, Direction, IntegerProgram, LinearExpr},
};

const NAME: &str = "microlp";

static LIMITS_IGNORED: Once = Once::new();

/// Solves to optimality. Time limits and gaps cannot be enforced and are only warned about.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrolpBackend;

impl MipBackend for MicrolpBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn solve(&self, program: &IntegerProgram, limits: &SolveLimits) -> Result<BackendOutcome, SolverError> {
        if limits.time_limit.is_some() || limits.mip_gap.is_some() {
            LIMITS_IGNORED.call_once(|| warn!(?limits, "microlp cannot enforce solve limits, solving to optimality"));
        }

        let mut vars = ProblemVariables::new();
        let columns: Vec<Variable> = program.variables().iter().map(|v| {
            let (lower, upper) = v.domain.bounds();
            let definition = variable().name(v.name.clone()).min(lower).max(upper);
            vars.add(if v.domain.is_integral() {definition.integer()} else {definition})
        }).collect();
        let expression = |e: &LinearExpr| {
            e.terms().iter().fold(Expression::from(e.constant_value()), |acc, &(var, c)| acc + c * columns[var.index()])
        };

        let objective = expression(&program.objective().expr);
        let mut model = match program.objective().direction {
            Direction::Minimise => vars.minimise(objective),
            Direction::Maximise => vars.maximise(objective),
        }.using(microlp);
        // Rows without variables were already checked by the caller
        for row in program.constraints().iter().filter(|c| !c.lhs.terms().is_empty()) {
            let lhs = expression(&row.lhs);
            let rhs = row.rhs;
            model = model.with(match row.cmp {
                Comparison::LessEq => constraint!(lhs <= rhs),
                Comparison::GreaterEq => constraint!(lhs >= rhs),
                Comparison::Equal => constraint!(lhs == rhs),
            });
        }

        match model.solve() {
            Ok(solution) => Ok(BackendOutcome::Optimal(columns.iter().map(|&v| solution.value(v)).collect())),
            Err(ResolutionError::Infeasible) => Ok(BackendOutcome::Infeasible),
            Err(ResolutionError::Unbounded) => Err(SolverError::Unbounded { backend: NAME }),
            Err(e) => Err(SolverError::Backend { backend: NAME, message: e.to_string() }),
        }
    }
}
