//! Hands formulated models to a MIP backend and classifies the outcome.
//!
//! Backends implement [`MipBackend`]; the [`SolverAdapter`] applies the run's limits,
//! re-checks whatever assignment comes back against the program, and reports one of the
//! four [`SolveStatus`] values. Infeasibility and time limits are statuses, not errors.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::SolverError,
    model::{
        program::{IntegerProgram, VarId, FEASIBILITY_TOLERANCE},
        FormulatedModel,
    },
};

#[cfg(feature = "highs")]
pub mod highs;
pub mod microlp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal
    Optimal,
    /// A feasible assignment was found, but the limits ran out before optimality was proven
    Feasible,
    /// Proven infeasible
    Infeasible,
    /// The limits ran out before any feasible assignment was found
    NoSolution,
}
impl SolveStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// Resource limits for one solve
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolveLimits {
    pub time_limit: Option<Duration>,
    /// Relative optimality gap at which the search may stop
    pub mip_gap: Option<f64>,
}

/// What a backend observed, before any checking
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome {
    /// An optimal assignment, one value per program variable
    Optimal(Vec<f64>),
    /// The limits were reached, with the best incumbent if there is one
    TimeLimited(Option<Vec<f64>>),
    Infeasible,
}

/// A mixed-integer programming backend
pub trait MipBackend {
    fn name(&self) -> &'static str;
    fn solve(&self, program: &IntegerProgram, limits: &SolveLimits) -> Result<BackendOutcome, SolverError>;
}
impl<T: MipBackend + ?Sized> MipBackend for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve(&self, program: &IntegerProgram, limits: &SolveLimits) -> Result<BackendOutcome, SolverError> {
        (**self).solve(program, limits)
    }
}

/// The backends that can be selected by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pure Rust, no time limit support
    #[default]
    Microlp,
    /// Requires the `highs` feature
    Highs,
}

pub fn make_backend(kind: BackendKind) -> Result<Box<dyn MipBackend + Send + Sync>, SolverError> {
    match kind {
        BackendKind::Microlp => Ok(Box::new(microlp::MicrolpBackend)),
        #[cfg(feature = "highs")]
        BackendKind::Highs => Ok(Box::new(highs::HighsBackend)),
        #[cfg(not(feature = "highs"))]
        BackendKind::Highs => Err(SolverError::Backend {
            backend: "highs",
            message: "this build does not include the `highs` feature".into(),
        }),
    }
}

/// The checked result of one solve
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: SolveStatus,
    /// Objective value of the assignment, when there is one
    pub objective: Option<f64>,
    /// One value per program variable, present exactly when the status has a solution
    pub assignment: Option<Vec<f64>>,
    pub solve_time: Duration,
}
impl Solution {
    fn without_assignment(status: SolveStatus, solve_time: Duration) -> Self {
        Self { status, objective: None, assignment: None, solve_time }
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.assignment.as_ref().map(|a| a[var.index()])
    }
}

/// Solves models with one backend under fixed limits
#[derive(Debug, Clone)]
pub struct SolverAdapter<B> {
    backend: B,
    limits: SolveLimits,
}
impl<B: MipBackend> SolverAdapter<B> {
    pub fn new(backend: B, limits: SolveLimits) -> Self {
        Self { backend, limits }
    }

    pub fn limits(&self) -> SolveLimits {
        self.limits
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn solve(&self, model: &FormulatedModel) -> Result<Solution, SolverError> {
        let program = model.program();
        let backend = self.backend.name();
        let start = Instant::now();
        if let Some(row) = program.trivially_violated() {
            info!(model = model.label(), constraint = %row.name, "model is infeasible without solving");
            return Ok(Solution::without_assignment(SolveStatus::Infeasible, start.elapsed()));
        }

        let outcome = self.backend.solve(program, &self.limits)?;
        let solve_time = start.elapsed();
        let (status, values) = match outcome {
            BackendOutcome::Infeasible => (SolveStatus::Infeasible, None),
            BackendOutcome::TimeLimited(None) => (SolveStatus::NoSolution, None),
            BackendOutcome::TimeLimited(Some(values)) => match program.first_violation(&values, FEASIBILITY_TOLERANCE) {
                None => (SolveStatus::Feasible, Some(values)),
                Some(violation) => {
                    warn!(backend, %violation, "discarding infeasible incumbent");
                    (SolveStatus::NoSolution, None)
                }
            },
            BackendOutcome::Optimal(values) => {
                if values.len() != program.num_variables() {
                    return Err(SolverError::AssignmentLength {
                        backend, expected: program.num_variables(), found: values.len(),
                    });
                }
                if let Some(violation) = program.first_violation(&values, FEASIBILITY_TOLERANCE) {
                    return Err(SolverError::Backend {
                        backend, message: format!("optimal assignment is infeasible: {violation}"),
                    });
                }
                (SolveStatus::Optimal, Some(values))
            }
        };

        let objective = values.as_deref().map(|v| program.objective_value(v));
        info!(
            model = model.label(),
            backend,
            status = ?status,
            objective = ?objective,
            seconds = solve_time.as_secs_f64(),
            "solved"
        );
        Ok(Solution { status, objective, assignment: values, solve_time })
    }
}
