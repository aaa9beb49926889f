//! Batch drivers: the size sweep, the formulation comparison and the consistency run.
//!
//! A parameter set that fails to generate, build, solve or interpret is logged and
//! recorded as failed; the remaining parameter sets still run.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::Result,
    evaluate::{CoverageEvaluator, CoverageTable},
    generate::{Configuration, ConfigurationGenerator, Sampling},
    interpret::{interpret, AllocationReport},
    model::{build_model, CountEncoding, ModelInputs, ModelSpec, MovementRule},
    params::{RunMode, RunParams},
    problem::ZoneGraph,
    solver::{MipBackend, SolveStatus, SolverAdapter},
};

/// One row of a sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub label: &'static str,
    pub config_count: usize,
    /// Unary expansion width, for binary models
    pub max_frequency: Option<u32>,
    pub build_time: Option<Duration>,
    pub solve_time: Option<Duration>,
    pub num_variables: usize,
    pub num_constraints: usize,
    pub status: Option<SolveStatus>,
    pub objective: Option<f64>,
    /// Why the parameter set failed, if it did
    pub error: Option<String>,
}
impl RunRecord {
    fn failed(label: &'static str, config_count: usize, max_frequency: Option<u32>, error: String) -> Self {
        Self {
            label,
            config_count,
            max_frequency,
            build_time: None,
            solve_time: None,
            num_variables: 0,
            num_constraints: 0,
            status: None,
            objective: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// What a run produced
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Records(Vec<RunRecord>),
    Report(AllocationReport),
}

/// Runs the experiments described by one set of parameters against one instance
pub struct Experiment<'a, B> {
    graph: &'a ZoneGraph,
    params: &'a RunParams,
    solver: SolverAdapter<B>,
}
impl<'a, B: MipBackend> Experiment<'a, B> {
    pub fn new(graph: &'a ZoneGraph, params: &'a RunParams, backend: B) -> Self {
        Self { graph, params, solver: SolverAdapter::new(backend, params.solver.limits()) }
    }

    /// Runs whatever the parameters' mode asks for
    pub fn run(&self) -> Result<RunOutcome> {
        match self.params.mode {
            RunMode::SizeSweep => self.size_sweep().map(RunOutcome::Records),
            RunMode::Compare => Ok(RunOutcome::Records(self.compare_formulations())),
            RunMode::Consistency => self.consistency_run().map(RunOutcome::Report),
        }
    }

    fn spec(&self, spec: ModelSpec) -> ModelSpec {
        spec.with_fleet(&self.params.fleet).with_objective(self.params.model.objective)
    }

    fn generator(&self, sampling: Sampling) -> Result<ConfigurationGenerator<'a>> {
        Ok(ConfigurationGenerator::new(self.graph, self.params.fleet, sampling)?)
    }

    fn evaluate(&self, configurations: &[Configuration]) -> Vec<CoverageTable> {
        CoverageEvaluator::new(self.graph, self.params.coverage).evaluate_all(configurations)
    }

    /// The first `count` candidates and their coverage
    pub fn candidates(&self, count: usize) -> Result<(Vec<Configuration>, Vec<CoverageTable>)> {
        self.candidates_with(self.params.configurations.sampling, count)
    }

    fn candidates_with(&self, sampling: Sampling, count: usize) -> Result<(Vec<Configuration>, Vec<CoverageTable>)> {
        let configurations = self.generator(sampling)?.generate(count)?;
        let coverage = self.evaluate(&configurations);
        Ok((configurations, coverage))
    }

    /// Builds, solves and interprets one model
    pub fn solve(&self, spec: &ModelSpec, configurations: &[Configuration], coverage: &[CoverageTable])
        -> Result<(RunRecord, AllocationReport)>
    {
        let start = Instant::now();
        let inputs = ModelInputs { graph: self.graph, ambulances: self.params.fleet.ambulances, configurations, coverage };
        let model = build_model(spec, inputs)?;
        let build_time = start.elapsed();
        let solution = self.solver.solve(&model)?;
        let report = interpret(&model, configurations, coverage, &solution)?;
        let record = RunRecord {
            label: spec.label(),
            config_count: configurations.len(),
            max_frequency: self.expansion_width(spec),
            build_time: Some(build_time),
            solve_time: Some(solution.solve_time),
            num_variables: report.num_variables,
            num_constraints: report.num_constraints,
            status: Some(report.status),
            objective: report.objective,
            error: None,
        };
        Ok((record, report))
    }

    fn expansion_width(&self, spec: &ModelSpec) -> Option<u32> {
        match spec.counts {
            CountEncoding::Unary { max_frequency } => Some(max_frequency.unwrap_or(self.params.fleet.ambulances)),
            CountEncoding::Integer => None,
        }
    }

    fn record(&self, spec: &ModelSpec, configurations: &[Configuration], coverage: &[CoverageTable]) -> RunRecord {
        match self.solve(spec, configurations, coverage) {
            Ok((record, _)) => record,
            Err(e) => {
                warn!(model = spec.label(), configurations = configurations.len(), error = %e, "parameter set failed");
                RunRecord::failed(spec.label(), configurations.len(), self.expansion_width(spec), e.to_string())
            }
        }
    }

    /// Solves the base model on geometrically growing prefixes of one candidate pool
    pub fn size_sweep(&self) -> Result<Vec<RunRecord>> {
        let c = &self.params.configurations;
        let pool = self.generator(c.sampling)?.generate_log_spaced(c.min, c.max(), c.steps)?;
        let coverage = self.evaluate(&pool.configurations);
        let spec = self.spec(ModelSpec::base());
        let records: Vec<_> = pool.sizes.iter().map(|&size| {
            info!(configurations = size, "size sweep step");
            let configurations = pool.prefix(size);
            self.record(&spec, configurations, &coverage[..configurations.len()])
        }).collect();
        Ok(records)
    }

    /// Solves the base model and the binary model at every frequency bound, for every
    /// candidate set size
    pub fn compare_formulations(&self) -> Vec<RunRecord> {
        let bounds = &self.params.model.frequency_bounds;
        let mut records = vec![];
        for &size in &self.params.configurations.sizes {
            info!(configurations = size, "comparing formulations");
            let (configurations, coverage) = match self.candidates(size) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(configurations = size, error = %e, "could not generate candidates");
                    records.push(RunRecord::failed("base", size, None, e.to_string()));
                    records.extend(bounds.iter().map(|&n| RunRecord::failed("binary", size, Some(n), e.to_string())));
                    continue;
                }
            };
            records.push(self.record(&self.spec(ModelSpec::base()), &configurations, &coverage));
            for &bound in bounds {
                records.push(self.record(&self.spec(ModelSpec::binary(Some(bound))), &configurations, &coverage));
            }
        }
        records
    }

    /// Solves the consistency model once, returning the full report
    pub fn consistency_run(&self) -> Result<AllocationReport> {
        let model = &self.params.model;
        let mut spec = self.spec(ModelSpec::consistency(model.movement()));
        if model.binarize {
            spec = spec.with_counts(CountEncoding::Unary { max_frequency: Some(model.max_frequency) });
        }
        let sampling = self.params.configurations.sampling;
        let bounded = movement_bounded(sampling, model.movement());
        if bounded != sampling {
            warn!(?sampling, ?bounded, "sampler ignores the movement bound, drawing drifting candidates instead");
        }
        let (configurations, coverage) = self.candidates_with(bounded, self.params.configurations.count)?;
        let (_, report) = self.solve(&spec, &configurations, &coverage)?;
        Ok(report)
    }
}

/// A sampler whose candidates never move more ambulances between periods than `rule`
/// allows for any one zone. Drift samplers within the bound are kept as they are.
pub fn movement_bounded(sampling: Sampling, rule: MovementRule) -> Sampling {
    let bound = match rule {
        MovementRule::PerZone { max_shift } => max_shift,
        MovementRule::Network { max_moves } => max_moves,
    };
    match sampling {
        Sampling::Drift { max_shift, .. } if max_shift <= bound => sampling,
        Sampling::Drift { seed, .. } | Sampling::Random { seed } => Sampling::Drift { seed, max_shift: bound },
        Sampling::Exhaustive => Sampling::Drift { seed: 0, max_shift: bound },
    }
}
