use std::{collections::HashSet, fs, time::Duration};

use itertools::Itertools;
use ndarray::{array, Array2};

use crate::{
    baseline::{best_by_enumeration, objective_value},
    error::{Error, GenerationError, InstanceError, InterpretError, ModelError, SolverError},
    evaluate::{shortest_paths, CoverageEvaluator, CoverageMetric, CoverageTable},
    generate::{log_spaced_counts, Configuration, ConfigurationGenerator, FleetParams, Sampling},
    interpret::interpret,
    model::{
        build_model, program::IntegerProgram, CountVariables, FairnessObjective, FormulatedModel, ModelInputs,
        ModelSpec, MovementRule,
    },
    params::{MovementKind, RunMode, RunParams},
    parse::{parse_instance_description, parse_params, save_instance},
    problem::{EdgeDescription, InstanceDescription, ZoneDescription, ZoneGraph},
    solver::{microlp::MicrolpBackend, BackendOutcome, MipBackend, SolveLimits, SolveStatus, Solution, SolverAdapter},
    sweep::{movement_bounded, Experiment},
};

/// `n` zones on a line, one unit apart, with the given bases
fn line_instance(n: usize, bases: &[usize]) -> InstanceDescription {
    InstanceDescription {
        distances: None,
        zones: (0..n).map(|i| ZoneDescription {
            name: format!("z{i}"), x: Some(i as f64), y: Some(0.0), base: bases.contains(&i),
        }).collect(),
        edges: (1..n).map(|i| EdgeDescription { from: format!("z{}", i - 1), to: format!("z{i}"), weight: None }).collect(),
    }
}

fn line_graph(n: usize, bases: &[usize]) -> ZoneGraph {
    ZoneGraph::new(line_instance(n, bases)).unwrap()
}

fn fleet(ambulances: u32, periods: usize, min_per_base: u32) -> FleetParams {
    FleetParams { ambulances, periods, base_constrained: true, min_per_base }
}

fn candidates(graph: &ZoneGraph, fleet: FleetParams, sampling: Sampling, count: usize) -> (Vec<Configuration>, Vec<CoverageTable>) {
    let configurations = ConfigurationGenerator::new(graph, fleet, sampling).unwrap().generate(count).unwrap();
    let coverage = CoverageEvaluator::new(graph, CoverageMetric::Neighbourhood).evaluate_all(&configurations);
    (configurations, coverage)
}

fn build(graph: &ZoneGraph, spec: &ModelSpec, ambulances: u32, configurations: &[Configuration], coverage: &[CoverageTable]) -> FormulatedModel {
    build_model(spec, ModelInputs { graph, ambulances, configurations, coverage }).unwrap()
}

fn solve(model: &FormulatedModel) -> Solution {
    SolverAdapter::new(MicrolpBackend, SolveLimits::default()).solve(model).unwrap()
}

/// Replays a fixed outcome, for the statuses a real backend rarely produces on demand
struct ScriptedBackend(BackendOutcome);
impl MipBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn solve(&self, _: &IntegerProgram, _: &SolveLimits) -> Result<BackendOutcome, SolverError> {
        Ok(self.0.clone())
    }
}

/// Tests saving and loading capabilities, ensuring that
/// instance data is consistently (de)serialised.
#[test]
fn test_instance_serde() {
    let mut description = line_instance(4, &[0, 3]);
    description.edges[1].weight = Some(2.5);
    save_instance("__test_instance.toml", &description).unwrap();
    let description2 = parse_instance_description("__test_instance.toml").unwrap();
    assert_eq!(description, description2, "Ensure instance data (de)serialises consistently");
    fs::remove_file("__test_instance.toml").unwrap();
}

#[test]
fn test_graph_validation() {
    let graph = line_graph(5, &[0, 2]);
    assert_eq!(graph.bases(), vec![0, 2]);
    assert_eq!(graph.neighbours(1), &[0, 2]);
    assert_eq!(graph.distance(0, 4), 4.0, "Ensure distances are shortest paths along the line");
    assert_eq!(graph.index_of("z3"), Some(3));

    let mut duplicate = line_instance(3, &[0]);
    duplicate.zones[2].name = "z0".into();
    assert_eq!(ZoneGraph::new(duplicate), Err(InstanceError::DuplicateZone("z0".into())));

    let mut unknown = line_instance(3, &[0]);
    unknown.edges[0].to = "nowhere".into();
    assert_eq!(ZoneGraph::new(unknown), Err(InstanceError::UnknownZone("nowhere".into())));

    let mut no_position = line_instance(3, &[0]);
    no_position.zones[1].x = None;
    assert!(matches!(ZoneGraph::new(no_position), Err(InstanceError::MissingCoordinates { .. })));

    assert_eq!(ZoneGraph::new(InstanceDescription::default()), Err(InstanceError::NoZones));
}

#[test]
fn test_shortest_paths() {
    // z3 is isolated, and z0 - z1 costs nothing to cross
    let distances = shortest_paths(4, &[(0, 1, 0.0), (1, 2, 2.0), (0, 2, 5.0)]);
    assert_eq!(distances[[0, 1]], 0.0, "Ensure zero-weight edges are traversed for free");
    assert_eq!(distances[[0, 2]], 2.0, "Ensure the cheaper two-edge route wins");
    assert_eq!(distances[[2, 0]], 2.0);
    assert_eq!(distances[[3, 3]], 0.0);
    assert!(distances[[0, 3]].is_infinite() && distances[[3, 1]].is_infinite(), "Ensure unreachable pairs stay infinite");

    let mut zero_weight = line_instance(4, &[0]);
    zero_weight.edges[0].weight = Some(0.0);
    let graph = ZoneGraph::new(zero_weight).unwrap();
    assert_eq!(graph.distance(0, 1), 0.0);
    assert_eq!(graph.distance(0, 3), 2.0);
}

#[test]
fn test_distance_matrix_validation() {
    let with_matrix = |rows: Vec<Vec<f64>>| ZoneGraph::new(InstanceDescription { distances: Some(rows), ..line_instance(2, &[0]) });

    let graph = with_matrix(vec![vec![0.0, 3.0], vec![3.0, 0.0]]).unwrap();
    assert_eq!(graph.distance(0, 1), 3.0, "Ensure a given matrix overrides the edges");
    assert!(with_matrix(vec![vec![0.0, f64::INFINITY], vec![f64::INFINITY, 0.0]]).is_ok(), "Ensure infinity marks unreachable pairs");

    assert_eq!(
        with_matrix(vec![vec![0.0, 1.0], vec![-1.0, 0.0]]),
        Err(InstanceError::InvalidDistance { from: "z1".into(), to: "z0".into(), distance: -1.0 })
    );
    assert!(matches!(
        with_matrix(vec![vec![0.0, f64::NAN], vec![1.0, 0.0]]),
        Err(InstanceError::InvalidDistance { ref from, ref to, .. }) if from == "z0" && to == "z1"
    ));
    assert!(matches!(with_matrix(vec![vec![0.0, 1.0]]), Err(InstanceError::DistanceShape { expected: 2, rows: 1, .. })));
}

#[test]
fn test_coverage_metrics() {
    // z5 has no edges, so nothing ever reaches it
    let mut description = line_instance(5, &[0]);
    description.zones.push(ZoneDescription { name: "z5".into(), x: Some(10.0), y: Some(0.0), base: false });
    let graph = ZoneGraph::new(description).unwrap();
    let configuration = Configuration::new(array![[1], [0], [0], [0], [0], [0]], 1).unwrap();
    let scores = |metric| CoverageEvaluator::new(&graph, metric).evaluate(&configuration).scores().column(0).to_vec();

    assert_eq!(scores(CoverageMetric::Neighbourhood), vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(scores(CoverageMetric::Radius { radius: 2.0 }), vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    assert_eq!(
        scores(CoverageMetric::ResponseTime { worst_case: 3.0 }),
        vec![3.0, 2.0, 1.0, 0.0, 0.0, 0.0],
        "Ensure unreachable zones get the worst-case score instead of failing"
    );
}

#[test]
fn test_coverage_is_deterministic_and_ordered() {
    let graph = line_graph(5, &[0, 2]);
    let (configurations, coverage) = candidates(&graph, fleet(3, 2, 0), Sampling::Random { seed: 11 }, 20);
    let evaluator = CoverageEvaluator::new(&graph, CoverageMetric::Neighbourhood);
    for (configuration, table) in configurations.iter().zip(&coverage) {
        assert_eq!(&evaluator.evaluate(configuration), table);
    }
}

#[test]
fn test_every_sampler_respects_budget_and_bases() {
    let graph = line_graph(5, &[0, 2]);
    let fleet = fleet(6, 3, 1);
    for sampling in [Sampling::Exhaustive, Sampling::Random { seed: 7 }, Sampling::Drift { seed: 3, max_shift: 2 }] {
        let configurations = ConfigurationGenerator::new(&graph, fleet, sampling).unwrap().generate(60).unwrap();
        assert_eq!(configurations.len(), 60);
        let distinct: HashSet<_> = configurations.iter().collect();
        assert_eq!(distinct.len(), configurations.len(), "Ensure {sampling:?} never repeats a configuration");
        for c in &configurations {
            for p in 0..c.periods() {
                assert_eq!(c.period(p).sum(), 6, "Ensure every period deploys the whole fleet");
            }
            assert!(c.starts_on_bases(&graph, 1), "Ensure period 0 sits on bases");
            if let Sampling::Drift { max_shift, .. } = sampling {
                assert!(c.max_shift() <= max_shift);
            }
        }
    }
}

#[test]
fn test_exhaustive_sequence_is_complete_and_restartable() {
    let graph = line_graph(5, &[0, 2]);
    let generator = ConfigurationGenerator::new(&graph, fleet(2, 2, 0), Sampling::Exhaustive).unwrap();
    // 3 ways to split 2 over the bases, times 15 ways to split 2 over 5 zones
    assert_eq!(generator.iter().count(), 45);
    assert!(generator.iter().eq(generator.iter()), "Ensure the sequence restarts identically");
    let random = ConfigurationGenerator::new(&graph, fleet(2, 2, 0), Sampling::Random { seed: 1 }).unwrap();
    assert_eq!(random.iter().take(10).collect_vec(), random.iter().take(10).collect_vec());
}

#[test]
fn test_too_few_ambulances_for_bases() {
    let graph = line_graph(10, &(0..10).collect_vec());
    let result = ConfigurationGenerator::new(&graph, fleet(5, 2, 1), Sampling::default());
    assert!(matches!(result, Err(GenerationError::EmptyConfigurationSet { .. })));
}

#[test]
fn test_log_spaced_counts() {
    assert_eq!(log_spaced_counts(100, 1000, 4).unwrap(), vec![100, 215, 464, 1000]);
    assert_eq!(log_spaced_counts(5, 6, 8).unwrap(), vec![5, 6], "Ensure rounded counts are de-duplicated");
    assert_eq!(log_spaced_counts(7, 700, 1).unwrap(), vec![7]);
    assert_eq!(log_spaced_counts(0, 10, 3), Err(GenerationError::InvalidRange { min: 0, max: 10, steps: 3 }));
    assert!(log_spaced_counts(10, 5, 3).is_err());
}

#[test]
fn test_model_sizes() {
    let graph = line_graph(5, &[0, 2]);
    let (configurations, coverage) = candidates(&graph, fleet(3, 2, 0), Sampling::Random { seed: 2 }, 8);
    let base = build(&graph, &ModelSpec::base(), 3, &configurations, &coverage);
    // select, x[z,p], y[z] plus the worst-zone bound
    assert_eq!(base.program().variable_census(), (8, 10, 6));
    // select_one, count links, 3 non-base origins, coverage links, one bound per zone
    assert_eq!(base.program().num_constraints(), 1 + 10 + 3 + 5 + 5);

    let binary = build(&graph, &ModelSpec::binary(Some(2)), 3, &configurations, &coverage);
    assert_eq!(binary.program().variable_census(), (8 + 10 * 2, 0, 6));
    assert_eq!(binary.program().num_constraints(), 1 + 10 + 10 + 3 + 5 + 5, "Ensure one ordering row per adjacent bit pair");

    let gap = build(&graph, &ModelSpec::base().with_objective(FairnessObjective::MinimiseGap), 3, &configurations, &coverage);
    assert_eq!(gap.program().variable_census(), (8, 10, 7), "Ensure the gap adds an upper bound");
    assert_eq!(gap.program().num_constraints(), 1 + 10 + 3 + 5 + 10);
    assert_eq!(base.label(), "base");
    assert_eq!(binary.label(), "binary");
}

#[test]
fn test_model_input_errors() {
    let graph = line_graph(5, &[0, 2]);
    let (configurations, coverage) = candidates(&graph, fleet(3, 2, 0), Sampling::Random { seed: 2 }, 4);
    fn inputs<'a>(graph: &'a ZoneGraph, configurations: &'a [Configuration], coverage: &'a [CoverageTable]) -> ModelInputs<'a> {
        ModelInputs { graph, ambulances: 3, configurations, coverage }
    }
    assert_eq!(build_model(&ModelSpec::base(), inputs(&graph, &[], &[])).unwrap_err(), ModelError::NoConfigurations);
    assert_eq!(
        build_model(&ModelSpec::base(), inputs(&graph, &configurations, &coverage[..2])).unwrap_err(),
        ModelError::CoverageMismatch { configurations: 4, coverage: 2 }
    );
    assert_eq!(
        build_model(&ModelSpec::binary(Some(0)), inputs(&graph, &configurations, &coverage)).unwrap_err(),
        ModelError::ZeroFrequencyBound
    );
    let small = line_graph(4, &[0, 2]);
    let result = build_model(&ModelSpec::base(), inputs(&small, &configurations, &coverage));
    assert!(matches!(result, Err(ModelError::ShapeMismatch { index: 0, .. })));
}

/// Ensures the ILP agrees with scoring every candidate directly, for every objective
#[test]
fn test_base_model_matches_enumeration() {
    let graph = line_graph(5, &[0, 2]);
    let fleet = fleet(3, 2, 0);
    let (configurations, coverage) = candidates(&graph, fleet, Sampling::Random { seed: 1 }, 30);
    for objective in [FairnessObjective::MinimiseGap, FairnessObjective::MaximiseMinimum, FairnessObjective::MaximiseTotal] {
        let spec = ModelSpec::base().with_fleet(&fleet).with_objective(objective);
        let model = build(&graph, &spec, 3, &configurations, &coverage);
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal);
        let expected = best_by_enumeration(&spec, &graph, 3, &configurations, &coverage).unwrap();
        let objective_found = solution.objective.unwrap();
        assert!((objective_found - expected.objective).abs() < 1e-6, "{objective:?}: {objective_found} vs {}", expected.objective);

        let report = interpret(&model, &configurations, &coverage, &solution).unwrap();
        let plan = report.plan.unwrap();
        assert_eq!(&plan.counts, configurations[plan.selected].counts());
        assert!((objective_value(objective, &plan.zone_coverage) - objective_found).abs() < 1e-6);
    }
}

#[test]
fn test_binary_model_matches_base_model() {
    let graph = line_graph(5, &[0, 2]);
    let fleet = fleet(3, 2, 0);
    let (configurations, coverage) = candidates(&graph, fleet, Sampling::Random { seed: 4 }, 25);
    let base = solve(&build(&graph, &ModelSpec::base().with_fleet(&fleet), 3, &configurations, &coverage));
    let binary_spec = ModelSpec::binary(None).with_fleet(&fleet);
    let binary_model = build(&graph, &binary_spec, 3, &configurations, &coverage);
    let binary = solve(&binary_model);
    assert_eq!(binary.status, SolveStatus::Optimal);
    assert!((base.objective.unwrap() - binary.objective.unwrap()).abs() < 1e-6, "Ensure the unary expansion is exact");

    let report = interpret(&binary_model, &configurations, &coverage, &binary).unwrap();
    let plan = report.plan.unwrap();
    assert_eq!(&plan.counts, configurations[plan.selected].counts(), "Ensure bits collapse back to the selected counts");

    // A narrow expansion excludes every candidate with a count above the width
    let narrow = ModelSpec::binary(Some(1)).with_fleet(&fleet);
    let solution = solve(&build(&graph, &narrow, 3, &configurations, &coverage));
    match best_by_enumeration(&narrow, &graph, 3, &configurations, &coverage) {
        Some(best) => assert!((solution.objective.unwrap() - best.objective).abs() < 1e-6),
        None => assert_eq!(solution.status, SolveStatus::Infeasible),
    }
}

#[test]
fn test_consistency_scenario() {
    let graph = line_graph(5, &[0, 3]);
    let fleet = fleet(50, 3, 0);
    let (configurations, coverage) = candidates(&graph, fleet, Sampling::Drift { seed: 9, max_shift: 10 }, 20);
    let spec = ModelSpec::consistency(MovementRule::PerZone { max_shift: 10 }).with_fleet(&fleet);
    let model = build(&graph, &spec, 50, &configurations, &coverage);
    let solution = solve(&model);
    assert!(solution.status.has_solution());
    let plan = interpret(&model, &configurations, &coverage, &solution).unwrap().plan.unwrap();
    for z in 0..5 {
        if !graph.is_base(z) {
            assert_eq!(plan.counts[[z, 0]], 0, "Ensure period 0 only uses bases");
        }
        for p in 1..3 {
            assert!(plan.counts[[z, p]].abs_diff(plan.counts[[z, p - 1]]) <= 10);
        }
    }
    assert_eq!(plan.counts[[0, 0]] + plan.counts[[3, 0]], 50);
}

/// The same scenario driven from run parameters, with the default random sampler
#[test]
fn test_consistency_run_bounds_default_sampling() {
    let graph = line_graph(5, &[0, 3]);
    let mut params = RunParams::default();
    params.mode = RunMode::Consistency;
    params.fleet = fleet(50, 3, 0);
    params.configurations.count = 200;
    params.model.max_movement = 10;
    assert_eq!(
        movement_bounded(params.configurations.sampling, params.model.movement()),
        Sampling::Drift { seed: 0, max_shift: 10 },
        "Ensure the unbounded default sampler is replaced"
    );

    let report = Experiment::new(&graph, &params, MicrolpBackend).consistency_run().unwrap();
    assert!(report.status.has_solution(), "Ensure the scenario is solvable, found {:?}", report.status);
    let plan = report.plan.unwrap();
    for z in 0..5 {
        for p in 1..3 {
            assert!(plan.counts[[z, p]].abs_diff(plan.counts[[z, p - 1]]) <= 10);
        }
    }
    assert_eq!(plan.counts[[0, 0]] + plan.counts[[3, 0]], 50, "Ensure period 0 only uses bases");
}

#[test]
fn test_movement_bounded_sampling() {
    let per_zone = MovementRule::PerZone { max_shift: 4 };
    let narrow = Sampling::Drift { seed: 7, max_shift: 2 };
    assert_eq!(movement_bounded(narrow, per_zone), narrow, "Ensure drift within the bound is kept");
    assert_eq!(movement_bounded(Sampling::Drift { seed: 7, max_shift: 9 }, per_zone), Sampling::Drift { seed: 7, max_shift: 4 });
    assert_eq!(movement_bounded(Sampling::Random { seed: 3 }, MovementRule::Network { max_moves: 1 }), Sampling::Drift { seed: 3, max_shift: 1 });
    assert_eq!(movement_bounded(Sampling::Exhaustive, per_zone), Sampling::Drift { seed: 0, max_shift: 4 });
}

#[test]
fn test_zero_movement_forces_static_allocation() {
    let graph = line_graph(5, &[0, 2]);
    let fleet = fleet(4, 3, 0);
    let (mut configurations, _) = candidates(&graph, fleet, Sampling::Random { seed: 5 }, 10);
    configurations.push(Configuration::new(array![[2, 2, 2], [0, 0, 0], [2, 2, 2], [0, 0, 0], [0, 0, 0]], 4).unwrap());
    let coverage = CoverageEvaluator::new(&graph, CoverageMetric::Neighbourhood).evaluate_all(&configurations);
    for rule in [MovementRule::PerZone { max_shift: 0 }, MovementRule::Network { max_moves: 0 }] {
        let model = build(&graph, &ModelSpec::consistency(rule).with_fleet(&fleet), 4, &configurations, &coverage);
        let solution = solve(&model);
        assert_eq!(solution.status, SolveStatus::Optimal, "{rule:?}");
        let plan = interpret(&model, &configurations, &coverage, &solution).unwrap().plan.unwrap();
        for z in 0..5 {
            let row = plan.counts.row(z);
            assert!(row.iter().all_equal(), "Ensure {rule:?} keeps zone {z} fixed, found {row}");
        }
    }
}

#[test]
fn test_unsatisfiable_base_minimum_is_infeasible() {
    let graph = line_graph(10, &(0..10).collect_vec());
    let unconstrained = fleet(5, 1, 0);
    let (configurations, coverage) = candidates(&graph, unconstrained, Sampling::Random { seed: 8 }, 20);
    let spec = ModelSpec { min_per_base: 1, ..ModelSpec::base() };
    let model = build(&graph, &spec, 5, &configurations, &coverage);
    let solution = solve(&model);
    assert_eq!(solution.status, SolveStatus::Infeasible, "Ensure infeasibility is a status, not a crash");
    assert_eq!(solution.assignment, None);
    let report = interpret(&model, &configurations, &coverage, &solution).unwrap();
    assert_eq!(report.plan, None);
}

#[test]
fn test_scripted_backend_statuses() {
    let graph = line_graph(5, &[0, 2]);
    let (configurations, coverage) = candidates(&graph, fleet(3, 2, 0), Sampling::Random { seed: 6 }, 6);
    let model = build(&graph, &ModelSpec::base(), 3, &configurations, &coverage);
    let optimal = solve(&model).assignment.unwrap();
    let scripted = |outcome| SolverAdapter::new(ScriptedBackend(outcome), SolveLimits::default()).solve(&model);

    let no_incumbent = scripted(BackendOutcome::TimeLimited(None)).unwrap();
    assert_eq!(no_incumbent.status, SolveStatus::NoSolution);
    assert_eq!(interpret(&model, &configurations, &coverage, &no_incumbent).unwrap().plan, None);

    let zeros = vec![0.0; model.program().num_variables()];
    let bad_incumbent = scripted(BackendOutcome::TimeLimited(Some(zeros))).unwrap();
    assert_eq!(bad_incumbent.status, SolveStatus::NoSolution, "Ensure an infeasible incumbent is discarded");

    let incumbent = scripted(BackendOutcome::TimeLimited(Some(optimal.clone()))).unwrap();
    assert_eq!(incumbent.status, SolveStatus::Feasible);
    assert!(interpret(&model, &configurations, &coverage, &incumbent).unwrap().plan.is_some());

    assert_eq!(scripted(BackendOutcome::Infeasible).unwrap().status, SolveStatus::Infeasible);
    assert!(matches!(
        scripted(BackendOutcome::Optimal(optimal[1..].to_vec())),
        Err(SolverError::AssignmentLength { backend: "scripted", .. })
    ));
}

#[test]
fn test_tampered_bits_are_rejected() {
    let graph = line_graph(5, &[0, 2]);
    let fleet = fleet(3, 2, 0);
    let (configurations, coverage) = candidates(&graph, fleet, Sampling::Random { seed: 10 }, 10);
    let model = build(&graph, &ModelSpec::binary(None).with_fleet(&fleet), 3, &configurations, &coverage);
    let solution = solve(&model);
    let CountVariables::Unary(bits) = &model.layout().counts else {
        panic!("Expected unary counts");
    };
    let tampered = |edit: &dyn Fn(&mut Vec<f64>)| {
        let mut assignment = solution.assignment.clone().unwrap();
        edit(&mut assignment);
        Solution { assignment: Some(assignment), ..solution.clone() }
    };
    let is_inconsistent = |s: &Solution| {
        matches!(interpret(&model, &configurations, &coverage, s), Err(InterpretError::BinarizationInconsistency { zone: 1, period: 1, .. }))
    };

    let disordered = tampered(&|a| {
        a[bits[[1, 1, 0]].index()] = 0.0;
        a[bits[[1, 1, 1]].index()] = 1.0;
    });
    assert!(is_inconsistent(&disordered), "Ensure a set bit after an unset one is caught");

    let fractional = tampered(&|a| a[bits[[1, 1, 2]].index()] = 0.5);
    assert!(is_inconsistent(&fractional), "Ensure fractional bits are caught");

    let selected = interpret(&model, &configurations, &coverage, &solution).unwrap().plan.unwrap().selected;
    let count = configurations[selected].count(1, 1) as usize;
    let wrong = if count < 3 {count + 1} else {count - 1};
    let miscounted = tampered(&|a| {
        for k in 0..3 {
            a[bits[[1, 1, k]].index()] = if k < wrong {1.0} else {0.0};
        }
    });
    assert!(is_inconsistent(&miscounted), "Ensure bits that disagree with the selection are caught");
}

#[test]
fn test_run_params() {
    let defaults: RunParams = toml::from_str("").unwrap();
    assert_eq!(defaults, RunParams::default());
    assert!(defaults.validate().is_ok());
    assert_eq!(defaults.configurations.max(), 1000);
    assert_eq!(defaults.solver.limits().time_limit, Some(Duration::from_secs(600)));

    let params: RunParams = toml::from_str(r#"
        mode = "consistency"
        instance = "instances/five_zones.toml"

        [fleet]
        ambulances = 12
        periods = 4

        [configurations.sampling]
        strategy = "drift"
        seed = 4
        max_shift = 2

        [coverage]
        metric = "response_time"
        worst_case = 5.0

        [model]
        movement_rule = "network"
        max_movement = 3
    "#).unwrap();
    assert_eq!(params.mode, RunMode::Consistency);
    assert_eq!(params.fleet.ambulances, 12);
    assert!(params.fleet.base_constrained, "Ensure omitted fleet fields keep their defaults");
    assert_eq!(params.configurations.sampling, Sampling::Drift { seed: 4, max_shift: 2 });
    assert_eq!(params.coverage, CoverageMetric::ResponseTime { worst_case: 5.0 });
    assert_eq!(params.model.movement_rule, MovementKind::Network);
    assert_eq!(params.model.movement(), MovementRule::Network { max_moves: 3 });

    fs::write("__test_params.toml", "[configurations]\nmin = 0\n").unwrap();
    let result = parse_params("__test_params.toml");
    fs::remove_file("__test_params.toml").unwrap();
    assert!(result.is_err(), "Ensure an empty configuration range is rejected");
}

/// Ensures one failing parameter set does not stop the rest of a sweep
#[test]
fn test_sweep_continues_after_failure() {
    let graph = line_graph(5, &[0, 2]);
    let mut params = RunParams::default();
    params.fleet = fleet(3, 2, 0);
    params.mode = RunMode::Compare;
    params.configurations.sizes = vec![5, 10];
    params.model.frequency_bounds = vec![0, 2];
    let records = Experiment::new(&graph, &params, MicrolpBackend).compare_formulations();
    assert_eq!(records.len(), 6);
    for chunk in records.chunks(3) {
        assert!(!chunk[0].is_failure() && chunk[0].label == "base");
        assert!(chunk[1].is_failure(), "Ensure a zero frequency bound fails its own parameter set");
        assert!(!chunk[2].is_failure() && chunk[2].status.is_some());
    }

    params.fleet = fleet(3, 2, 5);
    let records = Experiment::new(&graph, &params, MicrolpBackend).compare_formulations();
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.is_failure()), "Ensure failed generation is recorded per parameter set");
}

#[test]
fn test_size_sweep_and_consistency_run() {
    let graph = line_graph(5, &[0, 2]);
    let mut params = RunParams::default();
    params.fleet = fleet(3, 2, 0);
    params.configurations.min = 4;
    params.configurations.max = Some(16);
    params.configurations.steps = 3;
    let experiment = Experiment::new(&graph, &params, MicrolpBackend);
    let records = experiment.size_sweep().unwrap();
    assert_eq!(records.iter().map(|r| r.config_count).collect_vec(), vec![4, 8, 16]);
    assert!(records.iter().all(|r| r.status == Some(SolveStatus::Optimal)));
    // Larger candidate sets contain the smaller ones, so the worst zone never gets worse
    assert!(records.windows(2).all(|w| w[1].objective.unwrap() >= w[0].objective.unwrap() - 1e-6));

    params.configurations.count = 12;
    params.model.max_movement = 3;
    params.model.binarize = true;
    let report = Experiment::new(&graph, &params, MicrolpBackend).consistency_run();
    match report {
        Ok(report) => assert_eq!(report.label, "consistency"),
        Err(e) => panic!("consistency run failed: {e}"),
    }

    params.fleet = fleet(3, 2, 5);
    let failed = Experiment::new(&graph, &params, MicrolpBackend).consistency_run();
    assert!(matches!(failed, Err(Error::Generation(GenerationError::EmptyConfigurationSet { .. }))));
}

#[test]
fn test_counts_round_trip_through_arrays() {
    let counts: Array2<u32> = array![[1, 0], [2, 3]];
    let configuration = Configuration::new(counts.clone(), 3).unwrap();
    assert_eq!(configuration.counts(), &counts);
    assert_eq!(configuration.max_shift(), 1);
    assert_eq!(
        Configuration::new(array![[1, 0], [1, 3]], 3),
        Err(GenerationError::BudgetViolated { period: 0, expected: 3, found: 2 })
    );
}
