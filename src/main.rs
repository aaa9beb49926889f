#![warn(rust_2018_idioms)]

use std::env;

use ambulance_alloc::{
    parse::{parse_instance, parse_params},
    solver::make_backend,
    sweep::{Experiment, RunOutcome},
};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params_path = env::args().nth(1).unwrap_or_else(|| "run.toml".to_string());
    let params = parse_params(&params_path).with_context(|| format!("loading run parameters from {params_path}"))?;
    let graph = parse_instance(&params.instance)
        .with_context(|| format!("loading instance {}", params.instance.display()))?;
    let backend = make_backend(params.solver.backend)?;

    let experiment = Experiment::new(&graph, &params, backend);
    match experiment.run().context("running experiment")? {
        RunOutcome::Records(records) => {
            println!("{:<12} {:>8} {:>6} {:>10} {:>10} {:>8} {:>12} {:>12}",
                "model", "configs", "freq", "build (s)", "solve (s)", "vars", "status", "objective");
            for r in &records {
                let secs = |d: Option<std::time::Duration>| d.map_or("-".to_string(), |d| format!("{:.3}", d.as_secs_f64()));
                let status = r.status.map_or("failed".to_string(), |s| format!("{s:?}"));
                println!("{:<12} {:>8} {:>6} {:>10} {:>10} {:>8} {:>12} {:>12}",
                    r.label,
                    r.config_count,
                    r.max_frequency.map_or("-".to_string(), |n| n.to_string()),
                    secs(r.build_time),
                    secs(r.solve_time),
                    r.num_variables,
                    status,
                    r.objective.map_or("-".to_string(), |o| format!("{o:.3}")),
                );
                if let Some(error) = &r.error {
                    println!("    {error}");
                }
            }
        }
        RunOutcome::Report(report) => {
            println!("{} model: {:?} (objective {:?}, {:.3} s)",
                report.label, report.status, report.objective, report.solve_time.as_secs_f64());
            if let Some(plan) = &report.plan {
                println!("selected configuration {}, fairness gap {:.3}, minimum coverage {:.3}, total {:.3}",
                    plan.selected, plan.fairness_gap, plan.minimum_coverage, plan.total_coverage);
                for (z, (zone, counts)) in graph.zones().iter().zip(plan.counts.rows()).enumerate() {
                    let row = counts.iter().map(|c| format!("{c:>4}")).collect::<String>();
                    println!("{:<12} {row}   covered in {} of {} periods", zone.name, plan.covered_periods(z), plan.periods());
                }
            }
        }
    }
    Ok(())
}
