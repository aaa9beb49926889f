//! The building blocks every formulation is assembled from.
//!
//! Each contribution adds its own variables and constraints to a [`ModelBuilder`] and
//! records the handles the rest of the build (and the interpretation of solutions) needs.

use ndarray::{Array2, Array3};

use super::{
    grid,
    program::{Comparison, Direction, Domain, LinearExpr},
    CountEncoding, CountVariables, FairnessObjective, Flow, ModelBuilder, MovementRule,
};

/// A composable piece of a formulation
pub trait Contribution {
    fn name(&self) -> &'static str;
    fn apply(&self, builder: &mut ModelBuilder<'_>);
}

/// One binary indicator per configuration, exactly one of which is set
pub struct Selection;
impl Contribution for Selection {
    fn name(&self) -> &'static str {
        "selection"
    }

    fn apply(&self, b: &mut ModelBuilder<'_>) {
        let program = &mut b.program;
        b.selection = (0..b.inputs.configurations.len())
            .map(|c| program.add_variable(format!("select[{c}]"), Domain::Binary))
            .collect();
        let all: LinearExpr = b.selection.iter().map(|&v| (v, 1.0)).collect();
        b.program.add_constraint("select_one", all, Comparison::Equal, 1.0);
    }
}

/// Count variables tied to the counts of the selected configuration
pub struct DeploymentCounts {
    pub encoding: CountEncoding,
}
impl Contribution for DeploymentCounts {
    fn name(&self) -> &'static str {
        match self.encoding {
            CountEncoding::Integer => "integer_counts",
            CountEncoding::Unary { .. } => "unary_counts",
        }
    }

    fn apply(&self, b: &mut ModelBuilder<'_>) {
        let (zones, periods, ambulances) = (b.inputs.zones(), b.inputs.periods(), b.inputs.ambulances);
        let program = &mut b.program;
        let counts = match self.encoding {
            CountEncoding::Integer => {
                let domain = Domain::Integer { lower: 0.0, upper: ambulances as f64 };
                CountVariables::Integer(Array2::from_shape_fn((zones, periods), |(z, p)| {
                    program.add_variable(format!("x[{z},{p}]"), domain)
                }))
            }
            CountEncoding::Unary { max_frequency } => {
                let width = max_frequency.map_or(ambulances, |n| n.min(ambulances)) as usize;
                let bits = Array3::from_shape_fn((zones, periods, width), |(z, p, k)| {
                    program.add_variable(format!("u[{z},{p},{k}]"), Domain::Binary)
                });
                for (z, p) in grid(zones, periods) {
                    for k in 1..width {
                        let order = LinearExpr::from(bits[[z, p, k]]).with_term(bits[[z, p, k - 1]], -1.0);
                        program.add_constraint(format!("order[{z},{p},{k}]"), order, Comparison::LessEq, 0.0);
                    }
                }
                CountVariables::Unary(bits)
            }
        };
        b.counts = Some(counts);
        let row = match self.encoding {
            CountEncoding::Integer => "count",
            CountEncoding::Unary { .. } => "unary",
        };
        for (z, p) in grid(zones, periods) {
            let mut link = b.count_expr(z, p);
            link.add_scaled(&b.selected_count(z, p), -1.0);
            b.program.add_constraint(format!("{row}[{z},{p}]"), link, Comparison::Equal, 0.0);
        }
    }
}

/// Period 0 uses only base stations, each holding at least `min_per_base`
pub struct BaseOrigin {
    pub min_per_base: u32,
}
impl Contribution for BaseOrigin {
    fn name(&self) -> &'static str {
        "base_origin"
    }

    fn apply(&self, b: &mut ModelBuilder<'_>) {
        if b.inputs.periods() == 0 {
            return;
        }
        for z in 0..b.inputs.zones() {
            let count = b.count_expr(z, 0);
            if !b.inputs.graph.is_base(z) {
                b.program.add_constraint(format!("origin[{z}]"), count, Comparison::Equal, 0.0);
            } else if self.min_per_base > 0 {
                b.program.add_constraint(format!("base_min[{z}]"), count, Comparison::GreaterEq, self.min_per_base as f64);
            }
        }
    }
}

/// Bounds on how the deployment changes between consecutive periods
pub struct Movement {
    pub rule: MovementRule,
}
impl Contribution for Movement {
    fn name(&self) -> &'static str {
        match self.rule {
            MovementRule::PerZone { .. } => "per_zone_movement",
            MovementRule::Network { .. } => "network_movement",
        }
    }

    fn apply(&self, b: &mut ModelBuilder<'_>) {
        let (zones, periods) = (b.inputs.zones(), b.inputs.periods());
        match self.rule {
            MovementRule::PerZone { max_shift } => {
                let bound = max_shift as f64;
                for (z, p) in grid(zones, periods).filter(|&(_, p)| p > 0) {
                    let mut change = b.count_expr(z, p);
                    change.add_scaled(&b.count_expr(z, p - 1), -1.0);
                    b.program.add_constraint(format!("shift_up[{z},{p}]"), change.clone(), Comparison::LessEq, bound);
                    b.program.add_constraint(format!("shift_down[{z},{p}]"), change, Comparison::GreaterEq, -bound);
                }
            }
            MovementRule::Network { max_moves } => {
                let domain = Domain::Integer { lower: 0.0, upper: b.inputs.ambulances as f64 };
                for p in 1..periods {
                    let period = p - 1;
                    let first = b.flows.len();
                    for from in 0..zones {
                        let reachable = std::iter::once(from).chain(b.inputs.graph.neighbours(from).iter().copied());
                        for to in reachable {
                            let var = b.program.add_variable(format!("move[{from},{to},{period}]"), domain);
                            b.flows.push(Flow { from, to, period, var });
                        }
                    }
                    let arcs = &b.flows[first..];
                    let mut moved = LinearExpr::new();
                    for zone in 0..zones {
                        let mut outflow: LinearExpr = arcs.iter().filter(|f| f.from == zone).map(|f| (f.var, 1.0)).collect();
                        outflow.add_scaled(&b.count_expr(zone, period), -1.0);
                        let mut inflow: LinearExpr = arcs.iter().filter(|f| f.to == zone).map(|f| (f.var, 1.0)).collect();
                        inflow.add_scaled(&b.count_expr(zone, p), -1.0);
                        b.program.add_constraint(format!("outflow[{zone},{period}]"), outflow, Comparison::Equal, 0.0);
                        b.program.add_constraint(format!("inflow[{zone},{period}]"), inflow, Comparison::Equal, 0.0);
                    }
                    for f in arcs.iter().filter(|f| f.from != f.to) {
                        moved.add_term(f.var, 1.0);
                    }
                    b.program.add_constraint(format!("moves[{period}]"), moved, Comparison::LessEq, max_moves as f64);
                }
            }
        }
    }
}

/// Per-zone coverage of the selected configuration
pub struct Coverage;
impl Contribution for Coverage {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn apply(&self, b: &mut ModelBuilder<'_>) {
        let totals: Vec<_> = b.inputs.coverage.iter().map(|t| t.zone_totals()).collect();
        for z in 0..b.inputs.zones() {
            let (lower, upper) = totals.iter().map(|t| t[z])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
            let y = b.program.add_variable(format!("y[{z}]"), Domain::Continuous { lower, upper });
            let mut link = LinearExpr::from(y);
            for (t, &select) in totals.iter().zip(&b.selection) {
                link.add_term(select, -t[z]);
            }
            b.program.add_constraint(format!("coverage[{z}]"), link, Comparison::Equal, 0.0);
            b.coverage.push(y);
        }
    }
}

/// The objective over the per-zone coverage variables
pub struct Fairness {
    pub objective: FairnessObjective,
}
impl Contribution for Fairness {
    fn name(&self) -> &'static str {
        "fairness"
    }

    fn apply(&self, b: &mut ModelBuilder<'_>) {
        let (lower, upper) = b.inputs.coverage.iter()
            .flat_map(|t| t.zone_totals())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
        let domain = Domain::Continuous { lower, upper };
        let coverage = b.coverage.clone();
        if self.objective == FairnessObjective::MaximiseTotal {
            let total = coverage.iter().map(|&y| (y, 1.0)).collect();
            b.program.set_objective(Direction::Maximise, total);
            return;
        }
        let low = b.program.add_variable("y_min", domain);
        for (z, &y) in coverage.iter().enumerate() {
            b.program.add_constraint(format!("y_min[{z}]"), LinearExpr::from(y).with_term(low, -1.0), Comparison::GreaterEq, 0.0);
        }
        b.coverage_low = Some(low);
        if self.objective == FairnessObjective::MaximiseMinimum {
            b.program.set_objective(Direction::Maximise, LinearExpr::from(low));
            return;
        }
        let high = b.program.add_variable("y_max", domain);
        for (z, &y) in coverage.iter().enumerate() {
            b.program.add_constraint(format!("y_max[{z}]"), LinearExpr::from(y).with_term(high, -1.0), Comparison::LessEq, 0.0);
        }
        b.coverage_high = Some(high);
        b.program.set_objective(Direction::Minimise, LinearExpr::from(high).with_term(low, -1.0));
    }
}
