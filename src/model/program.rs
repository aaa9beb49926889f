//! A solver-neutral integer program: named variables with domains, linear
//! constraints and a linear objective.

use std::fmt;

/// Tolerance used when checking integrality and constraint satisfaction
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Handle of a variable within one [`IntegerProgram`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);
impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    Binary,
    Integer { lower: f64, upper: f64 },
    Continuous { lower: f64, upper: f64 },
}
impl Domain {
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Domain::Binary => (0.0, 1.0),
            Domain::Integer { lower, upper } | Domain::Continuous { lower, upper } => (lower, upper),
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(self, Domain::Continuous { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
}

/// `Σ coefficient·variable + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}
impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self { terms: vec![], constant: value }
    }

    /// Adds `coefficient·var`, skipping zero coefficients
    pub fn add_term(&mut self, var: VarId, coefficient: f64) -> &mut Self {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
        self
    }

    /// Adds `factor·other`
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) -> &mut Self {
        for &(var, c) in &other.terms {
            self.add_term(var, c * factor);
        }
        self.constant += other.constant * factor;
        self
    }

    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.0]).sum::<f64>() + self.constant
    }
}
impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::new().with_term(var, 1.0)
    }
}
impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        let mut expr = LinearExpr::new();
        for (var, c) in iter {
            expr.add_term(var, c);
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessEq,
    GreaterEq,
    Equal,
}
impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Comparison::LessEq => "<=",
            Comparison::GreaterEq => ">=",
            Comparison::Equal => "==",
        })
    }
}

/// `lhs cmp rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub lhs: LinearExpr,
    pub cmp: Comparison,
    pub rhs: f64,
}
impl Constraint {
    pub fn is_satisfied_by(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs.evaluate(values);
        let slack = tolerance * (1.0 + self.rhs.abs());
        match self.cmp {
            Comparison::LessEq => lhs <= self.rhs + slack,
            Comparison::GreaterEq => lhs >= self.rhs - slack,
            Comparison::Equal => (lhs - self.rhs).abs() <= slack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimise,
    Maximise,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub direction: Direction,
    pub expr: LinearExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerProgram {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Objective,
}
impl Default for IntegerProgram {
    fn default() -> Self {
        Self::new()
    }
}
impl IntegerProgram {
    /// An empty program minimising zero
    pub fn new() -> Self {
        Self {
            variables: vec![],
            constraints: vec![],
            objective: Objective { direction: Direction::Minimise, expr: LinearExpr::new() },
        }
    }

    pub fn add_variable(&mut self, name: impl Into<String>, domain: Domain) -> VarId {
        self.variables.push(Variable { name: name.into(), domain });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, lhs: LinearExpr, cmp: Comparison, rhs: f64) {
        self.constraints.push(Constraint { name: name.into(), lhs, cmp, rhs });
    }

    pub fn set_objective(&mut self, direction: Direction, expr: LinearExpr) {
        self.objective = Objective { direction, expr };
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// The number of variables of each kind: binary, general integer, continuous
    pub fn variable_census(&self) -> (usize, usize, usize) {
        self.variables.iter().fold((0, 0, 0), |(b, i, c), v| match v.domain {
            Domain::Binary => (b + 1, i, c),
            Domain::Integer { .. } => (b, i + 1, c),
            Domain::Continuous { .. } => (b, i, c + 1),
        })
    }

    /// A constraint without variables that can never hold, if any.
    /// Backends are never handed such constraints.
    pub fn trivially_violated(&self) -> Option<&Constraint> {
        self.constraints.iter()
            .find(|c| c.lhs.terms().is_empty() && !c.is_satisfied_by(&[], FEASIBILITY_TOLERANCE))
    }

    /// Describes the first bound, integrality or constraint violation of `values`
    pub fn first_violation(&self, values: &[f64], tolerance: f64) -> Option<String> {
        if values.len() != self.variables.len() {
            return Some(format!("{} values for {} variables", values.len(), self.variables.len()));
        }
        for (v, &x) in self.variables.iter().zip(values) {
            let (lower, upper) = v.domain.bounds();
            if !x.is_finite() || x < lower - tolerance || x > upper + tolerance {
                return Some(format!("{} = {} is outside [{}, {}]", v.name, x, lower, upper));
            }
            if v.domain.is_integral() && (x - x.round()).abs() > tolerance {
                return Some(format!("{} = {} is not integral", v.name, x));
            }
        }
        self.constraints.iter()
            .find(|c| !c.is_satisfied_by(values, tolerance))
            .map(|c| format!("constraint {} violated: {} {} {}", c.name, c.lhs.evaluate(values), c.cmp, c.rhs))
    }

    pub fn is_satisfied_by(&self, values: &[f64], tolerance: f64) -> bool {
        self.first_violation(values, tolerance).is_none()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.expr.evaluate(values)
    }
}
