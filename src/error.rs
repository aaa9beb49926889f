//! Error types for every layer of the allocation pipeline.
//!
//! Solver-reported infeasibility and time limits are *not* errors: they are
//! surfaced as [`SolveStatus`](crate::solver::SolveStatus) values.

use thiserror::Error;

/// Problems found while validating an instance description
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstanceError {
    #[error("the instance has no zones")]
    NoZones,
    #[error("zone `{0}` is declared more than once")]
    DuplicateZone(String),
    #[error("edge refers to unknown zone `{0}`")]
    UnknownZone(String),
    #[error("edge {from} - {to} has invalid weight {weight}")]
    InvalidWeight { from: String, to: String, weight: f64 },
    #[error("edge {from} - {to} has no weight and its endpoints lack coordinates")]
    MissingCoordinates { from: String, to: String },
    #[error("distance matrix should be {expected}x{expected}, found {rows} rows with a row of length {cols}")]
    DistanceShape { expected: usize, rows: usize, cols: usize },
    /// Matrix entries may be infinite for unreachable pairs, never negative or NaN
    #[error("distance from {from} to {to} is invalid: {distance}")]
    InvalidDistance { from: String, to: String, distance: f64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    /// No valid candidate exists, or none could be produced
    #[error("no valid configuration could be generated: {reason}")]
    EmptyConfigurationSet { reason: String },
    #[error("invalid configuration count range {min}..={max} in {steps} steps")]
    InvalidRange { min: usize, max: usize, steps: usize },
    #[error("configuration budget violated in period {period}: {found} ambulances instead of {expected}")]
    BudgetViolated { period: usize, expected: u32, found: u32 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("cannot build a model without configurations")]
    NoConfigurations,
    #[error("{configurations} configurations but {coverage} coverage tables")]
    CoverageMismatch { configurations: usize, coverage: usize },
    #[error("configuration {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch { index: usize, expected: [usize; 2], found: [usize; 2] },
    #[error("the maximum frequency bound must be at least 1")]
    ZeroFrequencyBound,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("the {backend} backend reported an unbounded model")]
    Unbounded { backend: &'static str },
    #[error("the {backend} backend failed: {message}")]
    Backend { backend: &'static str, message: String },
    #[error("the {backend} backend returned {found} values for {expected} variables")]
    AssignmentLength { backend: &'static str, expected: usize, found: usize },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InterpretError {
    /// The thermometer bits returned by the solver do not decode to the
    /// selected configuration. Points at a formulation or solver bug.
    #[error("binarization inconsistency at zone {zone}, period {period}: {detail}")]
    BinarizationInconsistency { zone: usize, period: usize, detail: String },
    #[error("expected exactly one selected configuration, found {0}")]
    SelectionInconsistency(usize),
    #[error("deployment count at zone {zone}, period {period} is not integral: {value}")]
    NonIntegralCount { zone: usize, period: usize, value: f64 },
    #[error("deployment count at zone {zone}, period {period} is {decoded}, but the selected configuration deploys {expected}")]
    CountMismatch { zone: usize, period: usize, decoded: u32, expected: u32 },
    #[error("the model was built over {expected} configurations, but {found} were supplied")]
    CandidateMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not access {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("could not parse {path}: {source}")]
    Toml { path: String, source: toml::de::Error },
    #[error("could not serialise TOML: {0}")]
    Serialise(#[from] toml::ser::Error),
    #[error("invalid run parameters: {0}")]
    InvalidParams(String),
}

/// Any failure of a single allocation run
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Interpret(#[from] InterpretError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
