#![warn(rust_2018_idioms)]
//! Multi-period ambulance fleet allocation.
//!
//! Candidate deployments are generated ([`generate`]), scored per zone and period
//! ([`evaluate`]), and chosen between by an integer program ([`model`]) that a MIP
//! backend solves ([`solver`]). The chosen deployment is read back and checked by
//! [`interpret`].

pub mod baseline;
pub mod error;
pub mod evaluate;
pub mod generate;
pub mod interpret;
pub mod model;
pub mod params;
pub mod parse;
pub mod problem;
pub mod solver;
pub mod sweep;

#[cfg(test)]
mod test;
