//! Evaluates how well a deployment covers the zones, period by period.
//!
//! Distances between zones are shortest paths over the instance graph, computed once
//! per instance with Dijkstra's algorithm.

use std::cmp::Reverse;

use itertools::Itertools;
use ndarray::{Array2, ArrayView2};
use ordered_float::NotNan;
use radix_heap::RadixHeapMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{generate::Configuration, problem::ZoneGraph};

/// All-pairs shortest-path distances over an undirected weighted graph.
/// Unreachable pairs are left at infinity.
pub fn shortest_paths(n: usize, edges: &[(usize, usize, f64)]) -> Array2<f64> {
    let mut adjacency = vec![vec![]; n];
    for &(a, b, w) in edges {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
    }
    let rows: Vec<Vec<f64>> = (0..n).into_par_iter().map(|source| dijkstra(&adjacency, source)).collect();
    Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
}

fn dijkstra(adjacency: &[Vec<(usize, f64)>], source: usize) -> Vec<f64> {
    let mut distances = vec![f64::INFINITY; adjacency.len()];
    distances[source] = 0.0;
    // Edge weights are non-negative, so pushed keys never exceed the last popped key,
    // which is the monotonicity the radix heap requires
    let mut heap: RadixHeapMap<Reverse<NotNan<f64>>, usize> = RadixHeapMap::new();
    heap.push(Reverse(NotNan::default()), source);
    while let Some((Reverse(d), zone)) = heap.pop() {
        let d = d.into_inner();
        if d > distances[zone] {continue};
        for &(next, w) in &adjacency[zone] {
            // Weights are finite, so sums of them never produce NaN
            let Ok(candidate) = NotNan::new(d + w) else {continue};
            if *candidate < distances[next] {
                distances[next] = *candidate;
                heap.push(Reverse(candidate), next);
            }
        }
    }
    distances
}

/// How the service quality of a zone in one period is scored.
/// Higher scores are always better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum CoverageMetric {
    /// 1 if an ambulance is stationed in the zone or an adjacent one, else 0
    #[default]
    Neighbourhood,
    /// 1 if the nearest ambulance is at most `radius` away, else 0
    Radius { radius: f64 },
    /// `worst_case - d` where `d` is the distance to the nearest ambulance,
    /// capped at `worst_case`. Zones no ambulance can reach score 0.
    ResponseTime { worst_case: f64 },
}

/// Coverage scores of every zone in every period, indexed `[zone, period]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageTable {
    scores: Array2<f64>,
}
impl CoverageTable {
    pub fn score(&self, zone: usize, period: usize) -> f64 {
        self.scores[[zone, period]]
    }

    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    /// The coverage of each zone summed over the horizon
    pub fn zone_totals(&self) -> Vec<f64> {
        self.scores.rows().into_iter().map(|row| row.sum()).collect_vec()
    }
}

/// Scores configurations against a fixed graph and metric
#[derive(Debug, Clone, Copy)]
pub struct CoverageEvaluator<'a> {
    graph: &'a ZoneGraph,
    metric: CoverageMetric,
}
impl<'a> CoverageEvaluator<'a> {
    pub fn new(graph: &'a ZoneGraph, metric: CoverageMetric) -> Self {
        Self { graph, metric }
    }

    pub fn metric(&self) -> CoverageMetric {
        self.metric
    }

    pub fn evaluate(&self, configuration: &Configuration) -> CoverageTable {
        self.evaluate_counts(configuration.counts().view())
    }

    /// Scores a raw `[zone, period]` count matrix
    pub fn evaluate_counts(&self, counts: ArrayView2<'_, u32>) -> CoverageTable {
        let (zones, periods) = counts.dim();
        let mut scores = Array2::zeros((zones, periods));
        for p in 0..periods {
            let deployed = (0..zones).filter(|&z| counts[[z, p]] > 0).collect_vec();
            for z in 0..zones {
                scores[[z, p]] = match self.metric {
                    CoverageMetric::Neighbourhood => {
                        let covered = counts[[z, p]] > 0
                            || self.graph.neighbours(z).iter().any(|&n| counts[[n, p]] > 0);
                        if covered {1.0} else {0.0}
                    }
                    CoverageMetric::Radius { radius } => {
                        if self.nearest(z, &deployed) <= radius {1.0} else {0.0}
                    }
                    CoverageMetric::ResponseTime { worst_case } => {
                        worst_case - self.nearest(z, &deployed).min(worst_case)
                    }
                };
            }
        }
        CoverageTable { scores }
    }

    /// Evaluates many configurations in parallel, preserving their order
    pub fn evaluate_all(&self, configurations: &[Configuration]) -> Vec<CoverageTable> {
        configurations.par_iter().map(|c| self.evaluate(c)).collect()
    }

    fn nearest(&self, zone: usize, deployed: &[usize]) -> f64 {
        deployed.iter().map(|&d| self.graph.distance(zone, d)).fold(f64::INFINITY, f64::min)
    }
}
